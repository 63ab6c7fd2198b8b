use std::path::PathBuf;

use clap::Parser;
use tracing::warn;

pub const DEFAULT_PORT: u16 = 8080;

/// 命令行参数，均可通过环境变量（或 .env 文件）提供
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Args {
    /// 监听端口，缺失或非法时回退到 8080
    #[arg(long, env = "PORT")]
    pub port: Option<String>,

    /// 运行环境标记，仅用于日志
    #[arg(long = "env", env = "ENV", default_value = "development")]
    pub environment: String,

    #[arg(long, env = "DB_HOST", default_value = "127.0.0.1")]
    pub db_host: String,

    #[arg(long, env = "DB_PORT", default_value = "3306")]
    pub db_port: String,

    #[arg(long, env = "DB_USERNAME", default_value = "root")]
    pub db_username: String,

    #[arg(long, env = "DB_PASSWORD", default_value = "", hide_env_values = true)]
    pub db_password: String,

    #[arg(long, env = "DB_DATABASE", default_value = "quest")]
    pub db_database: String,

    /// 完整数据库连接串，设置后忽略 DB_* 参数（例如 sqlite://quest.db?mode=rwc）
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 10)]
    pub db_max_connections: u32,

    /// AI 问答服务地址
    #[arg(long, env = "AI_URL", default_value = "")]
    pub ai_url: String,

    /// Bearer Token 的 HS256 密钥
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    #[arg(long, env = "UPLOAD_DIR", default_value = "./upload/user")]
    pub upload_dir: PathBuf,

    #[arg(long, env = "LOG_DIR", default_value = "logs")]
    pub log_dir: PathBuf,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// 解析后的运行配置，由 main 构造后注入各组件
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub environment: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub ai_url: Option<String>,
    pub jwt_secret: String,
    pub upload_dir: PathBuf,
}

impl Config {
    pub fn from_args(args: Args) -> Self {
        let port = resolve_port(args.port.as_deref());
        let database_url = args.database_url.clone().unwrap_or_else(|| {
            mysql_url(
                &args.db_username,
                &args.db_password,
                &args.db_host,
                &args.db_port,
                &args.db_database,
            )
        });
        let ai_url = Some(args.ai_url.trim().to_string()).filter(|url| !url.is_empty());
        if ai_url.is_none() {
            warn!("未配置 AI_URL，所有 AI 请求都将使用占位回答");
        }
        Self {
            port,
            environment: args.environment,
            database_url,
            db_max_connections: args.db_max_connections.max(1),
            ai_url,
            jwt_secret: args.jwt_secret,
            upload_dir: args.upload_dir,
        }
    }
}

/// 解析端口，缺失或非法时记录警告并使用默认端口
pub fn resolve_port(raw: Option<&str>) -> u16 {
    match raw.map(str::trim) {
        Some(value) => match value.parse::<u16>() {
            Ok(port) if port > 0 => port,
            _ => {
                warn!("端口号无效: {:?}，使用默认端口 {}", value, DEFAULT_PORT);
                DEFAULT_PORT
            }
        },
        None => {
            warn!("未设置 PORT，使用默认端口 {}", DEFAULT_PORT);
            DEFAULT_PORT
        }
    }
}

fn mysql_url(username: &str, password: &str, host: &str, port: &str, database: &str) -> String {
    if password.is_empty() {
        format!("mysql://{}@{}:{}/{}", username, host, port, database)
    } else {
        format!("mysql://{}:{}@{}:{}/{}", username, password, host, port, database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args::parse_from(["quest-server", "--jwt-secret", "secret"])
    }

    #[test]
    fn test_resolve_port() {
        assert_eq!(resolve_port(Some("3000")), 3000);
        assert_eq!(resolve_port(Some(" 9000 ")), 9000);
        assert_eq!(resolve_port(None), DEFAULT_PORT);
        assert_eq!(resolve_port(Some("abc")), DEFAULT_PORT);
        assert_eq!(resolve_port(Some("0")), DEFAULT_PORT);
        assert_eq!(resolve_port(Some("70000")), DEFAULT_PORT);
    }

    #[test]
    fn test_database_url_from_parts() {
        let mut args = base_args();
        args.db_host = "db.internal".to_string();
        args.db_port = "3307".to_string();
        args.db_username = "app".to_string();
        args.db_password = "pw".to_string();
        args.db_database = "quest_prod".to_string();
        args.database_url = None;

        let config = Config::from_args(args);
        assert_eq!(config.database_url, "mysql://app:pw@db.internal:3307/quest_prod");
    }

    #[test]
    fn test_database_url_override_and_empty_ai_url() {
        let mut args = base_args();
        args.database_url = Some("sqlite://quest.db?mode=rwc".to_string());
        args.ai_url = "   ".to_string();

        let config = Config::from_args(args);
        assert_eq!(config.database_url, "sqlite://quest.db?mode=rwc");
        assert_eq!(config.ai_url, None);
    }

    #[test]
    fn test_defaults() {
        let mut args = base_args();
        args.port = None;
        let config = Config::from_args(args);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.upload_dir, PathBuf::from("./upload/user"));
        assert_eq!(config.jwt_secret, "secret");
    }
}
