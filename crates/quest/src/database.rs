use std::time::Duration;

use anyhow::{Context, Result};
use quest_migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use serde::Serialize;
use tracing::{debug, error, info};
use utoipa::ToSchema;

use crate::config::Config;

async fn database_connection(config: &Config) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(config.database_url.clone());
    options
        .max_connections(config.db_max_connections)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(3600))
        // SQL 语句由文件日志层写入 query 日志
        .sqlx_logging(true);

    let connection = Database::connect(options).await.context("连接数据库失败")?;
    debug!(
        "数据库连接池已创建，后端: {:?}，最大连接数: {}",
        connection.get_database_backend(),
        config.db_max_connections
    );
    Ok(connection)
}

async fn migrate_database(connection: &DatabaseConnection) -> Result<()> {
    Migrator::up(connection, None).await.context("数据库迁移失败")?;
    debug!("数据库迁移完成");
    Ok(())
}

/// 建立连接并应用迁移，供 main 使用
pub async fn setup_database(config: &Config) -> Result<DatabaseConnection> {
    let connection = database_connection(config).await?;
    migrate_database(&connection).await?;
    info!("数据库初始化完成");
    Ok(connection)
}

/// 数据库健康状态
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct HealthStatus {
    /// up 或 down
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthStatus {
    pub fn is_up(&self) -> bool {
        self.status == "up"
    }
}

pub async fn health(connection: &DatabaseConnection) -> HealthStatus {
    match connection.ping().await {
        Ok(()) => HealthStatus {
            status: "up".to_string(),
            message: Some("database is healthy".to_string()),
            error: None,
        },
        Err(e) => {
            error!("数据库健康检查失败: {}", e);
            HealthStatus {
                status: "down".to_string(),
                message: None,
                error: Some(e.to_string()),
            }
        }
    }
}

pub async fn close_database(connection: DatabaseConnection) {
    match connection.close().await {
        Ok(()) => info!("数据库连接已关闭"),
        Err(e) => error!("关闭数据库连接失败: {}", e),
    }
}

/// 测试用的内存数据库，已应用全部迁移
#[cfg(test)]
pub(crate) async fn memory_database() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    // 内存库只存在于单个连接中
    options.max_connections(1).min_connections(1).sqlx_logging(false);
    let connection = Database::connect(options).await.unwrap();
    migrate_database(&connection).await.unwrap();
    connection
}
