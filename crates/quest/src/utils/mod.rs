pub mod ai_gateway;
pub mod file_logger;
pub mod pagination;
pub mod signal;
pub mod upload;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use self::file_logger::FileLogWriter;

// 自定义控制台输出层
struct ConsoleLayer;

impl<S> Layer<S> for ConsoleLayer
where
    S: Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let level = event.metadata().level();

        let mut visitor = MessageVisitor::new();
        event.record(&mut visitor);

        if let Some(message) = visitor.finish() {
            let timestamp = Local::now().format("%b %d %H:%M:%S");

            let (color_code, level_str) = match *level {
                tracing::Level::ERROR => ("\x1b[31m", "ERROR"), // 红色
                tracing::Level::WARN => ("\x1b[33m", " WARN"),  // 黄色
                tracing::Level::INFO => ("\x1b[32m", " INFO"),  // 绿色
                tracing::Level::DEBUG => ("\x1b[36m", "DEBUG"), // 青色
                tracing::Level::TRACE => ("\x1b[35m", "TRACE"), // 紫色
            };

            println!("\x1b[2m{}\x1b[0m {}{:>5}\x1b[0m {}", timestamp, color_code, level_str, message);
        }
    }
}

// 文件日志层，按来源和级别分发到 app / error / query 文件
struct FileLogLayer {
    writer: Arc<FileLogWriter>,
}

impl<S> Layer<S> for FileLogLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = MessageVisitor::new();
        event.record(&mut visitor);

        if let Some(message) = visitor.finish() {
            let metadata = event.metadata();
            self.writer.write_log(metadata.level(), &message, metadata.target());
        }
    }
}

// 用于提取日志消息和结构化字段的访问者
struct MessageVisitor {
    message: Option<String>,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn new() -> Self {
        Self {
            message: None,
            fields: Vec::new(),
        }
    }

    /// 将消息和 key=value 字段拼成一行
    fn finish(self) -> Option<String> {
        match (self.message, self.fields.is_empty()) {
            (Some(message), true) => Some(message),
            (Some(message), false) => Some(format!("{} {}", message, self.fields.join(" "))),
            (None, false) => Some(self.fields.join(" ")),
            (None, true) => None,
        }
    }
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }
}

pub fn init_logger(log_level: &str, log_dir: &Path) -> anyhow::Result<()> {
    let writer = Arc::new(FileLogWriter::new(log_dir)?);

    // 控制台只保留应用日志，SQL 语句进入 query 文件
    let console_layer = ConsoleLayer.with_filter(build_console_filter(log_level));
    let file_layer = FileLogLayer { writer }.with_filter(build_file_filter(log_level));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;
    Ok(())
}

/// 构建控制台日志过滤器，降低 sqlx 等依赖的噪音
fn build_console_filter(base_level: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::builder().parse_lossy(format!(
        "{},\
            sqlx::query=error,\
            sqlx=error,\
            sea_orm::database=error,\
            sea_orm_migration=warn,\
            hyper=warn,\
            reqwest=warn,\
            h2=warn",
        base_level
    ))
}

/// 构建文件日志过滤器，保留 SQL 语句用于 query 日志
fn build_file_filter(base_level: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::builder().parse_lossy(format!(
        "{},\
            sqlx::query=info,\
            sea_orm::database=info,\
            sea_orm_migration=warn,\
            hyper=warn,\
            reqwest=warn,\
            h2=warn",
        base_level
    ))
}
