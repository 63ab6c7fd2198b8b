use std::fs::{self, File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{Local, NaiveDate};
use tracing::Level;

/// 日志文件类别，每类每天一个文件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFileKind {
    App,
    Error,
    Query,
}

impl LogFileKind {
    fn prefix(self) -> &'static str {
        match self {
            LogFileKind::App => "app",
            LogFileKind::Error => "error",
            LogFileKind::Query => "query",
        }
    }

    pub fn file_name(self, date: NaiveDate) -> String {
        format!("{}_{}.log", self.prefix(), date.format("%Y-%m-%d"))
    }
}

/// 根据日志来源和级别决定写入哪些文件
///
/// sqlx / sea_orm 的日志只进入 query 文件；其余 INFO 及以上进入 app 文件，ERROR 额外写入 error 文件。
pub fn route(target: &str, level: &Level) -> Vec<LogFileKind> {
    if target.starts_with("sqlx") || target.starts_with("sea_orm") {
        return vec![LogFileKind::Query];
    }
    let mut kinds = Vec::with_capacity(2);
    if *level <= Level::INFO {
        kinds.push(LogFileKind::App);
    }
    if *level == Level::ERROR {
        kinds.push(LogFileKind::Error);
    }
    kinds
}

/// 日志行格式：`YYYY-MM-DD HH:MM:SS.mmm LEVEL message`
fn format_line(timestamp: &str, level: &Level, message: &str) -> String {
    format!("{} {:>5} {}", timestamp, level, message)
}

struct DailyFile {
    date: NaiveDate,
    writer: LineWriter<File>,
}

// 日志文件写入器，跨天时自动切换到新文件
pub struct FileLogWriter {
    log_dir: PathBuf,
    app: Mutex<Option<DailyFile>>,
    error: Mutex<Option<DailyFile>>,
    query: Mutex<Option<DailyFile>>,
}

impl FileLogWriter {
    pub fn new(log_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let log_dir = log_dir.into();
        fs::create_dir_all(&log_dir)?;
        Ok(Self {
            log_dir,
            app: Mutex::new(None),
            error: Mutex::new(None),
            query: Mutex::new(None),
        })
    }

    fn slot(&self, kind: LogFileKind) -> &Mutex<Option<DailyFile>> {
        match kind {
            LogFileKind::App => &self.app,
            LogFileKind::Error => &self.error,
            LogFileKind::Query => &self.query,
        }
    }

    fn open(&self, kind: LogFileKind, date: NaiveDate) -> std::io::Result<DailyFile> {
        let path = self.log_dir.join(kind.file_name(date));
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(DailyFile {
            date,
            writer: LineWriter::new(file),
        })
    }

    /// 写入一行日志，写入失败只输出到 stderr，不影响业务
    pub fn write_log(&self, level: &Level, message: &str, target: &str) {
        let now = Local::now();
        let line = format_line(&now.format("%Y-%m-%d %H:%M:%S%.3f").to_string(), level, message);
        for kind in route(target, level) {
            if let Err(e) = self.write_line(kind, now.date_naive(), &line) {
                eprintln!("写入日志文件失败 ({}): {}", kind.prefix(), e);
            }
        }
    }

    fn write_line(&self, kind: LogFileKind, date: NaiveDate, line: &str) -> std::io::Result<()> {
        let mut guard = match self.slot(kind).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let needs_open = guard.as_ref().map_or(true, |current| current.date != date);
        if needs_open {
            *guard = Some(self.open(kind, date)?);
        }
        match guard.as_mut() {
            Some(current) => writeln!(current.writer, "{}", line),
            None => Ok(()),
        }
    }

    pub fn flush(&self) {
        for kind in [LogFileKind::App, LogFileKind::Error, LogFileKind::Query] {
            if let Ok(mut guard) = self.slot(kind).lock() {
                if let Some(current) = guard.as_mut() {
                    let _ = current.writer.flush();
                }
            }
        }
    }
}

impl Drop for FileLogWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("quest-{}-{}", name, uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_route() {
        assert_eq!(route("sqlx::query", &Level::INFO), vec![LogFileKind::Query]);
        assert_eq!(route("sea_orm::database", &Level::ERROR), vec![LogFileKind::Query]);
        assert_eq!(route("quest::api", &Level::INFO), vec![LogFileKind::App]);
        assert_eq!(route("quest::api", &Level::WARN), vec![LogFileKind::App]);
        assert_eq!(
            route("quest::api", &Level::ERROR),
            vec![LogFileKind::App, LogFileKind::Error]
        );
        assert!(route("quest::api", &Level::DEBUG).is_empty());
    }

    #[test]
    fn test_format_line() {
        assert_eq!(
            format_line("2025-06-01 08:00:00.123", &Level::ERROR, "出错了"),
            "2025-06-01 08:00:00.123 ERROR 出错了"
        );
        assert_eq!(
            format_line("2025-06-01 08:00:00.123", &Level::INFO, "启动"),
            "2025-06-01 08:00:00.123  INFO 启动"
        );
    }

    #[test]
    fn test_file_name() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(LogFileKind::App.file_name(date), "app_2025-06-01.log");
        assert_eq!(LogFileKind::Error.file_name(date), "error_2025-06-01.log");
        assert_eq!(LogFileKind::Query.file_name(date), "query_2025-06-01.log");
    }

    #[test]
    fn test_write_log_routes_to_files() {
        let dir = unique_temp_dir("logs");
        let writer = FileLogWriter::new(&dir).unwrap();
        writer.write_log(&Level::ERROR, "出错了", "quest::api");
        writer.write_log(&Level::INFO, "SELECT 1", "sqlx::query");
        writer.flush();

        let today = Local::now().date_naive();
        let app = fs::read_to_string(dir.join(LogFileKind::App.file_name(today))).unwrap();
        let error = fs::read_to_string(dir.join(LogFileKind::Error.file_name(today))).unwrap();
        let query = fs::read_to_string(dir.join(LogFileKind::Query.file_name(today))).unwrap();
        assert!(app.contains("出错了"));
        assert!(app.trim_end().ends_with(" ERROR 出错了"));
        assert!(!app.contains("[quest::api]"));
        assert!(error.contains("出错了"));
        assert!(!app.contains("SELECT 1"));
        assert!(query.contains("SELECT 1"));

        drop(writer);
        let _ = fs::remove_dir_all(&dir);
    }
}
