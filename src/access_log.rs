// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 访问日志
//!
//! 每个完成的请求写一行访问记录，写入本监听地址上命中的域名的日志文件；
//! Host 缺失或在该监听地址上未配置时写入 `error` 日志。
//!
//! 生产环境下记录通过 `log` 门面以 `access::<域名>` 为 target 发出，
//! 由 log4rs 的文件 appender 落盘：每条记录在 appender 锁内一次写完，多个连接并发写同一文件时不会交错。

use std::fmt;
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Local};
use log::{info, LevelFilter};
use log4rs::{
    append::{console::ConsoleAppender, file::FileAppender},
    config::{Appender, Config as LogConfig, Logger, Root},
    encode::pattern::PatternEncoder,
};

use crate::param::ERROR_LOG_NAME;

/// 访问日志 target 的前缀
pub const ACCESS_TARGET_PREFIX: &str = "access::";

/// 一条访问记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub peer: IpAddr,
    /// 请求中原样的 Host 标头
    pub host: Option<String>,
    /// 虚拟主机表实际命中的域名，决定写入哪个日志
    pub vhost: Option<String>,
    pub path: String,
    pub status: u16,
    pub content_length: u64,
    pub user_agent: Option<String>,
}

impl fmt::Display for LogRecord {
    /// `[<date>] <peer-ip> <host> <path> <status> <content-length> "<user-agent>"`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} {} {} {} \"{}\"",
            self.timestamp.format("%a %b %d %H:%M:%S %Y"),
            self.peer,
            self.host.as_deref().unwrap_or("-"),
            self.path,
            self.status,
            self.content_length,
            self.user_agent.as_deref().unwrap_or("")
        )
    }
}

impl LogRecord {
    /// 记录应当写入的日志名
    pub fn log_name(&self) -> &str {
        self.vhost.as_deref().unwrap_or(ERROR_LOG_NAME)
    }
}

/// 只追加的访问日志
pub trait AccessLogSink: Send + Sync {
    fn append(&self, record: &LogRecord);
}

/// 写入 log4rs 文件 appender 的访问日志
#[derive(Debug, Default, Clone, Copy)]
pub struct Log4rsSink;

impl Log4rsSink {
    pub fn new() -> Self {
        Self
    }
}

impl AccessLogSink for Log4rsSink {
    fn append(&self, record: &LogRecord) {
        let target = format!("{}{}", ACCESS_TARGET_PREFIX, record.log_name());
        info!(target: target.as_str(), "{}", record);
    }
}

/// 保存在内存中的访问日志
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<(String, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// (日志名, 行) 的快照
    pub fn lines(&self) -> Vec<(String, String)> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AccessLogSink for MemorySink {
    fn append(&self, record: &LogRecord) {
        let mut lines = match self.lines.lock() {
            Ok(lines) => lines,
            Err(poisoned) => poisoned.into_inner(),
        };
        lines.push((record.log_name().to_string(), record.to_string()));
    }
}

/// 日志系统初始化失败
#[derive(Debug)]
pub enum LoggingError {
    Io(std::io::Error),
    Config(String),
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoggingError::Io(e) => write!(f, "无法创建日志文件：{}", e),
            LoggingError::Config(e) => write!(f, "无法初始化日志系统：{}", e),
        }
    }
}

impl std::error::Error for LoggingError {}

/// 初始化 log4rs：控制台输出诊断日志，每个域名及 `error` 各一个访问日志文件。
///
/// 日志目录不存在时创建，已有的日志文件会被清空。
pub fn init_logging(
    log_dir: &Path,
    domains: &[String],
    level: LevelFilter,
) -> Result<log4rs::Handle, LoggingError> {
    fs::create_dir_all(log_dir).map_err(LoggingError::Io)?;

    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} {h({l})} {t} - {m}{n}",
        )))
        .build();
    let mut builder =
        LogConfig::builder().appender(Appender::builder().build("stdout", Box::new(stdout)));

    let names = domains
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(ERROR_LOG_NAME));
    for name in names {
        let file = FileAppender::builder()
            .append(false)
            .encoder(Box::new(PatternEncoder::new("{m}{n}")))
            .build(log_dir.join(format!("{}.log", name)))
            .map_err(LoggingError::Io)?;
        let appender = format!("access_{}", name);
        builder = builder
            .appender(Appender::builder().build(appender.clone(), Box::new(file)))
            .logger(
                Logger::builder()
                    .appender(appender)
                    .additive(false)
                    .build(format!("{}{}", ACCESS_TARGET_PREFIX, name), LevelFilter::Info),
            );
    }

    let config = builder
        .build(Root::builder().appender("stdout").build(level))
        .map_err(|e| LoggingError::Config(e.to_string()))?;
    log4rs::init_config(config).map_err(|e| LoggingError::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(host: Option<&str>, vhost: Option<&str>, user_agent: Option<&str>) -> LogRecord {
        LogRecord {
            timestamp: Local.with_ymd_and_hms(2026, 10, 19, 16, 5, 9).unwrap(),
            peer: "10.0.0.7".parse().unwrap(),
            host: host.map(str::to_string),
            vhost: vhost.map(str::to_string),
            path: "/index.html".to_string(),
            status: 200,
            content_length: 1234,
            user_agent: user_agent.map(str::to_string),
        }
    }

    #[test]
    fn test_line_format() {
        assert_eq!(
            record(Some("a.com"), Some("a.com"), Some("curl/8.0")).to_string(),
            "[Mon Oct 19 16:05:09 2026] 10.0.0.7 a.com /index.html 200 1234 \"curl/8.0\""
        );
    }

    #[test]
    fn test_line_format_with_missing_fields() {
        assert_eq!(
            record(None, None, None).to_string(),
            "[Mon Oct 19 16:05:09 2026] 10.0.0.7 - /index.html 200 1234 \"\""
        );
    }

    #[test]
    fn test_log_name_follows_matched_domain() {
        assert_eq!(record(Some("a.com"), Some("a.com"), None).log_name(), "a.com");
        // 带端口的 Host 命中 a.com，日志仍写入 a.com
        assert_eq!(record(Some("a.com:8080"), Some("a.com"), None).log_name(), "a.com");
        // 在其他监听地址上配置的域名，在本地址未命中
        assert_eq!(record(Some("b.com"), None, None).log_name(), "error");
        assert_eq!(record(None, None, None).log_name(), "error");
    }

    #[test]
    fn test_memory_sink_routing() {
        let sink = MemorySink::new();
        sink.append(&record(Some("a.com"), Some("a.com"), None));
        sink.append(&record(Some("evil.com"), None, None));
        sink.append(&record(None, None, None));

        let names: Vec<String> = sink.lines().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a.com", "error", "error"]);
    }
}
