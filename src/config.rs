use std::fmt;
use std::fs::File;
use std::io::prelude::*;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{warn, LevelFilter};
use serde_derive::{Deserialize, Serialize};

use crate::vhost::VirtualHostTable;

/// 配置文件中的一条虚拟主机记录
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VirtualHostEntry {
    pub vhost: String,
    pub ip: String,
    pub port: u16,
    pub documentroot: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    log: String,
    server: Vec<VirtualHostEntry>,
    #[serde(default = "default_keep_alive_timeout")]
    keep_alive_timeout: u64,
    #[serde(default)]
    worker_threads: usize,
    #[serde(default = "default_chunk_size")]
    chunk_size: usize,
    #[serde(default = "default_request_buffer_limit")]
    request_buffer_limit: usize,
    #[serde(default = "default_fingerprint_cache_size")]
    fingerprint_cache_size: usize,
    #[serde(default)]
    max_connections: usize,
    #[serde(default = "default_log_level")]
    log_level: String,
}

fn default_keep_alive_timeout() -> u64 {
    5
}

fn default_chunk_size() -> usize {
    262144 // 256KB
}

fn default_request_buffer_limit() -> usize {
    8192
}

fn default_fingerprint_cache_size() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

/// 启动阶段的配置错误。任何一种都会让进程拒绝启动。
#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Json(serde_json::Error),
    Toml(toml::de::Error),
    InvalidAddress(String),
    InvalidLogLevel(String),
    NoServers,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "无法读取配置文件{}：{}", path.display(), e),
            ConfigError::Json(e) => write!(f, "配置文件不是合法的JSON：{}", e),
            ConfigError::Toml(e) => write!(f, "配置文件不是合法的TOML：{}", e),
            ConfigError::InvalidAddress(a) => write!(f, "非法的监听地址：{}", a),
            ConfigError::InvalidLogLevel(l) => write!(f, "非法的日志级别：{}", l),
            ConfigError::NoServers => write!(f, "配置文件中没有任何server条目"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn new() -> Self {
        Self {
            log: "logs".to_string(),
            server: Vec::new(),
            keep_alive_timeout: default_keep_alive_timeout(),
            worker_threads: 0,
            chunk_size: default_chunk_size(),
            request_buffer_limit: default_request_buffer_limit(),
            fingerprint_cache_size: default_fingerprint_cache_size(),
            max_connections: 0,
            log_level: default_log_level(),
        }
    }

    /// 读取配置文件。`.json` 后缀按 JSON 解析，其余按 TOML 解析。
    pub fn from_file<P: AsRef<Path>>(filename: P) -> Result<Self, ConfigError> {
        let path = filename.as_ref();
        let mut file = File::open(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let mut str_val = String::new();
        file.read_to_string(&mut str_val)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&str_val),
            _ => Self::from_toml(&str_val),
        }
    }

    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        let raw_config: Config = serde_json::from_str(s).map_err(ConfigError::Json)?;
        raw_config.normalize()
    }

    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let raw_config: Config = toml::from_str(s).map_err(ConfigError::Toml)?;
        raw_config.normalize()
    }

    fn normalize(mut self) -> Result<Self, ConfigError> {
        if self.server.is_empty() {
            return Err(ConfigError::NoServers);
        }
        if self.log_level.parse::<LevelFilter>().is_err() {
            return Err(ConfigError::InvalidLogLevel(self.log_level));
        }
        if self.worker_threads == 0 {
            self.worker_threads = num_cpus::get();
        }
        if self.keep_alive_timeout == 0 {
            warn!("keep_alive_timeout被设置为0，这会让所有连接立即超时，因此该值将被改为5。");
            self.keep_alive_timeout = default_keep_alive_timeout();
        }
        if self.chunk_size == 0 {
            warn!("chunk_size被设置为0，该值将被改为默认的256KB。");
            self.chunk_size = default_chunk_size();
        }
        if self.request_buffer_limit == 0 {
            warn!("request_buffer_limit被设置为0，该值将被改为默认的8KB。");
            self.request_buffer_limit = default_request_buffer_limit();
        }
        // 提前校验所有地址，保证启动时报错而不是运行中报错
        self.virtual_hosts()?;
        Ok(self)
    }

    /// 构建虚拟主机表
    pub fn virtual_hosts(&self) -> Result<VirtualHostTable, ConfigError> {
        let mut entries = Vec::with_capacity(self.server.len());
        for entry in &self.server {
            let ip: IpAddr = entry
                .ip
                .parse()
                .map_err(|_| ConfigError::InvalidAddress(format!("{}:{}", entry.ip, entry.port)))?;
            entries.push((
                SocketAddr::new(ip, entry.port),
                entry.vhost.clone(),
                entry.documentroot.clone(),
            ));
        }
        Ok(VirtualHostTable::from_entries(entries))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn log_dir(&self) -> &Path {
        Path::new(&self.log)
    }

    pub fn servers(&self) -> &[VirtualHostEntry] {
        &self.server
    }

    pub fn keep_alive_timeout(&self) -> Duration {
        Duration::from_secs(self.keep_alive_timeout)
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn request_buffer_limit(&self) -> usize {
        self.request_buffer_limit
    }

    pub fn fingerprint_cache_size(&self) -> usize {
        self.fingerprint_cache_size
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const JSON_CONFIG: &str = r#"{
        "log": "logs",
        "server": [
            {"vhost": "a.com", "ip": "127.0.0.1", "port": 8080, "documentroot": "/srv/a/"},
            {"vhost": "b.com", "ip": "127.0.0.1", "port": 8080, "documentroot": "/srv/b"},
            {"vhost": "c.com", "ip": "0.0.0.0", "port": 8081, "documentroot": "/srv/c"}
        ]
    }"#;

    #[test]
    fn test_json_config_defaults() {
        let config = Config::from_json(JSON_CONFIG).unwrap();

        assert_eq!(config.log_dir(), Path::new("logs"));
        assert_eq!(config.servers().len(), 3);
        assert_eq!(config.keep_alive_timeout(), Duration::from_secs(5));
        assert_eq!(config.chunk_size(), 262144);
        assert_eq!(config.request_buffer_limit(), 8192);
        assert_eq!(config.max_connections(), 0);
        assert!(config.worker_threads() > 0);
        assert_eq!(config.log_level(), LevelFilter::Info);
    }

    #[test]
    fn test_json_config_builds_table() {
        let config = Config::from_json(JSON_CONFIG).unwrap();
        let table = config.virtual_hosts().unwrap();

        assert_eq!(table.len(), 2);
        let hosts = table.get(&"127.0.0.1:8080".parse().unwrap()).unwrap();
        assert_eq!(hosts.resolve(Some("a.com")).unwrap(), Path::new("/srv/a"));
        assert_eq!(hosts.resolve(Some("b.com")).unwrap(), Path::new("/srv/b"));
        assert!(hosts.resolve(Some("c.com")).is_err());
    }

    #[test]
    fn test_toml_config() {
        let toml_str = r#"
            log = "/var/log/vhost"
            keep_alive_timeout = 10
            worker_threads = 2
            max_connections = 64
            log_level = "debug"

            [[server]]
            vhost = "a.com"
            ip = "::1"
            port = 80
            documentroot = "/srv/a"
        "#;
        let config = Config::from_toml(toml_str).unwrap();

        assert_eq!(config.keep_alive_timeout(), Duration::from_secs(10));
        assert_eq!(config.worker_threads(), 2);
        assert_eq!(config.max_connections(), 64);
        assert_eq!(config.log_level(), LevelFilter::Debug);
        let table = config.virtual_hosts().unwrap();
        assert!(table.get(&"[::1]:80".parse().unwrap()).is_some());
    }

    #[test]
    fn test_zero_timeout_replaced() {
        let toml_str = r#"
            log = "logs"
            keep_alive_timeout = 0
            [[server]]
            vhost = "a.com"
            ip = "127.0.0.1"
            port = 80
            documentroot = "/srv/a"
        "#;
        let config = Config::from_toml(toml_str).unwrap();
        assert_eq!(config.keep_alive_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_address_rejected() {
        let json = r#"{"log": "logs", "server": [
            {"vhost": "a.com", "ip": "not-an-ip", "port": 80, "documentroot": "/srv/a"}
        ]}"#;
        assert!(matches!(Config::from_json(json), Err(ConfigError::InvalidAddress(_))));
    }

    #[test]
    fn test_empty_server_list_rejected() {
        let json = r#"{"log": "logs", "server": []}"#;
        assert!(matches!(Config::from_json(json), Err(ConfigError::NoServers)));
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let json = r#"{"log": "logs", "log_level": "loud", "server": [
            {"vhost": "a.com", "ip": "127.0.0.1", "port": 80, "documentroot": "/srv/a"}
        ]}"#;
        assert!(matches!(Config::from_json(json), Err(ConfigError::InvalidLogLevel(_))));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(Config::from_json("{not json"), Err(ConfigError::Json(_))));
        assert!(matches!(Config::from_toml("log = "), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_from_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("config.json");
        let mut f = File::create(&json_path).unwrap();
        f.write_all(JSON_CONFIG.as_bytes()).unwrap();
        assert_eq!(Config::from_file(&json_path).unwrap().servers().len(), 3);

        let missing = dir.path().join("missing.toml");
        assert!(matches!(Config::from_file(&missing), Err(ConfigError::Io(_, _))));
    }
}
