pub mod access_log;
pub mod config;
pub mod connection;
pub mod exception;
pub mod fingerprint;
pub mod mime;
pub mod param;
pub mod processor;
pub mod range;
pub mod request;
pub mod resource;
pub mod response;
pub mod server;
pub mod transmit;
pub mod vhost;

pub use access_log::{AccessLogSink, Log4rsSink, LogRecord, MemorySink};
pub use config::{Config, ConfigError};
pub use exception::Exception;
pub use param::{HttpRequestMethod, HttpVersion};
pub use processor::{Outcome, Processor};
pub use range::RangeDecision;
pub use request::Request;
pub use response::Response;
pub use server::{Server, ServerStats};
pub use vhost::{HostMap, VirtualHostTable};
