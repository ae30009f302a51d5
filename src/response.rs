use std::time::{Duration, SystemTime};

use bytes::Bytes;
use chrono::prelude::*;

use crate::{param::*, range::RangeDecision, resource::ResourceMetadata};

/// 响应头中 `Connection` 部分的三种形态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// `Keep-Alive: timeout=N` + `Connection: keep-alive`
    KeepAlive(u64),
    /// 只写 `Connection: keep-alive`（206 响应不通告超时）
    KeepAliveQuiet,
    /// `Connection: close`
    Close,
}

#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    date: DateTime<Utc>,
    server_name: String,
    connection: ConnectionMode,
    accept_ranges: Option<String>,
    cache_control: Option<String>,
    last_modified: Option<DateTime<Utc>>,
    content_type: Option<String>,
    content_range: Option<String>,
    content_length: Option<u64>,
    etag: Option<String>,
    content: Option<Bytes>,
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            date: Utc::now(),
            server_name: SERVER_NAME.to_string(),
            connection: ConnectionMode::Close,
            accept_ranges: None,
            cache_control: None,
            last_modified: None,
            content_type: None,
            content_range: None,
            content_length: None,
            etag: None,
            content: None,
        }
    }

    /// 构造 404 响应。`with_body` 为假（HEAD）时只保留标头。
    pub fn not_found(message: &str, keep_alive: Option<Duration>, with_body: bool) -> Self {
        let mut response = Self::new();
        response
            .set_code(404)
            .set_connection(keep_alive, false)
            .set_content_type("text/plain");
        response.content_length = Some(message.len() as u64);
        if with_body {
            response.content = Some(Bytes::copy_from_slice(message.as_bytes()));
        }
        response
    }

    /// 根据范围决策为已定位的资源构造响应头。正文由 `transmit` 模块另行发送。
    pub fn from_decision(
        decision: &RangeDecision,
        metadata: &ResourceMetadata,
        etag: Option<&str>,
        keep_alive: Option<Duration>,
    ) -> Self {
        let mut response = Self::new();
        let is_partial = matches!(decision, RangeDecision::Partial { .. });
        response
            .set_code(decision.status_code())
            .set_connection(keep_alive, is_partial)
            .set_last_modified(metadata.modified)
            .set_content_type(&metadata.mime);
        response.accept_ranges = Some("bytes".to_string());
        response.cache_control = Some(CACHE_CONTROL.to_string());

        match *decision {
            RangeDecision::Full => {
                response.content_length = Some(metadata.size);
                response.etag = etag.map(str::to_string);
            }
            RangeDecision::Partial { start, end, length } => {
                response.content_range = Some(format!("bytes {}-{}/{}", start, end, metadata.size));
                response.content_length = Some(length);
            }
            RangeDecision::NotModified => {}
            RangeDecision::NotSatisfiable => {
                response.content_range = Some(format!("bytes */{}", metadata.size));
                response.content_length = Some(0);
            }
        }
        response
    }

    fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = reason_phrase(code).to_string();
        self
    }

    fn set_connection(&mut self, keep_alive: Option<Duration>, quiet: bool) -> &mut Self {
        self.connection = match (keep_alive, quiet) {
            (None, _) => ConnectionMode::Close,
            (Some(_), true) => ConnectionMode::KeepAliveQuiet,
            (Some(timeout), false) => ConnectionMode::KeepAlive(timeout.as_secs()),
        };
        self
    }

    fn set_last_modified(&mut self, modified: SystemTime) -> &mut Self {
        self.last_modified = Some(DateTime::<Utc>::from(modified));
        self
    }

    fn set_content_type(&mut self, mime: &str) -> &mut Self {
        self.content_type = Some(mime.to_string());
        self
    }

    /// 按固定顺序序列化状态行与标头，以空行结束
    pub fn header_block(&self) -> String {
        let mut header = format!(
            "{} {} {}{}",
            self.version.as_str(),
            self.status_code,
            self.information,
            CRLF
        );
        push_header(&mut header, "Date", &format_date(&self.date));
        push_header(&mut header, "Server", &self.server_name);
        match self.connection {
            ConnectionMode::KeepAlive(timeout) => {
                push_header(&mut header, "Keep-Alive", &format!("timeout={}", timeout));
                push_header(&mut header, "Connection", "keep-alive");
            }
            ConnectionMode::KeepAliveQuiet => push_header(&mut header, "Connection", "keep-alive"),
            ConnectionMode::Close => push_header(&mut header, "Connection", "close"),
        }
        if let Some(r) = &self.accept_ranges {
            push_header(&mut header, "Accept-Ranges", r);
        }
        if let Some(c) = &self.cache_control {
            push_header(&mut header, "Cache-Control", c);
        }
        if let Some(m) = &self.last_modified {
            push_header(&mut header, "Last-Modified", &format_date(m));
        }
        if let Some(t) = &self.content_type {
            push_header(&mut header, "Content-Type", t);
        }
        if let Some(r) = &self.content_range {
            push_header(&mut header, "Content-Range", r);
        }
        if let Some(l) = self.content_length {
            push_header(&mut header, "Content-Length", &l.to_string());
        }
        if let Some(e) = &self.etag {
            push_header(&mut header, "Etag", e);
        }
        header.push_str(CRLF);
        header
    }

    /// 标头加上内联正文（仅 404 提示信息）
    pub fn as_bytes(&self) -> Bytes {
        let header = self.header_block();
        match &self.content {
            Some(c) => [header.as_bytes(), &c[..]].concat().into(),
            None => Bytes::from(header),
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn connection(&self) -> ConnectionMode {
        self.connection
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn content(&self) -> Option<&Bytes> {
        self.content.as_ref()
    }
}

fn push_header(header: &mut String, name: &str, value: &str) {
    header.push_str(name);
    header.push_str(": ");
    header.push_str(value);
    header.push_str(CRLF);
}

/// HTTP-date（IMF-fixdate），例如 `Sun, 06 Nov 1994 08:49:37 GMT`
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
