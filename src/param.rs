// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Web 服务器协议参数与常量模块
//!
//! 该模块定义了虚拟主机服务器遵循的 HTTP/1.1 子集相关常量和数据结构，包括：
//! - 服务器实际会产生的状态码及其原因短语（Reason Phrase）。
//! - 作为内容嗅探兜底的后缀名 MIME 映射表。
//! - 受支持的 HTTP 方法与版本的强类型枚举。

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;

/// 服务器名称标识，用于 HTTP 响应头的 `Server` 字段
pub const SERVER_NAME: &str = "vhost-webserver";

/// HTTP 协议规定的换行符（Carriage Return Line Feed）
pub const CRLF: &str = "\r\n";

/// 请求头结束标志
pub const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// 请求 `/` 时改写成的默认首页
pub const INDEX_FILE: &str = "/index.html";

/// Host 未配置时返回的 404 正文
pub const DOMAIN_NOT_FOUND_MSG: &str = "REQUESTED DOMAIN NOT FOUND\r\n";

/// 资源不存在时返回的 404 正文
pub const RESOURCE_NOT_FOUND_MSG: &str = "REQUESTED RESOURCE NOT FOUND\r\n";

/// 响应中固定的缓存策略
pub const CACHE_CONTROL: &str = "max-age=5";

/// 未命中任何域名时访问日志写入的兜底日志名
pub const ERROR_LOG_NAME: &str = "error";

lazy_static! {
    /// HTTP 状态码与其对应的标准原因短语映射表。
    ///
    /// 只收录本服务器会产生的状态码。参考标准：RFC 9110。
    pub static ref STATUS_CODES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        map.insert(200, "OK");
        map.insert(206, "Partial Content");
        map.insert(304, "Not Modified");
        map.insert(404, "Not Found");
        map.insert(416, "Range Not Satisfiable");
        map
    };
}

lazy_static! {
    /// 文件后缀名到 MIME 类型的映射表。
    ///
    /// 仅在魔数嗅探无法识别文件内容时使用。
    pub static ref MIME_TYPES: HashMap<&'static str, &'static str> = [
        ("css", "text/css"),
        ("csv", "text/csv"),
        ("htm", "text/html"),
        ("html", "text/html"),
        ("ics", "text/calendar"),
        ("js", "text/javascript"),
        ("mjs", "text/javascript"),
        ("json", "application/json"),
        ("jsonld", "application/ld+json"),
        ("md", "text/markdown"),
        ("svg", "image/svg+xml"),
        ("txt", "text/plain"),
        ("xhtml", "application/xhtml+xml"),
        ("xml", "text/xml"),
        ("webmanifest", "application/manifest+json"),
        ("map", "application/json"),
        ("wasm", "application/wasm"),
        ("bin", "application/octet-stream"),
    ]
    .iter()
    .copied()
    .collect();
}

/// 支持的 HTTP 协议版本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    /// HTTP/1.1 版本
    V1_1,
}

impl HttpVersion {
    /// 请求行与状态行中使用的版本字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVersion::V1_1 => "HTTP/1.1",
        }
    }
}

/// 受支持的 HTTP 请求方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpRequestMethod {
    /// 获取资源
    Get,
    /// 获取资源的元数据（不包含响应体）
    Head,
}

impl HttpRequestMethod {
    /// 严格区分大小写地解析方法名，不在支持列表中返回 `None`
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "GET" => Some(HttpRequestMethod::Get),
            "HEAD" => Some(HttpRequestMethod::Head),
            _ => None,
        }
    }
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for HttpRequestMethod {
    /// 将枚举格式化为 HTTP 标准大写方法名
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpRequestMethod::Get => write!(f, "GET"),
            HttpRequestMethod::Head => write!(f, "HEAD"),
        }
    }
}

/// 根据状态码查询原因短语，未收录的状态码返回空串
pub fn reason_phrase(code: u16) -> &'static str {
    STATUS_CODES.get(&code).copied().unwrap_or("")
}
