// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 负责将从 TCP 流中读取的原始字节解析为强类型的 `Request` 结构体：
//! 1. 请求行（Request-Line）的解析与校验（方法、路径、版本）。
//! 2. 标头（Headers）的提取：名称统一小写，值去除首尾空白，同名标头后者覆盖前者。
//!
//! 不支持标头折叠、多行标头以及请求体。任何校验失败都返回报文错误，
//! 由连接层直接断开而不发送响应。

use crate::{exception::Exception, param::*};
use log::error;

/// 按首次出现顺序保存的标头表。
///
/// 名称已小写化；重复的名称会在原位置覆盖旧值。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入标头，名称需已小写化
    pub fn insert(&mut self, name: String, value: String) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// 按小写名称查询
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// 表示一个已通过校验的 HTTP 请求。
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP 请求方法（GET 或 HEAD）
    method: HttpRequestMethod,
    /// 请求路径，`%20` 已还原为空格，不做其他百分号解码
    path: String,
    /// HTTP 协议版本
    version: HttpVersion,
    /// 全部标头
    headers: Headers,
}

impl Request {
    /// 从原始字节缓冲区尝试构建 `Request` 实例。
    ///
    /// # 参数
    /// * `buffer` - 请求头的原始字节（通常截止到空行）。
    /// * `id` - 连接 ID，用于在多线程环境下追踪日志。
    ///
    /// # 错误处理
    /// 非 UTF-8、请求行不足三段、方法不是 GET/HEAD 或版本不是 `HTTP/1.1`
    /// 时返回对应的 `Exception`。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        let request_string = match std::str::from_utf8(buffer) {
            Ok(string) => string,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let mut lines = request_string.lines();

        // 请求行 (e.g., "GET /index.html HTTP/1.1")
        let request_line = lines.next().unwrap_or("");
        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() < 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_line);
            return Err(Exception::MalformedRequestLine);
        }

        let method = match HttpRequestMethod::parse(parts[0]) {
            Some(m) => m,
            None => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, parts[0]);
                return Err(Exception::UnSupportedRequestMethod);
            }
        };

        let version = match parts[2] {
            "HTTP/1.1" => HttpVersion::V1_1,
            other => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, other);
                return Err(Exception::UnsupportedHttpVersion);
            }
        };

        let path = parts[1].replace("%20", " ");

        let mut headers = Headers::new();
        for line in lines {
            if line.is_empty() {
                break;
            }
            // 没有冒号的行直接忽略
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim().to_lowercase(), value.trim().to_string());
            }
        }

        Ok(Self {
            method,
            path,
            version,
            headers,
        })
    }
}

// --- Getter 访问器实现 ---

impl Request {
    /// 获取 HTTP 协议版本
    pub fn version(&self) -> HttpVersion {
        self.version
    }

    /// 获取请求路径
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 获取请求方法
    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn host(&self) -> Option<&str> {
        self.headers.get("host")
    }

    pub fn range(&self) -> Option<&str> {
        self.headers.get("range")
    }

    pub fn if_none_match(&self) -> Option<&str> {
        self.headers.get("if-none-match")
    }

    pub fn connection(&self) -> Option<&str> {
        self.headers.get("connection")
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.headers.get("user-agent")
    }

    /// 客户端是否显式要求 `Connection: keep-alive`
    pub fn keep_alive(&self) -> bool {
        self.connection()
            .map_or(false, |c| c.eq_ignore_ascii_case("keep-alive"))
    }
}
