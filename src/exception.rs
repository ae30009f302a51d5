// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了请求处理生命周期中可能出现的各类异常情况。
//!
//! - **报文错误**：请求无法解析，连接直接关闭且不发送任何响应。
//! - **路由与资源错误**：转化为 404 或 416 响应。
//! - **传输错误**：正文发送失败或连接空闲超时，连接随即关闭。

use std::fmt;

/// 服务器处理请求过程中发生的异常类型。
///
/// 所有变体都在 `connection` 模块内被消化，不会影响其他连接。
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Exception {
    /// 请求字节流无法解析为合法的 UTF-8 字符串。
    RequestIsNotUtf8,
    /// 请求行不足三段（方法、路径、版本）。
    MalformedRequestLine,
    /// 使用了 GET/HEAD 之外的方法。
    UnSupportedRequestMethod,
    /// 协议版本不是 `HTTP/1.1`。
    UnsupportedHttpVersion,
    /// 请求头超过了缓冲区上限仍未结束。
    RequestTooLarge,
    /// Host 缺失或没有对应的虚拟主机。对应 404。
    UnknownHost,
    /// 文档根目录下不存在该文件，或目标是目录。对应 404。
    FileNotFound,
    /// 请求路径试图越出文档根目录。按 404 处理。
    InvalidPath,
    /// Range 无法满足。对应 416。
    RangeNotSatisfiable,
    /// 正文发送失败（对端关闭、管道破裂），连接必须关闭。
    TransmissionFailure,
    /// 等待请求时空闲超时或连接被重置。
    TimeoutOrReset,
}

use Exception::*;

impl Exception {
    /// 该异常是否属于报文格式错误（不回复、直接断开）
    pub fn is_malformed_request(&self) -> bool {
        matches!(
            self,
            RequestIsNotUtf8
                | MalformedRequestLine
                | UnSupportedRequestMethod
                | UnsupportedHttpVersion
                | RequestTooLarge
        )
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            MalformedRequestLine => write!(f, "Malformed request line"),
            UnSupportedRequestMethod => write!(f, "Unsupported request method"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            RequestTooLarge => write!(f, "Request head too large"),
            UnknownHost => write!(f, "Requested domain not found (404)"),
            FileNotFound => write!(f, "File not found (404)"),
            InvalidPath => write!(f, "Invalid path (404)"),
            RangeNotSatisfiable => write!(f, "Range not satisfiable (416)"),
            TransmissionFailure => write!(f, "Failed to transmit response body"),
            TimeoutOrReset => write!(f, "Connection timed out or was reset"),
        }
    }
}

impl std::error::Error for Exception {}
