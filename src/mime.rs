// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # MIME 类型探测
//!
//! 根据文件内容而不是后缀名判断 `Content-Type`：
//! 1. 读取文件头部，用魔数嗅探识别二进制格式。
//! 2. 嗅探失败时查后缀名表（主要用于 CSS/JS 这类纯文本格式）。
//! 3. 仍无法确定时，合法 UTF-8 视为 `text/plain`，否则为 `application/octet-stream`。

use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::warn;

use crate::param::MIME_TYPES;

/// 嗅探时读取的文件头部长度
const SNIFF_LEN: usize = 8192;

const OCTET_STREAM: &str = "application/octet-stream";
const TEXT_PLAIN: &str = "text/plain";

/// 内容类型探测服务
#[cfg_attr(test, mockall::automock)]
pub trait ContentTypeDetector: Send + Sync {
    fn detect(&self, path: &Path) -> String;
}

/// 基于魔数嗅探的默认实现
#[derive(Debug, Default, Clone, Copy)]
pub struct MagicDetector;

impl MagicDetector {
    pub fn new() -> Self {
        Self
    }

    /// 对已读取的文件头部做判断，便于脱离文件系统单独测试
    pub fn detect_bytes(head: &[u8], path: &Path) -> String {
        if let Some(kind) = infer::get(head) {
            return kind.mime_type().to_string();
        }
        if let Some(mime) = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|e| MIME_TYPES.get(e.to_ascii_lowercase().as_str()))
        {
            return mime.to_string();
        }
        match std::str::from_utf8(head) {
            Ok(_) => TEXT_PLAIN.to_string(),
            // 截断在多字节字符中间不算非法
            Err(e) if e.error_len().is_none() => TEXT_PLAIN.to_string(),
            Err(_) => OCTET_STREAM.to_string(),
        }
    }
}

impl ContentTypeDetector for MagicDetector {
    fn detect(&self, path: &Path) -> String {
        let mut head = Vec::with_capacity(SNIFF_LEN);
        let read = File::open(path).and_then(|f| f.take(SNIFF_LEN as u64).read_to_end(&mut head));
        if let Err(e) = read {
            warn!("无法读取{}用于类型探测：{}", path.display(), e);
            return OCTET_STREAM.to_string();
        }
        Self::detect_bytes(&head, path)
    }
}
