// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 条件请求与范围请求
//!
//! 根据请求头与资源当前大小、指纹决定响应走向：
//! - 无 `Range`：指纹与 `If-None-Match` 相同则 304，否则 200。
//! - 有 `Range`：只接受单个 `bytes=` 区间，合法为 206，否则 416。

use lazy_static::lazy_static;
use regex::Regex;

use crate::exception::Exception::{self, RangeNotSatisfiable};
use crate::request::Request;

lazy_static! {
    static ref BYTE_RANGE: Regex = Regex::new(r"^bytes\s*=\s*(\d*)\s*-\s*(\d*)$").unwrap();
}

/// 范围决策。`end` 为闭区间。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeDecision {
    Full,
    Partial { start: u64, end: u64, length: u64 },
    NotModified,
    NotSatisfiable,
}

impl RangeDecision {
    /// 该决策对应的状态码
    pub fn status_code(&self) -> u16 {
        match self {
            RangeDecision::Full => 200,
            RangeDecision::Partial { .. } => 206,
            RangeDecision::NotModified => 304,
            RangeDecision::NotSatisfiable => 416,
        }
    }
}

/// 计算请求的范围决策。
///
/// `fingerprint` 只在没有 `Range` 标头时才会被用到，调用方可以在有 `Range` 时传 `None`
/// 以省去一次哈希计算。
pub fn evaluate(request: &Request, file_size: u64, fingerprint: Option<&str>) -> RangeDecision {
    match request.range() {
        None => match (request.if_none_match(), fingerprint) {
            (Some(tag), Some(current)) if unquote(tag) == current => RangeDecision::NotModified,
            _ => RangeDecision::Full,
        },
        Some(spec) => match parse_byte_range(spec, file_size) {
            Ok((start, end)) => RangeDecision::Partial {
                start,
                end,
                length: end - start + 1,
            },
            Err(_) => RangeDecision::NotSatisfiable,
        },
    }
}

/// 解析单个 byte-range-spec，返回闭区间 `[start, end]`。
///
/// - `bytes=<start>-`：要求 `start < size`，区间为 `[start, size-1]`。
/// - `bytes=-<n>`：要求 `n < size`，区间为 `[0, n]`。
/// - `bytes=<start>-<end>`：要求 `start <= end`、`start < size` 且 `end-start < size`，
///   超出文件末尾的 `end` 截断到 `size-1`。
///
/// 其余情况（含无法解析的写法）一律为 `RangeNotSatisfiable`。
pub fn parse_byte_range(spec: &str, file_size: u64) -> Result<(u64, u64), Exception> {
    let captures = BYTE_RANGE.captures(spec.trim()).ok_or(RangeNotSatisfiable)?;
    let start = captures.get(1).map(|m| m.as_str()).unwrap_or("");
    let end = captures.get(2).map(|m| m.as_str()).unwrap_or("");
    let number = |digits: &str| digits.parse::<u64>().map_err(|_| RangeNotSatisfiable);

    let window = match (start.is_empty(), end.is_empty()) {
        (true, true) => None,
        (false, true) => {
            let start = number(start)?;
            (start < file_size).then(|| (start, file_size - 1))
        }
        (true, false) => {
            let suffix = number(end)?;
            (suffix < file_size).then_some((0, suffix))
        }
        (false, false) => {
            let start = number(start)?;
            let end = number(end)?;
            (start <= end && start < file_size && end - start < file_size)
                .then(|| (start, end.min(file_size - 1)))
        }
    };
    window.ok_or(RangeNotSatisfiable)
}

/// 去掉一层成对的双引号
fn unquote(tag: &str) -> &str {
    tag.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(tag)
}
