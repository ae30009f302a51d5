// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 资源定位
//!
//! 把 (文档根目录, 请求路径) 映射为文件系统中的普通文件并读取其元数据。
//! 每个请求都重新 stat，不跨请求缓存。

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use log::{debug, warn};

use crate::{exception::Exception, mime::ContentTypeDetector, param::INDEX_FILE};

/// 一次请求内有效的资源元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceMetadata {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
    pub mime: String,
}

/// 定位请求的资源。
///
/// `/` 改写为 `/index.html`；不以 `/` 开头或含有 `..` 段的路径一律拒绝；
/// 不存在或是目录时返回 `FileNotFound`。
pub fn resolve(
    document_root: &Path,
    request_path: &str,
    detector: &dyn ContentTypeDetector,
    id: u128,
) -> Result<ResourceMetadata, Exception> {
    let path = match request_path {
        "/" => INDEX_FILE,
        other => other,
    };

    if !path.starts_with('/') {
        warn!("[ID{}]请求路径不以/开头：{}", id, path);
        return Err(Exception::InvalidPath);
    }
    // 去除领先的 '/' 以便进行路径拼接，否则 join 会把绝对路径当作新的根
    let relative = Path::new(path.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        warn!("[ID{}]请求路径试图越出文档根目录：{}", id, path);
        return Err(Exception::InvalidPath);
    }

    let full_path = document_root.join(relative);
    debug!("[ID{}]映射物理路径：{}", id, full_path.display());

    let metadata = match fs::metadata(&full_path) {
        Ok(m) => m,
        Err(e) => {
            debug!("[ID{}]无法获取{}的元数据：{}", id, full_path.display(), e);
            return Err(Exception::FileNotFound);
        }
    };
    if metadata.is_dir() {
        debug!("[ID{}]请求的路径是目录：{}", id, full_path.display());
        return Err(Exception::FileNotFound);
    }

    let mime = detector.detect(&full_path);
    Ok(ResourceMetadata {
        size: metadata.len(),
        modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        mime,
        path: full_path,
    })
}
