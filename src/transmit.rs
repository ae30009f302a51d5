// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 文件正文传输
//!
//! 从文件指定偏移开始分块读取并写入连接。传输失败不重试，由调用方关闭连接。

use std::io::SeekFrom;
use std::path::PathBuf;

use log::{debug, error};
use tokio::{
    fs::File as TokioFile,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt},
};

use crate::exception::Exception;

/// 需要发送的文件窗口
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyWindow {
    pub path: PathBuf,
    pub offset: u64,
    /// `None` 表示一直发送到文件末尾
    pub count: Option<u64>,
}

/// 发送 `window` 描述的字节，返回实际发送的字节数。
///
/// 文件在发送过程中被截短、无法打开或对端断开都视为 `TransmissionFailure`。
pub async fn send_file<W>(
    stream: &mut W,
    window: &BodyWindow,
    chunk_size: usize,
    id: u128,
) -> Result<u64, Exception>
where
    W: AsyncWrite + Unpin,
{
    let mut file = match TokioFile::open(&window.path).await {
        Ok(f) => f,
        Err(e) => {
            error!("[ID{}]无法打开文件{}: {}", id, window.path.display(), e);
            return Err(Exception::TransmissionFailure);
        }
    };
    if window.offset > 0 {
        if let Err(e) = file.seek(SeekFrom::Start(window.offset)).await {
            error!("[ID{}]无法定位到文件位置{}: {}", id, window.offset, e);
            return Err(Exception::TransmissionFailure);
        }
    }

    let mut reader = file.take(window.count.unwrap_or(u64::MAX));
    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut total_sent = 0u64;
    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => {
                if let Err(e) = stream.write_all(&buffer[..n]).await {
                    error!("[ID{}]写入正文失败: {}", id, e);
                    return Err(Exception::TransmissionFailure);
                }
                total_sent += n as u64;
            }
            Err(e) => {
                error!("[ID{}]读取文件失败: {}", id, e);
                return Err(Exception::TransmissionFailure);
            }
        }
    }
    if let Err(e) = stream.flush().await {
        error!("[ID{}]刷新连接失败: {}", id, e);
        return Err(Exception::TransmissionFailure);
    }

    match window.count {
        Some(expected) if total_sent < expected => {
            error!(
                "[ID{}]文件在发送过程中被截短，应发送{}字节，实际{}字节",
                id, expected, total_sent
            );
            Err(Exception::TransmissionFailure)
        }
        _ => {
            debug!("[ID{}]正文传输完成，共发送 {} 字节", id, total_sent);
            Ok(total_sent)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn file_with(content: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::File::create(&path).unwrap().write_all(content).unwrap();
        (dir, path)
    }

    fn sample() -> Vec<u8> {
        (0..=255u8).cycle().take(1000).collect()
    }

    #[tokio::test]
    async fn test_whole_file() {
        let content = sample();
        let (_dir, path) = file_with(&content);
        let window = BodyWindow { path, offset: 0, count: None };

        let mut out = Vec::new();
        let sent = send_file(&mut out, &window, 64, 0).await.unwrap();
        assert_eq!(sent, 1000);
        assert_eq!(out, content);
    }

    #[tokio::test]
    async fn test_window() {
        let content = sample();
        let (_dir, path) = file_with(&content);
        let window = BodyWindow { path, offset: 100, count: Some(250) };

        let mut out = Vec::new();
        let sent = send_file(&mut out, &window, 64, 0).await.unwrap();
        assert_eq!(sent, 250);
        assert_eq!(out, &content[100..350]);
    }

    #[tokio::test]
    async fn test_short_file_is_failure() {
        let (_dir, path) = file_with(b"0123456789");
        let window = BodyWindow { path, offset: 5, count: Some(10) };

        let mut out = Vec::new();
        assert_eq!(
            send_file(&mut out, &window, 64, 0).await.unwrap_err(),
            Exception::TransmissionFailure
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let window = BodyWindow { path: dir.path().join("gone"), offset: 0, count: None };

        let mut out = Vec::new();
        assert!(send_file(&mut out, &window, 64, 0).await.is_err());
    }

    #[tokio::test]
    async fn test_closed_peer_is_failure() {
        let (_dir, path) = file_with(&sample());
        let window = BodyWindow { path, offset: 0, count: None };

        let (mut client, server) = tokio::io::duplex(16);
        drop(server);
        assert_eq!(
            send_file(&mut client, &window, 64, 0).await.unwrap_err(),
            Exception::TransmissionFailure
        );
    }
}
