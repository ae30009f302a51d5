// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 连接工作者
//!
//! 每个 TCP 连接一个任务，按状态机推进：
//! 等待请求 → 处理 → 响应（标头与正文） → 等待请求或关闭。
//!
//! 同一连接上一次只处理一个请求，前一个响应完全发出后才读取下一个请求。
//! 只有等待请求时受空闲超时约束，发送正文期间不设超时。

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    time::{timeout_at, Instant},
};

use crate::{
    access_log::AccessLogSink,
    exception::Exception,
    param::HEAD_TERMINATOR,
    processor::{Outcome, Processor},
    request::Request,
    transmit,
};

/// 一个监听地址上所有连接共享的只读上下文
pub struct WorkerContext {
    pub processor: Arc<Processor>,
    pub access_log: Arc<dyn AccessLogSink>,
    pub idle_timeout: Duration,
    pub chunk_size: usize,
    pub request_buffer_limit: usize,
}

enum ConnectionState {
    AwaitingRequest,
    Processing(Request),
    Responding(Outcome),
    Closed,
}

pub struct Connection<S> {
    stream: S,
    peer: SocketAddr,
    id: u128,
    buffer: BytesMut,
    state: ConnectionState,
    ctx: Arc<WorkerContext>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer: SocketAddr, id: u128, ctx: Arc<WorkerContext>) -> Self {
        Self {
            stream,
            peer,
            id,
            buffer: BytesMut::with_capacity(1024),
            state: ConnectionState::AwaitingRequest,
            ctx,
        }
    }

    /// 运行直到连接关闭。任何分支退出时都会关闭写端。
    pub async fn run(mut self) {
        loop {
            let state = std::mem::replace(&mut self.state, ConnectionState::Closed);
            self.state = match state {
                ConnectionState::AwaitingRequest => match self.read_request().await {
                    Ok(Some(request)) => ConnectionState::Processing(request),
                    Ok(None) => {
                        debug!("[ID{}]对端关闭了连接", self.id);
                        ConnectionState::Closed
                    }
                    Err(e) => {
                        if e.is_malformed_request() {
                            warn!("[ID{}]请求报文错误：{}，直接断开", self.id, e);
                        }
                        ConnectionState::Closed
                    }
                },
                ConnectionState::Processing(request) => match self.process(request).await {
                    Some(outcome) => ConnectionState::Responding(outcome),
                    None => ConnectionState::Closed,
                },
                ConnectionState::Responding(outcome) => self.respond(outcome).await,
                ConnectionState::Closed => break,
            };
        }

        if let Err(e) = self.stream.shutdown().await {
            debug!("[ID{}]关闭连接时出错：{}", self.id, e);
        }
        debug!("[ID{}]TCP连接已关闭", self.id);
    }

    /// 读取一个完整的请求头。
    ///
    /// 返回 `Ok(None)` 表示对端正常关闭；超时或连接被重置返回 `TimeoutOrReset`。
    async fn read_request(&mut self) -> Result<Option<Request>, Exception> {
        let deadline = Instant::now() + self.ctx.idle_timeout;
        loop {
            if let Some(end) = find_head_end(&self.buffer) {
                if end > self.ctx.request_buffer_limit {
                    return Err(Exception::RequestTooLarge);
                }
                // 超出本请求头的字节留给下一个请求
                let head = self.buffer.split_to(end);
                debug!("[ID{}]HTTP请求接收完毕，{}字节", self.id, head.len());
                return Request::try_from(&head, self.id).map(Some);
            }
            if self.buffer.len() > self.ctx.request_buffer_limit {
                return Err(Exception::RequestTooLarge);
            }

            self.buffer.reserve(1024);
            match timeout_at(deadline, self.stream.read_buf(&mut self.buffer)).await {
                Err(_) => {
                    debug!("[ID{}]等待请求超时", self.id);
                    return Err(Exception::TimeoutOrReset);
                }
                Ok(Err(e)) => {
                    debug!("[ID{}]读取连接时遇到错误：{}", self.id, e);
                    return Err(Exception::TimeoutOrReset);
                }
                Ok(Ok(0)) => return Ok(None),
                Ok(Ok(_)) => {}
            }
        }
    }

    async fn process(&self, request: Request) -> Option<Outcome> {
        let processor = Arc::clone(&self.ctx.processor);
        let peer = self.peer.ip();
        let id = self.id;
        match tokio::task::spawn_blocking(move || processor.process(&request, peer, id)).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("[ID{}]处理请求的任务异常退出：{}", id, e);
                None
            }
        }
    }

    /// 发送标头与正文，写访问日志，并决定下一个状态
    async fn respond(&mut self, outcome: Outcome) -> ConnectionState {
        let head = outcome.response.as_bytes();
        let mut failed = false;
        if let Err(e) = self.stream.write_all(&head).await {
            error!("[ID{}]发送响应头失败：{}", self.id, e);
            failed = true;
        } else if let Some(window) = &outcome.body {
            failed = transmit::send_file(&mut self.stream, window, self.ctx.chunk_size, self.id)
                .await
                .is_err();
        } else if let Err(e) = self.stream.flush().await {
            error!("[ID{}]刷新连接失败：{}", self.id, e);
            failed = true;
        }

        self.ctx.access_log.append(&outcome.log);
        info!(
            "[ID{}] {} {} {} {}",
            self.id,
            self.peer,
            outcome.log.path,
            outcome.status,
            outcome.response.information()
        );

        if failed || !outcome.keep_alive {
            ConnectionState::Closed
        } else {
            ConnectionState::AwaitingRequest
        }
    }
}

/// 请求头结束位置（包含空行）。同时接受 `\r\n\r\n` 与 `\n\n`，取先出现者。
fn find_head_end(buffer: &[u8]) -> Option<usize> {
    let crlf = buffer
        .windows(HEAD_TERMINATOR.len())
        .position(|w| w == HEAD_TERMINATOR)
        .map(|i| i + HEAD_TERMINATOR.len());
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|i| i + 2);
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
