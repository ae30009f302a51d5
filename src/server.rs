// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 监听管理
//!
//! 为虚拟主机表中的每个监听地址绑定端口并运行独立的接收循环，
//! 每接收一个连接就派生一个连接任务。另提供基于标准输入的管理控制台。

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::TcpListener,
    sync::{watch, Semaphore},
    task::JoinHandle,
};

use crate::{
    access_log::AccessLogSink,
    config::Config,
    connection::{Connection, WorkerContext},
    fingerprint::{CachedFingerprinter, Fingerprinter, Sha256Fingerprinter},
    mime::{ContentTypeDetector, MagicDetector},
    processor::Processor,
    vhost::VirtualHostTable,
};

/// 运行状态统计，供管理控制台查询
#[derive(Debug, Default)]
pub struct ServerStats {
    active_connections: AtomicUsize,
    next_id: AtomicU64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }

    /// 分配连接 ID
    pub fn next_id(&self) -> u128 {
        self.next_id.fetch_add(1, Ordering::Relaxed) as u128
    }

    fn enter(self: &Arc<Self>) -> ActiveGuard {
        self.active_connections.fetch_add(1, Ordering::SeqCst);
        ActiveGuard(Arc::clone(self))
    }
}

/// 连接任务结束（包括异常结束）时活跃连接数减一
struct ActiveGuard(Arc<ServerStats>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.active_connections.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 已绑定全部监听地址、尚未开始接收连接的服务器
pub struct Server {
    listeners: Vec<(TcpListener, Arc<WorkerContext>)>,
    stats: Arc<ServerStats>,
    limiter: Option<Arc<Semaphore>>,
}

impl Server {
    /// 绑定配置中的所有监听地址。任一地址绑定失败都直接返回错误。
    pub async fn bind(
        config: &Config,
        table: &VirtualHostTable,
        access_log: Arc<dyn AccessLogSink>,
    ) -> io::Result<Self> {
        let detector: Arc<dyn ContentTypeDetector> = Arc::new(MagicDetector::new());
        let fingerprinter: Arc<dyn Fingerprinter> = Arc::new(CachedFingerprinter::new(
            Sha256Fingerprinter,
            config.fingerprint_cache_size(),
        ));

        let mut listeners = Vec::with_capacity(table.len());
        for (address, hosts) in table.listeners() {
            let listener = match TcpListener::bind(*address).await {
                Ok(listener) => listener,
                Err(e) => {
                    error!("无法绑定地址：{}，错误：{}", address, e);
                    return Err(e);
                }
            };
            info!("地址{}绑定完成，虚拟主机：{:?}", address, hosts.domains().collect::<Vec<_>>());

            let processor = Processor::new(
                Arc::clone(hosts),
                Arc::clone(&detector),
                Arc::clone(&fingerprinter),
                config.keep_alive_timeout(),
            );
            let ctx = WorkerContext {
                processor: Arc::new(processor),
                access_log: Arc::clone(&access_log),
                idle_timeout: config.keep_alive_timeout(),
                chunk_size: config.chunk_size(),
                request_buffer_limit: config.request_buffer_limit(),
            };
            listeners.push((listener, Arc::new(ctx)));
        }

        let limiter = match config.max_connections() {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };
        Ok(Self {
            listeners,
            stats: Arc::new(ServerStats::new()),
            limiter,
        })
    }

    /// 实际绑定的地址（端口为 0 时由系统分配）
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.listeners
            .iter()
            .filter_map(|(listener, _)| listener.local_addr().ok())
            .collect()
    }

    pub fn stats(&self) -> Arc<ServerStats> {
        Arc::clone(&self.stats)
    }

    /// 运行所有接收循环，直到 `shutdown` 变为 `true`。已建立的连接不受影响。
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let handles: Vec<JoinHandle<()>> = self
            .listeners
            .into_iter()
            .map(|(listener, ctx)| {
                tokio::spawn(serve_listener(
                    listener,
                    ctx,
                    Arc::clone(&self.stats),
                    self.limiter.clone(),
                    shutdown.clone(),
                ))
            })
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                error!("接收循环异常退出：{}", e);
            }
        }
        info!("所有监听已停止");
    }
}

async fn serve_listener(
    listener: TcpListener,
    ctx: Arc<WorkerContext>,
    stats: Arc<ServerStats>,
    limiter: Option<Arc<Semaphore>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let address = match listener.local_addr() {
        Ok(address) => address.to_string(),
        Err(_) => "?".to_string(),
    };
    info!("{} UP", address);

    loop {
        if *shutdown.borrow() {
            break;
        }

        // 达到连接数上限时在此排队，不再接收新连接
        let permit = match &limiter {
            Some(semaphore) => tokio::select! {
                permit = Arc::clone(semaphore).acquire_owned() => match permit {
                    Ok(permit) => Some(permit),
                    Err(_) => break,
                },
                _ = shutdown.changed() => break,
            },
            None => None,
        };

        let listener = &listener;
        let (stream, peer) = tokio::select! {
            accepted = accept_retrying(|| listener.accept(), &address) => accepted,
            _ = shutdown.changed() => break,
        };

        let id = stats.next_id();
        debug!("[ID{}]TCP连接已建立：{}", id, peer);
        let guard = stats.enter();
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            let _guard = guard;
            let _permit = permit;
            Connection::new(stream, peer, id, ctx).run().await;
        });
    }
    info!("{} DOWN", address);
}

/// accept 失败（如文件描述符耗尽）后等待的时间
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// 反复调用 `accept` 直到成功，每次失败后等待 `ACCEPT_RETRY_DELAY`
async fn accept_retrying<F, Fut, T>(mut accept: F, address: &str) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    loop {
        match accept().await {
            Ok(accepted) => return accepted,
            Err(e) => {
                error!("{}接收连接失败：{}", address, e);
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
            }
        }
    }
}

/// 从标准输入读取管理指令：`stop`、`status`、`help`
///
/// 标准输入关闭后控制台退出，服务器继续运行。
pub async fn admin_console(stats: Arc<ServerStats>, shutdown: Arc<watch::Sender<bool>>) {
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut input = String::new();
    loop {
        input.clear();
        match reader.read_line(&mut input).await {
            Ok(0) | Err(_) => {
                debug!("标准输入已关闭，管理控制台退出");
                break;
            }
            Ok(_) => {}
        }
        match input.trim() {
            "stop" => {
                println!("停机指令已激活，服务器将停止接收新连接...");
                let _ = shutdown.send(true);
                break;
            }
            "status" => {
                println!("== Webserver 状态 ===");
                println!("当前活跃连接数: {}", stats.active_connections());
                println!("====================");
            }
            "help" => {
                println!("== Webserver Help ==");
                println!("stop   - 发出停机信号");
                println!("status - 查看当前服务器运行状态");
                println!("help   - 显示此帮助信息");
                println!("====================");
            }
            "" => {}
            cmd => println!("无效的命令：{}", cmd),
        }
    }
}
