// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 多虚拟主机静态文件服务器
//!
//! 用法：`vhost-webserver <配置文件>`
//!
//! 启动流程：
//! - 读取配置（`.json` 或 TOML）并构建虚拟主机表
//! - 初始化日志系统（控制台诊断日志 + 每个域名一个访问日志）
//! - 按配置的线程数构建 Tokio 运行时
//! - 绑定所有监听地址，启动接收循环与管理控制台
//!
//! 在控制台输入 `stop` 或按下 Ctrl-C 时停止接收新连接并退出。

use std::{env, process, sync::Arc, time::Duration};

use log::{error, info};
use tokio::{runtime::Builder, sync::watch};

use vhost_webserver::{
    access_log::{self, Log4rsSink},
    server::{self, Server},
    Config,
};

fn main() {
    // 1. 配置文件
    let path = match env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("NO CONFIG FILE.");
            eprintln!("用法：vhost-webserver <配置文件>");
            process::exit(1);
        }
    };
    let config = match Config::from_file(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("配置文件{}无效：{}", path, e);
            process::exit(1);
        }
    };
    let table = match config.virtual_hosts() {
        Ok(table) => table,
        Err(e) => {
            eprintln!("配置文件{}无效：{}", path, e);
            process::exit(1);
        }
    };

    // 2. 日志系统
    let domains = table.all_domains();
    if let Err(e) = access_log::init_logging(config.log_dir(), &domains, config.log_level()) {
        eprintln!("{}", e);
        process::exit(1);
    }
    info!("配置文件已载入：{}", path);
    info!("日志目录：{}", config.log_dir().display());

    // 3. 运行时
    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建运行时：{}", e);
            process::exit(1);
        }
    };
    info!("工作线程数：{}", config.worker_threads());

    let exit_code = runtime.block_on(async move {
        let access_log = Arc::new(Log4rsSink::new());
        let server = match Server::bind(&config, &table, access_log).await {
            Ok(server) => server,
            Err(_) => return 1,
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shutdown_tx = Arc::new(shutdown_tx);
        tokio::spawn(server::admin_console(server.stats(), Arc::clone(&shutdown_tx)));

        tokio::select! {
            _ = server.run(shutdown_rx) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("收到Ctrl-C，正在停止...");
                let _ = shutdown_tx.send(true);
            }
        }
        0
    });

    // 标准输入上的阻塞读取不会自行结束
    runtime.shutdown_timeout(Duration::from_secs(1));
    info!("服务器已退出");
    process::exit(exit_code);
}
