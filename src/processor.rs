// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求处理器
//!
//! 串联 虚拟主机 → 资源定位 → 条件/范围判断 → 响应构建 四个步骤，
//! 给出状态码、响应头、正文窗口以及访问日志字段。这里的文件系统操作都是阻塞的，
//! 连接层会把调用放到阻塞线程池里执行。

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use log::{debug, warn};

use crate::{
    access_log::LogRecord,
    fingerprint::Fingerprinter,
    mime::ContentTypeDetector,
    param::*,
    range::{self, RangeDecision},
    request::Request,
    resource,
    response::Response,
    transmit::BodyWindow,
    vhost::HostMap,
};

/// 单个请求的处理结果
#[derive(Debug, Clone)]
pub struct Outcome {
    pub status: u16,
    pub response: Response,
    /// 仅 GET 的 200/206 才有
    pub body: Option<BodyWindow>,
    pub log: LogRecord,
    /// 本次交换后是否保持连接
    pub keep_alive: bool,
}

/// 绑定到一个监听地址的请求处理器
pub struct Processor {
    hosts: Arc<HostMap>,
    detector: Arc<dyn ContentTypeDetector>,
    fingerprinter: Arc<dyn Fingerprinter>,
    keep_alive_timeout: Duration,
}

impl Processor {
    pub fn new(
        hosts: Arc<HostMap>,
        detector: Arc<dyn ContentTypeDetector>,
        fingerprinter: Arc<dyn Fingerprinter>,
        keep_alive_timeout: Duration,
    ) -> Self {
        Self {
            hosts,
            detector,
            fingerprinter,
            keep_alive_timeout,
        }
    }

    pub fn process(&self, request: &Request, peer: IpAddr, id: u128) -> Outcome {
        let timestamp = Local::now();
        let keep_alive = request.keep_alive();
        let keep_alive_timeout = keep_alive.then_some(self.keep_alive_timeout);
        let is_get = request.method() == HttpRequestMethod::Get;

        let log = |vhost: Option<&str>, status: u16, content_length: u64| LogRecord {
            timestamp,
            peer,
            host: request.host().map(str::to_string),
            vhost: vhost.map(str::to_string),
            path: request.path().to_string(),
            status,
            content_length: if is_get { content_length } else { 0 },
            user_agent: request.user_agent().map(str::to_string),
        };
        let not_found = |vhost: Option<&str>, message: &str| Outcome {
            status: 404,
            response: Response::not_found(message, keep_alive_timeout, is_get),
            body: None,
            log: log(vhost, 404, message.len() as u64),
            keep_alive,
        };

        // 1. 虚拟主机。日志按本监听地址上命中的域名归档
        let (domain, root) = match self.hosts.lookup(request.host()) {
            Ok(hit) => hit,
            Err(_) => {
                warn!("[ID{}]未配置的域名：{:?}，返回404", id, request.host());
                return not_found(None, DOMAIN_NOT_FOUND_MSG);
            }
        };

        // 2. 资源定位
        let metadata = match resource::resolve(root, request.path(), self.detector.as_ref(), id) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("[ID{}]请求的路径：{} 不可用（{}），返回404", id, request.path(), e);
                return not_found(Some(domain), RESOURCE_NOT_FOUND_MSG);
            }
        };

        // 3. 条件与范围。只有不带 Range 的请求才需要指纹
        let fingerprint = match request.range() {
            Some(_) => None,
            None => match self.fingerprinter.fingerprint(&metadata.path) {
                Ok(fingerprint) => Some(fingerprint),
                Err(e) => {
                    warn!("[ID{}]无法计算{}的指纹：{}，返回404", id, metadata.path.display(), e);
                    return not_found(Some(domain), RESOURCE_NOT_FOUND_MSG);
                }
            },
        };
        let decision = range::evaluate(request, metadata.size, fingerprint.as_deref());
        debug!("[ID{}]范围决策：{:?}", id, decision);

        // 4. 响应头
        let response =
            Response::from_decision(&decision, &metadata, fingerprint.as_deref(), keep_alive_timeout);

        // 5. 正文窗口与日志长度
        let (window, logged_length) = match decision {
            RangeDecision::Full => (
                Some(BodyWindow {
                    path: metadata.path.clone(),
                    offset: 0,
                    count: Some(metadata.size),
                }),
                metadata.size,
            ),
            RangeDecision::Partial { start, length, .. } => (
                Some(BodyWindow {
                    path: metadata.path.clone(),
                    offset: start,
                    count: Some(length),
                }),
                length,
            ),
            RangeDecision::NotModified | RangeDecision::NotSatisfiable => (None, metadata.size),
        };

        let status = decision.status_code();
        Outcome {
            status,
            response,
            body: window.filter(|_| is_get),
            log: log(Some(domain), status, logged_length),
            keep_alive,
        }
    }
}
