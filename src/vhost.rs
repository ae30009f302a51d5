// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 虚拟主机表
//!
//! 监听地址 → {域名 → 文档根目录} 的两级映射。启动时构建一次，
//! 之后以 `Arc` 只读共享给该地址上的所有连接。

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::exception::Exception;

/// 单个监听地址上的域名表
#[derive(Debug, Clone, Default)]
pub struct HostMap {
    domains: HashMap<String, PathBuf>,
}

impl HostMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个域名。文档根目录末尾的 `/` 会被去掉，同名域名后者覆盖前者。
    pub fn insert(&mut self, domain: &str, document_root: &str) {
        let root = match document_root.strip_suffix('/') {
            Some(stripped) if !stripped.is_empty() => stripped,
            _ => document_root,
        };
        self.domains.insert(domain.to_string(), PathBuf::from(root));
    }

    /// 根据 Host 标头解析文档根目录。
    pub fn resolve(&self, host: Option<&str>) -> Result<&Path, Exception> {
        self.lookup(host).map(|(_, root)| root)
    }

    /// 返回实际命中的域名及其文档根目录。
    ///
    /// 区分大小写的精确匹配；未命中且带有 `:端口` 后缀时再用去掉端口的主机名匹配一次。
    pub fn lookup(&self, host: Option<&str>) -> Result<(&str, &Path), Exception> {
        let host = host.ok_or(Exception::UnknownHost)?;
        let entry = match self.domains.get_key_value(host) {
            Some(entry) => Some(entry),
            None => match host.rsplit_once(':') {
                Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
                    self.domains.get_key_value(name)
                }
                _ => None,
            },
        };
        entry
            .map(|(domain, root)| (domain.as_str(), root.as_path()))
            .ok_or(Exception::UnknownHost)
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domains.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

/// 全部监听地址的虚拟主机表
#[derive(Debug, Clone, Default)]
pub struct VirtualHostTable {
    listeners: HashMap<SocketAddr, Arc<HostMap>>,
}

impl VirtualHostTable {
    /// 由 (地址, 域名, 文档根目录) 三元组构建
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (SocketAddr, String, String)>,
    {
        let mut grouped: HashMap<SocketAddr, HostMap> = HashMap::new();
        for (address, domain, root) in entries {
            grouped.entry(address).or_default().insert(&domain, &root);
        }
        Self {
            listeners: grouped
                .into_iter()
                .map(|(address, hosts)| (address, Arc::new(hosts)))
                .collect(),
        }
    }

    pub fn get(&self, address: &SocketAddr) -> Option<Arc<HostMap>> {
        self.listeners.get(address).cloned()
    }

    pub fn listeners(&self) -> impl Iterator<Item = (&SocketAddr, &Arc<HostMap>)> {
        self.listeners.iter()
    }

    /// 所有监听地址上出现过的域名（去重、排序）
    pub fn all_domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self
            .listeners
            .values()
            .flat_map(|hosts| hosts.domains().map(str::to_string))
            .collect();
        domains.sort();
        domains.dedup();
        domains
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
