use std::fs::{self, File};
use std::io::{self, Read};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use log::{debug, warn};
use lru::LruCache;
use sha2::{Digest, Sha256};

/// 计算指纹时每次读取的块大小（1MB）
const CHUNK_SIZE: usize = 1 << 20;

/// 内容指纹服务，结果用作 ETag
#[cfg_attr(test, mockall::automock)]
pub trait Fingerprinter: Send + Sync {
    fn fingerprint(&self, path: &Path) -> io::Result<String>;
}

/// 分块流式读取文件并计算 SHA-256，输出小写十六进制
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Fingerprinter;

impl Fingerprinter for Sha256Fingerprinter {
    fn fingerprint(&self, path: &Path) -> io::Result<String> {
        let mut file = File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; CHUNK_SIZE];
        loop {
            let n = file.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
        Ok(format!("{:x}", hasher.finalize()))
    }
}

#[derive(Clone)]
struct CacheEntry {
    fingerprint: String,
    modified_time: SystemTime,
    size: u64,
}

pub struct FingerprintCache {
    cache: LruCache<PathBuf, CacheEntry>,
}

impl FingerprintCache {
    // 根据容量构造
    pub fn from_capacity(capacity: usize) -> Self {
        let capacity = match NonZeroUsize::new(capacity) {
            Some(c) => c,
            None => panic!("调用from_capacity时指定的大小是0。如果需要禁用缓存，请在调用处进行处理，而不是传入0"),
        };
        Self {
            cache: LruCache::new(capacity),
        }
    }
    // 放入
    pub fn push(&mut self, path: &Path, fingerprint: String, modified_time: SystemTime, size: u64) {
        let entry = CacheEntry {
            fingerprint,
            modified_time,
            size,
        };
        self.cache.put(path.to_path_buf(), entry);
    }
    // 查询有效缓存，修改时间或大小变化即视为失效
    pub fn find(&mut self, path: &Path, modified_time: SystemTime, size: u64) -> Option<&str> {
        match self.cache.get(path) {
            Some(entry) if entry.modified_time == modified_time && entry.size == size => {
                Some(entry.fingerprint.as_str())
            }
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }
}

/// 带 `(path, mtime, size)` 缓存的指纹服务。对外可见的指纹与不缓存时完全一致。
pub struct CachedFingerprinter<F> {
    inner: F,
    cache: Option<Mutex<FingerprintCache>>,
}

impl<F: Fingerprinter> CachedFingerprinter<F> {
    /// `capacity` 为 0 时不缓存，每次都重新计算
    pub fn new(inner: F, capacity: usize) -> Self {
        let cache = match capacity {
            0 => None,
            c => Some(Mutex::new(FingerprintCache::from_capacity(c))),
        };
        Self { inner, cache }
    }
}

impl<F: Fingerprinter> Fingerprinter for CachedFingerprinter<F> {
    fn fingerprint(&self, path: &Path) -> io::Result<String> {
        let cache = match &self.cache {
            Some(cache) => cache,
            None => return self.inner.fingerprint(path),
        };

        let metadata = fs::metadata(path)?;
        let modified_time = metadata.modified()?;
        let size = metadata.len();

        {
            let mut cache_lock = match cache.lock() {
                Ok(lock) => lock,
                Err(poisoned) => {
                    warn!("指纹缓存锁被污染，恢复并继续");
                    poisoned.into_inner()
                }
            };
            if let Some(fingerprint) = cache_lock.find(path, modified_time, size) {
                debug!("指纹缓存命中：{}", path.display());
                return Ok(fingerprint.to_string());
            }
        }

        // 计算期间不持有锁
        let fingerprint = self.inner.fingerprint(path)?;
        let mut cache_lock = match cache.lock() {
            Ok(lock) => lock,
            Err(poisoned) => poisoned.into_inner(),
        };
        cache_lock.push(path, fingerprint.clone(), modified_time, size);
        Ok(fingerprint)
    }
}
