//! Opportunistic byte cache for file downloads.
//!
//! Two layers: an in-memory LRU for bytes fetched this run, and an
//! optional on-disk directory keyed by a digest of the URL. Caching is
//! best-effort; disk failures are logged and the bytes are refetched,
//! never failing the pipeline.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::http::HttpClient;

/// Byte cache in front of [`HttpClient::get_bytes`].
pub struct DownloadCache {
    memory: LruCache<String, Arc<Vec<u8>>>,
    disk_dir: Option<PathBuf>,
}

impl DownloadCache {
    /// Create a cache holding up to `capacity` responses in memory, with
    /// an optional disk spill directory.
    pub fn new(capacity: usize, disk_dir: Option<PathBuf>) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            memory: LruCache::new(capacity),
            disk_dir,
        }
    }

    /// Fetch a URL, consulting memory, then disk, then the network.
    pub async fn fetch(&mut self, http: &HttpClient, url: &str) -> Result<Arc<Vec<u8>>> {
        if let Some(bytes) = self.memory.get(url) {
            debug!(url, "download cache hit (memory)");
            return Ok(Arc::clone(bytes));
        }

        if let Some(bytes) = self.read_disk(url) {
            debug!(url, "download cache hit (disk)");
            let bytes = Arc::new(bytes);
            self.memory.put(url.to_string(), Arc::clone(&bytes));
            return Ok(bytes);
        }

        let bytes = Arc::new(http.get_bytes(url).await?);
        self.memory.put(url.to_string(), Arc::clone(&bytes));
        self.write_disk(url, &bytes);
        Ok(bytes)
    }

    /// Number of responses currently held in memory.
    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    /// Drop everything cached in memory (disk entries stay).
    pub fn clear(&mut self) {
        self.memory.clear();
    }

    fn cache_path(&self, url: &str) -> Option<PathBuf> {
        self.disk_dir
            .as_ref()
            .map(|dir| dir.join(format!("{:016x}.bin", fnv1a(url.as_bytes()))))
    }

    fn read_disk(&self, url: &str) -> Option<Vec<u8>> {
        let path = self.cache_path(url)?;
        std::fs::read(path).ok()
    }

    fn write_disk(&self, url: &str, bytes: &[u8]) {
        let Some(path) = self.cache_path(url) else {
            return;
        };
        if let Some(dir) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                warn!(url, error = %e, "cannot create download cache dir");
                return;
            }
        }
        if let Err(e) = std::fs::write(&path, bytes) {
            warn!(url, error = %e, "cannot write download cache entry");
        }
    }
}

/// FNV-1a 64-bit digest for cache file names.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &byte in bytes {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a_is_stable_and_distinct() {
        let a = fnv1a(b"https://example.com/a.geojson");
        let b = fnv1a(b"https://example.com/b.geojson");
        assert_ne!(a, b);
        assert_eq!(a, fnv1a(b"https://example.com/a.geojson"));
    }

    #[test]
    fn test_memory_eviction() {
        let mut cache = DownloadCache::new(2, None);
        cache
            .memory
            .put("u1".into(), Arc::new(vec![1]));
        cache
            .memory
            .put("u2".into(), Arc::new(vec![2]));
        cache
            .memory
            .put("u3".into(), Arc::new(vec![3]));

        assert_eq!(cache.len(), 2);
        assert!(cache.memory.get("u1").is_none(), "oldest entry evicted");
        assert!(cache.memory.get("u3").is_some());
    }

    #[test]
    fn test_disk_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DownloadCache::new(4, Some(dir.path().to_path_buf()));

        cache.write_disk("https://example.com/data", &[1, 2, 3]);
        assert_eq!(
            cache.read_disk("https://example.com/data"),
            Some(vec![1, 2, 3])
        );
        assert_eq!(cache.read_disk("https://example.com/other"), None);
    }

    #[test]
    fn test_disk_failure_is_silent() {
        // Pointing at an unwritable location must not panic or error
        let cache = DownloadCache::new(4, Some(PathBuf::from("/dev/null/nope")));
        cache.write_disk("https://example.com/data", &[1]);
        assert_eq!(cache.read_disk("https://example.com/data"), None);
    }
}
