//! Memory tier in front of the disk store.
//!
//! Read path (the manager does not promote on its own):
//!
//! 1. [`CacheManager::lookup_memory`]; on hit, done.
//! 2. [`CacheManager::lookup_disk`]; on hit, also [`CacheManager::store`] it.
//! 3. Fetch remotely; on success [`CacheManager::store`] and
//!    [`CacheManager::store_to_disk`].
//!
//! [`ThumbnailLoader`](crate::loader::ThumbnailLoader) follows exactly this.

use std::io::Cursor;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, ImageFormat};
use tokio::task::JoinHandle;

use super::disk::{DiskStore, Reclaimed};
use super::memory::{DEFAULT_MEMORY_CAPACITY, MemoryCache};
use super::observer::{CacheEvent, SharedObserver, default_observer};
use crate::error::StorageError;

/// Default age after which a disk entry is swept (7 days)
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Default disk budget (3 MiB)
pub const DEFAULT_MAX_DISK_BYTES: u64 = 3 * 1024 * 1024;

/// Construction-time cache settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Disk entries last written longer ago than this are removed by
    /// [`CacheManager::run_maintenance`]
    pub expiry: Duration,
    /// Total disk budget, enforced after every disk write
    pub max_disk_bytes: u64,
    /// Number of decoded images kept in memory
    pub memory_capacity: NonZeroUsize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expiry: DEFAULT_EXPIRY,
            max_disk_bytes: DEFAULT_MAX_DISK_BYTES,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
        }
    }
}

struct Inner {
    config: CacheConfig,
    memory: MemoryCache,
    disk: DiskStore,
    observer: SharedObserver,
}

/// Two-tier image cache. Cheap to clone; clones share both tiers.
///
/// No operation returns an error: every storage or codec failure degrades to
/// a miss or a no-op and is reported to the observer.
#[derive(Clone)]
pub struct CacheManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("config", &self.inner.config)
            .field("memory", &self.inner.memory)
            .field("disk", &self.inner.disk)
            .finish_non_exhaustive()
    }
}

impl CacheManager {
    /// Create a manager storing disk entries under `dir`, logging swallowed
    /// failures through `tracing`.
    pub fn new(dir: impl Into<PathBuf>, config: CacheConfig) -> Self {
        Self::with_observer(dir, config, default_observer())
    }

    /// Create a manager that reports swallowed failures and evictions to `observer`
    pub fn with_observer(
        dir: impl Into<PathBuf>,
        config: CacheConfig,
        observer: SharedObserver,
    ) -> Self {
        let disk = DiskStore::with_observer(dir, config.max_disk_bytes, Arc::clone(&observer));
        Self {
            inner: Arc::new(Inner {
                config,
                memory: MemoryCache::new(config.memory_capacity),
                disk,
                observer,
            }),
        }
    }

    /// Settings this manager was built with
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Memory tier
    pub fn memory(&self) -> &MemoryCache {
        &self.inner.memory
    }

    /// Disk tier
    pub fn disk(&self) -> &DiskStore {
        &self.inner.disk
    }

    /// Memory lookup only. No I/O.
    pub fn lookup_memory(&self, key: &str) -> Option<Arc<DynamicImage>> {
        self.inner.memory.get(key)
    }

    /// Read and decode the disk entry for `key`. A corrupt file is a miss.
    ///
    /// Does not populate the memory tier.
    pub fn lookup_disk(&self, key: &str) -> Option<Arc<DynamicImage>> {
        let bytes = self.inner.disk.get(key)?;
        match image::load_from_memory(&bytes) {
            Ok(image) => Some(Arc::new(image)),
            Err(source) => {
                self.report(&StorageError::Decode {
                    key: key.to_string(),
                    source,
                });
                None
            }
        }
    }

    /// Put an image in the memory tier only.
    pub fn store(&self, key: &str, image: Arc<DynamicImage>) {
        self.inner.memory.insert(key, image);
    }

    /// Encode as PNG and write to the disk tier, then enforce the disk budget.
    ///
    /// Blocking; keep it off latency-sensitive threads. Returns `false` if
    /// nothing was written.
    pub fn store_to_disk(&self, key: &str, image: &DynamicImage) -> bool {
        match encode_png(image) {
            Ok(bytes) => self.inner.disk.put(key, &bytes),
            Err(source) => {
                self.report(&StorageError::Encode {
                    key: key.to_string(),
                    source,
                });
                false
            }
        }
    }

    /// [`store_to_disk`](Self::store_to_disk) on tokio's blocking pool.
    ///
    /// Must be called from within a tokio runtime.
    pub fn store_to_disk_in_background(
        &self,
        key: &str,
        image: Arc<DynamicImage>,
    ) -> JoinHandle<bool> {
        let manager = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || manager.store_to_disk(&key, &image))
    }

    /// Remove disk entries older than the configured expiry.
    ///
    /// Nothing schedules this; call it on startup or from a periodic task.
    pub fn run_maintenance(&self) -> Reclaimed {
        let reclaimed = self.inner.disk.expire_older_than(self.inner.config.expiry);
        if reclaimed.files > 0 {
            tracing::info!(
                "Expired {} cached images ({} bytes)",
                reclaimed.files,
                reclaimed.bytes
            );
        }
        reclaimed
    }

    /// Drop everything held in memory. The disk tier is untouched.
    pub fn clear_memory(&self) {
        self.inner.memory.clear();
    }

    fn report(&self, err: &StorageError) {
        self.inner.observer.on_event(&CacheEvent::StorageFailed(err));
    }
}

/// Encoded form written to disk
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png)?;
    Ok(bytes.into_inner())
}
