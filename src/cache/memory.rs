//! LRU cache for decoded images.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use image::DynamicImage;
use lru::LruCache;

/// Default number of images kept in memory
pub const DEFAULT_MEMORY_CAPACITY: NonZeroUsize = NonZeroUsize::new(100).unwrap();

/// Thread-safe, count-bounded image cache.
///
/// Cloning shares the underlying storage. Evicting from here never touches
/// the disk tier.
#[derive(Clone)]
pub struct MemoryCache {
    images: Arc<Mutex<LruCache<String, Arc<DynamicImage>>>>,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cache = self.lock();
        f.debug_struct("MemoryCache")
            .field("len", &cache.len())
            .field("capacity", &cache.cap())
            .finish()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_CAPACITY)
    }
}

impl MemoryCache {
    /// Create a cache holding at most `capacity` images.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            images: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Store a decoded image, evicting the least recently used one if full.
    pub fn insert(&self, key: &str, image: Arc<DynamicImage>) {
        self.lock().put(key.to_string(), image);
    }

    /// Get a decoded image, marking it as recently used.
    pub fn get(&self, key: &str) -> Option<Arc<DynamicImage>> {
        self.lock().get(key).map(Arc::clone)
    }

    /// Check if an image is cached (does not touch recency).
    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains(key)
    }

    /// Drop a single image.
    pub fn remove(&self, key: &str) -> Option<Arc<DynamicImage>> {
        self.lock().pop(key)
    }

    /// Clear the entire cache.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Get the number of cached images.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Maximum number of images held.
    pub fn capacity(&self) -> NonZeroUsize {
        self.lock().cap()
    }

    // poisoned locks are recovered
    fn lock(&self) -> MutexGuard<'_, LruCache<String, Arc<DynamicImage>>> {
        self.images.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
