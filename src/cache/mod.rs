//! Two-tier image cache.
//!
//! A count-bounded LRU of decoded images ([`MemoryCache`]) in front of a
//! size- and age-bounded directory of encoded image files ([`DiskStore`]),
//! composed by [`CacheManager`].

mod disk;
mod manager;
mod memory;
mod observer;

pub use disk::{DiskStore, DiskUsage, Reclaimed};
pub use manager::{
    CacheConfig, CacheManager, DEFAULT_EXPIRY, DEFAULT_MAX_DISK_BYTES, encode_png,
};
pub use memory::{DEFAULT_MEMORY_CAPACITY, MemoryCache};
pub use observer::{CacheEvent, CacheObserver, EvictionReason, SharedObserver, TracingObserver};

use std::sync::{PoisonError, RwLock};

/// Process-wide instance, if the application installed one
static SHARED: RwLock<Option<CacheManager>> = RwLock::new(None);

/// Install (or replace) the process-wide cache manager.
///
/// Returns the previously installed instance.
pub fn set_shared(manager: CacheManager) -> Option<CacheManager> {
    SHARED
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(manager)
}

/// The process-wide cache manager, if one was installed.
pub fn shared() -> Option<CacheManager> {
    SHARED
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}
