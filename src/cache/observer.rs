//! Hook for failures and evictions the cache otherwise swallows.

use std::path::Path;
use std::sync::Arc;

use crate::error::StorageError;

/// Why a disk entry was deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// Older than the expiry duration
    Expired,
    /// Removed to bring the directory back under the byte budget
    OverBudget,
    /// Removed by an explicit clear
    Cleared,
}

/// Something the cache did (or failed to do) without telling its caller
#[derive(Debug)]
pub enum CacheEvent<'a> {
    /// A filesystem or codec operation failed and was degraded to a miss/no-op
    StorageFailed(&'a StorageError),
    /// A disk entry was removed
    Evicted {
        /// File that was removed
        path: &'a Path,
        /// Its size in bytes
        size: u64,
        /// Which janitor removed it
        reason: EvictionReason,
    },
}

/// Receives [`CacheEvent`]s. Must be cheap and must not panic.
pub trait CacheObserver: Send + Sync {
    /// Called synchronously from the cache operation that produced the event
    fn on_event(&self, event: &CacheEvent<'_>);
}

/// Default observer: forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CacheObserver for TracingObserver {
    fn on_event(&self, event: &CacheEvent<'_>) {
        match event {
            CacheEvent::StorageFailed(err) => {
                tracing::warn!("Image cache degraded: {err}");
            }
            CacheEvent::Evicted { path, size, reason } => {
                tracing::debug!("Evicted {} ({size} bytes, {reason:?})", path.display());
            }
        }
    }
}

/// Shared observer handle
pub type SharedObserver = Arc<dyn CacheObserver>;

pub(crate) fn default_observer() -> SharedObserver {
    Arc::new(TracingObserver)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use super::*;

    /// Owned copy of a [`CacheEvent`] for assertions
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Recorded {
        Failed(String),
        Evicted(PathBuf, EvictionReason),
    }

    #[derive(Default)]
    pub struct RecordingObserver {
        events: Mutex<Vec<Recorded>>,
    }

    impl RecordingObserver {
        pub fn events(&self) -> Vec<Recorded> {
            self.events.lock().unwrap().clone()
        }

        pub fn failures(&self) -> usize {
            self.events()
                .iter()
                .filter(|e| matches!(e, Recorded::Failed(_)))
                .count()
        }

        pub fn evicted(&self, reason: EvictionReason) -> Vec<PathBuf> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    Recorded::Evicted(path, r) if r == reason => Some(path),
                    _ => None,
                })
                .collect()
        }
    }

    impl CacheObserver for RecordingObserver {
        fn on_event(&self, event: &CacheEvent<'_>) {
            let recorded = match event {
                CacheEvent::StorageFailed(err) => Recorded::Failed(err.to_string()),
                CacheEvent::Evicted { path, reason, .. } => {
                    Recorded::Evicted(path.to_path_buf(), *reason)
                }
            };
            self.events.lock().unwrap().push(recorded);
        }
    }
}
