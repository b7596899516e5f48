//! # thumbcache
//!
//! A two-tier image cache: decoded images in a bounded in-memory LRU, encoded
//! bytes in a size- and age-bounded directory on disk.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ThumbnailLoader                         │
//! │     memory → disk (promote) → network (fill both tiers)     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!          ┌───────────────────┴───────────────────┐
//!          ▼                                       ▼
//! ┌─────────────────────────────┐   ┌─────────────────────────────┐
//! │        CacheManager         │   │        RemoteSource         │
//! │                             │   │                             │
//! │ • MemoryCache (LRU, count)  │   │ • fetch_list                │
//! │ • DiskStore (flat dir)      │   │ • fetch_image_bytes         │
//! │ • run_maintenance           │   │ • HttpSource (reqwest)      │
//! └─────────────────────────────┘   └─────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`cache`]: Memory tier, disk tier, and the manager composing them
//! - [`loader`]: The read-through protocol and a background loader task
//! - [`source`]: Remote feed and image host
//! - [`config`]: Configuration management
//! - [`error`]: Transport and storage errors
//! - [`models`]: Feed records
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use thumbcache::{CacheConfig, CacheManager};
//!
//! let cache = CacheManager::new("/tmp/thumbs", CacheConfig::default());
//! let key = "https://via.placeholder.com/150/92c952";
//!
//! if cache.lookup_memory(key).is_none() {
//!     if let Some(image) = cache.lookup_disk(key) {
//!         cache.store(key, Arc::clone(&image));
//!     }
//! }
//!
//! // on startup, or from a periodic task
//! cache.run_maintenance();
//! ```
//!
//! Storage failures never reach the caller; they degrade to a cache miss and
//! are reported to a [`CacheObserver`].

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_possible_truncation)]

pub mod cache;
pub mod config;
pub mod error;
pub mod loader;
pub mod models;
pub mod paths;
pub mod source;

// Re-export main types for convenience
pub use cache::{CacheConfig, CacheManager, CacheObserver, DiskStore, MemoryCache};
pub use config::Config;
pub use error::{StorageError, TransportError};
pub use loader::{ImageLoader, LoadResult, ThumbnailLoader, Tier};
pub use models::Album;
pub use source::{HttpSource, RemoteSource};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
