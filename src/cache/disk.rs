//! On-disk tier: one flat directory, one file per key.
//!
//! File name is the percent-encoded key, contents are the raw encoded image
//! bytes. There is no index: a directory listing plus each file's size and
//! modification time is all the bookkeeping there is. The modification time
//! doubles as the recency signal for the byte budget and the staleness signal
//! for expiry.
//!
//! Nothing here returns an error. Failures are reported to the
//! [`CacheObserver`](super::CacheObserver) and degrade to a miss or a no-op.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use super::observer::{CacheEvent, EvictionReason, SharedObserver, default_observer};
use crate::error::StorageError;

/// Sequence for temporary file names, unique within the process
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// What a janitor pass removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reclaimed {
    /// Number of files deleted
    pub files: usize,
    /// Bytes freed
    pub bytes: u64,
}

/// Current footprint of the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskUsage {
    /// Number of cached entries
    pub files: usize,
    /// Sum of entry sizes
    pub bytes: u64,
    /// Modification time of the least recently written entry
    pub oldest: Option<SystemTime>,
}

struct FileEntry {
    path: PathBuf,
    size: u64,
    modified: SystemTime,
}

/// Durable key to bytes storage with age- and size-based janitors
pub struct DiskStore {
    dir: PathBuf,
    max_bytes: u64,
    observer: SharedObserver,
    /// Held by writers and janitors so a budget pass never lands between
    /// another writer's rename and its return.
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for DiskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskStore")
            .field("dir", &self.dir)
            .field("max_bytes", &self.max_bytes)
            .finish_non_exhaustive()
    }
}

impl DiskStore {
    /// Create a store rooted at `dir`. The directory is created lazily on the
    /// first write.
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self::with_observer(dir, max_bytes, default_observer())
    }

    /// Create a store that reports swallowed failures to `observer`
    pub fn with_observer(dir: impl Into<PathBuf>, max_bytes: u64, observer: SharedObserver) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
            observer,
            write_lock: Mutex::new(()),
        }
    }

    /// Storage directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Byte budget enforced after every [`put`](Self::put)
    pub const fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Path the entry for `key` lives at, or `None` for an empty key.
    ///
    /// Two different keys that encode to the same name share a file.
    pub fn path_for(&self, key: &str) -> Option<PathBuf> {
        file_name(key).map(|name| self.dir.join(name))
    }

    /// Read the bytes stored under `key`. Missing or unreadable files are a miss.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) if is_missing(&e) => None,
            Err(source) => {
                self.report(&StorageError::Read { path, source });
                None
            }
        }
    }

    /// Write `bytes` under `key`, replacing any previous entry, then run the
    /// byte budget pass.
    ///
    /// Returns `false` if the entry could not be written. Never retries.
    pub fn put(&self, key: &str, bytes: &[u8]) -> bool {
        let _guard = self.lock();
        match self.write_entry(key, bytes) {
            Ok(()) => {
                self.evict_over_budget(self.max_bytes);
                true
            }
            Err(err) => {
                self.report(&err);
                false
            }
        }
    }

    /// Remove the entry for `key`. Returns `true` if a file was deleted.
    pub fn remove(&self, key: &str) -> bool {
        let Some(path) = self.path_for(key) else {
            return false;
        };
        let _guard = self.lock();
        match fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) if is_missing(&e) => false,
            Err(source) => {
                self.report(&StorageError::Remove { path, source });
                false
            }
        }
    }

    /// Delete every file last written more than `max_age` ago, regardless of
    /// the byte budget. Also reclaims temporary files left by interrupted writes.
    pub fn expire_older_than(&self, max_age: Duration) -> Reclaimed {
        let _guard = self.lock();
        let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
            return Reclaimed::default();
        };

        let mut reclaimed = Reclaimed::default();
        for entry in self.scan(true) {
            if entry.modified < cutoff && self.delete(&entry, EvictionReason::Expired) {
                reclaimed.files += 1;
                reclaimed.bytes += entry.size;
            }
        }
        reclaimed
    }

    /// Delete least recently written entries until the total is at most
    /// `max_bytes`.
    pub fn enforce_size_budget(&self, max_bytes: u64) -> Reclaimed {
        let _guard = self.lock();
        self.evict_over_budget(max_bytes)
    }

    /// Delete every entry
    pub fn clear(&self) -> Reclaimed {
        let _guard = self.lock();
        let mut reclaimed = Reclaimed::default();
        for entry in self.scan(true) {
            if self.delete(&entry, EvictionReason::Cleared) {
                reclaimed.files += 1;
                reclaimed.bytes += entry.size;
            }
        }
        reclaimed
    }

    /// Count and size of the cached entries
    pub fn usage(&self) -> DiskUsage {
        self.scan(false)
            .into_iter()
            .fold(DiskUsage::default(), |mut usage, entry| {
                usage.files += 1;
                usage.bytes += entry.size;
                usage.oldest = Some(match usage.oldest {
                    Some(oldest) => oldest.min(entry.modified),
                    None => entry.modified,
                });
                usage
            })
    }

    /// Oldest first. The total is decremented by each candidate's size even
    /// when its deletion fails, so the pass is a single sweep and always
    /// terminates; a failed delete can leave the directory over budget until
    /// the next write.
    fn evict_over_budget(&self, max_bytes: u64) -> Reclaimed {
        let mut entries = self.scan(false);
        let mut total: u64 = entries.iter().map(|e| e.size).sum();
        let mut reclaimed = Reclaimed::default();
        if total <= max_bytes {
            return reclaimed;
        }

        entries.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));

        for entry in entries {
            if total <= max_bytes {
                break;
            }
            if self.delete(&entry, EvictionReason::OverBudget) {
                reclaimed.files += 1;
                reclaimed.bytes += entry.size;
            }
            total = total.saturating_sub(entry.size);
        }
        reclaimed
    }

    fn write_entry(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self
            .path_for(key)
            .ok_or_else(|| StorageError::InvalidKey(key.to_string()))?;

        if !self.dir.is_dir() {
            fs::create_dir_all(&self.dir).map_err(|source| StorageError::CreateDir {
                path: self.dir.clone(),
                source,
            })?;
        }

        let tmp = self.dir.join(format!(
            ".{}-{}.tmp",
            std::process::id(),
            TMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        if let Err(source) = write_stamped(&tmp, bytes).and_then(|()| fs::rename(&tmp, &path)) {
            let _ = fs::remove_file(&tmp);
            return Err(StorageError::Write { path, source });
        }
        Ok(())
    }

    /// Regular files in the directory. Unreadable entries are reported and skipped.
    fn scan(&self, include_hidden: bool) -> Vec<FileEntry> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(e) if is_missing(&e) => return Vec::new(),
            Err(source) => {
                self.report(&StorageError::ListDir {
                    path: self.dir.clone(),
                    source,
                });
                return Vec::new();
            }
        };

        let mut entries = Vec::new();
        for dir_entry in read_dir {
            let dir_entry = match dir_entry {
                Ok(dir_entry) => dir_entry,
                Err(source) => {
                    self.report(&StorageError::ListDir {
                        path: self.dir.clone(),
                        source,
                    });
                    continue;
                }
            };

            if !include_hidden && dir_entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }

            let path = dir_entry.path();
            let metadata = match dir_entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(source) => {
                    self.report(&StorageError::Metadata { path, source });
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            match metadata.modified() {
                Ok(modified) => entries.push(FileEntry {
                    path,
                    size: metadata.len(),
                    modified,
                }),
                Err(source) => self.report(&StorageError::Metadata { path, source }),
            }
        }
        entries
    }

    /// Returns `true` if this call removed the file
    fn delete(&self, entry: &FileEntry, reason: EvictionReason) -> bool {
        match fs::remove_file(&entry.path) {
            Ok(()) => {
                self.observer.on_event(&CacheEvent::Evicted {
                    path: &entry.path,
                    size: entry.size,
                    reason,
                });
                true
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(source) => {
                self.report(&StorageError::Remove {
                    path: entry.path.clone(),
                    source,
                });
                false
            }
        }
    }

    fn report(&self, err: &StorageError) {
        self.observer.on_event(&CacheEvent::StorageFailed(err));
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The path, or one of its parents, does not exist as a directory
fn is_missing(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

/// Percent-encoded file name for `key`. A leading dot is encoded too so the
/// name is never `.`, `..` or hidden.
fn file_name(key: &str) -> Option<String> {
    if key.is_empty() {
        return None;
    }
    let encoded = urlencoding::encode(key);
    Some(match encoded.strip_prefix('.') {
        Some(rest) => format!("%2E{rest}"),
        None => encoded.into_owned(),
    })
}

/// Write the file and stamp its mtime with the full-precision clock; some
/// filesystems only advance timestamps once per tick.
fn write_stamped(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.set_modified(SystemTime::now())?;
    file.sync_all()
}
