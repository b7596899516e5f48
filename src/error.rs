//! Error types
//!
//! [`TransportError`] is what the remote source hands back to its caller.
//! [`StorageError`] never crosses the cache API: the disk and memory tiers
//! degrade to a miss or a no-op and only report the failure to the
//! [`CacheObserver`](crate::cache::CacheObserver).

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure fetching from the remote feed or image host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The URL could not be parsed
    #[error("invalid url")]
    InvalidUrl,
    /// The body could not be decoded (bad JSON, not an image)
    #[error("invalid data")]
    InvalidData,
    /// The server answered with something other than 200 OK
    #[error("invalid response")]
    InvalidResponse,
    /// Anything else (connection reset, timeout, ...)
    #[error("unknown transport error")]
    Unknown,
}

/// Failure inside the cache tiers
#[derive(Debug, Error)]
pub enum StorageError {
    /// The key derives to no usable file name
    #[error("invalid cache key: {0:?}")]
    InvalidKey(String),

    /// Creating the cache directory failed
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Writing (or renaming into place) failed
    #[error("failed to write {path}: {source}")]
    Write {
        /// Target file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Reading a cached file failed for a reason other than "not found"
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that could not be read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Deleting a cached file failed
    #[error("failed to remove {path}: {source}")]
    Remove {
        /// File that could not be removed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Listing the cache directory failed
    #[error("failed to list {path}: {source}")]
    ListDir {
        /// Directory that could not be listed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Reading size or modification time failed
    #[error("failed to read metadata of {path}: {source}")]
    Metadata {
        /// File whose attributes could not be read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The image could not be encoded for disk
    #[error("failed to encode image for {key}: {source}")]
    Encode {
        /// Cache key
        key: String,
        /// Codec error
        #[source]
        source: image::ImageError,
    },

    /// Bytes on disk are not a decodable image
    #[error("failed to decode cached image for {key}: {source}")]
    Decode {
        /// Cache key
        key: String,
        /// Codec error
        #[source]
        source: image::ImageError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        assert_eq!(TransportError::InvalidUrl.to_string(), "invalid url");
        assert_eq!(TransportError::InvalidResponse.to_string(), "invalid response");
    }

    #[test]
    fn test_storage_error_keeps_source() {
        let err = StorageError::Write {
            path: PathBuf::from("/tmp/x"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/tmp/x"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
