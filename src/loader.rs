//! Thumbnail loading through the cache.
//!
//! [`ThumbnailLoader`] walks memory, then disk, then the network, and fills
//! the tiers it missed. [`ImageLoader`] runs it on a background task for
//! callers that poll for results (a render loop, say).

use std::sync::Arc;

use image::DynamicImage;
use tokio::sync::mpsc;

use crate::cache::CacheManager;
use crate::error::TransportError;
use crate::models::Album;
use crate::source::RemoteSource;

/// Where a loaded image came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Memory tier hit
    Memory,
    /// Disk tier hit (now promoted to memory)
    Disk,
    /// Fetched from the network (now stored in both tiers)
    Remote,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Memory => "memory",
            Self::Disk => "disk",
            Self::Remote => "remote",
        };
        f.write_str(name)
    }
}

/// Cache-aware image loader
pub struct ThumbnailLoader<S> {
    cache: CacheManager,
    source: Arc<S>,
}

impl<S> Clone for ThumbnailLoader<S> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            source: Arc::clone(&self.source),
        }
    }
}

impl<S: RemoteSource> ThumbnailLoader<S> {
    /// Create a loader over `cache`, falling back to `source`
    pub fn new(cache: CacheManager, source: S) -> Self {
        Self {
            cache,
            source: Arc::new(source),
        }
    }

    /// The cache this loader fills
    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// The remote source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetch the photo list (never cached)
    pub async fn fetch_list(&self) -> Result<Vec<Album>, TransportError> {
        self.source.fetch_list().await
    }

    /// Load the image at `url`.
    ///
    /// Only transport failures surface; cache failures just mean a refetch.
    /// Bytes that do not decode as an image are [`TransportError::InvalidData`].
    ///
    /// A remote hit returns as soon as the memory tier holds it; the disk
    /// write (and its budget pass) finishes on tokio's blocking pool.
    pub async fn load(&self, url: &str) -> Result<(Arc<DynamicImage>, Tier), TransportError> {
        if let Some(image) = self.cache.lookup_memory(url) {
            return Ok((image, Tier::Memory));
        }

        if let Some(image) = self.cache.lookup_disk(url) {
            self.cache.store(url, Arc::clone(&image));
            return Ok((image, Tier::Disk));
        }

        tracing::debug!("Downloading image: {url}");
        let bytes = self.source.fetch_image_bytes(url).await?;
        let image = image::load_from_memory(&bytes).map_err(|e| {
            tracing::debug!("Downloaded bytes for {url} are not an image: {e}");
            TransportError::InvalidData
        })?;
        let image = Arc::new(image);

        self.cache.store(url, Arc::clone(&image));
        let write = self.cache.store_to_disk_in_background(url, Arc::clone(&image));
        let url = url.to_string();
        tokio::spawn(async move {
            if let Err(e) = write.await {
                tracing::warn!("Disk write for {url} did not complete: {e}");
            }
        });

        Ok((image, Tier::Remote))
    }
}

/// Message for the image loader task
#[derive(Debug)]
pub enum LoaderMessage {
    /// Request to load an image
    Load {
        /// Image URL (cache key)
        url: String,
    },
    /// Shutdown the loader
    Shutdown,
}

/// Result of an image load operation
#[derive(Debug, Clone)]
pub enum LoadResult {
    /// Image loaded successfully
    Success {
        /// Requested URL
        url: String,
        /// Decoded image
        image: Arc<DynamicImage>,
        /// Tier that served it
        tier: Tier,
    },
    /// Image loading failed
    Failed {
        /// Requested URL
        url: String,
        /// Why
        error: TransportError,
    },
}

/// Async image loader that runs in a background task.
pub struct ImageLoader {
    /// Sender to request image loads
    sender: mpsc::UnboundedSender<LoaderMessage>,
    /// Receiver for load results
    result_rx: mpsc::UnboundedReceiver<LoadResult>,
}

impl ImageLoader {
    /// Spawn the background task. Must be called from within a tokio runtime.
    pub fn spawn<S: RemoteSource + 'static>(loader: ThumbnailLoader<S>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = mpsc::unbounded_channel();

        tokio::spawn(loader_task(rx, result_tx, loader));

        Self {
            sender: tx,
            result_rx,
        }
    }

    /// Request an image to be loaded.
    pub fn load(&self, url: &str) {
        let _ = self.sender.send(LoaderMessage::Load {
            url: url.to_string(),
        });
    }

    /// Poll for completed loads (non-blocking).
    pub fn poll_results(&mut self) -> Vec<LoadResult> {
        let mut results = Vec::new();
        while let Ok(result) = self.result_rx.try_recv() {
            results.push(result);
        }
        results
    }

    /// Wait for the next completed load. `None` once the task has stopped.
    pub async fn next_result(&mut self) -> Option<LoadResult> {
        self.result_rx.recv().await
    }

    /// Shutdown the loader.
    pub fn shutdown(&self) {
        let _ = self.sender.send(LoaderMessage::Shutdown);
    }
}

/// Background task that handles image loading.
async fn loader_task<S: RemoteSource>(
    mut rx: mpsc::UnboundedReceiver<LoaderMessage>,
    result_tx: mpsc::UnboundedSender<LoadResult>,
    loader: ThumbnailLoader<S>,
) {
    while let Some(msg) = rx.recv().await {
        match msg {
            LoaderMessage::Load { url } => {
                let result = match loader.load(&url).await {
                    Ok((image, tier)) => LoadResult::Success { url, image, tier },
                    Err(error) => {
                        tracing::warn!("Failed to load image {url}: {error}");
                        LoadResult::Failed { url, error }
                    }
                };
                if result_tx.send(result).is_err() {
                    break;
                }
            }
            LoaderMessage::Shutdown => {
                tracing::debug!("Image loader shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, encode_png};
    use image::{Rgba, RgbaImage};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    const URL: &str = "https://via.placeholder.com/150/92c952";

    #[derive(Default)]
    struct FakeSource {
        images: HashMap<String, Vec<u8>>,
        fetches: AtomicUsize,
    }

    impl FakeSource {
        fn with(url: &str, bytes: Vec<u8>) -> Self {
            let mut source = Self::default();
            source.images.insert(url.to_string(), bytes);
            source
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    impl RemoteSource for FakeSource {
        async fn fetch_list(&self) -> Result<Vec<Album>, TransportError> {
            Ok(Vec::new())
        }

        async fn fetch_image_bytes(&self, url: &str) -> Result<Vec<u8>, TransportError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.images
                .get(url)
                .cloned()
                .ok_or(TransportError::InvalidResponse)
        }
    }

    fn thumbnail() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 3, Rgba([0x92, 0xc9, 0x52, 255])))
    }

    fn png() -> Vec<u8> {
        encode_png(&thumbnail()).unwrap()
    }

    /// The disk write after a remote load is detached from `load`
    async fn wait_for_disk(cache: &CacheManager, url: &str) -> bool {
        for _ in 0..500 {
            if cache.lookup_disk(url).is_some() {
                return true;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_remote_then_memory() {
        let dir = tempdir().unwrap();
        let cache = CacheManager::new(dir.path(), CacheConfig::default());
        let loader = ThumbnailLoader::new(cache.clone(), FakeSource::with(URL, png()));

        let (image, tier) = loader.load(URL).await.unwrap();
        assert_eq!(tier, Tier::Remote);
        assert_eq!(*image, thumbnail());

        let (_, tier) = loader.load(URL).await.unwrap();
        assert_eq!(tier, Tier::Memory);
        assert_eq!(loader.source().fetches(), 1);

        assert!(cache.lookup_memory(URL).is_some());
        assert!(wait_for_disk(&cache, URL).await);
    }

    #[tokio::test]
    async fn test_remote_load_fills_disk_without_blocking_next_load() {
        let dir = tempdir().unwrap();
        let cache = CacheManager::new(dir.path(), CacheConfig::default());
        let other = "https://via.placeholder.com/150/771796";
        let mut source = FakeSource::with(URL, png());
        source.images.insert(other.to_string(), png());
        let mut loader = ImageLoader::spawn(ThumbnailLoader::new(cache.clone(), source));

        loader.load(URL);
        loader.load(other);
        for _ in 0..2 {
            assert!(matches!(
                loader.next_result().await,
                Some(LoadResult::Success { tier: Tier::Remote, .. })
            ));
        }

        assert!(wait_for_disk(&cache, URL).await);
        assert!(wait_for_disk(&cache, other).await);
        assert_eq!(cache.disk().usage().files, 2);
    }

    #[tokio::test]
    async fn test_disk_hit_is_promoted() {
        let dir = tempdir().unwrap();
        CacheManager::new(dir.path(), CacheConfig::default()).store_to_disk(URL, &thumbnail());

        let cache = CacheManager::new(dir.path(), CacheConfig::default());
        let loader = ThumbnailLoader::new(cache.clone(), FakeSource::default());

        let (image, tier) = loader.load(URL).await.unwrap();
        assert_eq!(tier, Tier::Disk);
        assert_eq!(*image, thumbnail());
        assert_eq!(loader.source().fetches(), 0);
        assert!(cache.lookup_memory(URL).is_some());
    }

    #[tokio::test]
    async fn test_transport_error_propagates_and_caches_nothing() {
        let dir = tempdir().unwrap();
        let cache = CacheManager::new(dir.path(), CacheConfig::default());
        let loader = ThumbnailLoader::new(cache.clone(), FakeSource::default());

        let err = loader.load(URL).await.unwrap_err();
        assert_eq!(err, TransportError::InvalidResponse);
        assert!(cache.lookup_memory(URL).is_none());
        assert_eq!(cache.disk().usage().files, 0);
    }

    #[tokio::test]
    async fn test_undecodable_download_is_invalid_data() {
        let dir = tempdir().unwrap();
        let cache = CacheManager::new(dir.path(), CacheConfig::default());
        let loader = ThumbnailLoader::new(cache.clone(), FakeSource::with(URL, b"<html>".to_vec()));

        assert_eq!(loader.load(URL).await.unwrap_err(), TransportError::InvalidData);
        assert!(cache.lookup_memory(URL).is_none());
        assert_eq!(cache.disk().usage().files, 0);
    }

    #[tokio::test]
    async fn test_background_loader_reports_results() {
        let dir = tempdir().unwrap();
        let cache = CacheManager::new(dir.path(), CacheConfig::default());
        let mut loader =
            ImageLoader::spawn(ThumbnailLoader::new(cache.clone(), FakeSource::with(URL, png())));

        loader.load(URL);
        loader.load("https://via.placeholder.com/150/missing");

        match loader.next_result().await.unwrap() {
            LoadResult::Success { url, tier, .. } => {
                assert_eq!(url, URL);
                assert_eq!(tier, Tier::Remote);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        match loader.next_result().await.unwrap() {
            LoadResult::Failed { error, .. } => assert_eq!(error, TransportError::InvalidResponse),
            other => panic!("unexpected result: {other:?}"),
        }

        assert!(wait_for_disk(&cache, URL).await);
        loader.shutdown();
        assert!(loader.next_result().await.is_none());
        assert!(loader.poll_results().is_empty());
    }
}
