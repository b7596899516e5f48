//! Remote data source: the photo feed and the image host.

mod http;

pub use http::{DEFAULT_BASE_URL, HttpSource};

use std::future::Future;

use crate::error::TransportError;
use crate::models::Album;

/// What the cache layer needs from the network
pub trait RemoteSource: Send + Sync {
    /// Fetch the list of album photos
    fn fetch_list(&self) -> impl Future<Output = Result<Vec<Album>, TransportError>> + Send;

    /// Fetch the raw (encoded) bytes of the image at `url`
    fn fetch_image_bytes(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;
}
