//! Album photo record from the feed

use serde::{Deserialize, Serialize};

/// One photo entry of the `/photos` feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    /// Album this photo belongs to
    pub album_id: u64,
    /// Photo ID
    pub id: u64,
    /// Caption
    pub title: String,
    /// Full-size image URL
    pub url: String,
    /// Thumbnail URL (the cache key used by the list view)
    pub thumbnail_url: String,
}
