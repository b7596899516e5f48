//! Common paths for thumbcache data storage
//!
//! - `~/.config/thumbcache/config.toml` - User configuration
//! - `<platform cache dir>/thumbcache/images/` - Cached image files

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Get the config file path (~/.config/thumbcache/config.toml)
pub fn config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("thumbcache").join("config.toml"))
}

/// Get the default image cache directory.
///
/// Not created here; the disk store creates it on first write.
pub fn image_cache_dir() -> Result<PathBuf> {
    let cache = dirs::cache_dir().context("Could not determine cache directory")?;
    Ok(cache.join("thumbcache").join("images"))
}
