//! Data models for thumbcache

mod album;

pub use album::Album;
