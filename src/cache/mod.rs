//! Inkpost cache system.
//!
//! A key/value cache with a secondary tag index. Read paths store their
//! results under the tags they depend on; content mutations invalidate those
//! tags through the coordinator.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! default_ttl_seconds = 300
//! tag_ttl_seconds = 3600
//! capacity = 10000
//! ```

pub mod backend;
mod config;
mod index;
pub mod keys;
pub(crate) mod lock;

pub use backend::{CacheBackend, CacheError, MemoryCacheBackend};
pub use config::CacheConfig;
pub use index::CacheIndex;
pub use keys::{CacheTag, article_key};
