//! Versioned cache of the application shell's static assets.
//!
//! Independent from the record store and the data model:
//! - `install` fills the current generation from a fixed manifest, all or nothing
//! - `activate` deletes every older generation sharing the cache prefix
//! - `intercept` answers same-origin requests cache first, populating on miss,
//!   and leaves data service traffic alone

mod fetch;
mod manager;
mod storage;

pub use fetch::{AssetFetcher, FetchError, HttpFetcher};
pub use manager::{AssetCacheConfig, AssetCacheManager, AssetSource, Interception};
pub use storage::AssetStore;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetError {
  #[error("asset cache database error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("failed to create asset cache directory: {0}")]
  Io(#[from] std::io::Error),

  #[error("failed to encode cached headers: {0}")]
  Headers(#[from] serde_json::Error),

  #[error(transparent)]
  Fetch(#[from] FetchError),

  #[error("{url} answered with status {status}")]
  BadStatus { url: String, status: u16 },

  #[error("invalid asset path '{path}': {source}")]
  InvalidPath {
    path: String,
    #[source]
    source: url::ParseError,
  },

  #[error("cache generation {0} has not been installed")]
  NotInstalled(String),

  #[error("asset cache lock poisoned")]
  Poisoned,
}
