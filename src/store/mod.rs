//! Persistent record store for offline reads.
//!
//! This module provides the local side of the offline cache:
//! - Two collections (restaurants, reviews) keyed by primary key
//! - A non-unique secondary index on reviews by restaurant
//! - Lazy, idempotent schema creation on first open
//! - A shared handle that degrades to "no persistence" when the store can't be opened

mod handle;
mod schema;
mod sqlite;
mod traits;

pub use handle::StoreHandle;
pub use sqlite::{RecordStore, StoreError};
pub use traits::{Collection, Fetched, Index, Record};
