//! Shared, lazily opened handle to the record store.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

use super::sqlite::RecordStore;
use crate::error::{DataError, Result};

/// Owned handle to the record store, cheap to clone and share.
///
/// The store is opened on first use. If opening fails the handle reports
/// `DataError::StoreUnavailable` and tries again on the next access; callers
/// degrade to network-only operation.
#[derive(Clone)]
pub struct StoreHandle {
  inner: Arc<HandleInner>,
}

struct HandleInner {
  path: Option<PathBuf>,
  store: Mutex<Option<Arc<RecordStore>>>,
}

impl StoreHandle {
  /// Handle for a store file at `path`; nothing is opened yet.
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self::with_path(Some(path.into()))
  }

  /// Handle that never persists anything.
  #[cfg(test)]
  pub fn disabled() -> Self {
    Self::with_path(None)
  }

  fn with_path(path: Option<PathBuf>) -> Self {
    Self {
      inner: Arc::new(HandleInner {
        path,
        store: Mutex::new(None),
      }),
    }
  }

  /// The open store, opening it first if needed.
  pub fn get(&self) -> Result<Arc<RecordStore>> {
    let path = self.inner.path.as_ref().ok_or(DataError::StoreUnavailable)?;
    let mut slot = self
      .inner
      .store
      .lock()
      .unwrap_or_else(PoisonError::into_inner);

    if let Some(store) = slot.as_ref() {
      return Ok(Arc::clone(store));
    }

    match RecordStore::open(path) {
      Ok(store) => {
        debug!(path = %path.display(), "opened record store");
        let store = Arc::new(store);
        *slot = Some(Arc::clone(&store));
        Ok(store)
      }
      Err(e) => {
        warn!(path = %path.display(), error = %e, "record store unavailable");
        Err(DataError::StoreUnavailable)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn test_open_is_lazy_and_shared() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("records.db");
    let handle = StoreHandle::new(&path);
    assert!(!path.exists());

    let first = handle.get().unwrap();
    let second = handle.clone().get().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(path.exists());
  }

  #[test]
  fn test_unopenable_store_is_unavailable() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"file").unwrap();

    let handle = StoreHandle::new(blocker.join("records.db"));
    assert!(matches!(handle.get(), Err(DataError::StoreUnavailable)));
    assert!(matches!(handle.get(), Err(DataError::StoreUnavailable)));
  }

  #[test]
  fn test_failed_open_is_retried_on_next_access() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("data");
    std::fs::write(&blocker, b"file").unwrap();

    let handle = StoreHandle::new(blocker.join("records.db"));
    assert!(handle.get().is_err());

    std::fs::remove_file(&blocker).unwrap();
    let store = handle.get().unwrap();
    assert!(blocker.join("records.db").exists());
    assert!(Arc::ptr_eq(&store, &handle.clone().get().unwrap()));
  }

  #[test]
  fn test_disabled_handle_never_opens() {
    assert!(matches!(
      StoreHandle::disabled().get(),
      Err(DataError::StoreUnavailable)
    ));
  }
}
