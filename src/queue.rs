//! Durable queue of reviews that could not be submitted.
//!
//! Backed by a single named slot: one JSON file holding the serialized list,
//! kept apart from the record store. Writes go through a temp file and a
//! rename so a crash never leaves a half-written list behind. A slot that no
//! longer parses is moved aside to `pending-reviews.corrupt` and the queue
//! starts over empty.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::Review;

/// Slot name holding the pending reviews.
pub const PENDING_KEY: &str = "pending-reviews";

const CORRUPT_EXTENSION: &str = "corrupt";

#[derive(Error, Debug)]
pub enum QueueError {
  #[error("IO error on pending queue {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("pending queue {path} is corrupt: {source}")]
  Corrupt {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

/// Reviews waiting to be replayed against the remote service.
#[derive(Clone)]
pub struct PendingQueue {
  path: PathBuf,
  // Serializes read-modify-write cycles within the process
  lock: Arc<Mutex<()>>,
}

impl PendingQueue {
  /// Queue stored in `dir` under the fixed slot name.
  pub fn new(dir: impl AsRef<Path>) -> Self {
    Self {
      path: dir.as_ref().join(format!("{}.json", PENDING_KEY)),
      lock: Arc::new(Mutex::new(())),
    }
  }

  /// Append a review.
  pub fn enqueue(&self, review: &Review) -> Result<(), QueueError> {
    let _guard = self.guard();

    let mut reviews = self.read_recovering()?;
    reviews.push(review.clone());
    self.write(&reviews)?;

    debug!(pending = reviews.len(), "queued offline review");
    Ok(())
  }

  /// Take every queued review, leaving the queue empty.
  ///
  /// The queue is cleared as soon as it has been read; nothing survives a
  /// drain even if the caller later fails to process the entries.
  pub fn drain(&self) -> Result<Vec<Review>, QueueError> {
    let _guard = self.guard();

    let reviews = self.read_recovering()?;
    match fs::remove_file(&self.path) {
      Ok(()) => {}
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(source) => {
        return Err(QueueError::Io {
          path: self.path.clone(),
          source,
        })
      }
    }

    Ok(reviews)
  }

  /// Queued reviews without removing them.
  pub fn list(&self) -> Result<Vec<Review>, QueueError> {
    let _guard = self.guard();
    self.read_recovering()
  }

  fn guard(&self) -> MutexGuard<'_, ()> {
    self.lock.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Read the slot, setting an unreadable one aside instead of failing on it.
  fn read_recovering(&self) -> Result<Vec<Review>, QueueError> {
    match self.read() {
      Err(QueueError::Corrupt { path, source }) => {
        let aside = path.with_extension(CORRUPT_EXTENSION);
        warn!(
          path = %path.display(),
          moved_to = %aside.display(),
          error = %source,
          "pending queue unreadable, starting over"
        );
        fs::rename(&path, &aside).map_err(|source| QueueError::Io { path, source })?;
        Ok(Vec::new())
      }
      other => other,
    }
  }

  fn read(&self) -> Result<Vec<Review>, QueueError> {
    let contents = match fs::read_to_string(&self.path) {
      Ok(contents) => contents,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(source) => {
        return Err(QueueError::Io {
          path: self.path.clone(),
          source,
        })
      }
    };

    serde_json::from_str(&contents).map_err(|source| QueueError::Corrupt {
      path: self.path.clone(),
      source,
    })
  }

  fn write(&self, reviews: &[Review]) -> Result<(), QueueError> {
    let io_err = |source| QueueError::Io {
      path: self.path.clone(),
      source,
    };

    if let Some(parent) = self.path.parent() {
      fs::create_dir_all(parent).map_err(io_err)?;
    }

    let json = serde_json::to_string(reviews).map_err(|source| QueueError::Corrupt {
      path: self.path.clone(),
      source,
    })?;

    let temp_path = self.path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path).map_err(io_err)?;
    file.write_all(json.as_bytes()).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    fs::rename(&temp_path, &self.path).map_err(io_err)?;

    Ok(())
  }
}
