//! Error types for the data layer.
//!
//! Library modules return these typed errors; the binary edge wraps them in
//! `color_eyre` reports.

use thiserror::Error;

use crate::queue::QueueError;

/// Errors surfaced by the remote data gateway.
#[derive(Error, Debug)]
pub enum DataError {
  /// Network unreachable or a non-2xx response.
  #[error("request to {url} failed: {reason}")]
  Transport { url: String, reason: String },

  /// The persistent record store could not be opened.
  #[error("persistent store unavailable")]
  StoreUnavailable,

  /// The entity is absent from an otherwise successful result set.
  #[error("{entity} {key} does not exist")]
  NotFound { entity: &'static str, key: String },

  /// The payload failed to parse or lacked required fields.
  #[error("malformed response from {url}: {reason}")]
  MalformedResponse { url: String, reason: String },

  /// The network read failed and the store had nothing to fall back on.
  #[error("no {collection} available: network failed ({cause}) and nothing is cached")]
  Unavailable {
    collection: &'static str,
    cause: String,
  },

  /// A failed submission could not be recorded for later replay.
  #[error("could not queue offline review: {0}")]
  Queue(#[from] QueueError),
}

impl DataError {
  pub fn transport(url: impl Into<String>, reason: impl ToString) -> Self {
    Self::Transport {
      url: url.into(),
      reason: reason.to_string(),
    }
  }

  pub fn malformed(url: impl Into<String>, reason: impl ToString) -> Self {
    Self::MalformedResponse {
      url: url.into(),
      reason: reason.to_string(),
    }
  }
}

pub type Result<T> = std::result::Result<T, DataError>;
