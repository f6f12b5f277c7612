//! Remote data gateway: the single entry point for restaurant and review data.
//!
//! Reads go network first and fall back to the persistent store; writes that
//! fail are recorded in the pending queue for replay once connectivity returns.

mod filters;
mod layer;

pub use filters::Selection;

use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{DataError, Result};
use crate::model::{Restaurant, Review};
use crate::queue::{PendingQueue, QueueError};
use crate::remote::RemoteService;
use crate::store::{Fetched, Index, StoreHandle};

/// What to do with a review the service did not accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflineMode {
  /// Keep it in the pending queue for a later replay
  Queue,
  /// Give up on it
  Drop,
}

/// Outcome of a review submission
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
  pub review: Review,
  pub status: SubmissionStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStatus {
  /// Accepted by the service; `review` is the server's record
  Confirmed,
  /// Queued locally, to be retried when back online
  Pending,
  /// Not accepted and not queued
  Dropped,
}

impl Submission {
  pub fn is_pending(&self) -> bool {
    self.status == SubmissionStatus::Pending
  }
}

/// Result of a favorite toggle
#[derive(Debug, Clone, PartialEq)]
pub struct FavoriteToggle {
  /// The restaurant with its flag flipped
  pub restaurant: Restaurant,
  /// Whether the service acknowledged the change
  pub synced: bool,
}

/// Data access for restaurants and reviews.
pub struct Gateway<R> {
  remote: Arc<R>,
  store: StoreHandle,
  queue: PendingQueue,
}

impl<R> Clone for Gateway<R> {
  fn clone(&self) -> Self {
    Self {
      remote: Arc::clone(&self.remote),
      store: self.store.clone(),
      queue: self.queue.clone(),
    }
  }
}

impl<R: RemoteService> Gateway<R> {
  pub fn new(remote: R, store: StoreHandle, queue: PendingQueue) -> Self {
    Self {
      remote: Arc::new(remote),
      store,
      queue,
    }
  }

  pub fn remote(&self) -> &R {
    &self.remote
  }

  pub(crate) fn queue(&self) -> &PendingQueue {
    &self.queue
  }

  // ==========================================================================
  // Collection reads
  // ==========================================================================

  /// All restaurants, refreshed from the network when possible.
  pub async fn fetch_restaurants(&self) -> Result<Fetched<Vec<Restaurant>>> {
    layer::read_through(&self.store, self.remote.get_restaurants(), |db| {
      db.get_all::<Restaurant>()
    })
    .await
  }

  /// Reviews of one restaurant, refreshed from the network when possible.
  pub async fn fetch_reviews(&self, restaurant_id: u64) -> Result<Fetched<Vec<Review>>> {
    layer::read_through(&self.store, self.remote.get_reviews(restaurant_id), |db| {
      db.get_by_index::<Review>(Index::Restaurant, restaurant_id)
    })
    .await
  }

  // ==========================================================================
  // Derived restaurant reads
  // ==========================================================================

  pub async fn fetch_by_id(&self, id: u64) -> Result<Fetched<Restaurant>> {
    layer::read_one(&self.store, self.remote.get_restaurants(), id, "restaurant").await
  }

  pub async fn fetch_by_cuisine(&self, cuisine: &str) -> Result<Fetched<Vec<Restaurant>>> {
    self
      .fetch_by_cuisine_and_neighborhood(&Selection::Only(cuisine.to_string()), &Selection::All)
      .await
  }

  pub async fn fetch_by_neighborhood(
    &self,
    neighborhood: &str,
  ) -> Result<Fetched<Vec<Restaurant>>> {
    self
      .fetch_by_cuisine_and_neighborhood(
        &Selection::All,
        &Selection::Only(neighborhood.to_string()),
      )
      .await
  }

  pub async fn fetch_by_cuisine_and_neighborhood(
    &self,
    cuisine: &Selection,
    neighborhood: &Selection,
  ) -> Result<Fetched<Vec<Restaurant>>> {
    let fetched = self.fetch_restaurants().await?;
    Ok(fetched.map(|all| filters::by_selection(all, cuisine, neighborhood)))
  }

  /// Distinct neighborhoods in first-seen order.
  pub async fn fetch_neighborhoods(&self) -> Result<Fetched<Vec<String>>> {
    let fetched = self.fetch_restaurants().await?;
    Ok(fetched.map(|all| filters::unique_in_order(all.iter().map(|r| r.neighborhood.as_str()))))
  }

  /// Distinct cuisines in first-seen order.
  pub async fn fetch_cuisines(&self) -> Result<Fetched<Vec<String>>> {
    let fetched = self.fetch_restaurants().await?;
    Ok(fetched.map(|all| filters::unique_in_order(all.iter().map(|r| r.cuisine_type.as_str()))))
  }

  // ==========================================================================
  // Writes
  // ==========================================================================

  /// Flip the favorite flag.
  ///
  /// The flipped record is committed locally before the service is told, and
  /// stays committed whatever the service answers.
  pub async fn toggle_favorite(&self, mut restaurant: Restaurant) -> FavoriteToggle {
    let is_favorite = restaurant.toggle_favorite();
    layer::persist(&self.store, std::slice::from_ref(&restaurant));

    let synced = match self.remote.set_favorite(restaurant.id, is_favorite).await {
      Ok(()) => true,
      Err(e) => {
        warn!(restaurant = restaurant.id, error = %e, "favorite not synced, kept locally");
        false
      }
    };

    FavoriteToggle { restaurant, synced }
  }

  /// Submit a new review.
  ///
  /// On success the server's record is stored and returned. On any failure the
  /// review comes back unchanged, queued for replay or dropped per `mode`.
  pub async fn submit_review(&self, review: Review, mode: OfflineMode) -> Result<Submission> {
    let outcome = match self.remote.create_review(&review).await {
      Ok(saved) if saved.id.is_some() => Ok(saved),
      Ok(_) => Err(DataError::malformed(
        "POST /reviews/",
        "created review has no id",
      )),
      Err(e) => Err(e),
    };

    let error = match outcome {
      Ok(saved) => {
        layer::persist(&self.store, std::slice::from_ref(&saved));
        return Ok(Submission {
          review: saved,
          status: SubmissionStatus::Confirmed,
        });
      }
      Err(e) => e,
    };

    match mode {
      OfflineMode::Queue => {
        self.queue.enqueue(&review)?;
        info!(restaurant = review.restaurant_id, error = %error, "review queued for later submission");
        Ok(Submission {
          review,
          status: SubmissionStatus::Pending,
        })
      }
      OfflineMode::Drop => {
        warn!(restaurant = review.restaurant_id, error = %error, "review dropped");
        Ok(Submission {
          review,
          status: SubmissionStatus::Dropped,
        })
      }
    }
  }

  /// Reviews for a restaurant still waiting in the pending queue.
  pub fn pending_reviews(&self, restaurant_id: u64) -> std::result::Result<Vec<Review>, QueueError> {
    Ok(
      self
        .queue
        .list()?
        .into_iter()
        .filter(|r| r.restaurant_id == restaurant_id)
        .collect(),
    )
  }
}
