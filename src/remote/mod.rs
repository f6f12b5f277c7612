//! Access to the remote restaurant data service.

mod client;

pub use client::HttpRemote;

use crate::error::Result;
use crate::model::{Restaurant, Review};

/// Operations the remote data service offers.
///
/// `HttpRemote` talks to the real service; tests substitute an in-memory fake.
#[allow(async_fn_in_trait)]
pub trait RemoteService {
  /// `GET /restaurants/`
  async fn get_restaurants(&self) -> Result<Vec<Restaurant>>;

  /// `GET /reviews/?restaurant_id={id}`
  async fn get_reviews(&self, restaurant_id: u64) -> Result<Vec<Review>>;

  /// `PUT /restaurants/{id}` with `{"is_favorite": bool}`
  async fn set_favorite(&self, restaurant_id: u64, is_favorite: bool) -> Result<()>;

  /// `POST /reviews/`, returning the created review with its id.
  async fn create_review(&self, review: &Review) -> Result<Review>;

  /// Whether the service answers at all.
  async fn is_reachable(&self) -> bool;
}
