//! In-memory stand-ins for the remote service used across unit tests.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{DataError, Result};
use crate::model::{Restaurant, Review};
use crate::remote::RemoteService;

pub fn restaurant(id: u64, name: &str, neighborhood: &str, cuisine: &str) -> Restaurant {
  serde_json::from_value(serde_json::json!({
    "id": id,
    "name": name,
    "neighborhood": neighborhood,
    "cuisine_type": cuisine,
    "photograph": id.to_string(),
    "latlng": { "lat": 40.7, "lng": -73.9 },
  }))
  .unwrap()
}

/// Fake data service with a switchable connection.
pub struct FakeRemote {
  online: AtomicBool,
  malformed: AtomicBool,
  delay: Option<Duration>,
  restaurants: Mutex<Vec<Restaurant>>,
  reviews: Mutex<Vec<Review>>,
  next_review_id: AtomicU64,
  create_attempts: AtomicUsize,
  favorite_calls: Mutex<Vec<(u64, bool)>>,
}

impl FakeRemote {
  fn new(online: bool) -> Self {
    Self {
      online: AtomicBool::new(online),
      malformed: AtomicBool::new(false),
      delay: None,
      restaurants: Mutex::new(Vec::new()),
      reviews: Mutex::new(Vec::new()),
      next_review_id: AtomicU64::new(100),
      create_attempts: AtomicUsize::new(0),
      favorite_calls: Mutex::new(Vec::new()),
    }
  }

  pub fn online() -> Self {
    Self::new(true)
  }

  pub fn offline() -> Self {
    Self::new(false)
  }

  pub fn with_restaurants(self, restaurants: Vec<Restaurant>) -> Self {
    self.set_restaurants(restaurants);
    self
  }

  /// Every call sleeps this long before answering.
  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  pub fn set_online(&self, online: bool) {
    self.online.store(online, Ordering::SeqCst);
  }

  /// Make review creation answer without an id.
  pub fn set_malformed(&self, malformed: bool) {
    self.malformed.store(malformed, Ordering::SeqCst);
  }

  pub fn set_restaurants(&self, restaurants: Vec<Restaurant>) {
    *self.restaurants.lock().unwrap() = restaurants;
  }

  pub fn add_review(&self, review: Review) {
    self.reviews.lock().unwrap().push(review);
  }

  /// Reviews the service has accepted so far
  pub fn reviews(&self) -> Vec<Review> {
    self.reviews.lock().unwrap().clone()
  }

  pub fn create_attempts(&self) -> usize {
    self.create_attempts.load(Ordering::SeqCst)
  }

  pub fn favorite_calls(&self) -> Vec<(u64, bool)> {
    self.favorite_calls.lock().unwrap().clone()
  }

  async fn connect(&self, path: &str) -> Result<()> {
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    if self.online.load(Ordering::SeqCst) {
      Ok(())
    } else {
      Err(DataError::transport(
        format!("fake://service{}", path),
        "connection refused",
      ))
    }
  }
}

impl RemoteService for FakeRemote {
  async fn get_restaurants(&self) -> Result<Vec<Restaurant>> {
    self.connect("/restaurants/").await?;
    Ok(self.restaurants.lock().unwrap().clone())
  }

  async fn get_reviews(&self, restaurant_id: u64) -> Result<Vec<Review>> {
    self.connect("/reviews/").await?;
    Ok(
      self
        .reviews
        .lock()
        .unwrap()
        .iter()
        .filter(|r| r.restaurant_id == restaurant_id)
        .cloned()
        .collect(),
    )
  }

  async fn set_favorite(&self, restaurant_id: u64, is_favorite: bool) -> Result<()> {
    self.connect("/restaurants/").await?;
    self
      .favorite_calls
      .lock()
      .unwrap()
      .push((restaurant_id, is_favorite));
    Ok(())
  }

  async fn create_review(&self, review: &Review) -> Result<Review> {
    self.create_attempts.fetch_add(1, Ordering::SeqCst);
    self.connect("/reviews/").await?;

    if self.malformed.load(Ordering::SeqCst) {
      return Ok(review.clone());
    }

    let saved = Review {
      id: Some(self.next_review_id.fetch_add(1, Ordering::SeqCst)),
      ..review.clone()
    };
    self.reviews.lock().unwrap().push(saved.clone());
    Ok(saved)
  }

  async fn is_reachable(&self) -> bool {
    self.connect("/").await.is_ok()
  }
}
