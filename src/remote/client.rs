use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::error::{DataError, Result};
use crate::model::{Restaurant, Review};

use super::RemoteService;

/// Body of the favorite partial update
#[derive(Debug, Serialize)]
struct FavoriteUpdate {
  is_favorite: bool,
}

/// HTTP client for the restaurant data service
#[derive(Clone)]
pub struct HttpRemote {
  client: Client,
  base_url: String,
}

impl HttpRemote {
  pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
    let client = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| DataError::transport(base_url, e))?;

    Ok(Self {
      client,
      base_url: base_url.trim_end_matches('/').to_string(),
    })
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url, path)
  }

  /// Map a sent request to a success response or a transport error.
  fn check(url: &str, result: reqwest::Result<Response>) -> Result<Response> {
    let response = result.map_err(|e| DataError::transport(url, e))?;
    response
      .error_for_status()
      .map_err(|e| DataError::transport(url, e))
  }

  /// Read the body and parse it; body read failures count as transport errors.
  async fn parse<T: DeserializeOwned>(url: &str, response: Response) -> Result<T> {
    let bytes = response
      .bytes()
      .await
      .map_err(|e| DataError::transport(url, e))?;
    serde_json::from_slice(&bytes).map_err(|e| DataError::malformed(url, e))
  }
}

impl RemoteService for HttpRemote {
  async fn get_restaurants(&self) -> Result<Vec<Restaurant>> {
    let url = self.url("/restaurants/");
    let response = Self::check(&url, self.client.get(&url).send().await)?;
    Self::parse(&url, response).await
  }

  async fn get_reviews(&self, restaurant_id: u64) -> Result<Vec<Review>> {
    let url = self.url("/reviews/");
    let response = Self::check(
      &url,
      self
        .client
        .get(&url)
        .query(&[("restaurant_id", restaurant_id)])
        .send()
        .await,
    )?;
    Self::parse(&url, response).await
  }

  async fn set_favorite(&self, restaurant_id: u64, is_favorite: bool) -> Result<()> {
    let url = self.url(&format!("/restaurants/{}", restaurant_id));
    Self::check(
      &url,
      self
        .client
        .put(&url)
        .json(&FavoriteUpdate { is_favorite })
        .send()
        .await,
    )?;
    Ok(())
  }

  async fn create_review(&self, review: &Review) -> Result<Review> {
    let url = self.url("/reviews/");
    let body = Review {
      id: None,
      ..review.clone()
    };
    let response = Self::check(&url, self.client.post(&url).json(&body).send().await)?;
    Self::parse(&url, response).await
  }

  async fn is_reachable(&self) -> bool {
    // Any HTTP answer, even an error status, means the service is up
    match self.client.head(&self.url("/")).send().await {
      Ok(_) => true,
      Err(e) => {
        debug!(error = %e, "remote service unreachable");
        false
      }
    }
  }
}
