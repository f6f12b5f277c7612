//! Requests, responses and the network side of the asset cache.

use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// An outgoing asset request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
  pub method: String,
  pub url: Url,
}

impl AssetRequest {
  pub fn get(url: Url) -> Self {
    Self {
      method: "GET".to_string(),
      url,
    }
  }

  pub fn is_get(&self) -> bool {
    self.method.eq_ignore_ascii_case("GET")
  }

  /// Stable key identifying this request in the cache.
  pub fn cache_key(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.method.to_ascii_uppercase().as_bytes());
    hasher.update(b" ");
    hasher.update(self.url.as_str().as_bytes());
    hex::encode(hasher.finalize())
  }
}

/// A complete, buffered response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetResponse {
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl AssetResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Stand-in answer when neither the cache nor the network can serve a request.
  pub fn gateway_timeout(reason: &str) -> Self {
    Self {
      status: 504,
      headers: vec![("content-type".to_string(), "text/plain".to_string())],
      body: format!("offline: {}", reason).into_bytes(),
    }
  }
}

#[derive(Error, Debug)]
#[error("fetch of {url} failed: {reason}")]
pub struct FetchError {
  pub url: String,
  pub reason: String,
}

impl FetchError {
  pub fn new(url: &Url, reason: impl ToString) -> Self {
    Self {
      url: url.to_string(),
      reason: reason.to_string(),
    }
  }
}

/// Network access for asset requests.
#[allow(async_fn_in_trait)]
pub trait AssetFetcher {
  async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse, FetchError>;
}

/// Fetches assets over HTTP.
#[derive(Clone)]
pub struct HttpFetcher {
  client: Client,
}

impl HttpFetcher {
  pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self { client })
  }
}

impl AssetFetcher for HttpFetcher {
  async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse, FetchError> {
    let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
      .map_err(|e| FetchError::new(&request.url, e))?;

    let response = self
      .client
      .request(method, request.url.clone())
      .send()
      .await
      .map_err(|e| FetchError::new(&request.url, e))?;

    let status = response.status().as_u16();
    let headers = response
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.as_str().to_string(), v.to_string()))
      })
      .collect();
    let body = response
      .bytes()
      .await
      .map_err(|e| FetchError::new(&request.url, e))?
      .to_vec();

    Ok(AssetResponse {
      status,
      headers,
      body,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cache_key_depends_on_method_and_url() {
    let url = Url::parse("http://localhost:8000/css/styles.css").unwrap();
    let get = AssetRequest::get(url.clone());
    let lower = AssetRequest {
      method: "get".to_string(),
      url: url.clone(),
    };
    let head = AssetRequest {
      method: "HEAD".to_string(),
      url,
    };

    assert_eq!(get.cache_key(), lower.cache_key());
    assert_ne!(get.cache_key(), head.cache_key());
    assert_eq!(get.cache_key().len(), 64);
  }

  #[test]
  fn test_gateway_timeout_is_not_success() {
    let response = AssetResponse::gateway_timeout("connection refused");
    assert_eq!(response.status, 504);
    assert!(!response.is_success());
  }
}
