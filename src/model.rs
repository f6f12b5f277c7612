//! Restaurant and review records as served by the remote data service.
//!
//! The service is loose about scalar types (ids and flags sometimes arrive as
//! strings), so the numeric and boolean fields accept either form.

use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::store::{Collection, Index, Record};

/// Geographic coordinate of a restaurant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
  pub lat: f64,
  pub lng: f64,
}

/// A restaurant record.
///
/// Everything but `is_favorite` is treated as immutable; fields the service
/// sends that are not modelled here are kept in `details` and written back
/// unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
  #[serde(deserialize_with = "lenient")]
  pub id: u64,
  pub name: String,
  #[serde(default)]
  pub neighborhood: String,
  #[serde(default)]
  pub cuisine_type: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub latlng: Option<LatLng>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub photograph: Option<String>,
  #[serde(default, deserialize_with = "lenient_flag")]
  pub is_favorite: bool,
  #[serde(flatten)]
  pub details: Map<String, Value>,
}

impl Restaurant {
  /// Flip the favorite flag in place and return the new value.
  pub fn toggle_favorite(&mut self) -> bool {
    self.is_favorite = !self.is_favorite;
    self.is_favorite
  }
}

/// A review of a restaurant.
///
/// `id` is `None` until the service has accepted the review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
  #[serde(
    default,
    deserialize_with = "lenient_opt",
    skip_serializing_if = "Option::is_none"
  )]
  pub id: Option<u64>,
  #[serde(deserialize_with = "lenient")]
  pub restaurant_id: u64,
  pub name: String,
  #[serde(deserialize_with = "lenient")]
  pub rating: u8,
  #[serde(default)]
  pub comments: String,
  /// Creation time in epoch milliseconds
  #[serde(
    rename = "createdAt",
    default,
    deserialize_with = "lenient_opt",
    skip_serializing_if = "Option::is_none"
  )]
  pub created_at: Option<i64>,
  #[serde(
    rename = "updatedAt",
    default,
    deserialize_with = "lenient_opt",
    skip_serializing_if = "Option::is_none"
  )]
  pub updated_at: Option<i64>,
}

impl Review {
  /// A new, not yet submitted review stamped with the current time.
  pub fn new(
    restaurant_id: u64,
    name: impl Into<String>,
    rating: u8,
    comments: impl Into<String>,
  ) -> Self {
    Self {
      id: None,
      restaurant_id,
      name: name.into(),
      rating,
      comments: comments.into(),
      created_at: Some(Utc::now().timestamp_millis()),
      updated_at: None,
    }
  }

  pub fn created(&self) -> Option<DateTime<Utc>> {
    self
      .created_at
      .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
  }
}

// ============================================================================
// Record implementations
// ============================================================================

impl Record for Restaurant {
  fn collection() -> Collection {
    Collection::Restaurants
  }

  fn primary_key(&self) -> Option<u64> {
    Some(self.id)
  }

  fn index_value(&self, _index: Index) -> Option<u64> {
    None
  }
}

impl Record for Review {
  fn collection() -> Collection {
    Collection::Reviews
  }

  fn primary_key(&self) -> Option<u64> {
    self.id
  }

  fn index_value(&self, index: Index) -> Option<u64> {
    match index {
      Index::Restaurant => Some(self.restaurant_id),
    }
  }
}

// ============================================================================
// Lenient scalar deserialization
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose<T> {
  Value(T),
  Text(String),
}

impl<T> Loose<T>
where
  T: FromStr,
  T::Err: Display,
{
  fn resolve<E: serde::de::Error>(self) -> Result<T, E> {
    match self {
      Loose::Value(v) => Ok(v),
      Loose::Text(s) => s.trim().parse().map_err(E::custom),
    }
  }
}

/// Accept either the native JSON type or its string rendering.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de> + FromStr,
  T::Err: Display,
{
  Loose::<T>::deserialize(deserializer)?.resolve()
}

fn lenient_opt<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de> + FromStr,
  T::Err: Display,
{
  match Option::<Loose<T>>::deserialize(deserializer)? {
    Some(Loose::Text(s)) if s.trim().is_empty() => Ok(None),
    Some(loose) => loose.resolve().map(Some),
    None => Ok(None),
  }
}

/// A flag that may be a bool, a string, null or missing; null and blank read as false.
fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(lenient_opt::<D, bool>(deserializer)?.unwrap_or(false))
}
