//! Core traits and types for the record store.

use serde::{de::DeserializeOwned, Serialize};

/// The named collections held by the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
  Restaurants,
  Reviews,
}

impl Collection {
  /// Collection (and table) name
  pub fn name(self) -> &'static str {
    match self {
      Self::Restaurants => "restaurants",
      Self::Reviews => "reviews",
    }
  }

  /// Secondary indexes defined on this collection.
  pub fn indexes(self) -> &'static [Index] {
    match self {
      Self::Restaurants => &[],
      Self::Reviews => &[Index::Restaurant],
    }
  }
}

/// Non-unique secondary indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Index {
  /// Reviews by parent restaurant
  Restaurant,
}

impl Index {
  pub fn name(self) -> &'static str {
    match self {
      Self::Restaurant => "restaurant",
    }
  }

  /// Column backing the index
  pub(crate) fn column(self) -> &'static str {
    match self {
      Self::Restaurant => "restaurant_id",
    }
  }
}

/// Trait for records that can be persisted.
///
/// Implementors name their collection, expose the primary key and provide a
/// value for each index their collection declares.
pub trait Record: Clone + Send + Sync + Serialize + DeserializeOwned {
  fn collection() -> Collection;

  /// Primary key, `None` if the record has not been assigned one yet.
  fn primary_key(&self) -> Option<u64>;

  /// Value of the given secondary index for this record.
  fn index_value(&self, index: Index) -> Option<u64>;
}

/// Result of a gateway read, including where the data came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
  pub data: T,
  pub source: Source,
}

impl<T> Fetched<T> {
  /// Fresh data from the network.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: Source::Network,
    }
  }

  /// Data read back from the record store while offline.
  pub fn offline(data: T) -> Self {
    Self {
      data,
      source: Source::Store,
    }
  }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
    Fetched {
      data: f(self.data),
      source: self.source,
    }
  }

  pub fn is_offline(&self) -> bool {
    self.source == Source::Store
  }
}

/// Indicates where fetched data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
  /// Fresh data from the remote service
  Network,
  /// Network unavailable, served from the persistent store
  Store,
}
