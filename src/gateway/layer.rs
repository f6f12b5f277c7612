//! Refresh-then-fallback read policy shared by every collection read.

use std::future::Future;
use tracing::{debug, warn};

use crate::error::{DataError, Result};
use crate::store::{Fetched, Record, RecordStore, StoreError, StoreHandle};

/// Read a collection network first.
///
/// 1. Try the network; on success upsert the result into the store and return it
/// 2. On failure read the store through `fallback`
/// 3. If the store is unavailable or has nothing, report the read as unavailable
///
/// A network answer always wins over whatever the store holds.
pub(super) async fn read_through<T, Fut, L>(
  store: &StoreHandle,
  network: Fut,
  fallback: L,
) -> Result<Fetched<Vec<T>>>
where
  T: Record,
  Fut: Future<Output = Result<Vec<T>>>,
  L: FnOnce(&RecordStore) -> std::result::Result<Vec<T>, StoreError>,
{
  let collection = T::collection().name();

  let cause = match network.await {
    Ok(data) => {
      persist(store, &data);
      return Ok(Fetched::from_network(data));
    }
    Err(e) => e,
  };

  warn!(collection, error = %cause, "network read failed, falling back to local store");

  let cached = match store.get() {
    Ok(db) => fallback(db.as_ref()).unwrap_or_else(|e| {
      warn!(collection, error = %e, "local store read failed");
      Vec::new()
    }),
    Err(e) => {
      debug!(collection, error = %e, "nothing to fall back on");
      Vec::new()
    }
  };

  if cached.is_empty() {
    return Err(DataError::Unavailable {
      collection,
      cause: cause.to_string(),
    });
  }

  debug!(collection, count = cached.len(), "serving records from local store");
  Ok(Fetched::offline(cached))
}

/// Read one record network first.
///
/// The network answers with the whole collection, which is persisted like any
/// other read. Offline, the record is looked up by key; it is `NotFound` only
/// when the store holds other records of the collection.
pub(super) async fn read_one<T, Fut>(
  store: &StoreHandle,
  network: Fut,
  key: u64,
  entity: &'static str,
) -> Result<Fetched<T>>
where
  T: Record,
  Fut: Future<Output = Result<Vec<T>>>,
{
  let collection = T::collection().name();
  let not_found = || DataError::NotFound {
    entity,
    key: key.to_string(),
  };

  let cause = match network.await {
    Ok(data) => {
      persist(store, &data);
      return data
        .into_iter()
        .find(|record| record.primary_key() == Some(key))
        .map(Fetched::from_network)
        .ok_or_else(not_found);
    }
    Err(e) => e,
  };

  warn!(collection, key, error = %cause, "network read failed, looking up local store");

  let unavailable = |cause: DataError| DataError::Unavailable {
    collection,
    cause: cause.to_string(),
  };
  let db = match store.get() {
    Ok(db) => db,
    Err(e) => {
      debug!(collection, error = %e, "nothing to fall back on");
      return Err(unavailable(cause));
    }
  };

  match db.get_one::<T>(key) {
    Ok(Some(record)) => Ok(Fetched::offline(record)),
    Ok(None) => match db.get_all::<T>() {
      Ok(all) if !all.is_empty() => Err(not_found()),
      _ => Err(unavailable(cause)),
    },
    Err(e) => {
      warn!(collection, error = %e, "local store read failed");
      Err(unavailable(cause))
    }
  }
}

/// Best-effort upsert; a store that can't be opened or written is only logged.
pub(super) fn persist<T: Record>(store: &StoreHandle, records: &[T]) {
  let collection = T::collection().name();
  match store.get() {
    Ok(db) => {
      if let Err(e) = db.upsert_all(records) {
        warn!(collection, error = %e, "failed to persist records");
      }
    }
    Err(e) => debug!(collection, error = %e, "records not persisted"),
  }
}
