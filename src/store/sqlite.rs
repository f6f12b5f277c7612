//! SQLite implementation of the record store.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, warn};

use super::schema::{SCHEMA, SCHEMA_VERSION};
use super::traits::{Collection, Index, Record};

#[derive(Error, Debug)]
pub enum StoreError {
  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("failed to create store directory: {0}")]
  Io(#[from] std::io::Error),

  #[error("failed to serialize {collection} record: {source}")]
  Serialize {
    collection: &'static str,
    #[source]
    source: serde_json::Error,
  },

  #[error("{collection} record has no primary key")]
  MissingKey { collection: &'static str },

  #[error("{collection} record has no value for index '{index}'")]
  MissingIndexValue {
    collection: &'static str,
    index: &'static str,
  },

  #[error("index '{index}' is not defined on {collection}")]
  UnknownIndex {
    collection: &'static str,
    index: &'static str,
  },

  #[error("key {0} does not fit in a sqlite integer")]
  KeyOutOfRange(u64),

  #[error("record store lock poisoned")]
  Poisoned,
}

/// Durable keyed store of restaurants and reviews.
pub struct RecordStore {
  conn: Mutex<Connection>,
}

impl RecordStore {
  /// Open or create the store at `path`, creating the schema on first open.
  pub fn open(path: &Path) -> Result<Self, StoreError> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.ensure_schema()?;

    Ok(store)
  }

  /// Create the schema once; later opens see the stored version and skip it.
  fn ensure_schema(&self) -> Result<(), StoreError> {
    let conn = self.lock()?;

    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version >= SCHEMA_VERSION {
      return Ok(());
    }

    debug!(from = version, to = SCHEMA_VERSION, "creating record store schema");
    conn.execute_batch(SCHEMA)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

    Ok(())
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
    self.conn.lock().map_err(|_| StoreError::Poisoned)
  }

  /// Insert or replace every record by primary key in one transaction.
  ///
  /// Either all records are written or none are.
  pub fn upsert_all<T: Record>(&self, records: &[T]) -> Result<usize, StoreError> {
    let collection = T::collection();

    // Encode up front so a bad record never leaves a partial write behind
    let rows = records
      .iter()
      .map(encode_row)
      .collect::<Result<Vec<_>, _>>()?;

    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    {
      let mut stmt = tx.prepare(&upsert_sql(collection))?;
      for row in rows {
        stmt.execute(params_from_iter(row))?;
      }
    }
    tx.commit()?;

    Ok(records.len())
  }

  /// All records of a collection in primary key order.
  pub fn get_all<T: Record>(&self) -> Result<Vec<T>, StoreError> {
    let collection = T::collection();
    let conn = self.lock()?;

    let mut stmt = conn.prepare(&format!(
      "SELECT data FROM {} ORDER BY id",
      collection.name()
    ))?;
    let rows = stmt
      .query_map([], |row| row.get::<_, Vec<u8>>(0))?
      .collect::<Result<Vec<_>, _>>()?;

    Ok(decode_rows(collection, rows))
  }

  /// Records whose `index` value equals `value`, in primary key order.
  pub fn get_by_index<T: Record>(&self, index: Index, value: u64) -> Result<Vec<T>, StoreError> {
    let collection = T::collection();
    if !collection.indexes().contains(&index) {
      return Err(StoreError::UnknownIndex {
        collection: collection.name(),
        index: index.name(),
      });
    }

    let conn = self.lock()?;
    let mut stmt = conn.prepare(&format!(
      "SELECT data FROM {} WHERE {} = ?1 ORDER BY id",
      collection.name(),
      index.column()
    ))?;
    let rows = stmt
      .query_map(params![sql_key(value)?], |row| row.get::<_, Vec<u8>>(0))?
      .collect::<Result<Vec<_>, _>>()?;

    Ok(decode_rows(collection, rows))
  }

  /// A single record by primary key.
  pub fn get_one<T: Record>(&self, key: u64) -> Result<Option<T>, StoreError> {
    let collection = T::collection();
    let conn = self.lock()?;

    let data: Option<Vec<u8>> = conn
      .query_row(
        &format!("SELECT data FROM {} WHERE id = ?1", collection.name()),
        params![sql_key(key)?],
        |row| row.get(0),
      )
      .optional()?;

    Ok(data.and_then(|data| decode_rows(collection, vec![data]).pop()))
  }
}

/// `INSERT OR REPLACE` covering the key, every index column and the payload.
fn upsert_sql(collection: Collection) -> String {
  let mut columns = vec!["id"];
  columns.extend(collection.indexes().iter().map(|i| i.column()));
  columns.push("data");

  let placeholders = (1..=columns.len())
    .map(|n| format!("?{}", n))
    .collect::<Vec<_>>()
    .join(", ");

  format!(
    "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
    collection.name(),
    columns.join(", "),
    placeholders
  )
}

/// Bind values in the column order produced by `upsert_sql`.
fn encode_row<T: Record>(record: &T) -> Result<Vec<Value>, StoreError> {
  let collection = T::collection();

  let key = record.primary_key().ok_or(StoreError::MissingKey {
    collection: collection.name(),
  })?;
  let mut row = vec![Value::Integer(sql_key(key)?)];

  for index in collection.indexes() {
    let value = record
      .index_value(*index)
      .ok_or(StoreError::MissingIndexValue {
        collection: collection.name(),
        index: index.name(),
      })?;
    row.push(Value::Integer(sql_key(value)?));
  }

  let data = serde_json::to_vec(record).map_err(|source| StoreError::Serialize {
    collection: collection.name(),
    source,
  })?;
  row.push(Value::Blob(data));

  Ok(row)
}

fn decode_rows<T: Record>(collection: Collection, rows: Vec<Vec<u8>>) -> Vec<T> {
  rows
    .into_iter()
    .filter_map(|data| match serde_json::from_slice(&data) {
      Ok(record) => Some(record),
      Err(e) => {
        warn!(collection = collection.name(), error = %e, "skipping unreadable record");
        None
      }
    })
    .collect()
}

fn sql_key(key: u64) -> Result<i64, StoreError> {
  i64::try_from(key).map_err(|_| StoreError::KeyOutOfRange(key))
}
