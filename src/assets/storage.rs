//! SQLite storage for asset cache generations.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::fetch::{AssetRequest, AssetResponse};
use super::AssetError;

/// Schema for asset cache tables.
const ASSET_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS generations (
    name TEXT PRIMARY KEY
);

-- One row per cached request
CREATE TABLE IF NOT EXISTS entries (
    generation TEXT NOT NULL,
    request_key TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    PRIMARY KEY (generation, request_key)
);
"#;

/// Named cache generations holding request/response pairs.
pub struct AssetStore {
  conn: Mutex<Connection>,
}

impl AssetStore {
  pub fn open(path: &Path) -> Result<Self, AssetError> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    conn.execute_batch(ASSET_SCHEMA)?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>, AssetError> {
    self.conn.lock().map_err(|_| AssetError::Poisoned)
  }

  /// Create the generation if it doesn't exist yet.
  #[cfg(test)]
  pub fn open_generation(&self, name: &str) -> Result<(), AssetError> {
    let conn = self.lock()?;
    conn.execute(
      "INSERT OR IGNORE INTO generations (name) VALUES (?1)",
      params![name],
    )?;
    Ok(())
  }

  /// Names of every existing generation.
  pub fn generations(&self) -> Result<Vec<String>, AssetError> {
    let conn = self.lock()?;
    let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY name")?;
    let names = stmt
      .query_map([], |row| row.get(0))?
      .collect::<Result<Vec<String>, _>>()?;
    Ok(names)
  }

  /// Delete a generation and everything cached in it.
  pub fn delete_generation(&self, name: &str) -> Result<bool, AssetError> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM entries WHERE generation = ?1", params![name])?;
    let deleted = tx.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
    tx.commit()?;
    Ok(deleted > 0)
  }

  pub fn lookup(
    &self,
    generation: &str,
    request: &AssetRequest,
  ) -> Result<Option<AssetResponse>, AssetError> {
    let conn = self.lock()?;
    let row: Option<(u16, String, Vec<u8>)> = conn
      .query_row(
        "SELECT status, headers, body FROM entries
         WHERE generation = ?1 AND request_key = ?2",
        params![generation, request.cache_key()],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
      )
      .optional()?;

    match row {
      Some((status, headers, body)) => Ok(Some(AssetResponse {
        status,
        headers: serde_json::from_str(&headers)?,
        body,
      })),
      None => Ok(None),
    }
  }

  /// Store one response, creating the generation if needed.
  pub fn put(
    &self,
    generation: &str,
    request: &AssetRequest,
    response: &AssetResponse,
  ) -> Result<(), AssetError> {
    self.put_all(generation, &[(request.clone(), response.clone())])
  }

  /// Store every pair in one transaction; nothing is written if any insert fails.
  pub fn put_all(
    &self,
    generation: &str,
    entries: &[(AssetRequest, AssetResponse)],
  ) -> Result<(), AssetError> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    tx.execute(
      "INSERT OR IGNORE INTO generations (name) VALUES (?1)",
      params![generation],
    )?;
    {
      let mut stmt = tx.prepare(
        "INSERT OR REPLACE INTO entries (generation, request_key, url, status, headers, body)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
      )?;
      for (request, response) in entries {
        stmt.execute(params![
          generation,
          request.cache_key(),
          request.url.as_str(),
          response.status,
          serde_json::to_string(&response.headers)?,
          response.body,
        ])?;
      }
    }
    tx.commit()?;
    Ok(())
  }

  /// URLs cached in a generation.
  pub fn urls(&self, generation: &str) -> Result<Vec<String>, AssetError> {
    let conn = self.lock()?;
    let mut stmt =
      conn.prepare("SELECT url FROM entries WHERE generation = ?1 ORDER BY url")?;
    let urls = stmt
      .query_map(params![generation], |row| row.get(0))?
      .collect::<Result<Vec<String>, _>>()?;
    Ok(urls)
  }
}
