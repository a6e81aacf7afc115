//! SQLite-backed key-value store (persists across restarts).

use async_trait::async_trait;
use led_types::{KvStore, StoreError};
use rusqlite::OptionalExtension;
use std::path::Path;

/// SQLite KvStore: one row per key in a `kv` table.
pub struct SqliteKvStore {
    conn: std::sync::Mutex<rusqlite::Connection>,
}

impl SqliteKvStore {
    /// Open (or create) the database at `path`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn =
            rusqlite::Connection::open(path).map_err(|e| StoreError::Other(e.to_string()))?;
        Self::with_schema(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn =
            rusqlite::Connection::open_in_memory().map_err(|e| StoreError::Other(e.to_string()))?;
        Self::with_schema(conn)
    }

    fn with_schema(conn: rusqlite::Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| StoreError::Other(e.to_string()))?;

        Ok(Self {
            conn: std::sync::Mutex::new(conn),
        })
    }

    fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<T, rusqlite::Error>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Other(format!("failed to acquire lock: {}", e)))?;
        f(&conn).map_err(|e| StoreError::Other(e.to_string()))
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM kv WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get(0),
            )
            .optional()
        })
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let now = chrono::Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![key, value, now],
            )
        })?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| conn.execute("DELETE FROM kv WHERE key = ?1", rusqlite::params![key]))?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
            let keys = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(keys)
        })
    }

    async fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StoreError> {
        let now = chrono::Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            for (key, value) in entries {
                tx.execute(
                    "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
                    rusqlite::params![key, value, now],
                )?;
            }
            tx.commit()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_values() {
        let store = SqliteKvStore::open_in_memory().unwrap();
        store.set("led_users", "[]").await.unwrap();
        store
            .set_many(&[("a", "1".to_string()), ("led_users", "[{}]".to_string())])
            .await
            .unwrap();
        assert_eq!(store.get("led_users").await.unwrap().as_deref(), Some("[{}]"));
        assert_eq!(store.keys().await.unwrap(), vec!["a", "led_users"]);
        store.remove("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let path = std::env::temp_dir().join(format!("led-kv-{}.db", std::process::id()));
        {
            let store = SqliteKvStore::new(&path).unwrap();
            store.set("led_incidents", "[]").await.unwrap();
        }
        let reopened = SqliteKvStore::new(&path).unwrap();
        assert_eq!(reopened.get("led_incidents").await.unwrap().as_deref(), Some("[]"));
        let _ = std::fs::remove_file(&path);
    }
}
