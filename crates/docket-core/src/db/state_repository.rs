//! Key-value repository for persisted store snapshots

use crate::error::Result;
use crate::util::unix_timestamp_millis;
use libsql::Connection;

/// Storage for opaque serialized store state, keyed by store name (async)
#[allow(async_fn_in_trait)]
pub trait StateRepository {
    /// Load the raw value stored under `key`
    async fn load(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    async fn save(&self, key: &str, value: &str) -> Result<()>;

    /// Remove the value stored under `key`
    async fn remove(&self, key: &str) -> Result<()>;
}

/// libSQL implementation of `StateRepository`
pub struct LibSqlStateRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlStateRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl StateRepository for LibSqlStateRepository<'_> {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM persisted_state WHERE key = ?", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            let value: String = row.get(0)?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO persisted_state (key, value, updated_at) VALUES (?1, ?2, ?3)",
                libsql::params![key, value, unix_timestamp_millis()],
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM persisted_state WHERE key = ?", [key])
            .await?;
        Ok(())
    }
}
