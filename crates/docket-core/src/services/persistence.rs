//! Shared persistence service used by the stores and the CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::db::{Database, LibSqlStateRepository, StateRepository};
use crate::Result;

/// Version written into every persisted envelope.
pub const STATE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    state: T,
    version: u32,
}

/// Thread-safe service for versioned store snapshots.
#[derive(Clone)]
pub struct PersistenceService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl PersistenceService {
    /// Open the service at the given filesystem path.
    ///
    /// A file that is not a database is moved aside and replaced with a
    /// fresh one.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = match Database::open(&db_path).await {
            Ok(db) => db,
            Err(error) if Self::is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Local state database at {} is unreadable: {}. Starting fresh.",
                    db_path.display(),
                    error
                );
                Self::quarantine_corrupted_db_files(&db_path)?;
                Database::open(&db_path).await?
            }
            Err(error) => return Err(error),
        };

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Load the state stored under `key`.
    ///
    /// Envelopes with another version or an undecodable payload are
    /// deleted and reported as empty.
    pub async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        validate_key(key)?;
        let raw = {
            let db = self.db.lock().await;
            let repo = LibSqlStateRepository::new(db.connection());
            repo.load(key).await?
        };
        let Some(raw) = raw else {
            return Ok(None);
        };

        let envelope: Envelope<Value> = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(error) => {
                tracing::warn!("Discarding unreadable persisted state for {key}: {error}");
                self.discard(key).await;
                return Ok(None);
            }
        };
        if envelope.version != STATE_VERSION {
            tracing::warn!(
                "Discarding persisted state for {key}: version {} (expected {STATE_VERSION})",
                envelope.version
            );
            self.discard(key).await;
            return Ok(None);
        }

        match serde_json::from_value(envelope.state) {
            Ok(state) => Ok(Some(state)),
            Err(error) => {
                tracing::warn!("Discarding persisted state for {key}: {error}");
                self.discard(key).await;
                Ok(None)
            }
        }
    }

    /// Store `state` under `key`.
    pub async fn save<T: Serialize>(&self, key: &str, state: &T) -> Result<()> {
        validate_key(key)?;
        let raw = serde_json::to_string(&Envelope {
            state,
            version: STATE_VERSION,
        })?;
        let db = self.db.lock().await;
        let repo = LibSqlStateRepository::new(db.connection());
        repo.save(key, &raw).await?;
        tracing::debug!("Persisted {key} ({} bytes)", raw.len());
        Ok(())
    }

    /// Remove the state stored under `key`.
    async fn remove(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let db = self.db.lock().await;
        let repo = LibSqlStateRepository::new(db.connection());
        repo.remove(key).await
    }

    async fn discard(&self, key: &str) {
        if let Err(error) = self.remove(key).await {
            tracing::warn!("Failed to delete discarded state for {key}: {error}");
        }
    }

    fn is_corrupted_db_error(error: &crate::Error) -> bool {
        error
            .to_string()
            .to_ascii_lowercase()
            .contains("file is not a database")
    }

    fn quarantine_corrupted_db_files(db_path: &Path) -> Result<()> {
        if db_path.exists() {
            let timestamp = chrono::Utc::now().timestamp_millis();
            let file_name = db_path
                .file_name()
                .map_or_else(|| "docket.db".into(), |name| name.to_string_lossy());
            let backup_path = db_path.with_file_name(format!("{file_name}.corrupt-{timestamp}"));

            std::fs::rename(db_path, &backup_path)?;
            tracing::warn!(
                "Moved corrupted local DB file from {} to {}",
                db_path.display(),
                backup_path.display()
            );
        }

        let Some(parent) = db_path.parent() else {
            return Ok(());
        };
        let Some(base_name) = db_path.file_name().and_then(|name| name.to_str()) else {
            return Ok(());
        };
        let sidecar_prefix = format!("{base_name}-");

        for entry in std::fs::read_dir(parent)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            if file_name.to_string_lossy().starts_with(&sidecar_prefix) {
                let path = entry.path();
                std::fs::remove_file(&path)?;
                tracing::warn!("Removed stale database file {}", path.display());
            }
        }

        Ok(())
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(crate::Error::InvalidInput(
            "persistence key cannot be empty".to_string(),
        ));
    }
    Ok(())
}
