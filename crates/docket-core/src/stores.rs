//! Explicitly constructed store context.
//!
//! `Stores` owns the document cache, the notification inbox and the
//! persistence service. It is cloned into whoever needs it; there are no
//! process globals.

use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard};

use crate::cache::{CacheSnapshot, DocumentCache, DOCUMENTS_STORE_KEY};
use crate::inbox::{InboxSnapshot, NotificationInbox, NOTIFICATIONS_STORE_KEY};
use crate::models::User;
use crate::services::PersistenceService;
use crate::Result;

/// Persistence key for the local user identity.
pub const SESSION_USER_KEY: &str = "session-user-v1";

#[derive(Clone)]
pub struct Stores {
    cache: Arc<RwLock<DocumentCache>>,
    inbox: Arc<RwLock<NotificationInbox>>,
    persistence: PersistenceService,
}

impl Stores {
    /// Build fresh stores and hydrate them from `persistence`.
    pub async fn open(persistence: PersistenceService) -> Result<Self> {
        let cache_snapshot = persistence
            .load::<CacheSnapshot>(DOCUMENTS_STORE_KEY)
            .await?;
        let inbox_snapshot = persistence
            .load::<InboxSnapshot>(NOTIFICATIONS_STORE_KEY)
            .await?;

        let mut cache = DocumentCache::new();
        cache.hydrate(cache_snapshot);
        let mut inbox = NotificationInbox::new();
        inbox.hydrate(inbox_snapshot);
        tracing::debug!(
            "Hydrated {} documents and {} notifications",
            cache.items().len(),
            inbox.items().len()
        );

        Ok(Self {
            cache: Arc::new(RwLock::new(cache)),
            inbox: Arc::new(RwLock::new(inbox)),
            persistence,
        })
    }

    /// Hydrated stores backed by an in-memory database.
    pub async fn in_memory() -> Result<Self> {
        Self::open(PersistenceService::open_in_memory().await?).await
    }

    pub const fn persistence(&self) -> &PersistenceService {
        &self.persistence
    }

    pub async fn cache(&self) -> RwLockReadGuard<'_, DocumentCache> {
        self.cache.read().await
    }

    pub async fn inbox(&self) -> RwLockReadGuard<'_, NotificationInbox> {
        self.inbox.read().await
    }

    /// Apply `mutate` to the cache, then persist its snapshot.
    ///
    /// A failed write is logged; the in-memory change stands.
    pub async fn update_cache<R>(&self, mutate: impl FnOnce(&mut DocumentCache) -> R) -> R {
        let (result, snapshot) = {
            let mut cache = self.cache.write().await;
            let result = mutate(&mut cache);
            (result, cache.snapshot())
        };
        if let Err(error) = self.persistence.save(DOCUMENTS_STORE_KEY, &snapshot).await {
            tracing::warn!("Failed to persist document cache: {error}");
        }
        result
    }

    /// Apply `mutate` to the inbox, then persist its snapshot.
    ///
    /// A failed write is logged; the in-memory change stands.
    pub async fn update_inbox<R>(&self, mutate: impl FnOnce(&mut NotificationInbox) -> R) -> R {
        let (result, snapshot) = {
            let mut inbox = self.inbox.write().await;
            let result = mutate(&mut inbox);
            (result, inbox.snapshot())
        };
        if let Err(error) = self
            .persistence
            .save(NOTIFICATIONS_STORE_KEY, &snapshot)
            .await
        {
            tracing::warn!("Failed to persist notification inbox: {error}");
        }
        result
    }

    /// The persisted local user, if one was saved.
    pub async fn load_user(&self) -> Result<Option<User>> {
        self.persistence.load(SESSION_USER_KEY).await
    }

    pub async fn save_user(&self, user: &User) -> Result<()> {
        self.persistence.save(SESSION_USER_KEY, user).await
    }
}
