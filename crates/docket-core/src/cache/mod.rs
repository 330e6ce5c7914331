//! Offline-first document cache.
//!
//! A plain state container: every mutation is synchronous and infallible.
//! Network calls and persistence live elsewhere (see `sync` and `stores`);
//! this module only guarantees the state invariants:
//!
//! - no two live records share an `id`
//! - `NetworkStatus::Error` always carries a message
//! - `has_hydrated` flips to `true` once and never reverts

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::DocumentRecord;
use crate::state::NetworkStatus;

/// Persistence key for the cache snapshot.
pub const DOCUMENTS_STORE_KEY: &str = "documents-store-v1";

/// Persisted subset of the cache. Network status and hydration state are
/// recomputed on every start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    #[serde(default)]
    pub items: Vec<DocumentRecord>,
    #[serde(default)]
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// Undo handle returned by [`DocumentCache::optimistic_insert`].
///
/// Consumed by [`DocumentCache::rollback`], so a token can restore state at
/// most once.
#[derive(Debug)]
#[must_use = "keep the token to roll back if the remote create fails"]
pub struct RollbackToken {
    temp_id: String,
    previous: Vec<DocumentRecord>,
}

impl RollbackToken {
    /// Id of the optimistically inserted record.
    pub fn temp_id(&self) -> &str {
        &self.temp_id
    }
}

/// In-memory document cache state.
#[derive(Debug, Clone, Default)]
pub struct DocumentCache {
    items: Vec<DocumentRecord>,
    last_sync_at: Option<DateTime<Utc>>,
    network_status: NetworkStatus,
    has_hydrated: bool,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[DocumentRecord] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&DocumentRecord> {
        self.items.iter().find(|record| record.id == id)
    }

    pub const fn last_sync_at(&self) -> Option<DateTime<Utc>> {
        self.last_sync_at
    }

    pub const fn network_status(&self) -> &NetworkStatus {
        &self.network_status
    }

    pub fn error_message(&self) -> Option<&str> {
        self.network_status.error_message()
    }

    pub const fn has_hydrated(&self) -> bool {
        self.has_hydrated
    }

    /// Replace every record after a successful full fetch.
    pub fn set_items(&mut self, items: Vec<DocumentRecord>) {
        self.items = merge_by_id(Vec::new(), items);
        self.mark_synced();
    }

    /// Merge records by id. Incoming records win and keep the position of
    /// the record they replace; new ids are appended in incoming order.
    pub fn upsert_items(&mut self, items: Vec<DocumentRecord>) {
        let current = std::mem::take(&mut self.items);
        self.items = merge_by_id(current, items);
        self.mark_synced();
    }

    /// Prepend a placeholder record without touching sync status.
    pub fn optimistic_insert(&mut self, record: DocumentRecord) -> RollbackToken {
        let previous = self.items.clone();
        let temp_id = record.id.clone();
        self.items.retain(|existing| existing.id != temp_id);
        self.items.insert(0, record);
        tracing::debug!("Optimistically inserted document {temp_id}");
        RollbackToken { temp_id, previous }
    }

    /// Restore the items captured by `token`.
    pub fn rollback(&mut self, token: RollbackToken) {
        tracing::debug!("Rolling back optimistic document {}", token.temp_id);
        self.items = token.previous;
    }

    pub fn set_network_error(&mut self, message: impl Into<String>) {
        self.network_status = NetworkStatus::Error(message.into());
    }

    pub fn clear_network_error(&mut self) {
        self.network_status = NetworkStatus::Ok;
    }

    pub fn mark_hydrated(&mut self) {
        self.has_hydrated = true;
    }

    /// Persisted subset of the current state.
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            items: self.items.clone(),
            last_sync_at: self.last_sync_at,
        }
    }

    /// Replay a persisted snapshot and mark the cache hydrated.
    ///
    /// Only the first call has any effect.
    pub fn hydrate(&mut self, snapshot: Option<CacheSnapshot>) {
        if self.has_hydrated {
            tracing::debug!("Document cache already hydrated; ignoring snapshot");
            return;
        }
        if let Some(snapshot) = snapshot {
            self.items = merge_by_id(Vec::new(), snapshot.items);
            self.last_sync_at = snapshot.last_sync_at;
        }
        self.mark_hydrated();
    }

    fn mark_synced(&mut self) {
        self.last_sync_at = Some(Utc::now());
        self.network_status = NetworkStatus::Ok;
    }
}

fn merge_by_id(
    base: Vec<DocumentRecord>,
    incoming: Vec<DocumentRecord>,
) -> Vec<DocumentRecord> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(base.len());
    let mut merged = Vec::with_capacity(base.len() + incoming.len());

    for record in base.into_iter().chain(incoming) {
        if let Some(&index) = positions.get(&record.id) {
            merged[index] = record;
        } else {
            positions.insert(record.id.clone(), merged.len());
            merged.push(record);
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentDraft;
    use pretty_assertions::assert_eq;

    fn doc(id: &str, title: &str) -> DocumentRecord {
        DocumentRecord::new(id, title, "1.0.0")
    }

    fn ids_and_titles(cache: &DocumentCache) -> Vec<(String, String)> {
        cache
            .items()
            .iter()
            .map(|record| (record.id.clone(), record.title.clone()))
            .collect()
    }

    fn pair(id: &str, title: &str) -> (String, String) {
        (id.to_string(), title.to_string())
    }

    #[test]
    fn new_cache_is_idle_and_not_hydrated() {
        let cache = DocumentCache::new();
        assert!(cache.items().is_empty());
        assert_eq!(cache.network_status(), &NetworkStatus::Idle);
        assert!(!cache.has_hydrated());
        assert_eq!(cache.last_sync_at(), None);
    }

    #[test]
    fn set_items_replaces_and_marks_synced() {
        let mut cache = DocumentCache::new();
        cache.set_network_error("offline");
        cache.set_items(vec![doc("1", "A")]);
        cache.set_items(vec![doc("2", "B")]);

        assert_eq!(ids_and_titles(&cache), vec![pair("2", "B")]);
        assert_eq!(cache.network_status(), &NetworkStatus::Ok);
        assert_eq!(cache.error_message(), None);
        assert!(cache.last_sync_at().is_some());
    }

    #[test]
    fn set_items_collapses_duplicate_ids() {
        let mut cache = DocumentCache::new();
        cache.set_items(vec![doc("1", "A"), doc("2", "B"), doc("1", "A2")]);
        assert_eq!(ids_and_titles(&cache), vec![pair("1", "A2"), pair("2", "B")]);
    }

    #[test]
    fn upsert_updates_in_place_then_appends_new() {
        let mut cache = DocumentCache::new();
        cache.set_items(vec![doc("1", "A")]);

        cache.upsert_items(vec![doc("1", "A2"), doc("2", "B")]);

        assert_eq!(ids_and_titles(&cache), vec![pair("1", "A2"), pair("2", "B")]);
        assert_eq!(cache.network_status(), &NetworkStatus::Ok);
    }

    #[test]
    fn upsert_preserves_unmatched_records_and_their_order() {
        let mut cache = DocumentCache::new();
        cache.set_items(vec![doc("1", "A"), doc("2", "B"), doc("3", "C")]);

        cache.upsert_items(vec![doc("4", "D"), doc("2", "B2")]);

        assert_eq!(
            ids_and_titles(&cache),
            vec![pair("1", "A"), pair("2", "B2"), pair("3", "C"), pair("4", "D")]
        );
    }

    #[test]
    fn optimistic_insert_then_rollback_restores_items() {
        let mut cache = DocumentCache::new();
        cache.set_items(vec![doc("1", "A"), doc("2", "B")]);
        let before = cache.items().to_vec();
        let synced_at = cache.last_sync_at();

        let draft = DocumentDraft::new("New", "1.0.0", Vec::new());
        let token = cache.optimistic_insert(DocumentRecord::optimistic(&draft));

        assert_eq!(cache.items().len(), 3);
        assert_eq!(cache.items()[0].id, token.temp_id());
        assert!(cache.items()[0].is_temporary());
        assert_eq!(cache.last_sync_at(), synced_at);

        cache.rollback(token);
        assert_eq!(cache.items(), before.as_slice());
    }

    #[test]
    fn optimistic_insert_does_not_touch_network_status() {
        let mut cache = DocumentCache::new();
        cache.set_network_error("Timeout to contact the server.");

        let _token = cache.optimistic_insert(doc("tmp-1", "Pending"));

        assert_eq!(cache.error_message(), Some("Timeout to contact the server."));
        assert_eq!(cache.last_sync_at(), None);
    }

    #[test]
    fn network_error_round_trip() {
        let mut cache = DocumentCache::new();
        cache.set_network_error("Error to contact the server.");
        assert!(cache.network_status().is_error());
        assert_eq!(cache.error_message(), Some("Error to contact the server."));

        cache.set_network_error("Timeout to contact the server.");
        assert_eq!(cache.error_message(), Some("Timeout to contact the server."));

        cache.clear_network_error();
        assert_eq!(cache.network_status(), &NetworkStatus::Ok);
        assert_eq!(cache.error_message(), None);
    }

    #[test]
    fn hydrate_replays_snapshot_once() {
        let mut source = DocumentCache::new();
        source.set_items(vec![doc("1", "A")]);
        let snapshot = source.snapshot();

        let mut cache = DocumentCache::new();
        cache.hydrate(Some(snapshot.clone()));
        assert!(cache.has_hydrated());
        assert_eq!(cache.items(), snapshot.items.as_slice());
        assert_eq!(cache.last_sync_at(), snapshot.last_sync_at);
        assert_eq!(cache.network_status(), &NetworkStatus::Idle);

        cache.hydrate(Some(CacheSnapshot::default()));
        assert_eq!(cache.items().len(), 1);
    }

    #[test]
    fn hydrate_without_snapshot_still_marks_hydrated() {
        let mut cache = DocumentCache::new();
        cache.hydrate(None);
        assert!(cache.has_hydrated());
        assert!(cache.items().is_empty());
    }

    #[test]
    fn snapshot_serializes_only_persisted_fields() {
        let mut cache = DocumentCache::new();
        cache.set_items(vec![doc("1", "A")]);
        cache.set_network_error("boom");

        let json = serde_json::to_value(cache.snapshot()).unwrap();
        let object = json.as_object().unwrap();
        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["items", "lastSyncAt"]);
    }
}
