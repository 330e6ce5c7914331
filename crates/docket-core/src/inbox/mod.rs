//! Deduplicated, capacity-bounded notification inbox.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{NewNotification, NotificationEvent};

/// Persistence key for the inbox snapshot.
pub const NOTIFICATIONS_STORE_KEY: &str = "notifications-store-v1";

/// Maximum number of entries kept in the inbox.
pub const DEFAULT_CAPACITY: usize = 150;

/// Unread counts above this are shown as `99+`.
const BADGE_LIMIT: usize = 99;

/// Persisted subset of the inbox. The scroll target is never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxSnapshot {
    #[serde(default)]
    pub items: Vec<NotificationEvent>,
}

/// Newest-first notification list with read flags and a pending scroll target.
#[derive(Debug, Clone)]
pub struct NotificationInbox {
    items: Vec<NotificationEvent>,
    scroll_target: Option<String>,
    capacity: usize,
    has_hydrated: bool,
}

impl Default for NotificationInbox {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl NotificationInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an inbox holding at most `capacity` entries (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            scroll_target: None,
            capacity: capacity.max(1),
            has_hydrated: false,
        }
    }

    /// Entries, newest first.
    pub fn items(&self) -> &[NotificationEvent] {
        &self.items
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub const fn has_hydrated(&self) -> bool {
        self.has_hydrated
    }

    pub fn find_by_document(&self, document_id: &str) -> Option<&NotificationEvent> {
        self.items
            .iter()
            .find(|item| item.document_id == document_id)
    }

    /// Add a notification unless one already exists for the same document.
    ///
    /// Returns the stored entry when it was inserted, `None` for a duplicate.
    /// When the inbox is full the oldest entries are dropped; the new entry
    /// is always kept.
    pub fn add(&mut self, notification: NewNotification) -> Option<&NotificationEvent> {
        if self.find_by_document(&notification.document_id).is_some() {
            tracing::debug!(
                "Ignoring duplicate notification for document {}",
                notification.document_id
            );
            return None;
        }

        let entry = NotificationEvent {
            id: notification
                .id
                .unwrap_or_else(|| Uuid::now_v7().to_string()),
            document_id: notification.document_id,
            document_title: notification.document_title,
            event_type: notification.event_type,
            user_id: notification.user_id,
            user_name: notification.user_name,
            created_at: notification.created_at,
            read: notification.read.unwrap_or(false),
        };

        self.items.insert(0, entry);
        self.items.truncate(self.capacity);
        self.items.first()
    }

    /// Mark one entry read. Unknown ids are ignored.
    pub fn mark_read(&mut self, id: &str) -> bool {
        match self.items.iter_mut().find(|item| item.id == id) {
            Some(item) => {
                item.read = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_read(&mut self) {
        for item in &mut self.items {
            item.read = true;
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn scroll_target(&self) -> Option<&str> {
        self.scroll_target.as_deref()
    }

    /// Record which entry a consumer should scroll to next. The consumer
    /// clears it once acted upon.
    pub fn set_scroll_target(&mut self, id: Option<String>) {
        self.scroll_target = id;
    }

    /// Point the scroll target at the entry for `document_id`, or clear it
    /// when there is none. Used when a delivered notification is opened.
    pub fn focus_document(&mut self, document_id: &str) -> Option<&str> {
        let target = self
            .find_by_document(document_id)
            .map(|item| item.id.clone());
        self.set_scroll_target(target);
        self.scroll_target()
    }

    /// Number of unread entries. Derived on every call.
    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|item| !item.read).count()
    }

    /// Unread count formatted for a badge.
    pub fn unread_badge(&self) -> String {
        let unread = self.unread_count();
        if unread > BADGE_LIMIT {
            format!("{BADGE_LIMIT}+")
        } else {
            unread.to_string()
        }
    }

    pub fn snapshot(&self) -> InboxSnapshot {
        InboxSnapshot {
            items: self.items.clone(),
        }
    }

    /// Replay persisted entries and mark the inbox hydrated.
    ///
    /// Dedup and capacity are re-applied, keeping the newest entry per
    /// document. Only the first call has any effect.
    pub fn hydrate(&mut self, snapshot: Option<InboxSnapshot>) {
        if self.has_hydrated {
            tracing::debug!("Notification inbox already hydrated; ignoring snapshot");
            return;
        }
        if let Some(snapshot) = snapshot {
            let mut seen = HashSet::new();
            self.items = snapshot
                .items
                .into_iter()
                .filter(|item| seen.insert(item.document_id.clone()))
                .take(self.capacity)
                .collect();
        }
        self.has_hydrated = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn notification(document_id: &str) -> NewNotification {
        NewNotification {
            id: None,
            document_id: document_id.to_string(),
            document_title: format!("Doc {document_id}"),
            event_type: "document.created".to_string(),
            user_id: "user-2".to_string(),
            user_name: "Grace".to_string(),
            created_at: Utc::now(),
            read: None,
        }
    }

    fn document_ids(inbox: &NotificationInbox) -> Vec<&str> {
        inbox
            .items()
            .iter()
            .map(|item| item.document_id.as_str())
            .collect()
    }

    #[test]
    fn add_prepends_with_generated_id_and_unread() {
        let mut inbox = NotificationInbox::new();
        inbox.add(notification("a"));
        let added = inbox.add(notification("b")).cloned().unwrap();

        assert!(!added.id.is_empty());
        assert!(!added.read);
        assert_eq!(document_ids(&inbox), vec!["b", "a"]);
    }

    #[test]
    fn add_keeps_supplied_id_and_read_flag() {
        let mut inbox = NotificationInbox::new();
        let mut input = notification("a");
        input.id = Some("fixed".to_string());
        input.read = Some(true);

        inbox.add(input);
        assert_eq!(inbox.items()[0].id, "fixed");
        assert!(inbox.items()[0].read);
    }

    #[test]
    fn duplicate_document_is_ignored() {
        let mut inbox = NotificationInbox::new();
        assert!(inbox.add(notification("a")).is_some());
        let first_id = inbox.items()[0].id.clone();

        let mut redelivered = notification("a");
        redelivered.document_title = "Renamed".to_string();
        assert!(inbox.add(redelivered).is_none());

        assert_eq!(inbox.items().len(), 1);
        assert_eq!(inbox.items()[0].id, first_id);
        assert_eq!(inbox.items()[0].document_title, "Doc a");
    }

    #[test]
    fn capacity_keeps_most_recent_entries() {
        let mut inbox = NotificationInbox::new();
        for index in 0..151 {
            inbox.add(notification(&format!("doc-{index}")));
        }

        assert_eq!(inbox.items().len(), DEFAULT_CAPACITY);
        assert_eq!(inbox.items()[0].document_id, "doc-150");
        assert_eq!(inbox.items()[149].document_id, "doc-1");
        assert!(inbox.find_by_document("doc-0").is_none());
    }

    #[test]
    fn evicted_document_can_notify_again() {
        let mut inbox = NotificationInbox::with_capacity(2);
        inbox.add(notification("a"));
        inbox.add(notification("b"));
        inbox.add(notification("c"));
        assert_eq!(document_ids(&inbox), vec!["c", "b"]);

        assert!(inbox.add(notification("a")).is_some());
        assert_eq!(document_ids(&inbox), vec!["a", "c"]);
    }

    #[test]
    fn many_adds_keep_dedup_and_capacity_invariants() {
        let mut inbox = NotificationInbox::with_capacity(10);
        for round in 0..5 {
            for index in 0..8 {
                inbox.add(notification(&format!("doc-{}", (index * 3 + round) % 13)));
            }
        }

        let mut ids = document_ids(&inbox);
        assert!(ids.len() <= 10);
        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }

    #[test]
    fn unread_accounting() {
        let mut inbox = NotificationInbox::new();
        inbox.add(notification("a"));
        inbox.add(notification("b"));
        inbox.add(notification("c"));
        assert_eq!(inbox.unread_count(), 3);

        let id = inbox.items()[1].id.clone();
        assert!(inbox.mark_read(&id));
        assert!(!inbox.mark_read("missing"));
        assert_eq!(inbox.unread_count(), 2);

        inbox.mark_all_read();
        assert_eq!(inbox.unread_count(), 0);
        assert_eq!(inbox.unread_badge(), "0");
    }

    #[test]
    fn unread_badge_caps_at_ninety_nine() {
        let mut inbox = NotificationInbox::new();
        for index in 0..99 {
            inbox.add(notification(&index.to_string()));
        }
        assert_eq!(inbox.unread_badge(), "99");

        inbox.add(notification("overflow"));
        assert_eq!(inbox.unread_badge(), "99+");
    }

    #[test]
    fn clear_empties_items_but_keeps_scroll_target() {
        let mut inbox = NotificationInbox::new();
        inbox.add(notification("a"));
        inbox.set_scroll_target(Some("x".to_string()));

        inbox.clear();
        assert!(inbox.items().is_empty());
        assert_eq!(inbox.scroll_target(), Some("x"));
    }

    #[test]
    fn focus_document_targets_matching_entry() {
        let mut inbox = NotificationInbox::new();
        inbox.add(notification("a"));
        let expected = inbox.items()[0].id.clone();

        assert_eq!(inbox.focus_document("a"), Some(expected.as_str()));
        assert_eq!(inbox.focus_document("missing"), None);
        assert_eq!(inbox.scroll_target(), None);
    }

    #[test]
    fn hydrate_restores_items_and_reapplies_invariants() {
        let mut source = NotificationInbox::new();
        source.add(notification("a"));
        source.add(notification("b"));
        let mut snapshot = source.snapshot();
        snapshot.items.push(snapshot.items[0].clone());

        let mut inbox = NotificationInbox::with_capacity(5);
        inbox.set_scroll_target(Some("kept".to_string()));
        inbox.hydrate(Some(snapshot));

        assert!(inbox.has_hydrated());
        assert_eq!(document_ids(&inbox), vec!["b", "a"]);
        assert_eq!(inbox.scroll_target(), Some("kept"));

        inbox.hydrate(None);
        assert_eq!(inbox.items().len(), 2);
    }
}
