//! Notification and realtime event models

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Frame type for a document created by a real user action.
pub const DOCUMENT_CREATED: &str = "document.created";
/// Frame type for a synthetic document-created event.
pub const DOCUMENT_CREATED_FAKE: &str = "document.created.fake";

/// User-facing classification of a document-created event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
    Real,
    Fake,
}

impl EventCategory {
    /// `document.created` is real, every other type is fake.
    pub fn classify(event_type: &str) -> Self {
        if event_type == DOCUMENT_CREATED {
            Self::Real
        } else {
            Self::Fake
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real => f.write_str("REAL"),
            Self::Fake => f.write_str("FAKE"),
        }
    }
}

/// A parsed `document.created*` realtime frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentCreatedEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub user_id: String,
    pub user_name: String,
    pub document_id: String,
    pub document_title: String,
    pub timestamp: DateTime<Utc>,
}

impl DocumentCreatedEvent {
    pub fn category(&self) -> EventCategory {
        EventCategory::classify(&self.event_type)
    }
}

/// An entry in the notification inbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub id: String,
    /// Dedup key: the inbox keeps at most one entry per document
    pub document_id: String,
    pub document_title: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub user_id: String,
    pub user_name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

/// Input to `NotificationInbox::add`. `id` is generated and `read` defaults
/// to `false` when absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub id: Option<String>,
    pub document_id: String,
    pub document_title: String,
    pub event_type: String,
    pub user_id: String,
    pub user_name: String,
    pub created_at: DateTime<Utc>,
    pub read: Option<bool>,
}

impl From<&DocumentCreatedEvent> for NewNotification {
    fn from(event: &DocumentCreatedEvent) -> Self {
        Self {
            id: None,
            document_id: event.document_id.clone(),
            document_title: event.document_title.clone(),
            event_type: event.event_type.clone(),
            user_id: event.user_id.clone(),
            user_name: event.user_name.clone(),
            created_at: event.timestamp,
            read: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_only_plain_created_as_real() {
        assert_eq!(EventCategory::classify(DOCUMENT_CREATED), EventCategory::Real);
        assert_eq!(
            EventCategory::classify(DOCUMENT_CREATED_FAKE),
            EventCategory::Fake
        );
        assert_eq!(EventCategory::classify("anything"), EventCategory::Fake);
        assert_eq!(EventCategory::Real.to_string(), "REAL");
    }

    #[test]
    fn notification_serializes_type_field() {
        let notification = NotificationEvent {
            id: "n1".to_string(),
            document_id: "d1".to_string(),
            document_title: "Title".to_string(),
            event_type: DOCUMENT_CREATED.to_string(),
            user_id: "u1".to_string(),
            user_name: "Ada".to_string(),
            created_at: Utc::now(),
            read: false,
        };
        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["type"], DOCUMENT_CREATED);
        assert_eq!(json["documentId"], "d1");
    }
}
