//! Document model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::User;

/// Prefix carried by ids of optimistically inserted records.
pub const TEMP_ID_PREFIX: &str = "tmp-";

/// A person credited on a document. Immutable once attached.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Contributor {
    pub id: String,
    pub name: String,
}

impl From<&User> for Contributor {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
        }
    }
}

/// A document as served by `GET /documents`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    /// Server id, or `tmp-<token>` while an optimistic insert is pending
    pub id: String,
    pub title: String,
    pub version: String,
    #[serde(default)]
    pub contributors: Vec<Contributor>,
    /// Attachment file names or URLs
    #[serde(default)]
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Falls back to the decode time when the server omits it
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// Create a record with no contributors or attachments, stamped now.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, version: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            version: version.into(),
            contributors: Vec::new(),
            attachments: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Build the placeholder shown while a create request is in flight.
    #[must_use]
    pub fn optimistic(draft: &DocumentDraft) -> Self {
        Self::new(temporary_id(), draft.name.trim(), draft.version.trim())
    }

    /// Whether this record is an unreconciled optimistic insert.
    pub fn is_temporary(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }
}

/// Generate a unique `tmp-` id. UUID v7 keeps these time-ordered.
#[must_use]
pub fn temporary_id() -> String {
    format!("{TEMP_ID_PREFIX}{}", Uuid::now_v7().simple())
}

/// What a caller asks for when creating a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDraft {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub files: Vec<String>,
}

impl DocumentDraft {
    pub fn new(name: impl Into<String>, version: impl Into<String>, files: Vec<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            files,
        }
    }
}

/// Wire body for `POST /documents`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentRequest {
    pub id: String,
    pub title: String,
    pub version: String,
    pub contributors: Vec<Contributor>,
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl CreateDocumentRequest {
    /// Build the request body, crediting the local user as first contributor.
    #[must_use]
    pub fn new(draft: &DocumentDraft, author: &User) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            title: draft.name.trim().to_string(),
            version: draft.version.trim().to_string(),
            contributors: vec![Contributor::from(author)],
            attachments: draft.files.clone(),
            created_at: Utc::now(),
        }
    }
}
