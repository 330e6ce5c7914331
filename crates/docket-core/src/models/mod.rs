//! Data models for Docket

mod document;
mod notification;
mod session;
mod sort;

pub use document::{
    temporary_id, Contributor, CreateDocumentRequest, DocumentDraft, DocumentRecord,
    TEMP_ID_PREFIX,
};
pub use notification::{
    DocumentCreatedEvent, EventCategory, NewNotification, NotificationEvent, DOCUMENT_CREATED,
    DOCUMENT_CREATED_FAKE,
};
pub use session::{Session, User};
pub use sort::DocumentSort;
