use std::io;

use docket_core::api::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] docket_core::Error),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Notification not found: {0}")]
    NotificationNotFound(String),
    #[error("No notification for document: {0}")]
    DocumentNotInInbox(String),
    #[error("{0}")]
    AmbiguousNotificationId(String),
    #[error("Pass a notification ID or --all")]
    MissingNotificationId,
}
