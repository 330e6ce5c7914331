use std::env;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use docket_core::api::HttpDocumentApi;
use docket_core::config::{default_data_dir, ClientConfig, ENV_API_URL};
use docket_core::inbox::NotificationInbox;
use docket_core::models::{DocumentRecord, EventCategory, NotificationEvent, Session, User};
use docket_core::services::PersistenceService;
use docket_core::sync::SyncOrchestrator;
use docket_core::util::normalize_text_option;
use docket_core::Stores;
use serde::Serialize;

use crate::error::CliError;
use crate::notifier::ConsoleNotifier;

const DEFAULT_USER_NAME: &str = "docket";
const SHORT_ID_LEN: usize = 13;

pub type CliOrchestrator = SyncOrchestrator<HttpDocumentApi, ConsoleNotifier, fn() -> bool>;

/// Everything a command needs: resolved config, hydrated stores and the
/// local session.
pub struct AppContext {
    pub config: ClientConfig,
    pub stores: Stores,
    pub session: Session,
    pub db_path: PathBuf,
}

impl AppContext {
    pub async fn open(db_path: &Path, api_url: Option<String>) -> Result<Self, CliError> {
        let mut config = ClientConfig::load();
        if let Some(url) = api_url {
            config.apply_overrides(|key| (key == ENV_API_URL).then(|| url.clone()));
        }
        config.validate()?;

        let stores = open_stores(db_path).await?;
        let session = resolve_session(&stores, &config).await?;

        Ok(Self {
            config,
            stores,
            session,
            db_path: db_path.to_path_buf(),
        })
    }

    /// Orchestrator wired to the HTTP API and the console notifier.
    ///
    /// `foreground` selects toasts over scheduled notifications.
    pub fn orchestrator(&self, foreground: bool) -> Result<CliOrchestrator, CliError> {
        let api = HttpDocumentApi::with_timeout(
            &self.config.api_base_url,
            self.session.clone(),
            self.config.request_timeout(),
        )?;
        let lifecycle: fn() -> bool = if foreground { || true } else { || false };

        Ok(SyncOrchestrator::new(
            self.stores.clone(),
            api,
            ConsoleNotifier,
            lifecycle,
            self.session.clone(),
        )
        .with_refetch_interval(self.config.refetch_interval()))
    }
}

pub async fn open_stores(path: &Path) -> Result<Stores, CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let persistence = PersistenceService::open_path(path.to_path_buf()).await?;
    Ok(Stores::open(persistence).await?)
}

/// Load the persisted local user, creating one on first run.
///
/// A configured user name replaces the stored one; the id never changes.
pub async fn resolve_session(stores: &Stores, config: &ClientConfig) -> Result<Session, CliError> {
    let user = match stores.load_user().await? {
        Some(mut user) => {
            if let Some(name) = config.user_name.as_ref().filter(|name| **name != user.name) {
                user.name.clone_from(name);
                stores.save_user(&user).await?;
            }
            user
        }
        None => {
            let name = config.user_name.clone().unwrap_or_else(default_user_name);
            let user = User::generate(name);
            stores.save_user(&user).await?;
            tracing::info!("Created local user {} ({})", user.name, user.id);
            user
        }
    };

    Ok(Session::new(user))
}

fn default_user_name() -> String {
    normalize_text_option(env::var("USER").or_else(|_| env::var("USERNAME")).ok())
        .unwrap_or_else(|| DEFAULT_USER_NAME.to_string())
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("DOCKET_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    default_data_dir()
        .unwrap_or_else(|| PathBuf::from(".docket"))
        .join("docket.db")
}

#[derive(Debug, Serialize)]
pub struct DocumentListItem {
    pub id: String,
    pub title: String,
    pub version: String,
    pub contributors: Vec<String>,
    pub attachments: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    pub relative_time: String,
    pub pending: bool,
}

#[derive(Debug, Serialize)]
pub struct NotificationListItem {
    pub id: String,
    pub document_id: String,
    pub document_title: String,
    pub category: String,
    pub user_id: String,
    pub user_name: String,
    pub created_at: String,
    pub relative_time: String,
    pub read: bool,
}

pub fn document_to_list_item(record: &DocumentRecord, now_ms: i64) -> DocumentListItem {
    DocumentListItem {
        id: record.id.clone(),
        title: record.title.clone(),
        version: record.version.clone(),
        contributors: record
            .contributors
            .iter()
            .map(|contributor| contributor.name.clone())
            .collect(),
        attachments: record.attachments.clone(),
        created_at: record.created_at.to_rfc3339(),
        updated_at: record.updated_at.to_rfc3339(),
        relative_time: format_relative_time(record.created_at.timestamp_millis(), now_ms),
        pending: record.is_temporary(),
    }
}

pub fn notification_to_list_item(entry: &NotificationEvent, now_ms: i64) -> NotificationListItem {
    NotificationListItem {
        id: entry.id.clone(),
        document_id: entry.document_id.clone(),
        document_title: entry.document_title.clone(),
        category: EventCategory::classify(&entry.event_type).to_string(),
        user_id: entry.user_id.clone(),
        user_name: entry.user_name.clone(),
        created_at: entry.created_at.to_rfc3339(),
        relative_time: format_relative_time(entry.created_at.timestamp_millis(), now_ms),
        read: entry.read,
    }
}

pub fn format_document_lines(records: &[DocumentRecord], now_ms: i64) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            let short_id = short_id(&record.id);
            let title = truncate_text(&record.title, 40);
            let version = truncate_text(&record.version, 10);
            let relative_time = format_relative_time(record.created_at.timestamp_millis(), now_ms);

            if record.is_temporary() {
                format!("{short_id:<13}  {title:<40}  {version:<10}  {relative_time:<10}  (pending)")
            } else {
                format!("{short_id:<13}  {title:<40}  {version:<10}  {relative_time}")
            }
        })
        .collect()
}

pub fn format_notification_lines(inbox: &NotificationInbox, now_ms: i64) -> Vec<String> {
    inbox
        .items()
        .iter()
        .map(|entry| {
            let marker = if entry.read { ' ' } else { '*' };
            let short_id = short_id(&entry.id);
            let summary = truncate_text(
                &format!(
                    "{} added \"{}\" ({})",
                    entry.user_name,
                    entry.document_title,
                    EventCategory::classify(&entry.event_type)
                ),
                60,
            );
            let relative_time = format_relative_time(entry.created_at.timestamp_millis(), now_ms);
            format!("{marker} {short_id:<13}  {summary:<60}  {relative_time}")
        })
        .collect()
}

pub fn short_id(id: &str) -> String {
    id.chars().take(SHORT_ID_LEN).collect()
}

pub fn truncate_text(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Resolve a notification id from a full id or a unique prefix.
pub fn resolve_notification_id(inbox: &NotificationInbox, query: &str) -> Result<String, CliError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(CliError::NotificationNotFound(String::new()));
    }
    if inbox.items().iter().any(|entry| entry.id == query) {
        return Ok(query.to_string());
    }

    let matches = inbox
        .items()
        .iter()
        .filter(|entry| entry.id.starts_with(query))
        .map(|entry| entry.id.as_str())
        .collect::<Vec<_>>();

    match matches.as_slice() {
        [] => Err(CliError::NotificationNotFound(query.to_string())),
        [id] => Ok((*id).to_string()),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(|id| short_id(id))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousNotificationId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}
