use chrono::Utc;
use docket_core::models::{EventCategory, NotificationEvent};
use docket_core::Stores;

use crate::cli::InboxCommands;
use crate::commands::common::{
    format_notification_lines, format_relative_time, notification_to_list_item,
    resolve_notification_id, AppContext, NotificationListItem,
};
use crate::error::CliError;

pub async fn run_inbox(
    ctx: &AppContext,
    command: Option<InboxCommands>,
    as_json: bool,
) -> Result<(), CliError> {
    match command {
        None => print_inbox(&ctx.stores, as_json).await,
        Some(InboxCommands::Read { id, all }) => {
            let marked = mark_read(&ctx.stores, id.as_deref(), all).await?;
            println!("Marked {marked} notification(s) as read");
            Ok(())
        }
        Some(InboxCommands::Clear) => {
            let removed = clear_inbox(&ctx.stores).await;
            println!("Removed {removed} notification(s)");
            Ok(())
        }
        Some(InboxCommands::Open { document_id }) => {
            let entry = open_document(ctx, &document_id).await?;
            let now_ms = Utc::now().timestamp_millis();
            println!("{}  {}", entry.document_id, entry.document_title);
            println!(
                "  {} by {}, {}",
                EventCategory::classify(&entry.event_type),
                entry.user_name,
                format_relative_time(entry.created_at.timestamp_millis(), now_ms)
            );
            Ok(())
        }
    }
}

async fn print_inbox(stores: &Stores, as_json: bool) -> Result<(), CliError> {
    let inbox = stores.inbox().await;
    let now_ms = Utc::now().timestamp_millis();

    if as_json {
        let json_items = inbox
            .items()
            .iter()
            .map(|entry| notification_to_list_item(entry, now_ms))
            .collect::<Vec<NotificationListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if inbox.items().is_empty() {
        println!("No notifications");
        return Ok(());
    }

    println!(
        "{} notification(s), {} unread",
        inbox.items().len(),
        inbox.unread_badge()
    );
    for line in format_notification_lines(&inbox, now_ms) {
        println!("{line}");
    }
    Ok(())
}

/// Mark one notification (by id or unique prefix) or all of them as read.
///
/// Returns how many entries changed from unread to read.
pub async fn mark_read(stores: &Stores, id: Option<&str>, all: bool) -> Result<usize, CliError> {
    let unread_before = stores.inbox().await.unread_count();

    if all {
        stores.update_inbox(|inbox| inbox.mark_all_read()).await;
    } else {
        let query = id.ok_or(CliError::MissingNotificationId)?;
        let resolved = resolve_notification_id(&*stores.inbox().await, query)?;
        stores.update_inbox(|inbox| inbox.mark_read(&resolved)).await;
    }

    let unread_after = stores.inbox().await.unread_count();
    Ok(unread_before.saturating_sub(unread_after))
}

pub async fn clear_inbox(stores: &Stores) -> usize {
    stores
        .update_inbox(|inbox| {
            let removed = inbox.items().len();
            inbox.clear();
            removed
        })
        .await
}

/// Focus the entry for `document_id` through the tap path and mark it read.
pub async fn open_document(
    ctx: &AppContext,
    document_id: &str,
) -> Result<NotificationEvent, CliError> {
    let orchestrator = ctx.orchestrator(true)?;
    let target = orchestrator
        .open_notification(document_id)
        .await
        .ok_or_else(|| CliError::DocumentNotInInbox(document_id.to_string()))?;

    ctx.stores
        .update_inbox(|inbox| {
            inbox.mark_read(&target);
            inbox.items().iter().find(|entry| entry.id == target).cloned()
        })
        .await
        .ok_or_else(|| CliError::DocumentNotInInbox(document_id.to_string()))
}
