//! Terminal notify-sink.

use docket_core::sync::NotifySink;
use docket_core::util::compact_text;
use serde_json::Value;

/// Prints notifications to stdout.
///
/// A terminal can always print, so permission is granted without a prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl NotifySink for ConsoleNotifier {
    async fn show_foreground_toast(&self, title: &str, body: &str) {
        println!("{title}  {body}");
    }

    async fn schedule_background_notification(&self, title: &str, body: &str, payload: &Value) {
        println!("[scheduled] {title}  {body}");
        tracing::debug!("Notification payload: {}", compact_text(&payload.to_string()));
    }

    async fn has_notification_permission(&self) -> bool {
        true
    }

    async fn request_notification_permission(&self) -> bool {
        true
    }
}
