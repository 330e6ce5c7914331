//! Notification delivery seams: the sink, the foreground probe and the
//! permission gate.

use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;

/// Where user-facing notifications go. Implemented by the host UI.
#[allow(async_fn_in_trait)]
pub trait NotifySink {
    async fn show_foreground_toast(&self, title: &str, body: &str);

    async fn schedule_background_notification(&self, title: &str, body: &str, payload: &Value);

    async fn has_notification_permission(&self) -> bool;

    /// Prompt the user. Returns whether permission was granted.
    async fn request_notification_permission(&self) -> bool;
}

/// Reports whether the app is currently in the foreground.
pub trait AppLifecycle {
    fn is_foreground(&self) -> bool;
}

impl<F> AppLifecycle for F
where
    F: Fn() -> bool,
{
    fn is_foreground(&self) -> bool {
        self()
    }
}

/// Tracks notification permission across events.
///
/// A denied prompt disables further prompts for the life of the gate, and a
/// call that arrives while a prompt is outstanding reports "not valid"
/// instead of stacking a second prompt.
#[derive(Debug)]
pub struct PermissionGate {
    can_prompt: AtomicBool,
    valid: AtomicBool,
    prompting: AtomicBool,
}

impl Default for PermissionGate {
    fn default() -> Self {
        Self {
            can_prompt: AtomicBool::new(true),
            valid: AtomicBool::new(false),
            prompting: AtomicBool::new(false),
        }
    }
}

impl PermissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a permission prompt may still be shown.
    pub fn can_prompt(&self) -> bool {
        self.can_prompt.load(Ordering::SeqCst)
    }

    /// Outcome of the last validation.
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    /// Check permission, prompting at most once per denial.
    pub async fn validate<N: NotifySink>(&self, sink: &N) -> bool {
        if sink.has_notification_permission().await {
            self.valid.store(true, Ordering::SeqCst);
            return true;
        }
        if !self.can_prompt() || self.prompting.swap(true, Ordering::SeqCst) {
            self.valid.store(false, Ordering::SeqCst);
            return false;
        }

        let granted = sink.request_notification_permission().await;
        self.prompting.store(false, Ordering::SeqCst);
        if !granted {
            tracing::info!("Notification permission denied; background notifications disabled");
            self.can_prompt.store(false, Ordering::SeqCst);
        }
        self.valid.store(granted, Ordering::SeqCst);
        granted
    }
}
