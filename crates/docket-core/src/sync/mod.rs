//! Sync orchestrator.
//!
//! The single writer path between the realtime stream, the HTTP API and the
//! stores. All of its work runs inside [`SyncOrchestrator::run`], so store
//! mutations never interleave.

mod invalidation;
mod notify;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::MissedTickBehavior;

pub use invalidation::InvalidationQueue;
pub use notify::{AppLifecycle, NotifySink, PermissionGate};

use crate::api::{ApiResult, DocumentApi};
use crate::models::{
    CreateDocumentRequest, DocumentCreatedEvent, DocumentDraft, DocumentRecord, EventCategory,
    NewNotification, Session,
};
use crate::realtime::RealtimeEvent;
use crate::stores::Stores;

/// Default interval between periodic refetches.
pub const DEFAULT_REFETCH_INTERVAL: Duration = Duration::from_secs(30);

/// Title of every new-document notification.
pub const NOTIFICATION_TITLE: &str = "📄 New document";

/// Body text for a new-document notification.
pub fn notification_body(event: &DocumentCreatedEvent) -> String {
    format!(
        "{} added \"{}\" ({})",
        event.user_name,
        event.document_title,
        event.category()
    )
}

/// How a document-created event was routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Toast,
    Scheduled,
    /// Backgrounded without notification permission.
    Suppressed,
}

/// Result of handling one document-created event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The event was caused by the local user.
    SelfEcho,
    Routed {
        category: EventCategory,
        /// `false` when the inbox already held an entry for the document.
        inserted: bool,
        delivery: Delivery,
    },
}

pub struct SyncOrchestrator<A, N, L> {
    stores: Stores,
    api: A,
    sink: N,
    lifecycle: L,
    session: Session,
    permission: PermissionGate,
    invalidations: Arc<InvalidationQueue>,
    refetch_interval: Duration,
}

impl<A, N, L> SyncOrchestrator<A, N, L>
where
    A: DocumentApi,
    N: NotifySink,
    L: AppLifecycle,
{
    pub fn new(stores: Stores, api: A, sink: N, lifecycle: L, session: Session) -> Self {
        Self {
            stores,
            api,
            sink,
            lifecycle,
            session,
            permission: PermissionGate::new(),
            invalidations: Arc::new(InvalidationQueue::new()),
            refetch_interval: DEFAULT_REFETCH_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_refetch_interval(mut self, interval: Duration) -> Self {
        self.refetch_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub const fn stores(&self) -> &Stores {
        &self.stores
    }

    pub const fn session(&self) -> &Session {
        &self.session
    }

    pub const fn permission(&self) -> &PermissionGate {
        &self.permission
    }

    /// Shared handle for requesting a refetch from outside the run loop.
    pub fn invalidations(&self) -> Arc<InvalidationQueue> {
        Arc::clone(&self.invalidations)
    }

    /// Drive the orchestrator until `shutdown` resolves.
    ///
    /// Refetches once immediately, then on every interval tick and whenever
    /// an invalidation is requested.
    pub async fn run(
        &self,
        mut events: broadcast::Receiver<RealtimeEvent>,
        shutdown: impl Future<Output = ()>,
    ) {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(self.refetch_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut events_open = true;

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => self.refresh_logged().await,
                requests = self.invalidations.wait() => {
                    tracing::debug!("Refetching after {requests} invalidation request(s)");
                    self.refresh_logged().await;
                }
                received = events.recv(), if events_open => match received {
                    Ok(RealtimeEvent::DocumentCreated(event)) => {
                        self.handle_document_created(event).await;
                    }
                    Ok(RealtimeEvent::StateChanged(state)) => {
                        tracing::debug!("Realtime connection is {state}");
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Missed {skipped} realtime events; refetching");
                        self.invalidations.request();
                    }
                    Err(RecvError::Closed) => {
                        tracing::info!("Realtime event stream closed");
                        events_open = false;
                    }
                },
            }
        }
        tracing::debug!("Sync orchestrator stopped");
    }

    /// Ingest one document-created event.
    pub async fn handle_document_created(&self, event: DocumentCreatedEvent) -> EventOutcome {
        if event.user_id == self.session.user_id() {
            tracing::debug!("Ignoring self-echo for document {}", event.document_id);
            return EventOutcome::SelfEcho;
        }

        let category = event.category();
        if category == EventCategory::Real {
            self.invalidations.request();
        }

        let notification = NewNotification::from(&event);
        let inserted = self
            .stores
            .update_inbox(|inbox| inbox.add(notification).is_some())
            .await;

        let delivery = self.route(&event).await;
        tracing::info!(
            "Document {} ({category}) from {}: {delivery:?}",
            event.document_id,
            event.user_name
        );
        EventOutcome::Routed {
            category,
            inserted,
            delivery,
        }
    }

    async fn route(&self, event: &DocumentCreatedEvent) -> Delivery {
        if self.permission.can_prompt() {
            self.permission.validate(&self.sink).await;
        }

        let body = notification_body(event);
        if self.lifecycle.is_foreground() {
            self.sink.show_foreground_toast(NOTIFICATION_TITLE, &body).await;
            return Delivery::Toast;
        }
        if !self.permission.is_valid() {
            return Delivery::Suppressed;
        }

        let payload = match serde_json::to_value(event) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::warn!("Failed to encode notification payload: {error}");
                serde_json::Value::Null
            }
        };
        self.sink
            .schedule_background_notification(NOTIFICATION_TITLE, &body, &payload)
            .await;
        Delivery::Scheduled
    }

    /// Fetch every document and replace the cache, or record the failure.
    pub async fn refresh(&self) -> ApiResult<usize> {
        let started = Instant::now();
        match self.api.fetch_documents().await {
            Ok(items) => {
                let count = items.len();
                self.stores.update_cache(|cache| cache.set_items(items)).await;
                tracing::debug!(
                    "Fetched {count} documents in {} ms",
                    started.elapsed().as_millis()
                );
                Ok(count)
            }
            Err(error) => {
                let message = error.user_message();
                tracing::warn!("Document fetch failed: {message}");
                self.stores
                    .update_cache(|cache| cache.set_network_error(message))
                    .await;
                Err(error)
            }
        }
    }

    async fn refresh_logged(&self) {
        // Failures are already recorded on the cache.
        let _ = self.refresh().await;
    }

    /// Create a document with an optimistic placeholder.
    ///
    /// The placeholder is rolled back if the remote call fails. On success it
    /// stays until the requested refetch replaces the list.
    pub async fn create_document(&self, draft: DocumentDraft) -> ApiResult<CreateDocumentRequest> {
        let request = CreateDocumentRequest::new(&draft, self.session.user());
        let placeholder = DocumentRecord::optimistic(&draft);
        let token = self
            .stores
            .update_cache(|cache| cache.optimistic_insert(placeholder))
            .await;

        match self.api.create_document(&request).await {
            Ok(()) => {
                tracing::info!("Created document {}", request.id);
                self.invalidations.request();
                Ok(request)
            }
            Err(error) => {
                tracing::warn!("Create failed, rolling back {}: {error}", token.temp_id());
                self.stores.update_cache(|cache| cache.rollback(token)).await;
                Err(error)
            }
        }
    }

    /// Handle a tap on a delivered notification.
    ///
    /// Returns the inbox entry to scroll to, if the document has one.
    pub async fn open_notification(&self, document_id: &str) -> Option<String> {
        self.stores
            .update_inbox(|inbox| inbox.focus_document(document_id).map(ToString::to_string))
            .await
    }
}
