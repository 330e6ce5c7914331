//! Reconnecting WebSocket client for document events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::frame::parse_frame;
use super::machine::{Action, ConnectionMachine, ABNORMAL_CLOSURE, NORMAL_CLOSURE, NO_STATUS_RECEIVED};
use super::BackoffPolicy;
use crate::models::DocumentCreatedEvent;
use crate::state::ConnectionState;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const EVENT_CAPACITY: usize = 64;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Something observed on the realtime connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeEvent {
    DocumentCreated(DocumentCreatedEvent),
    StateChanged(ConnectionState),
}

struct RunningTask {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Keeps one WebSocket connection alive until stopped or closed normally.
///
/// Every frame is delivered to each subscriber; slow subscribers may lag and
/// miss events rather than stall the connection.
pub struct RealtimeClient {
    url: String,
    policy: BackoffPolicy,
    events: broadcast::Sender<RealtimeEvent>,
    state: Arc<watch::Sender<ConnectionState>>,
    task: Mutex<Option<RunningTask>>,
    terminated: Arc<AtomicBool>,
}

impl std::fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("url", &self.url)
            .field("policy", &self.policy)
            .field("state", &self.state())
            .field("terminated", &self.is_terminated())
            .finish_non_exhaustive()
    }
}

impl RealtimeClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_policy(url, BackoffPolicy::default())
    }

    pub fn with_policy(url: impl Into<String>, policy: BackoffPolicy) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            url: url.into(),
            policy,
            events,
            state: Arc::new(state),
            task: Mutex::new(None),
            terminated: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Subscribe to events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.events.subscribe()
    }

    /// Watch the connection state.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Whether a stop or a normal closure has ended this client for good.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Start the connection loop. Calling it again while running, or after
    /// termination, does nothing.
    pub async fn start(&self) {
        if self.is_terminated() {
            tracing::debug!("Realtime client already terminated; ignoring start");
            return;
        }

        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|running| !running.handle.is_finished()) {
            return;
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let driver = Driver {
            url: self.url.clone(),
            machine: ConnectionMachine::new(self.policy),
            events: self.events.clone(),
            state: Arc::clone(&self.state),
            terminated: Arc::clone(&self.terminated),
            shutdown: shutdown_rx,
        };
        let handle = tokio::spawn(driver.run());
        *task = Some(RunningTask {
            shutdown: shutdown_tx,
            handle,
        });
        tracing::info!("Realtime client started for {}", self.url);
    }

    /// Close the connection with a normal closure and cancel any pending
    /// reconnect. The client cannot be restarted afterwards.
    pub async fn stop(&self) {
        self.terminated.store(true, Ordering::SeqCst);
        let running = self.task.lock().await.take();
        let Some(running) = running else {
            return;
        };

        // The driver may already have exited after a normal closure.
        let _ = running.shutdown.send(());
        if let Err(error) = running.handle.await {
            tracing::warn!("Realtime driver task failed: {error}");
        }
        tracing::info!("Realtime client stopped");
    }
}

enum SessionEnd {
    Closed(u16),
    ShutdownRequested(Box<WsStream>),
}

struct Driver {
    url: String,
    machine: ConnectionMachine,
    events: broadcast::Sender<RealtimeEvent>,
    state: Arc<watch::Sender<ConnectionState>>,
    terminated: Arc<AtomicBool>,
    shutdown: oneshot::Receiver<()>,
}

impl Driver {
    async fn run(mut self) {
        let mut action = self.machine.start();
        loop {
            self.publish_state();
            action = match action {
                Action::Connect => self.connect().await,
                Action::ScheduleReconnect { timer, delay, .. } => {
                    tracing::info!("Reconnecting in {} ms", delay.as_millis());
                    let fired = tokio::select! {
                        _ = &mut self.shutdown => false,
                        () = tokio::time::sleep(delay) => true,
                    };
                    if fired {
                        self.machine.timer_fired(timer)
                    } else {
                        self.machine.stop()
                    }
                }
                Action::Shutdown { .. } | Action::Idle => break,
            };
        }

        if self.machine.is_terminated() {
            self.terminated.store(true, Ordering::SeqCst);
        }
        self.publish_state();
        if self.machine.state() == ConnectionState::Closing {
            self.machine.closed(NORMAL_CLOSURE);
            self.publish_state();
        }
        tracing::debug!("Realtime driver exited");
    }

    async fn connect(&mut self) -> Action {
        let connected = tokio::select! {
            _ = &mut self.shutdown => None,
            result = tokio_tungstenite::connect_async(self.url.as_str()) => Some(result),
        };

        let ws = match connected {
            None => {
                let action = self.machine.stop();
                self.publish_state();
                self.machine.closed(NORMAL_CLOSURE);
                return action;
            }
            Some(Ok((ws, _response))) => ws,
            Some(Err(error)) => {
                tracing::warn!("Realtime connect to {} failed: {error}", self.url);
                return self.machine.connect_failed();
            }
        };

        self.machine.opened();
        self.publish_state();
        tracing::info!("Realtime connection open");

        match self.read_session(ws).await {
            SessionEnd::Closed(code) => {
                tracing::info!("Realtime connection closed with code {code}");
                self.machine.closed(code)
            }
            SessionEnd::ShutdownRequested(mut ws) => {
                let action = self.machine.stop();
                self.publish_state();
                close_normally(&mut ws).await;
                self.machine.closed(NORMAL_CLOSURE);
                action
            }
        }
    }

    async fn read_session(&mut self, mut ws: WsStream) -> SessionEnd {
        loop {
            let next = tokio::select! {
                _ = &mut self.shutdown => None,
                message = ws.next() => Some(message),
            };
            let Some(message) = next else {
                return SessionEnd::ShutdownRequested(Box::new(ws));
            };

            match message {
                Some(Ok(Message::Text(text))) => self.dispatch(text.as_str()),
                Some(Ok(Message::Close(frame))) => {
                    return SessionEnd::Closed(
                        frame.map_or(NO_STATUS_RECEIVED, |frame| u16::from(frame.code)),
                    );
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    tracing::warn!("Realtime connection error: {error}");
                    return SessionEnd::Closed(ABNORMAL_CLOSURE);
                }
                None => return SessionEnd::Closed(ABNORMAL_CLOSURE),
            }
        }
    }

    fn dispatch(&self, text: &str) {
        match parse_frame(text) {
            Ok(Some(event)) => {
                tracing::debug!("Received {} for document {}", event.event_type, event.document_id);
                let _ = self.events.send(RealtimeEvent::DocumentCreated(event));
            }
            Ok(None) => tracing::trace!("Ignoring unhandled realtime frame"),
            Err(error) => tracing::warn!("Dropping malformed realtime frame: {error}"),
        }
    }

    fn publish_state(&self) {
        let next = self.machine.state();
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            tracing::debug!("Realtime state: {next}");
            let _ = self.events.send(RealtimeEvent::StateChanged(next));
        }
    }
}

async fn close_normally(ws: &mut WsStream) {
    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: "client shutdown".into(),
    };
    if let Err(error) = ws.close(Some(frame)).await {
        tracing::debug!("Sending close frame failed: {error}");
        return;
    }
    let drained = tokio::time::timeout(CLOSE_TIMEOUT, async {
        while let Some(Ok(_)) = ws.next().await {}
    })
    .await;
    if drained.is_err() {
        tracing::debug!("Timed out waiting for close acknowledgement");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::SinkExt;
    use pretty_assertions::assert_eq;
    use tokio::net::TcpListener;

    const WAIT: Duration = Duration::from_secs(5);

    fn fast_policy() -> BackoffPolicy {
        BackoffPolicy::new(Duration::from_millis(10), Duration::from_millis(50), 10)
    }

    async fn listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        (listener, url)
    }

    async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
        let (stream, _) = tokio::time::timeout(WAIT, listener.accept())
            .await
            .unwrap()
            .unwrap();
        tokio_tungstenite::accept_async(stream).await.unwrap()
    }

    fn frame(document_id: &str) -> Message {
        Message::text(format!(
            r#"{{"type":"document.created","user_id":"u1","user_name":"Ada","document_id":"{document_id}","document_title":"Spec","timestamp":"2024-05-01T12:00:00Z"}}"#
        ))
    }

    async fn next_document(events: &mut broadcast::Receiver<RealtimeEvent>) -> DocumentCreatedEvent {
        tokio::time::timeout(WAIT, async {
            loop {
                if let RealtimeEvent::DocumentCreated(event) = events.recv().await.unwrap() {
                    return event;
                }
            }
        })
        .await
        .unwrap()
    }

    async fn wait_for_state(client: &RealtimeClient, expected: ConnectionState) {
        let mut state = client.watch_state();
        tokio::time::timeout(WAIT, state.wait_for(|current| *current == expected))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delivers_document_frames_and_skips_malformed_ones() {
        let (listener, url) = listener().await;
        let client = RealtimeClient::with_policy(url, fast_policy());
        let mut events = client.subscribe();
        client.start().await;

        let mut server = accept(&listener).await;
        server.send(Message::text("{not json")).await.unwrap();
        server.send(frame("d1")).await.unwrap();

        let event = next_document(&mut events).await;
        assert_eq!(event.document_id, "d1");
        assert_eq!(event.user_name, "Ada");
        assert_eq!(client.state(), ConnectionState::Connected);

        client.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reconnects_after_dropped_connection() {
        let (listener, url) = listener().await;
        let client = RealtimeClient::with_policy(url, fast_policy());
        let mut events = client.subscribe();
        client.start().await;

        let first = accept(&listener).await;
        drop(first);

        let mut second = accept(&listener).await;
        second.send(frame("d2")).await.unwrap();
        assert_eq!(next_document(&mut events).await.document_id, "d2");
        assert!(!client.is_terminated());

        client.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn normal_server_close_is_terminal() {
        let (listener, url) = listener().await;
        let client = RealtimeClient::with_policy(url, fast_policy());
        client.start().await;

        let mut server = accept(&listener).await;
        wait_for_state(&client, ConnectionState::Connected).await;
        let mut events = client.subscribe();
        server
            .close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "bye".into(),
            }))
            .await
            .unwrap();

        let mut seen = Vec::new();
        tokio::time::timeout(WAIT, async {
            while let Ok(event) = events.recv().await {
                if let RealtimeEvent::StateChanged(state) = event {
                    seen.push(state);
                    if state == ConnectionState::Disconnected {
                        break;
                    }
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(
            seen,
            vec![ConnectionState::Closing, ConnectionState::Disconnected]
        );
        assert_eq!(client.state(), ConnectionState::Disconnected);

        let reconnect = tokio::time::timeout(Duration::from_millis(300), listener.accept()).await;
        assert!(reconnect.is_err());
        assert!(client.is_terminated());

        client.start().await;
        let restart = tokio::time::timeout(Duration::from_millis(200), listener.accept()).await;
        assert!(restart.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_sends_normal_close() {
        let (listener, url) = listener().await;
        let client = RealtimeClient::with_policy(url, fast_policy());
        client.start().await;

        let mut server = accept(&listener).await;
        wait_for_state(&client, ConnectionState::Connected).await;

        let (_, received) = tokio::join!(client.stop(), async {
            loop {
                match server.next().await {
                    Some(Ok(Message::Close(frame))) => return frame,
                    Some(Ok(_)) => {}
                    _ => return None,
                }
            }
        });

        assert_eq!(received.map(|frame| frame.code), Some(CloseCode::Normal));
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(client.is_terminated());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_during_handshake_disconnects() {
        let (listener, url) = listener().await;
        let held = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(WAIT).await;
            drop(stream);
        });

        let client = RealtimeClient::with_policy(url, fast_policy());
        client.start().await;
        wait_for_state(&client, ConnectionState::Connecting).await;

        tokio::time::timeout(WAIT, client.stop()).await.unwrap();
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(*client.watch_state().borrow(), ConnectionState::Disconnected);
        assert!(client.is_terminated());

        held.abort();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_cancels_pending_reconnect() {
        let (listener, url) = listener().await;
        drop(listener);
        let client = RealtimeClient::with_policy(
            url,
            BackoffPolicy::new(Duration::from_secs(60), Duration::from_secs(60), 10),
        );
        client.start().await;
        wait_for_state(&client, ConnectionState::Disconnected).await;

        tokio::time::timeout(WAIT, client.stop()).await.unwrap();
        assert!(client.is_terminated());
    }
}
