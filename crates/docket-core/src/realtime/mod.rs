//! Realtime document events over WebSocket.

mod backoff;
mod client;
mod frame;
mod machine;

pub use backoff::BackoffPolicy;
pub use client::{RealtimeClient, RealtimeEvent};
pub use frame::{is_document_created, parse_frame, parse_frame_at, FrameError};
pub use machine::{
    Action, ConnectionMachine, TimerId, ABNORMAL_CLOSURE, NORMAL_CLOSURE, NO_STATUS_RECEIVED,
};
