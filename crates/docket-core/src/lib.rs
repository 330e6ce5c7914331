//! docket-core - Core library for Docket
//!
//! This crate contains the models, realtime client, offline document cache,
//! notification inbox, persistence and sync logic shared by Docket front-ends.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod inbox;
pub mod models;
pub mod realtime;
pub mod services;
pub mod state;
pub mod stores;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use state::{ConnectionState, NetworkStatus};
pub use stores::Stores;
