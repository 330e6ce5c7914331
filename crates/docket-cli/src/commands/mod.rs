pub mod common;
pub mod completions;
pub mod create;
pub mod inbox;
pub mod list;
pub mod status;
pub mod watch;
