//! Services shared by every Docket front-end.

mod persistence;

pub use persistence::{PersistenceService, STATE_VERSION};
