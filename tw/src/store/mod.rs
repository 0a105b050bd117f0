//! Table store with actor pattern
//!
//! StoreManager owns the loaded table and processes messages via channels, so
//! foreground commands and watcher reloads are applied one at a time.

mod manager;
mod messages;
mod persistence;

pub use manager::StoreManager;
pub use messages::{LoadSummary, SaveSummary, StoreCommand, StoreError, StoreEvent, StoreResponse, StoreStatus};
pub use persistence::write_atomic;
