//! ticketsync Core
//!
//! Types and synchronous building blocks shared across ticketsync components.
//!
//! This crate provides:
//! - The snapshot, history and update types observed by the presentation layer
//! - Error types and result handling
//! - The push-vs-poll state machine
//! - A bounded history buffer and local purchase simulation
//! - Session configuration loading

pub mod config;
pub mod error;
pub mod event_bus;
pub mod history;
pub mod machine;
pub mod purchase;
pub mod types;

pub use config::{SnapshotFields, SyncConfig};
pub use error::{Error, Result};
pub use event_bus::EventBus;
pub use history::HistoryBuffer;
pub use machine::SyncStateMachine;
pub use purchase::{simulate, PurchaseSimulator, DEFAULT_QUANTITY};
pub use types::{
    ChannelMode, HistoryPoint, PushMessage, Snapshot, SyncState, SyncStatus, SyncUpdate,
    UpdateOrigin,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{ChannelMode, HistoryPoint, Snapshot, SyncState, SyncStatus, SyncUpdate};
    pub use crate::config::SyncConfig;
}
