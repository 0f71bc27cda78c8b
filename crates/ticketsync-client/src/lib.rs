//! ticketsync Client
//!
//! Keeps a remaining-ticket count fresh: fetches the event snapshot over
//! HTTP, upgrades to a WebSocket push channel when one is configured, and
//! falls back to periodic polling when the push channel cannot be opened or
//! drops.

pub mod push;
pub mod session;
pub mod source;

pub use push::{PushChannel, PushConnector, WebSocketChannel, WebSocketConnector};
pub use session::SyncSession;
pub use source::{fetch_snapshot, parse_snapshot_body, HttpSnapshotSource, SnapshotSource};
