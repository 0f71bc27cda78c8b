//! Error types for ticketsync

use crate::types::SyncState;

/// Result type alias using ticketsync's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for ticketsync operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Snapshot endpoint transport failure or non-success status
    #[error("network error: {0}")]
    Network(String),

    /// Snapshot payload was empty, not an array, or not JSON
    #[error("empty result: {0}")]
    EmptyResult(String),

    /// Push channel failed to open
    #[error("push channel failed to open: {0}")]
    ChannelInit(String),

    /// Push channel closed or errored after opening
    #[error("push channel dropped: {0}")]
    ChannelDropped(String),

    /// Push payload could not be parsed
    #[error("malformed push message: {0}")]
    MalformedMessage(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Rejected state machine transition
    #[error("invalid transition from {from:?} to {to:?}")]
    Transition { from: SyncState, to: SyncState },

    /// Purchase quantity must be positive
    #[error("invalid purchase quantity: {0}")]
    InvalidQuantity(u32),

    /// No remaining-ticket count has been observed yet
    #[error("remaining ticket count is not known yet")]
    UnknownRemaining,

    /// The session has been shut down
    #[error("sync session is closed")]
    SessionClosed,

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Address parsing errors
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Create a new network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a new empty-result error
    pub fn empty_result(msg: impl Into<String>) -> Self {
        Self::EmptyResult(msg.into())
    }

    /// Create a new channel-init error
    pub fn channel_init(msg: impl Into<String>) -> Self {
        Self::ChannelInit(msg.into())
    }

    /// Create a new channel-dropped error
    pub fn channel_dropped(msg: impl Into<String>) -> Self {
        Self::ChannelDropped(msg.into())
    }

    /// Create a new malformed-message error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedMessage(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::EmptyResult(_) => "empty_result",
            Self::ChannelInit(_) => "channel_init",
            Self::ChannelDropped(_) => "channel_dropped",
            Self::MalformedMessage(_) => "malformed_message",
            Self::Config(_) => "config",
            Self::Transition { .. } => "transition",
            Self::InvalidQuantity(_) => "invalid_quantity",
            Self::UnknownRemaining => "unknown_remaining",
            Self::SessionClosed => "session_closed",
            Self::Serialization(_) => "serialization",
            Self::Url(_) => "url",
        }
    }
}
