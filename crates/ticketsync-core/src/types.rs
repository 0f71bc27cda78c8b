//! Core types for ticketsync

use crate::config::SnapshotFields;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Latest known state of a ticketed event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Opaque identifier used to address the push channel
    pub id: Option<String>,

    /// Remaining tickets, absent until a numeric count has been observed
    pub remaining: Option<u64>,

    /// Raw payload, passed through untouched for display
    #[serde(default)]
    pub metadata: Value,
}

impl Snapshot {
    /// Build a snapshot from one element of the endpoint's array payload
    ///
    /// The remaining count prefers the current-quantity field and falls back
    /// to the total-quota field; if neither is numeric it stays unset.
    pub fn from_payload(payload: Value, fields: &SnapshotFields) -> Self {
        let id = payload.get(&fields.id).and_then(identifier_from_value);
        let remaining = payload
            .get(&fields.remaining)
            .and_then(remaining_from_value)
            .or_else(|| payload.get(&fields.quota).and_then(remaining_from_value));

        Self {
            id,
            remaining,
            metadata: payload,
        }
    }

    /// Merge a freshly fetched snapshot into this one.
    ///
    /// Identifier and metadata are replaced; the remaining count is only
    /// replaced when the fresh snapshot carries one.
    pub fn merge(&mut self, fresh: Snapshot) {
        if fresh.id.is_some() {
            self.id = fresh.id;
        }
        if fresh.remaining.is_some() {
            self.remaining = fresh.remaining;
        }
        self.metadata = fresh.metadata;
    }

    /// Identifier usable for opening a push channel
    pub fn push_identifier(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Convert a JSON number into a remaining-ticket count.
///
/// Negative values clamp to zero and fractions truncate; anything that is
/// not a JSON number yields `None`.
pub fn remaining_from_value(value: &Value) -> Option<u64> {
    let Value::Number(number) = value else {
        return None;
    };
    if let Some(n) = number.as_u64() {
        return Some(n);
    }
    if number.as_i64().is_some() {
        return Some(0);
    }
    let f = number.as_f64()?;
    if !f.is_finite() {
        return None;
    }
    Some(if f <= 0.0 { 0 } else { f.trunc() as u64 })
}

fn identifier_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Inbound push message, recognized shape `{ identifier, remaining }`.
///
/// Only `remaining` is read; every other key is ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct PushMessage {
    pub remaining: Option<u64>,
}

impl PushMessage {
    /// Parse a raw text frame. Non-object JSON yields no count.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| Error::malformed(e.to_string()))?;
        Ok(Self {
            remaining: value
                .as_object()
                .and_then(|object| object.get("remaining"))
                .and_then(remaining_from_value),
        })
    }

    /// Parse a raw text frame.
    ///
    /// Returns `Ok(None)` for well-formed JSON without a numeric remaining
    /// count, which callers ignore.
    pub fn parse_remaining(text: &str) -> Result<Option<u64>> {
        Ok(Self::parse(text)?.remaining)
    }
}

/// A single observation of the remaining-ticket count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub remaining: u64,
}

/// Currently active synchronization transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChannelMode {
    #[default]
    None,
    Push,
    Poll,
}

/// State of the sync state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Init,
    Polling,
    PushConnecting,
    PushOpen,
    Stopped,
}

impl SyncState {
    /// Transport mode implied by this state
    pub fn mode(self) -> ChannelMode {
        match self {
            Self::Polling => ChannelMode::Poll,
            Self::PushOpen => ChannelMode::Push,
            Self::Init | Self::PushConnecting | Self::Stopped => ChannelMode::None,
        }
    }
}

/// What produced an update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOrigin {
    InitialFetch,
    Poll,
    Push,
    Purchase,
    ModeChange,
}

impl UpdateOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitialFetch => "initial_fetch",
            Self::Poll => "poll",
            Self::Push => "push",
            Self::Purchase => "purchase",
            Self::ModeChange => "mode_change",
        }
    }
}

/// Update published to session subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncUpdate {
    pub mode: ChannelMode,
    pub state: SyncState,
    pub remaining: Option<u64>,
    pub origin: UpdateOrigin,
    pub at: DateTime<Utc>,
}

/// Observable copy of a session's state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub state: SyncState,
    pub mode: ChannelMode,
    pub snapshot: Option<Snapshot>,
    pub history: Vec<HistoryPoint>,
}

impl SyncStatus {
    /// Last known remaining-ticket count
    pub fn remaining(&self) -> Option<u64> {
        self.snapshot.as_ref().and_then(|s| s.remaining)
    }
}
