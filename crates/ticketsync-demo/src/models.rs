use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Mock feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub event_id: u64,
    pub name: String,
    pub total_quota: u64,
    pub remaining: u64,
    /// Automatic sales per second, 0 disables the generator at startup
    pub sales_rate: f64,
    /// Largest batch sold in one automatic sale
    pub max_batch: u32,
    /// Accept cross-origin requests from anywhere instead of local dev origins
    pub allow_any_origin: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            event_id: 153,
            name: "Spring Festival".to_string(),
            total_quota: 30_000,
            remaining: 29_300,
            sales_rate: 0.0,
            max_batch: 4,
            allow_any_origin: false,
        }
    }
}

/// One ticketed event, as served by the snapshot endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketEvent {
    pub id: u64,
    pub name: String,
    pub current_quantity: u64,
    pub total_quota: u64,
    pub starts_at: DateTime<Utc>,
}

impl TicketEvent {
    pub fn from_config(config: &FeedConfig) -> Self {
        Self {
            id: config.event_id,
            name: config.name.clone(),
            current_quantity: config.remaining.min(config.total_quota),
            total_quota: config.total_quota,
            starts_at: Utc::now() + Duration::days(7),
        }
    }

    pub fn push_payload(&self) -> PushPayload {
        PushPayload {
            identifier: self.id.to_string(),
            remaining: self.current_quantity,
        }
    }
}

/// Message sent to push clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPayload {
    pub identifier: String,
    pub remaining: u64,
}

/// Events broadcast inside the feed server
#[derive(Debug, Clone)]
pub enum FeedEvent {
    RemainingChanged(PushPayload),
    /// Ask every push connection to close
    DisconnectPush,
    SalesStateChanged(SalesState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalesState {
    Running,
    Stopped,
}

/// Automatic sales parameters
#[derive(Debug, Clone)]
pub struct SalesConfig {
    pub rate: f64,
    pub max_batch: u32,
    pub duration_secs: Option<u64>,
}
