//! Session configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default polling cadence
pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 10_000;

/// Default number of history points kept for trend display
pub const DEFAULT_HISTORY_CAPACITY: usize = 30;

/// Configuration for a sync session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Selects one of the named `sources` as the snapshot endpoint
    #[serde(default)]
    pub source_selector: Option<String>,

    /// Named snapshot endpoints
    #[serde(default)]
    pub sources: BTreeMap<String, String>,

    /// Snapshot URL override, takes precedence over `source_selector`
    #[serde(default)]
    pub custom_endpoint: Option<String>,

    /// Polling cadence in milliseconds
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,

    /// Push channel base address; absent means polling only
    #[serde(default)]
    pub push_address: Option<String>,

    /// Query parameter carrying the event identifier on the push address
    #[serde(default = "default_push_id_param")]
    pub push_id_param: String,

    /// Maximum number of history points
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Field names read from the snapshot payload
    #[serde(default)]
    pub fields: SnapshotFields,
}

impl SyncConfig {
    /// Load configuration from a YAML, TOML or JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::config(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        let config: SyncConfig = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Check invariants that deserialization cannot express.
    ///
    /// The snapshot endpoint is resolved separately by [`SyncConfig::snapshot_url`]
    /// since sessions driven by a custom source never need one.
    pub fn validate(&self) -> Result<()> {
        if self.polling_interval_ms == 0 {
            return Err(Error::config("polling_interval_ms must be positive"));
        }
        if self.history_capacity == 0 {
            return Err(Error::config("history_capacity must be positive"));
        }
        if self.push_id_param.is_empty() {
            return Err(Error::config("push_id_param must not be empty"));
        }
        self.push_base()?;
        Ok(())
    }

    /// Resolve the snapshot endpoint
    pub fn snapshot_url(&self) -> Result<Url> {
        if let Some(endpoint) = &self.custom_endpoint {
            return Ok(Url::parse(endpoint)?);
        }

        let selector = self
            .source_selector
            .as_deref()
            .ok_or_else(|| Error::config("no custom_endpoint or source_selector configured"))?;

        // File loading lowercases map keys but not the selector value.
        let endpoint = self
            .sources
            .get(selector)
            .or_else(|| {
                self.sources
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(selector))
                    .map(|(_, endpoint)| endpoint)
            })
            .ok_or_else(|| Error::config(format!("unknown source: {}", selector)))?;

        Ok(Url::parse(endpoint)?)
    }

    /// Parsed push base address, if push is configured
    pub fn push_base(&self) -> Result<Option<Url>> {
        self.push_address
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(Error::from)
    }

    /// Push address for a given event identifier
    pub fn push_url(&self, identifier: &str) -> Result<Option<Url>> {
        Ok(self.push_base()?.map(|mut url| {
            url.query_pairs_mut()
                .append_pair(&self.push_id_param, identifier);
            url
        }))
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source_selector: None,
            sources: BTreeMap::new(),
            custom_endpoint: None,
            polling_interval_ms: default_polling_interval_ms(),
            push_address: None,
            push_id_param: default_push_id_param(),
            history_capacity: default_history_capacity(),
            fields: SnapshotFields::default(),
        }
    }
}

/// Keys read from a snapshot payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFields {
    #[serde(default = "default_id_field")]
    pub id: String,

    /// Preferred remaining-count field
    #[serde(default = "default_remaining_field")]
    pub remaining: String,

    /// Fallback when the preferred field is not numeric
    #[serde(default = "default_quota_field")]
    pub quota: String,
}

impl Default for SnapshotFields {
    fn default() -> Self {
        Self {
            id: default_id_field(),
            remaining: default_remaining_field(),
            quota: default_quota_field(),
        }
    }
}

fn default_polling_interval_ms() -> u64 {
    DEFAULT_POLLING_INTERVAL_MS
}

fn default_push_id_param() -> String {
    "eventId".to_string()
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

fn default_id_field() -> String {
    "id".to_string()
}

fn default_remaining_field() -> String {
    "currentQuantity".to_string()
}

fn default_quota_field() -> String {
    "totalQuota".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.polling_interval_ms, 10_000);
        assert_eq!(config.history_capacity, 30);
        assert!(config.push_address.is_none());
    }

    #[test]
    fn test_custom_endpoint_overrides_selector() {
        let mut config = SyncConfig {
            source_selector: Some("main".to_string()),
            ..Default::default()
        };
        config
            .sources
            .insert("main".to_string(), "https://a.example/events".to_string());
        assert_eq!(
            config.snapshot_url().unwrap().as_str(),
            "https://a.example/events"
        );

        config.custom_endpoint = Some("https://b.example/events".to_string());
        assert_eq!(
            config.snapshot_url().unwrap().as_str(),
            "https://b.example/events"
        );
    }

    #[test]
    fn test_unknown_source_rejected() {
        let config = SyncConfig {
            source_selector: Some("missing".to_string()),
            ..Default::default()
        };
        assert!(matches!(config.snapshot_url(), Err(Error::Config(_))));
    }

    #[test]
    fn test_push_url_appends_identifier() {
        let config = SyncConfig {
            push_address: Some("wss://push.example/feed?v=2".to_string()),
            ..Default::default()
        };
        let url = config.push_url("153").unwrap().unwrap();
        assert_eq!(url.as_str(), "wss://push.example/feed?v=2&eventId=153");

        let polling_only = SyncConfig::default();
        assert!(polling_only.push_url("153").unwrap().is_none());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = SyncConfig {
            custom_endpoint: Some("http://localhost/events".to_string()),
            polling_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "custom_endpoint: http://localhost:3000/api/events\n\
             polling_interval_ms: 2500\n\
             push_address: ws://localhost:3000/ws\n\
             fields:\n  remaining: left"
        )
        .unwrap();

        let config = SyncConfig::load(file.path()).unwrap();
        assert_eq!(config.polling_interval_ms, 2500);
        assert_eq!(config.push_address.as_deref(), Some("ws://localhost:3000/ws"));
        assert_eq!(config.fields.remaining, "left");
        assert_eq!(config.fields.quota, "totalQuota");
        assert_eq!(config.history_capacity, 30);
    }

    #[test]
    fn test_load_mixed_case_source_name() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "source_selector: Main\n\
             sources:\n  Main: http://a.example/events\n  Backup: http://b.example/events"
        )
        .unwrap();

        let config = SyncConfig::load(file.path()).unwrap();
        assert_eq!(
            config.snapshot_url().unwrap().as_str(),
            "http://a.example/events"
        );

        let config = SyncConfig {
            source_selector: Some("BACKUP".to_string()),
            ..config
        };
        assert_eq!(
            config.snapshot_url().unwrap().as_str(),
            "http://b.example/events"
        );
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            SyncConfig::load("/nonexistent/ticketsync.yaml"),
            Err(Error::Config(_))
        ));
    }
}
