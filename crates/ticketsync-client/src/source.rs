//! Snapshot fetching from the remote event endpoint

use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use serde_json::Value;
use ticketsync_core::{Error, Result, Snapshot, SnapshotFields};
use url::Url;

/// Anything that can produce the current event snapshot
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch the current snapshot. No retries: callers poll again.
    async fn fetch_snapshot(&self) -> Result<Snapshot>;
}

/// Snapshot source backed by an HTTP endpoint returning a JSON array
pub struct HttpSnapshotSource {
    client: reqwest::Client,
    url: Url,
    fields: SnapshotFields,
}

impl HttpSnapshotSource {
    pub fn new(url: Url, fields: SnapshotFields) -> Self {
        Self::with_client(reqwest::Client::new(), url, fields)
    }

    pub fn with_client(client: reqwest::Client, url: Url, fields: SnapshotFields) -> Self {
        Self {
            client,
            url,
            fields,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn fetch_snapshot(&self) -> Result<Snapshot> {
        fetch_snapshot(&self.client, &self.url, &self.fields).await
    }
}

/// Issue a non-cached GET and take the first element of the array payload
pub async fn fetch_snapshot(
    client: &reqwest::Client,
    url: &Url,
    fields: &SnapshotFields,
) -> Result<Snapshot> {
    let response = client
        .get(url.clone())
        .header(CACHE_CONTROL, "no-cache")
        .header(PRAGMA, "no-cache")
        .send()
        .await
        .map_err(|e| Error::network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::network(format!("{} returned {}", url, status)));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| Error::network(e.to_string()))?;

    parse_snapshot_body(&body, fields)
}

/// Decode a snapshot response body
pub fn parse_snapshot_body(body: &[u8], fields: &SnapshotFields) -> Result<Snapshot> {
    let payload: Value = serde_json::from_slice(body)
        .map_err(|e| Error::empty_result(format!("payload is not JSON: {}", e)))?;

    match payload {
        Value::Array(items) => items
            .into_iter()
            .next()
            .map(|first| Snapshot::from_payload(first, fields))
            .ok_or_else(|| Error::empty_result("empty array")),
        _ => Err(Error::empty_result("payload is not an array")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_takes_first_element() {
        let body = br#"[{"id":153,"currentQuantity":29300},{"id":154,"currentQuantity":1}]"#;
        let snapshot = parse_snapshot_body(body, &SnapshotFields::default()).unwrap();
        assert_eq!(snapshot.id.as_deref(), Some("153"));
        assert_eq!(snapshot.remaining, Some(29300));
    }

    #[test]
    fn test_empty_and_non_array_payloads() {
        let fields = SnapshotFields::default();
        assert!(matches!(
            parse_snapshot_body(b"[]", &fields),
            Err(Error::EmptyResult(_))
        ));
        assert!(matches!(
            parse_snapshot_body(br#"{"id":1}"#, &fields),
            Err(Error::EmptyResult(_))
        ));
        assert!(matches!(
            parse_snapshot_body(b"<html>", &fields),
            Err(Error::EmptyResult(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let url = Url::parse("http://127.0.0.1:9/events").unwrap();
        let source = HttpSnapshotSource::new(url, SnapshotFields::default());
        assert!(matches!(
            source.fetch_snapshot().await,
            Err(Error::Network(_))
        ));
    }
}
