use std::future::Future;
use std::path::Path;
use std::time::Duration;
use ticketsync_client::SyncSession;
use ticketsync_core::{SyncConfig, DEFAULT_QUANTITY};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Instant, Interval};

/// Command-line overrides applied on top of the configuration file
#[derive(Debug, Default, Clone)]
pub struct WatchOverrides {
    pub endpoint: Option<String>,
    pub source: Option<String>,
    pub push: Option<String>,
    pub interval_ms: Option<u64>,
}

/// Load the session configuration, then apply overrides
pub fn load_config(path: Option<&Path>, overrides: WatchOverrides) -> anyhow::Result<SyncConfig> {
    let mut config = match path {
        Some(path) => SyncConfig::load(path)?,
        None => SyncConfig::default(),
    };

    if let Some(endpoint) = overrides.endpoint {
        config.custom_endpoint = Some(endpoint);
    }
    if let Some(source) = overrides.source {
        config.source_selector = Some(source);
    }
    if let Some(push) = overrides.push {
        config.push_address = Some(push);
    }
    if let Some(interval_ms) = overrides.interval_ms {
        config.polling_interval_ms = interval_ms;
    }

    config.validate()?;
    Ok(config)
}

/// Run a session, printing each update as one JSON line, until `stop` resolves
pub async fn run_watch(
    config: SyncConfig,
    purchase_every: Option<u64>,
    stop: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    let session = SyncSession::new(config)?;
    let mut updates = session.subscribe();
    session.start().await?;

    let mut purchases = purchase_every.filter(|secs| *secs > 0).map(|secs| {
        let period = Duration::from_secs(secs);
        tokio::time::interval_at(Instant::now() + period, period)
    });

    tokio::pin!(stop);
    loop {
        tokio::select! {
            _ = &mut stop => break,
            update = updates.recv() => match update {
                Ok(update) => println!("{}", serde_json::to_string(&update)?),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Watcher skipped {} updates", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            _ = next_purchase(&mut purchases) => {
                match session.simulate_purchase(DEFAULT_QUANTITY).await {
                    Ok(remaining) => tracing::info!("Simulated purchase, {} left", remaining),
                    Err(e) => tracing::warn!("Simulated purchase failed: {}", e),
                }
            }
        }
    }

    session.shutdown().await;
    println!("{}", serde_json::to_string_pretty(&session.status())?);
    Ok(())
}

async fn next_purchase(purchases: &mut Option<Interval>) {
    match purchases {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_win_over_defaults() {
        let config = load_config(
            None,
            WatchOverrides {
                endpoint: Some("http://127.0.0.1:3000/api/events".to_string()),
                push: Some("ws://127.0.0.1:3000/ws".to_string()),
                interval_ms: Some(500),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(config.polling_interval_ms, 500);
        assert_eq!(
            config.snapshot_url().unwrap().as_str(),
            "http://127.0.0.1:3000/api/events"
        );
        assert!(config.push_base().unwrap().is_some());
    }

    #[test]
    fn test_zero_interval_override_rejected() {
        let result = load_config(
            None,
            WatchOverrides {
                interval_ms: Some(0),
                ..Default::default()
            },
        );
        assert!(result.is_err());
    }
}
