use crate::models::{FeedEvent, SalesConfig, SalesState};
use crate::state::FeedState;
use rand::Rng;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Sells random ticket batches at a fixed rate
pub struct SalesGenerator {
    state: FeedState,
}

impl SalesGenerator {
    pub fn new(state: FeedState) -> Self {
        Self { state }
    }

    /// Run sales until stopped, sold out, or past the duration limit
    pub async fn run(&self, config: SalesConfig, mut stop_signal: oneshot::Receiver<()>) {
        let interval = Duration::from_secs_f64(1.0 / config.rate);
        let start_time = Instant::now();
        let max_batch = config.max_batch.max(1);

        loop {
            if let Some(duration) = config.duration_secs {
                if start_time.elapsed() > Duration::from_secs(duration) {
                    tracing::info!("Sales duration elapsed");
                    break;
                }
            }

            let quantity = rand::thread_rng().gen_range(1..=max_batch);
            if self.state.sell(quantity) == 0 {
                tracing::info!("Event sold out");
                break;
            }

            tokio::select! {
                _ = &mut stop_signal => return,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        if self.state.sales.stop() {
            self.state
                .event_bus
                .publish(FeedEvent::SalesStateChanged(SalesState::Stopped));
        }
    }
}

/// Start the generator in the background, `false` if sales already run
pub fn start_sales(state: &FeedState, config: SalesConfig) -> bool {
    let Some(stop_signal) = state.sales.start() else {
        return false;
    };

    tracing::info!(
        "Starting sales at {:.2}/s, batches of up to {}",
        config.rate,
        config.max_batch
    );
    state
        .event_bus
        .publish(FeedEvent::SalesStateChanged(SalesState::Running));

    let generator = SalesGenerator::new(state.clone());
    tokio::spawn(async move {
        generator.run(config, stop_signal).await;
    });
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeedConfig;

    #[tokio::test(start_paused = true)]
    async fn test_generator_stops_when_sold_out() {
        let state = FeedState::new(FeedConfig {
            remaining: 10,
            ..Default::default()
        });
        let config = SalesConfig {
            rate: 10.0,
            max_batch: 3,
            duration_secs: None,
        };

        assert!(start_sales(&state, config.clone()));
        assert!(!start_sales(&state, config));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(state.remaining(), 0);
        assert_eq!(state.sales.state(), SalesState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_signal_halts_sales() {
        let state = FeedState::new(FeedConfig::default());
        let config = SalesConfig {
            rate: 1.0,
            max_batch: 1,
            duration_secs: None,
        };

        assert!(start_sales(&state, config));
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(state.sales.stop());

        let after_stop = state.remaining();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(state.remaining(), after_stop);
        assert!(after_stop < 29_300);
    }
}
