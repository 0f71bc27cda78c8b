use crate::models::{FeedConfig, FeedEvent, PushPayload, TicketEvent};
use crate::traffic::SalesController;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use ticketsync_core::EventBus;

/// Shared state of the mock ticket feed
#[derive(Clone)]
pub struct FeedState {
    /// Startup configuration
    pub config: Arc<FeedConfig>,

    /// The single event served by the feed
    pub event: Arc<RwLock<TicketEvent>>,

    /// Broadcasts sales and push-control events to WebSocket handlers
    pub event_bus: Arc<EventBus<FeedEvent>>,

    /// Automatic sales control
    pub sales: Arc<SalesController>,

    /// Open push connections
    pub push_connections: Arc<AtomicUsize>,

    /// Prometheus renderer, present when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl FeedState {
    pub fn new(config: FeedConfig) -> Self {
        let event = TicketEvent::from_config(&config);
        Self {
            config: Arc::new(config),
            event: Arc::new(RwLock::new(event)),
            event_bus: Arc::new(EventBus::default()),
            sales: Arc::new(SalesController::new()),
            push_connections: Arc::new(AtomicUsize::new(0)),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Current event as served by the snapshot endpoint
    pub fn event(&self) -> TicketEvent {
        self.event.read().clone()
    }

    pub fn remaining(&self) -> u64 {
        self.event.read().current_quantity
    }

    pub fn push_payload(&self) -> PushPayload {
        self.event.read().push_payload()
    }

    /// Sell up to `quantity` tickets and notify push clients.
    ///
    /// Returns the remaining count. Selling from a sold-out event is a no-op
    /// and publishes nothing.
    pub fn sell(&self, quantity: u32) -> u64 {
        let (payload, sold) = {
            let mut event = self.event.write();
            let before = event.current_quantity;
            event.current_quantity = before.saturating_sub(u64::from(quantity));
            (event.push_payload(), before - event.current_quantity)
        };

        if sold > 0 {
            counter!("ticketsync_feed_tickets_sold_total").increment(sold);
            tracing::debug!("Sold {} tickets, {} left", sold, payload.remaining);
            self.event_bus.publish(FeedEvent::RemainingChanged(payload.clone()));
        }

        payload.remaining
    }

    /// Ask every open push connection to close
    pub fn disconnect_push(&self) -> usize {
        let open = self.push_connections.load(Ordering::SeqCst);
        tracing::info!("Disconnecting {} push connections", open);
        self.event_bus.publish(FeedEvent::DisconnectPush);
        open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sell_publishes_new_count() {
        let state = FeedState::new(FeedConfig::default());
        let mut events = state.event_bus.subscribe();

        assert_eq!(state.sell(5), 29_295);

        match events.recv().await.unwrap() {
            FeedEvent::RemainingChanged(payload) => {
                assert_eq!(payload.identifier, "153");
                assert_eq!(payload.remaining, 29_295);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_sell_saturates_and_goes_quiet_when_sold_out() {
        let state = FeedState::new(FeedConfig {
            remaining: 3,
            ..Default::default()
        });
        let mut events = state.event_bus.subscribe();

        assert_eq!(state.sell(10), 0);
        assert!(matches!(events.try_recv(), Ok(FeedEvent::RemainingChanged(_))));

        assert_eq!(state.sell(1), 0);
        assert!(events.try_recv().is_err());
    }
}
