use crate::models::SalesState;
use parking_lot::RwLock;
use tokio::sync::oneshot;

/// Controls the automatic sales generator
pub struct SalesController {
    inner: RwLock<ControllerInner>,
}

struct ControllerInner {
    state: SalesState,
    stop_sender: Option<oneshot::Sender<()>>,
}

impl SalesController {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(ControllerInner {
                state: SalesState::Stopped,
                stop_sender: None,
            }),
        }
    }

    pub fn state(&self) -> SalesState {
        self.inner.read().state
    }

    pub fn is_running(&self) -> bool {
        self.inner.read().state == SalesState::Running
    }

    /// Mark sales as running, returns a receiver that signals when to stop.
    /// `None` if sales are already running.
    pub fn start(&self) -> Option<oneshot::Receiver<()>> {
        let mut inner = self.inner.write();
        if inner.state == SalesState::Running {
            return None;
        }

        let (tx, rx) = oneshot::channel();
        inner.stop_sender = Some(tx);
        inner.state = SalesState::Running;
        Some(rx)
    }

    /// Stop sales, returns whether they were running
    pub fn stop(&self) -> bool {
        let mut inner = self.inner.write();
        if let Some(sender) = inner.stop_sender.take() {
            let _ = sender.send(());
        }
        std::mem::replace(&mut inner.state, SalesState::Stopped) == SalesState::Running
    }
}

impl Default for SalesController {
    fn default() -> Self {
        Self::new()
    }
}
