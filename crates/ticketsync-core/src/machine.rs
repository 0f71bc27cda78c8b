//! Transport selection state machine
//!
//! Guards the push-vs-poll transitions so that at most one push channel and
//! at most one polling interval exist at any time, and a dropped push
//! channel is never reopened.

use crate::types::{ChannelMode, SyncState};
use crate::{Error, Result};
use tracing::debug;

#[derive(Debug, Default)]
pub struct SyncStateMachine {
    state: SyncState,
}

impl SyncStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current state
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Get the active transport mode
    pub fn mode(&self) -> ChannelMode {
        self.state.mode()
    }

    pub fn is_stopped(&self) -> bool {
        self.state == SyncState::Stopped
    }

    /// Start opening a push channel. Only allowed straight out of `Init`.
    pub fn begin_push(&mut self) -> Result<()> {
        match self.state {
            SyncState::Init => {
                self.set(SyncState::PushConnecting);
                Ok(())
            }
            from => Err(Error::Transition {
                from,
                to: SyncState::PushConnecting,
            }),
        }
    }

    /// The push channel finished opening
    pub fn push_opened(&mut self) -> Result<()> {
        match self.state {
            SyncState::PushConnecting => {
                self.set(SyncState::PushOpen);
                Ok(())
            }
            from => Err(Error::Transition {
                from,
                to: SyncState::PushOpen,
            }),
        }
    }

    /// Switch to polling, from startup or after a push failure.
    ///
    /// Returns `false` when already polling, in which case nothing changes.
    pub fn enter_polling(&mut self) -> Result<bool> {
        match self.state {
            SyncState::Polling => Ok(false),
            SyncState::Init | SyncState::PushConnecting | SyncState::PushOpen => {
                self.set(SyncState::Polling);
                Ok(true)
            }
            SyncState::Stopped => Err(Error::Transition {
                from: SyncState::Stopped,
                to: SyncState::Polling,
            }),
        }
    }

    /// Stop from any state. Returns `false` if already stopped.
    pub fn stop(&mut self) -> bool {
        if self.state == SyncState::Stopped {
            return false;
        }
        self.set(SyncState::Stopped);
        true
    }

    fn set(&mut self, to: SyncState) {
        debug!("Sync state {:?} -> {:?}", self.state, to);
        self.state = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_push_lifecycle_falls_back_to_polling() {
        let mut machine = SyncStateMachine::new();
        machine.begin_push().unwrap();
        assert_eq!(machine.mode(), ChannelMode::None);

        machine.push_opened().unwrap();
        assert_eq!(machine.mode(), ChannelMode::Push);

        assert!(machine.enter_polling().unwrap());
        assert_eq!(machine.state(), SyncState::Polling);
        assert!(machine.begin_push().is_err());
    }

    #[test]
    fn test_double_open_rejected() {
        let mut machine = SyncStateMachine::new();
        machine.begin_push().unwrap();
        assert!(matches!(
            machine.begin_push(),
            Err(Error::Transition {
                from: SyncState::PushConnecting,
                ..
            })
        ));

        machine.push_opened().unwrap();
        assert!(machine.begin_push().is_err());
        assert!(machine.push_opened().is_err());
    }

    #[test]
    fn test_polling_twice_is_noop() {
        let mut machine = SyncStateMachine::new();
        assert!(machine.enter_polling().unwrap());
        assert!(!machine.enter_polling().unwrap());
        assert_eq!(machine.state(), SyncState::Polling);
    }

    #[test]
    fn test_stop_is_terminal_and_idempotent() {
        let mut machine = SyncStateMachine::new();
        assert!(machine.stop());
        assert!(!machine.stop());
        assert!(machine.begin_push().is_err());
        assert!(machine.enter_polling().is_err());
        assert_eq!(machine.mode(), ChannelMode::None);
    }

    #[derive(Debug, Clone, Copy)]
    enum Op {
        BeginPush,
        Opened,
        Poll,
        Stop,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::BeginPush),
            Just(Op::Opened),
            Just(Op::Poll),
            Just(Op::Stop)
        ]
    }

    proptest! {
        #[test]
        fn prop_push_never_reopens(ops in proptest::collection::vec(op(), 0..40)) {
            let mut machine = SyncStateMachine::new();
            let mut left_push = false;

            for op in ops {
                let before = machine.state();
                let _ = match op {
                    Op::BeginPush => machine.begin_push(),
                    Op::Opened => machine.push_opened(),
                    Op::Poll => machine.enter_polling().map(|_| ()),
                    Op::Stop => {
                        machine.stop();
                        Ok(())
                    }
                };
                let after = machine.state();

                if before == SyncState::PushOpen && after != SyncState::PushOpen {
                    left_push = true;
                    prop_assert_ne!(after, SyncState::PushConnecting);
                }
                if left_push {
                    prop_assert!(!matches!(after, SyncState::PushConnecting | SyncState::PushOpen));
                }
                if before == SyncState::Stopped {
                    prop_assert_eq!(after, SyncState::Stopped);
                }
            }
        }
    }
}
