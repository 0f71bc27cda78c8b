//! Local, optimistic purchase simulation
//!
//! Nothing here talks to the network: a simulated purchase only lowers the
//! locally known count and records the new value.

use crate::history::HistoryBuffer;
use crate::types::Snapshot;
use crate::{Error, Result};

/// Quantity used when the caller does not choose one
pub const DEFAULT_QUANTITY: u32 = 1;

/// Remaining count after buying `quantity` tickets, never below zero
pub fn simulate(current: u64, quantity: u32) -> Result<u64> {
    if quantity == 0 {
        return Err(Error::InvalidQuantity(quantity));
    }
    Ok(current.saturating_sub(u64::from(quantity)))
}

/// Applies simulated purchases to session state
pub struct PurchaseSimulator;

impl PurchaseSimulator {
    /// Decrement the snapshot's count and record it in the history
    pub fn apply(
        snapshot: Option<&mut Snapshot>,
        history: &mut HistoryBuffer,
        quantity: u32,
    ) -> Result<u64> {
        let snapshot = snapshot.ok_or(Error::UnknownRemaining)?;
        let current = snapshot.remaining.ok_or(Error::UnknownRemaining)?;
        let remaining = simulate(current, quantity)?;

        snapshot.remaining = Some(remaining);
        history.append(Some(remaining));
        Ok(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::Value;

    fn snapshot(remaining: Option<u64>) -> Snapshot {
        Snapshot {
            id: Some("153".to_string()),
            remaining,
            metadata: Value::Null,
        }
    }

    #[test]
    fn test_simulate() {
        assert_eq!(simulate(10, 3).unwrap(), 7);
        assert_eq!(simulate(2, 5).unwrap(), 0);
        assert_eq!(simulate(5, DEFAULT_QUANTITY).unwrap(), 4);
        assert!(matches!(simulate(5, 0), Err(Error::InvalidQuantity(0))));
    }

    #[test]
    fn test_apply_mutates_snapshot_and_history() {
        let mut current = snapshot(Some(10));
        let mut history = HistoryBuffer::default();

        let remaining = PurchaseSimulator::apply(Some(&mut current), &mut history, 3).unwrap();
        assert_eq!(remaining, 7);
        assert_eq!(current.remaining, Some(7));
        assert_eq!(history.latest().map(|p| p.remaining), Some(7));
    }

    #[test]
    fn test_apply_requires_known_count() {
        let mut history = HistoryBuffer::default();
        assert!(matches!(
            PurchaseSimulator::apply(None, &mut history, 1),
            Err(Error::UnknownRemaining)
        ));

        let mut unknown = snapshot(None);
        assert!(matches!(
            PurchaseSimulator::apply(Some(&mut unknown), &mut history, 1),
            Err(Error::UnknownRemaining)
        ));
        assert!(history.is_empty());
    }

    proptest! {
        #[test]
        fn prop_simulate_stays_in_range(r in any::<u64>(), q in 1u32..=u32::MAX) {
            let result = simulate(r, q).unwrap();
            prop_assert!(result <= r);
            if u64::from(q) <= r {
                prop_assert_eq!(result, r - u64::from(q));
            } else {
                prop_assert_eq!(result, 0);
            }
        }
    }
}
