//! Misbehaviour forwarding and the rolling observation window.

use custos_types::{OrderId, ValidatorId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Callback seam into the external evidence/punishment subsystem.
///
/// The settlement engine only reports; jailing decisions (thresholds,
/// slashing) are made outside.
pub trait EvidenceKeeper {
    /// A validator attested a payload that conflicts with the quorum
    /// outcome for `order_id`.
    fn record_misbehaviour_voter(&self, validator: &ValidatorId, order_id: &OrderId, height: u64);
}

/// No-op keeper for callers without a punishment subsystem wired in.
impl EvidenceKeeper for () {
    fn record_misbehaviour_voter(&self, _: &ValidatorId, _: &OrderId, _: u64) {}
}

/// Default rolling window, in blocks, for misbehaviour counting.
pub const MISBEHAVIOUR_WINDOW: u64 = 1_000;

/// Counts misbehaviour events per validator inside a rolling block-height
/// window. The count is advisory — the external punishment subsystem owns
/// the jailing threshold.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MisbehaviourTracker {
    window: u64,
    events: BTreeMap<ValidatorId, Vec<u64>>,
}

impl MisbehaviourTracker {
    pub fn new(window: u64) -> Self {
        Self {
            window,
            events: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, validator: &ValidatorId, height: u64) {
        self.events.entry(validator.clone()).or_default().push(height);
    }

    /// Events for `validator` within the window ending at `current_height`.
    pub fn count_in_window(&self, validator: &ValidatorId, current_height: u64) -> usize {
        let floor = current_height.saturating_sub(self.window);
        self.events
            .get(validator)
            .map_or(0, |hs| hs.iter().filter(|&&h| h > floor).count())
    }

    /// Drop events that fell out of the window.
    pub fn prune(&mut self, current_height: u64) {
        let floor = current_height.saturating_sub(self.window);
        self.events.retain(|_, hs| {
            hs.retain(|&h| h > floor);
            !hs.is_empty()
        });
    }
}

impl Default for MisbehaviourTracker {
    fn default() -> Self {
        Self::new(MISBEHAVIOUR_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn val(i: u32) -> ValidatorId {
        ValidatorId::new(format!("val-{i}"))
    }

    #[test]
    fn counts_only_inside_window() {
        let mut t = MisbehaviourTracker::new(100);
        t.record(&val(0), 50);
        t.record(&val(0), 120);
        t.record(&val(0), 190);

        // Window at height 200 covers (100, 200].
        assert_eq!(t.count_in_window(&val(0), 200), 2);
        assert_eq!(t.count_in_window(&val(0), 120), 3);
    }

    #[test]
    fn prune_drops_stale_events() {
        let mut t = MisbehaviourTracker::new(100);
        t.record(&val(0), 10);
        t.record(&val(1), 190);
        t.prune(200);

        assert_eq!(t.count_in_window(&val(0), 200), 0);
        assert_eq!(t.count_in_window(&val(1), 200), 1);
    }
}
