//! Change detection over last-seen status snapshots.
//!
//! One entry per application id, held only in process memory. A restart
//! forgets everything, so the first sweep afterwards re-announces every
//! application as "new". Accepted trade-off; persistence would need a store
//! schema the notification consumer doesn't currently justify.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::core::types::StatusSnapshot;

/// Map from application id to the last observed snapshot, linearized by a
/// single lock. This is the only component in the crate with built-in
/// synchronization; everything else keeps state per attempt.
#[derive(Default)]
pub struct ChangeTracker {
    seen: Mutex<HashMap<String, StatusSnapshot>>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `snapshot` for `application_id` and report whether it differs
    /// from the previous one.
    ///
    /// First observation → insert, `true`. Structurally different → overwrite,
    /// `true`. Identical → untouched, `false`. No ordering guarantee exists
    /// between different ids.
    pub fn update(&self, application_id: &str, snapshot: StatusSnapshot) -> bool {
        let mut seen = self.seen.lock().expect("tracker lock poisoned");
        match seen.get(application_id) {
            Some(prev) if *prev == snapshot => false,
            _ => {
                seen.insert(application_id.to_string(), snapshot);
                true
            }
        }
    }

    /// Number of distinct ids observed so far. Used by the sweep summary log.
    pub fn len(&self) -> usize {
        self.seen.lock().expect("tracker lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(status: &str) -> StatusSnapshot {
        StatusSnapshot {
            status: status.into(),
            code: 200,
            ..Default::default()
        }
    }

    #[test]
    fn first_observation_is_a_change() {
        let tracker = ChangeTracker::new();
        assert!(tracker.is_empty());
        assert!(tracker.update("AA001", snap("In Process")));
        assert!(!tracker.is_empty());
    }

    #[test]
    fn identical_snapshot_is_not_a_change() {
        let tracker = ChangeTracker::new();
        assert!(tracker.update("AA001", snap("In Process")));
        assert!(!tracker.update("AA001", snap("In Process")));
        assert!(!tracker.update("AA001", snap("In Process")));
    }

    #[test]
    fn differing_snapshots_both_report_change() {
        let tracker = ChangeTracker::new();
        assert!(tracker.update("AA001", snap("In Process")));
        assert!(tracker.update("AA001", snap("Issued")));
    }

    #[test]
    fn ids_are_tracked_independently() {
        let tracker = ChangeTracker::new();
        assert!(tracker.update("AA001", snap("In Process")));
        assert!(tracker.update("BB002", snap("In Process")));
        assert!(!tracker.update("AA001", snap("In Process")));
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn any_field_difference_counts() {
        let tracker = ChangeTracker::new();
        let mut s = snap("In Process");
        assert!(tracker.update("AA001", s.clone()));
        s.last_updated = "06-Mar-2024".into();
        assert!(tracker.update("AA001", s));
    }
}
