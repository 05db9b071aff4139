//! Authoritative tracking state

use serde::{Deserialize, Serialize};

use crate::pose::PoseSample;

/// Edge reported by the smoother after each sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VisibilityTransition {
    #[default]
    Unchanged,
    BecameVisible,
    BecameHidden,
}

impl VisibilityTransition {
    /// Whether the smoothed visibility flipped
    pub fn is_edge(&self) -> bool {
        !matches!(self, VisibilityTransition::Unchanged)
    }
}

/// Debounced visibility plus smoothed pose
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothedState {
    /// Debounced visibility
    pub visible: bool,

    /// Smoothed pose; `raw_visible` mirrors the latest raw sample
    pub pose: PoseSample,

    /// Timestamp of the last visibility flip (nanoseconds)
    pub stable_since_ns: u64,
}

impl Default for SmoothedState {
    fn default() -> Self {
        Self {
            visible: false,
            pose: PoseSample::identity(0),
            stable_since_ns: 0,
        }
    }
}

impl SmoothedState {
    /// Time spent in the current visibility state
    pub fn stable_for_ns(&self, now_ns: u64) -> u64 {
        now_ns.saturating_sub(self.stable_since_ns)
    }
}
