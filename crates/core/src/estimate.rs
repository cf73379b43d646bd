//! Estimate-type vocabulary shared across the accounting crates.

use serde::{Deserialize, Serialize};

/// Rounding and truncation discipline for a privacy loss distribution.
///
/// A pessimistic estimate rounds discretized loss values and truncates
/// tail mass so that the computed delta can only overstate the true
/// hockey-stick divergence; an optimistic estimate can only understate
/// it. Distributions of different estimate types must never be composed
/// with each other.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EstimateType {
    /// Rounding and truncation may only overstate delta.
    Pessimistic,
    /// Rounding and truncation may only understate delta.
    Optimistic,
}

impl EstimateType {
    /// Whether this is the pessimistic discipline.
    pub fn is_pessimistic(self) -> bool {
        matches!(self, EstimateType::Pessimistic)
    }
}
