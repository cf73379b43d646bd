//! Rounding of privacy loss values onto a uniform grid.
//!
//! Every discretized loss value is stored as an integer multiple of the
//! discretization interval. The rounding direction is what makes an
//! estimate pessimistic or optimistic: mass drawn from the upper
//! distribution carries its loss rounded toward +infinity under the
//! pessimistic discipline (overstating the loss, hence delta) and toward
//! -infinity under the optimistic one. Mechanism models must apply the
//! same direction to every loss value they emit, not only the generic
//! constructors.

use crate::estimate::EstimateType;

/// Round `value` to the smallest grid index `k` with `k * interval >= value`.
pub fn round_up(value: f64, interval: f64) -> i64 {
    (value / interval).ceil() as i64
}

/// Round `value` to the largest grid index `k` with `k * interval <= value`.
pub fn round_down(value: f64, interval: f64) -> i64 {
    (value / interval).floor() as i64
}

/// Round a loss value carrying upper-distribution mass for the given
/// estimate type: up for pessimistic, down for optimistic.
pub fn round_for_estimate(value: f64, interval: f64, estimate_type: EstimateType) -> i64 {
    if estimate_type.is_pessimistic() {
        round_up(value, interval)
    } else {
        round_down(value, interval)
    }
}
