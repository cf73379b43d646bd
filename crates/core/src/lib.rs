//! Core primitives for privacy loss distribution accounting.
//!
//! This crate provides the vocabulary shared by the accounting engine:
//! error types, the estimate-type tag, and grid rounding utilities.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod discretization;
pub mod error;
pub mod estimate;

pub use discretization::{round_down, round_for_estimate, round_up};
pub use error::{DpError, Result};
pub use estimate::EstimateType;

/// Common imports for accounting code.
pub mod prelude {
    pub use crate::{round_down, round_for_estimate, round_up, DpError, EstimateType, Result};
}
