//! Privacy loss distribution accounting.
//!
//! The central object is [`PrivacyLossDistribution`]: the discretized
//! distribution of the log-likelihood ratio a mechanism induces between
//! adjacent inputs. Distributions are built from standard noise mechanisms
//! (Laplace, Gaussian, their discrete counterparts, randomized response)
//! or from explicit outcome distributions, composed by convolution, and
//! queried for the (epsilon, delta) trade-off curve.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod mechanism;
pub mod pld;
pub mod pmf;
pub mod serialization;

pub use mechanism::{
    AdditiveNoisePrivacyLoss, DiscreteGaussianPrivacyLoss, DiscreteLaplacePrivacyLoss,
    GaussianPrivacyLoss, LaplacePrivacyLoss, PrivacyLossTail,
};
pub use pld::{
    NoiseMechanism, PldConfig, PrivacyLossDistribution, DEFAULT_LOG_MASS_TRUNCATION_BOUND,
    DEFAULT_TAIL_MASS_TRUNCATION, DEFAULT_VALUE_DISCRETIZATION_INTERVAL,
};
pub use pld_core::{DpError, EstimateType, Result};
pub use pmf::{ProbabilityMassFunction, MASS_SUM_TOLERANCE};
pub use serialization::{PldRecord, PmfEntry};

/// Common imports for privacy accounting.
pub mod prelude {
    pub use crate::{
        DpError, EstimateType, NoiseMechanism, PldConfig, PldRecord, PrivacyLossDistribution,
        ProbabilityMassFunction, Result, DEFAULT_TAIL_MASS_TRUNCATION,
    };
}
