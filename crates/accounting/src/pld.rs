//! Privacy loss distributions: construction, composition and divergence
//! queries.
//!
//! A `PrivacyLossDistribution` owns the discretized distribution of the
//! log-likelihood ratio between the two output distributions a mechanism
//! induces on adjacent inputs. Composing mechanisms sums their independent
//! loss variables, which convolves the underlying mass functions; the
//! epsilon-hockey-stick divergence of the result is the tightest delta for
//! which the composition is (epsilon, delta)-differentially private.

use std::collections::HashMap;

use pld_core::{round_for_estimate, DpError, EstimateType, Result};

use crate::mechanism::{
    AdditiveNoisePrivacyLoss, DiscreteGaussianPrivacyLoss, DiscreteLaplacePrivacyLoss,
    GaussianPrivacyLoss, LaplacePrivacyLoss,
};
use crate::pmf::{convolve_pmfs, ProbabilityMassFunction, MASS_SUM_TOLERANCE};

/// Default grid spacing for discretized loss values.
pub const DEFAULT_VALUE_DISCRETIZATION_INTERVAL: f64 = 1e-4;
/// Default natural-log cutoff below which upper-distribution mass is
/// truncated during construction.
pub const DEFAULT_LOG_MASS_TRUNCATION_BOUND: f64 = -50.0;
/// Default bound on the tail mass removed after each composition.
pub const DEFAULT_TAIL_MASS_TRUNCATION: f64 = 1e-15;

/// Discretization intervals closer than this are considered equal when
/// validating a composition.
const INTERVAL_MATCH_TOLERANCE: f64 = 1e-12;

/// Construction options shared by every factory.
#[derive(Clone, Copy, Debug)]
pub struct PldConfig {
    /// Grid spacing for discretized loss values.
    pub value_discretization_interval: f64,
    /// Rounding and truncation discipline.
    pub estimate_type: EstimateType,
    /// Natural log of the mass below which upper-distribution outcomes are
    /// truncated during construction.
    pub log_mass_truncation_bound: f64,
}

impl Default for PldConfig {
    fn default() -> Self {
        Self {
            value_discretization_interval: DEFAULT_VALUE_DISCRETIZATION_INTERVAL,
            estimate_type: EstimateType::Pessimistic,
            log_mass_truncation_bound: DEFAULT_LOG_MASS_TRUNCATION_BOUND,
        }
    }
}

impl PldConfig {
    /// Set the discretization interval.
    pub fn with_discretization_interval(mut self, interval: f64) -> Self {
        self.value_discretization_interval = interval;
        self
    }

    /// Set the estimate type.
    pub fn with_estimate_type(mut self, estimate_type: EstimateType) -> Self {
        self.estimate_type = estimate_type;
        self
    }

    /// Set the log mass truncation bound.
    pub fn with_log_mass_truncation_bound(mut self, bound: f64) -> Self {
        self.log_mass_truncation_bound = bound;
        self
    }

    /// Validate the options.
    pub fn validate(&self) -> Result<()> {
        if !self.value_discretization_interval.is_finite()
            || self.value_discretization_interval <= 0.0
        {
            return Err(DpError::invalid("discretization interval must be positive"));
        }
        if !self.log_mass_truncation_bound.is_finite() || self.log_mass_truncation_bound > 0.0 {
            return Err(DpError::invalid(
                "log mass truncation bound must be non-positive",
            ));
        }
        Ok(())
    }
}

/// Description of a supported noise mechanism, consumed by the type-keyed
/// factory [`PrivacyLossDistribution::from_mechanism`].
#[derive(Clone, Debug, PartialEq)]
pub enum NoiseMechanism {
    /// Laplace mechanism.
    Laplace {
        /// Scale of the Laplace noise.
        parameter: f64,
        /// Sensitivity of the underlying function.
        sensitivity: f64,
    },
    /// Gaussian mechanism.
    Gaussian {
        /// Standard deviation of the noise.
        standard_deviation: f64,
        /// Sensitivity of the underlying function.
        sensitivity: f64,
    },
    /// Discrete Laplace mechanism.
    DiscreteLaplace {
        /// Scale parameter of the discrete Laplace noise.
        parameter: f64,
        /// Integer sensitivity of the underlying function.
        sensitivity: i64,
    },
    /// Discrete Gaussian mechanism.
    DiscreteGaussian {
        /// Scale parameter (not the standard deviation) of the noise.
        sigma: f64,
        /// Integer sensitivity of the underlying function.
        sensitivity: i64,
        /// Optional symmetric support truncation bound.
        truncation_bound: Option<i64>,
    },
    /// Randomized response over a fixed number of buckets.
    RandomizedResponse {
        /// Probability of outputting a uniformly random bucket.
        noise_parameter: f64,
        /// Number of input (and output) buckets.
        num_buckets: u32,
    },
}

/// Discretized privacy loss distribution of a mechanism.
#[derive(Clone, Debug)]
pub struct PrivacyLossDistribution {
    value_discretization_interval: f64,
    infinity_mass: f64,
    pmf: ProbabilityMassFunction,
    estimate_type: EstimateType,
}

impl PrivacyLossDistribution {
    /// Module-scoped constructor from raw parts; production callers go
    /// through the factories, which maintain the mass invariants.
    pub(crate) fn from_parts(
        value_discretization_interval: f64,
        infinity_mass: f64,
        pmf: ProbabilityMassFunction,
        estimate_type: EstimateType,
    ) -> Self {
        Self {
            value_discretization_interval,
            infinity_mass,
            pmf,
            estimate_type,
        }
    }

    /// The distribution of a mechanism that leaks nothing: all mass at
    /// privacy loss zero.
    pub fn identity(config: &PldConfig) -> Result<Self> {
        config.validate()?;
        let mut pmf = ProbabilityMassFunction::new();
        pmf.add_mass(0, 1.0);
        Ok(Self::from_parts(
            config.value_discretization_interval,
            0.0,
            pmf,
            config.estimate_type,
        ))
    }

    /// The canonical worst-case distribution consistent with an
    /// (epsilon, delta)-DP guarantee: mass at `+epsilon`, `-epsilon` and
    /// infinity. Used to import externally stated guarantees.
    pub fn from_privacy_parameters(epsilon: f64, delta: f64, config: &PldConfig) -> Result<Self> {
        config.validate()?;
        if !epsilon.is_finite() || epsilon < 0.0 {
            return Err(DpError::invalid("epsilon must be non-negative and finite"));
        }
        if !delta.is_finite() || !(0.0..=1.0).contains(&delta) {
            return Err(DpError::invalid("delta must be in [0, 1]"));
        }
        let interval = config.value_discretization_interval;
        let estimate = config.estimate_type;
        let mut pmf = ProbabilityMassFunction::new();
        pmf.add_mass(
            round_for_estimate(epsilon, interval, estimate),
            (1.0 - delta) / (1.0 + (-epsilon).exp()),
        );
        pmf.add_mass(
            round_for_estimate(-epsilon, interval, estimate),
            (1.0 - delta) / (1.0 + epsilon.exp()),
        );
        Ok(Self::from_parts(interval, delta, pmf, estimate))
    }

    /// Construct from two explicit outcome distributions: for every
    /// outcome of the upper distribution the loss is the log ratio of its
    /// masses, `+infinity` where the lower distribution has none.
    pub fn from_probability_mass_functions(
        pmf_lower: &HashMap<i64, f64>,
        pmf_upper: &HashMap<i64, f64>,
        config: &PldConfig,
    ) -> Result<Self> {
        config.validate()?;
        validate_outcome_pmf(pmf_lower, "lower")?;
        validate_outcome_pmf(pmf_upper, "upper")?;

        let interval = config.value_discretization_interval;
        let estimate = config.estimate_type;
        let mut pmf = ProbabilityMassFunction::new();
        let mut infinity_mass = 0.0;

        for (&outcome, &mass_upper) in pmf_upper {
            if mass_upper <= 0.0 {
                continue;
            }
            let mass_lower = pmf_lower.get(&outcome).copied().unwrap_or(0.0);
            if mass_lower <= 0.0 {
                infinity_mass += mass_upper;
                continue;
            }
            if mass_upper.ln() <= config.log_mass_truncation_bound {
                if estimate.is_pessimistic() {
                    infinity_mass += mass_upper;
                }
                continue;
            }
            let loss = mass_upper.ln() - mass_lower.ln();
            pmf.add_mass(round_for_estimate(loss, interval, estimate), mass_upper);
        }

        Ok(Self::from_parts(interval, infinity_mass, pmf, estimate))
    }

    /// Construct from an additive-noise privacy loss model.
    pub fn from_additive_noise(
        model: &AdditiveNoisePrivacyLoss,
        config: &PldConfig,
    ) -> Result<Self> {
        config.validate()?;
        let interval = config.value_discretization_interval;
        let estimate = config.estimate_type;
        let tail = model.privacy_loss_tail(estimate);

        let mut pmf = ProbabilityMassFunction::new();
        let mut infinity_mass = 0.0;
        for &(loss, mass) in &tail.probability_mass {
            if mass <= 0.0 {
                continue;
            }
            if loss.is_infinite() {
                infinity_mass += mass;
            } else {
                pmf.add_mass(round_for_estimate(loss, interval, estimate), mass);
            }
        }

        if model.is_discrete() {
            // Enumerate the integer outcomes between the truncation points.
            let first = tail.lower_x_truncation.ceil() as i64;
            let last = tail.upper_x_truncation.floor() as i64;
            for outcome in first..=last {
                let mass = model.mu_upper_probability(outcome);
                if mass <= 0.0 {
                    continue;
                }
                let loss = model.privacy_loss(outcome as f64);
                if loss.is_infinite() {
                    infinity_mass += mass;
                } else {
                    pmf.add_mass(round_for_estimate(loss, interval, estimate), mass);
                }
            }
        } else {
            // One grid bucket at a time: the mass whose loss rounds to `k`
            // is the CDF difference over the matching outcome range.
            let lowest_loss = model.privacy_loss(tail.upper_x_truncation);
            let highest_loss = model.privacy_loss(tail.lower_x_truncation);
            let k_min = round_for_estimate(lowest_loss, interval, estimate);
            let k_max = round_for_estimate(highest_loss, interval, estimate);
            for k in k_min..=k_max {
                let (bucket_low, bucket_high) = if estimate.is_pessimistic() {
                    ((k - 1) as f64 * interval, k as f64 * interval)
                } else {
                    (k as f64 * interval, (k + 1) as f64 * interval)
                };
                let x_low = model
                    .inverse_privacy_loss(bucket_high)
                    .clamp(tail.lower_x_truncation, tail.upper_x_truncation);
                let x_high = model
                    .inverse_privacy_loss(bucket_low)
                    .clamp(tail.lower_x_truncation, tail.upper_x_truncation);
                if x_high > x_low {
                    let mass = model.mu_upper_cdf(x_high) - model.mu_upper_cdf(x_low);
                    if mass > 0.0 {
                        pmf.add_mass(k, mass);
                    }
                }
            }
        }

        Ok(Self::from_parts(interval, infinity_mass, pmf, estimate))
    }

    /// Construct for the Laplace mechanism.
    pub fn from_laplace_mechanism(
        parameter: f64,
        sensitivity: f64,
        config: &PldConfig,
    ) -> Result<Self> {
        let model = LaplacePrivacyLoss::new(parameter, sensitivity)?;
        Self::from_additive_noise(&AdditiveNoisePrivacyLoss::Laplace(model), config)
    }

    /// Construct for the Gaussian mechanism.
    pub fn from_gaussian_mechanism(
        standard_deviation: f64,
        sensitivity: f64,
        config: &PldConfig,
    ) -> Result<Self> {
        let model = GaussianPrivacyLoss::new(
            standard_deviation,
            sensitivity,
            config.log_mass_truncation_bound,
        )?;
        Self::from_additive_noise(&AdditiveNoisePrivacyLoss::Gaussian(model), config)
    }

    /// Construct for the discrete Laplace mechanism.
    pub fn from_discrete_laplace_mechanism(
        parameter: f64,
        sensitivity: i64,
        config: &PldConfig,
    ) -> Result<Self> {
        let model = DiscreteLaplacePrivacyLoss::new(parameter, sensitivity)?;
        Self::from_additive_noise(&AdditiveNoisePrivacyLoss::DiscreteLaplace(model), config)
    }

    /// Construct for the discrete Gaussian mechanism.
    pub fn from_discrete_gaussian_mechanism(
        sigma: f64,
        sensitivity: i64,
        truncation_bound: Option<i64>,
        config: &PldConfig,
    ) -> Result<Self> {
        let model = DiscreteGaussianPrivacyLoss::new(sigma, sensitivity, truncation_bound)?;
        Self::from_additive_noise(&AdditiveNoisePrivacyLoss::DiscreteGaussian(model), config)
    }

    /// Construct for randomized response over `num_buckets` buckets: with
    /// probability `noise_parameter` the output is a uniformly random
    /// bucket, otherwise it is the input bucket.
    pub fn from_randomized_response(
        noise_parameter: f64,
        num_buckets: u32,
        config: &PldConfig,
    ) -> Result<Self> {
        config.validate()?;
        if !noise_parameter.is_finite() || !(0.0..1.0).contains(&noise_parameter) {
            return Err(DpError::invalid("noise parameter must be in [0, 1)"));
        }
        if num_buckets < 2 {
            return Err(DpError::invalid("number of buckets must be at least two"));
        }

        let interval = config.value_discretization_interval;
        let estimate = config.estimate_type;
        let buckets = num_buckets as f64;
        let stay = 1.0 - noise_parameter + noise_parameter / buckets;
        let moved = noise_parameter / buckets;

        let mut pmf = ProbabilityMassFunction::new();
        let mut infinity_mass = 0.0;
        if moved > 0.0 {
            let loss = stay.ln() - moved.ln();
            pmf.add_mass(round_for_estimate(loss, interval, estimate), stay);
            pmf.add_mass(round_for_estimate(-loss, interval, estimate), moved);
            pmf.add_mass(0, (buckets - 2.0) * moved);
        } else {
            // Zero noise: the input bucket is impossible under the lower
            // distribution.
            infinity_mass = stay;
        }

        Ok(Self::from_parts(interval, infinity_mass, pmf, estimate))
    }

    /// Construct from a mechanism description, dispatching on its type.
    pub fn from_mechanism(mechanism: &NoiseMechanism, config: &PldConfig) -> Result<Self> {
        match *mechanism {
            NoiseMechanism::Laplace {
                parameter,
                sensitivity,
            } => Self::from_laplace_mechanism(parameter, sensitivity, config),
            NoiseMechanism::Gaussian {
                standard_deviation,
                sensitivity,
            } => Self::from_gaussian_mechanism(standard_deviation, sensitivity, config),
            NoiseMechanism::DiscreteLaplace {
                parameter,
                sensitivity,
            } => Self::from_discrete_laplace_mechanism(parameter, sensitivity, config),
            NoiseMechanism::DiscreteGaussian {
                sigma,
                sensitivity,
                truncation_bound,
            } => Self::from_discrete_gaussian_mechanism(sigma, sensitivity, truncation_bound, config),
            NoiseMechanism::RandomizedResponse {
                noise_parameter,
                num_buckets,
            } => Self::from_randomized_response(noise_parameter, num_buckets, config),
        }
    }

    /// Grid spacing of the discretized loss values.
    pub fn discretization_interval(&self) -> f64 {
        self.value_discretization_interval
    }

    /// Probability mass at privacy loss `+infinity`.
    pub fn infinity_mass(&self) -> f64 {
        self.infinity_mass
    }

    /// The finite part of the distribution.
    pub fn pmf(&self) -> &ProbabilityMassFunction {
        &self.pmf
    }

    /// Rounding discipline of this distribution.
    pub fn estimate_type(&self) -> EstimateType {
        self.estimate_type
    }

    /// Check that `other` can be composed with this distribution: the
    /// discretization intervals and estimate types must match.
    pub fn validate_composition(&self, other: &Self) -> Result<()> {
        let difference =
            (self.value_discretization_interval - other.value_discretization_interval).abs();
        if difference > INTERVAL_MATCH_TOLERANCE {
            return Err(DpError::precondition(format!(
                "discretization intervals must match ({} vs {})",
                self.value_discretization_interval, other.value_discretization_interval
            )));
        }
        if self.estimate_type != other.estimate_type {
            return Err(DpError::precondition("estimate types must match"));
        }
        Ok(())
    }

    /// Compose `other` into this distribution: the loss variables add, so
    /// the mass functions convolve. `other` is read but never modified.
    ///
    /// After the convolution the smallest-loss entries with cumulative
    /// mass at most `tail_mass_truncation` are removed; a pessimistic
    /// estimate folds the removed mass into the infinity mass, an
    /// optimistic one discards it.
    pub fn compose(&mut self, other: &Self, tail_mass_truncation: f64) -> Result<()> {
        self.validate_composition(other)?;

        // Either loss variable being infinite makes the sum infinite.
        let infinity_mass = self.infinity_mass + other.infinity_mass
            - self.infinity_mass * other.infinity_mass;

        // A side without finite mass leaves no finite mass in the sum.
        let mut pmf = convolve_pmfs(&self.pmf, &other.pmf);

        let removed = pmf.truncate_smallest(tail_mass_truncation);
        self.infinity_mass = if self.estimate_type.is_pessimistic() {
            infinity_mass + removed
        } else {
            infinity_mass
        };
        self.pmf = pmf;
        Ok(())
    }

    /// Replace this distribution with its `num_times`-fold composition,
    /// via binary exponentiation: O(log num_times) convolutions.
    pub fn self_compose(&mut self, num_times: u32, tail_mass_truncation: f64) -> Result<()> {
        if num_times == 0 {
            return Err(DpError::invalid("number of compositions must be at least one"));
        }
        if num_times == 1 {
            return Ok(());
        }

        let mut identity = ProbabilityMassFunction::new();
        identity.add_mass(0, 1.0);
        let mut result = Self::from_parts(
            self.value_discretization_interval,
            0.0,
            identity,
            self.estimate_type,
        );
        let mut base = self.clone();
        let mut remaining = num_times;
        while remaining > 0 {
            if remaining % 2 == 1 {
                result.compose(&base, tail_mass_truncation)?;
            }
            remaining /= 2;
            if remaining > 0 {
                let square = base.clone();
                base.compose(&square, tail_mass_truncation)?;
            }
        }
        *self = result;
        Ok(())
    }

    /// The epsilon-hockey-stick divergence: the tightest delta for which
    /// the mechanism is (epsilon, delta)-differentially private.
    pub fn get_delta_for_epsilon(&self, epsilon: f64) -> f64 {
        let mut delta = self.infinity_mass;
        for (key, mass) in self.pmf.iter() {
            let loss = key as f64 * self.value_discretization_interval;
            if loss > epsilon {
                // 1 - exp(epsilon - loss), stable for very negative
                // exponents.
                delta += -((epsilon - loss).exp_m1()) * mass;
            }
        }
        delta.clamp(0.0, 1.0)
    }

    /// The smallest non-negative epsilon whose divergence is at most
    /// `delta`, or `+infinity` when no finite epsilon achieves it.
    pub fn get_epsilon_for_delta(&self, delta: f64) -> f64 {
        if delta.is_nan() || delta < 0.0 {
            return f64::INFINITY;
        }
        if self.infinity_mass > delta {
            return f64::INFINITY;
        }

        // Scan losses in decreasing order. Between two adjacent losses the
        // divergence is mass_upper - exp(epsilon) * mass_lower, linear in
        // exp(epsilon), so the bracketing interval is solved directly.
        let mut mass_upper = self.infinity_mass;
        let mut mass_lower = 0.0;
        for (key, mass) in self.pmf.sorted_entries().into_iter().rev() {
            let loss = key as f64 * self.value_discretization_interval;
            if mass_upper > delta && mass_lower > 0.0 {
                let epsilon = ((mass_upper - delta) / mass_lower).ln();
                if epsilon >= loss {
                    break;
                }
            }
            mass_upper += mass;
            mass_lower += mass * (-loss).exp();
            if mass_upper >= delta && mass_lower == 0.0 {
                return loss.max(0.0);
            }
        }

        if mass_upper <= mass_lower + delta {
            return 0.0;
        }
        ((mass_upper - delta) / mass_lower).ln()
    }

    /// Delta of the composition of this distribution with `other` at
    /// `epsilon`, without mutating either operand and without
    /// materializing the composed mass function.
    ///
    /// Output-equivalent to [`Self::compose`] followed by
    /// [`Self::get_delta_for_epsilon`], up to the composition's tail mass
    /// truncation.
    pub fn get_delta_for_epsilon_for_composed_pld(
        &self,
        other: &Self,
        epsilon: f64,
    ) -> Result<f64> {
        self.validate_composition(other)?;
        let interval = self.value_discretization_interval;
        let mut delta = self.infinity_mass + other.infinity_mass
            - self.infinity_mass * other.infinity_mass;

        let (a, b) = match (self.pmf.to_dense(), other.pmf.to_dense()) {
            (Some(a), Some(b)) => (a, b),
            _ => return Ok(delta.clamp(0.0, 1.0)),
        };
        let loss_b = |j: usize| (b.lower_key + j as i64) as f64 * interval;

        // Two-pointer sweep: as the loss on the left side grows, the set
        // of right-side losses pushing the pair above epsilon only grows.
        let mut j = b.probs.len() as i64 - 1;
        let mut upper_mass = 0.0;
        let mut lower_mass = 0.0;
        for (i, &mass) in a.probs.iter().enumerate() {
            let loss = (a.lower_key + i as i64) as f64 * interval;
            while j >= 0 && loss + loss_b(j as usize) > epsilon {
                let other_mass = b.probs[j as usize];
                upper_mass += other_mass;
                lower_mass += other_mass * (-loss_b(j as usize)).exp();
                j -= 1;
            }
            if mass <= 0.0 || upper_mass <= 0.0 {
                continue;
            }
            let contribution = (upper_mass - (epsilon - loss).exp() * lower_mass).max(0.0);
            if contribution.is_finite() {
                delta += mass * contribution;
            }
        }

        Ok(delta.clamp(0.0, 1.0))
    }

    /// Total finite mass plus infinity mass; one up to numerical slack for
    /// factory-built distributions.
    pub fn total_mass(&self) -> f64 {
        self.pmf.total_mass() + self.infinity_mass
    }
}

fn validate_outcome_pmf(pmf: &HashMap<i64, f64>, name: &str) -> Result<()> {
    let mut total = 0.0;
    for (&outcome, &mass) in pmf {
        if !mass.is_finite() || mass < 0.0 {
            return Err(DpError::invalid(format!(
                "{name} probability mass function has invalid mass {mass} at outcome {outcome}"
            )));
        }
        total += mass;
    }
    if total > 1.0 + MASS_SUM_TOLERANCE {
        return Err(DpError::invalid(format!(
            "{name} probability mass function sums to {total}, above one"
        )));
    }
    Ok(())
}
