//! Additive-noise privacy loss models.
//!
//! Each model describes the privacy loss random variable of one noise
//! mechanism: sample an outcome `x` from the upper distribution (noise
//! centered at zero) and report `ln(mu_upper(x) / mu_lower(x))`, where the
//! lower distribution is the same noise shifted by the sensitivity. Under
//! this convention the loss is non-increasing in `x` for every supported
//! family, which the discretization in `pld` relies on.

use statrs::distribution::{ContinuousCDF, Laplace, Normal};

use pld_core::{DpError, EstimateType, Result};

/// Truncation range of a privacy loss variable together with the explicit
/// probability mass lying outside it.
///
/// A loss of `f64::INFINITY` in `probability_mass` marks mass destined for
/// the infinity bucket of the resulting distribution.
#[derive(Clone, Debug)]
pub struct PrivacyLossTail {
    /// Outcomes below this value are covered by `probability_mass`.
    pub lower_x_truncation: f64,
    /// Outcomes above this value are covered by `probability_mass`.
    pub upper_x_truncation: f64,
    /// Explicit `(loss, mass)` pairs for the outcomes outside the range.
    pub probability_mass: Vec<(f64, f64)>,
}

/// Privacy loss of the Laplace mechanism with scale `parameter`.
#[derive(Clone, Debug)]
pub struct LaplacePrivacyLoss {
    parameter: f64,
    sensitivity: f64,
    noise: Laplace,
}

impl LaplacePrivacyLoss {
    /// Create the model; `parameter` and `sensitivity` must be positive.
    pub fn new(parameter: f64, sensitivity: f64) -> Result<Self> {
        if !parameter.is_finite() || parameter <= 0.0 {
            return Err(DpError::invalid("Laplace parameter must be positive"));
        }
        if !sensitivity.is_finite() || sensitivity <= 0.0 {
            return Err(DpError::invalid("sensitivity must be positive"));
        }
        let noise = Laplace::new(0.0, parameter)
            .map_err(|_| DpError::invalid("Laplace parameter must be positive"))?;
        Ok(Self {
            parameter,
            sensitivity,
            noise,
        })
    }

    fn privacy_loss(&self, x: f64) -> f64 {
        ((x - self.sensitivity).abs() - x.abs()) / self.parameter
    }

    /// Inverse of the linear mid-section on `[0, sensitivity]`.
    fn inverse_privacy_loss(&self, loss: f64) -> f64 {
        0.5 * (self.sensitivity - loss * self.parameter)
    }

    fn mu_upper_cdf(&self, x: f64) -> f64 {
        self.noise.cdf(x)
    }

    fn privacy_loss_tail(&self) -> PrivacyLossTail {
        let max_loss = self.sensitivity / self.parameter;
        // The loss is constant outside [0, sensitivity]; both tails are
        // exact, so pessimistic and optimistic estimates share them.
        PrivacyLossTail {
            lower_x_truncation: 0.0,
            upper_x_truncation: self.sensitivity,
            probability_mass: vec![
                (max_loss, self.mu_upper_cdf(0.0)),
                (-max_loss, 1.0 - self.mu_upper_cdf(self.sensitivity)),
            ],
        }
    }
}

/// Privacy loss of the Gaussian mechanism.
#[derive(Clone, Debug)]
pub struct GaussianPrivacyLoss {
    standard_deviation: f64,
    sensitivity: f64,
    log_mass_truncation_bound: f64,
    variance: f64,
    noise: Normal,
}

impl GaussianPrivacyLoss {
    /// Create the model; the deviation and sensitivity must be positive
    /// and the log mass truncation bound non-positive.
    pub fn new(
        standard_deviation: f64,
        sensitivity: f64,
        log_mass_truncation_bound: f64,
    ) -> Result<Self> {
        if !standard_deviation.is_finite() || standard_deviation <= 0.0 {
            return Err(DpError::invalid("standard deviation must be positive"));
        }
        if !sensitivity.is_finite() || sensitivity <= 0.0 {
            return Err(DpError::invalid("sensitivity must be positive"));
        }
        if !log_mass_truncation_bound.is_finite() || log_mass_truncation_bound > 0.0 {
            return Err(DpError::invalid(
                "log mass truncation bound must be non-positive",
            ));
        }
        let noise = Normal::new(0.0, standard_deviation)
            .map_err(|_| DpError::invalid("standard deviation must be positive"))?;
        Ok(Self {
            standard_deviation,
            sensitivity,
            log_mass_truncation_bound,
            variance: standard_deviation * standard_deviation,
            noise,
        })
    }

    fn privacy_loss(&self, x: f64) -> f64 {
        self.sensitivity * (0.5 * self.sensitivity - x) / self.variance
    }

    fn inverse_privacy_loss(&self, loss: f64) -> f64 {
        0.5 * self.sensitivity - loss * self.variance / self.sensitivity
    }

    fn mu_upper_cdf(&self, x: f64) -> f64 {
        self.noise.cdf(x)
    }

    fn privacy_loss_tail(&self, estimate_type: EstimateType) -> PrivacyLossTail {
        let tail_mass = 0.5 * self.log_mass_truncation_bound.exp();
        let lower_x_truncation = self.noise.inverse_cdf(tail_mass);
        let upper_x_truncation = -lower_x_truncation;

        let probability_mass = if estimate_type.is_pessimistic() {
            // The high-loss tail is unbounded; sending its mass to
            // infinity keeps the estimate an upper bound.
            vec![
                (f64::INFINITY, self.mu_upper_cdf(lower_x_truncation)),
                (
                    self.privacy_loss(upper_x_truncation),
                    1.0 - self.mu_upper_cdf(upper_x_truncation),
                ),
            ]
        } else {
            vec![(
                self.privacy_loss(lower_x_truncation),
                self.mu_upper_cdf(lower_x_truncation),
            )]
        };

        PrivacyLossTail {
            lower_x_truncation,
            upper_x_truncation,
            probability_mass,
        }
    }
}

/// Privacy loss of the discrete Laplace mechanism (mass proportional to
/// `exp(-parameter * |k|)` on the integers).
#[derive(Clone, Debug)]
pub struct DiscreteLaplacePrivacyLoss {
    parameter: f64,
    sensitivity: i64,
}

impl DiscreteLaplacePrivacyLoss {
    /// Create the model; `parameter` must be positive and `sensitivity`
    /// a positive integer.
    pub fn new(parameter: f64, sensitivity: i64) -> Result<Self> {
        if !parameter.is_finite() || parameter <= 0.0 {
            return Err(DpError::invalid("discrete Laplace parameter must be positive"));
        }
        if sensitivity < 1 {
            return Err(DpError::invalid("sensitivity must be a positive integer"));
        }
        Ok(Self {
            parameter,
            sensitivity,
        })
    }

    fn privacy_loss(&self, x: f64) -> f64 {
        self.parameter * ((x - self.sensitivity as f64).abs() - x.abs())
    }

    fn inverse_privacy_loss(&self, loss: f64) -> f64 {
        0.5 * (self.sensitivity as f64 - loss / self.parameter)
    }

    fn mu_upper_cdf(&self, x: f64) -> f64 {
        let a = self.parameter;
        let k = x.floor();
        if k < 0.0 {
            (a * k).exp() / (1.0 + (-a).exp())
        } else {
            1.0 - (-a * (k + 1.0)).exp() / (1.0 + (-a).exp())
        }
    }

    fn mu_upper_probability(&self, k: i64) -> f64 {
        let a = self.parameter;
        let normalizer = (1.0 - (-a).exp()) / (1.0 + (-a).exp());
        normalizer * (-a * k.abs() as f64).exp()
    }

    fn privacy_loss_tail(&self) -> PrivacyLossTail {
        let a = self.parameter;
        let s = self.sensitivity as f64;
        let max_loss = a * s;
        // P(K <= 0) and P(K >= sensitivity) in closed form; the loss is
        // constant on both regions, so the tails are exact.
        let mass_low_outcomes = 1.0 / (1.0 + (-a).exp());
        let mass_high_outcomes = (-a * s).exp() / (1.0 + (-a).exp());
        PrivacyLossTail {
            lower_x_truncation: 1.0,
            upper_x_truncation: s - 1.0,
            probability_mass: vec![
                (max_loss, mass_low_outcomes),
                (-max_loss, mass_high_outcomes),
            ],
        }
    }
}

/// Privacy loss of the discrete Gaussian mechanism (mass proportional to
/// `exp(-k^2 / (2 sigma^2))` on integers in `[-t, t]`).
#[derive(Clone, Debug)]
pub struct DiscreteGaussianPrivacyLoss {
    sigma: f64,
    sensitivity: i64,
    truncation_bound: i64,
    probabilities: Vec<f64>,
}

/// Symmetric truncation at `ceil(11.6 sigma)` excludes at most 1e-30 of
/// the untruncated mass.
const DEFAULT_TRUNCATION_MULTIPLIER: f64 = 11.6;

impl DiscreteGaussianPrivacyLoss {
    /// Create the model; `sigma` must be positive, `sensitivity` a
    /// positive integer. When `truncation_bound` is unset, the smallest
    /// symmetric range excluding at most 1e-30 of the mass is used.
    pub fn new(sigma: f64, sensitivity: i64, truncation_bound: Option<i64>) -> Result<Self> {
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(DpError::invalid("sigma must be positive"));
        }
        if sensitivity < 1 {
            return Err(DpError::invalid("sensitivity must be a positive integer"));
        }
        let truncation_bound = match truncation_bound {
            Some(bound) if bound < 1 => {
                return Err(DpError::invalid("truncation bound must be a positive integer"));
            }
            Some(bound) => bound,
            None => ((DEFAULT_TRUNCATION_MULTIPLIER * sigma).ceil() as i64).max(1),
        };

        let two_variance = 2.0 * sigma * sigma;
        let mut probabilities: Vec<f64> = (-truncation_bound..=truncation_bound)
            .map(|k| (-(k as f64) * (k as f64) / two_variance).exp())
            .collect();
        let normalizer: f64 = probabilities.iter().sum();
        for p in &mut probabilities {
            *p /= normalizer;
        }

        Ok(Self {
            sigma,
            sensitivity,
            truncation_bound,
            probabilities,
        })
    }

    /// The truncation bound in use (explicit or derived).
    pub fn truncation_bound(&self) -> i64 {
        self.truncation_bound
    }

    fn privacy_loss(&self, x: f64) -> f64 {
        let s = self.sensitivity as f64;
        if x < (self.sensitivity - self.truncation_bound) as f64 {
            // The lower distribution has no support here.
            return f64::INFINITY;
        }
        s * (s - 2.0 * x) / (2.0 * self.sigma * self.sigma)
    }

    fn inverse_privacy_loss(&self, loss: f64) -> f64 {
        let s = self.sensitivity as f64;
        0.5 * s - loss * self.sigma * self.sigma / s
    }

    fn mu_upper_cdf(&self, x: f64) -> f64 {
        let k = x.floor() as i64;
        if k < -self.truncation_bound {
            return 0.0;
        }
        let upto = k.min(self.truncation_bound);
        self.probabilities[..=(upto + self.truncation_bound) as usize]
            .iter()
            .sum()
    }

    fn mu_upper_probability(&self, k: i64) -> f64 {
        if k.abs() > self.truncation_bound {
            return 0.0;
        }
        self.probabilities[(k + self.truncation_bound) as usize]
    }

    fn privacy_loss_tail(&self) -> PrivacyLossTail {
        // The support is finite; enumeration covers every outcome.
        PrivacyLossTail {
            lower_x_truncation: -self.truncation_bound as f64,
            upper_x_truncation: self.truncation_bound as f64,
            probability_mass: Vec::new(),
        }
    }
}

/// The closed set of additive-noise privacy loss models.
///
/// Selected at construction time; the engine dispatches over the variants
/// rather than over an open trait since the supported mechanism families
/// are fixed and enumerable.
#[derive(Clone, Debug)]
pub enum AdditiveNoisePrivacyLoss {
    /// Laplace noise.
    Laplace(LaplacePrivacyLoss),
    /// Gaussian noise.
    Gaussian(GaussianPrivacyLoss),
    /// Discrete (geometric two-sided) Laplace noise.
    DiscreteLaplace(DiscreteLaplacePrivacyLoss),
    /// Truncated discrete Gaussian noise.
    DiscreteGaussian(DiscreteGaussianPrivacyLoss),
}

impl AdditiveNoisePrivacyLoss {
    /// Whether the noise distribution is supported on the integers.
    pub fn is_discrete(&self) -> bool {
        matches!(
            self,
            AdditiveNoisePrivacyLoss::DiscreteLaplace(_)
                | AdditiveNoisePrivacyLoss::DiscreteGaussian(_)
        )
    }

    /// Privacy loss at outcome `x`; `+infinity` where the lower
    /// distribution has no support.
    pub fn privacy_loss(&self, x: f64) -> f64 {
        match self {
            AdditiveNoisePrivacyLoss::Laplace(m) => m.privacy_loss(x),
            AdditiveNoisePrivacyLoss::Gaussian(m) => m.privacy_loss(x),
            AdditiveNoisePrivacyLoss::DiscreteLaplace(m) => m.privacy_loss(x),
            AdditiveNoisePrivacyLoss::DiscreteGaussian(m) => m.privacy_loss(x),
        }
    }

    /// Outcome attaining the given loss on the strictly decreasing
    /// section of the loss curve.
    pub fn inverse_privacy_loss(&self, loss: f64) -> f64 {
        match self {
            AdditiveNoisePrivacyLoss::Laplace(m) => m.inverse_privacy_loss(loss),
            AdditiveNoisePrivacyLoss::Gaussian(m) => m.inverse_privacy_loss(loss),
            AdditiveNoisePrivacyLoss::DiscreteLaplace(m) => m.inverse_privacy_loss(loss),
            AdditiveNoisePrivacyLoss::DiscreteGaussian(m) => m.inverse_privacy_loss(loss),
        }
    }

    /// CDF of the upper distribution at `x`.
    pub fn mu_upper_cdf(&self, x: f64) -> f64 {
        match self {
            AdditiveNoisePrivacyLoss::Laplace(m) => m.mu_upper_cdf(x),
            AdditiveNoisePrivacyLoss::Gaussian(m) => m.mu_upper_cdf(x),
            AdditiveNoisePrivacyLoss::DiscreteLaplace(m) => m.mu_upper_cdf(x),
            AdditiveNoisePrivacyLoss::DiscreteGaussian(m) => m.mu_upper_cdf(x),
        }
    }

    /// Point mass of the upper distribution at integer outcome `k`; zero
    /// for continuous noise.
    pub fn mu_upper_probability(&self, k: i64) -> f64 {
        match self {
            AdditiveNoisePrivacyLoss::Laplace(_) | AdditiveNoisePrivacyLoss::Gaussian(_) => 0.0,
            AdditiveNoisePrivacyLoss::DiscreteLaplace(m) => m.mu_upper_probability(k),
            AdditiveNoisePrivacyLoss::DiscreteGaussian(m) => m.mu_upper_probability(k),
        }
    }

    /// Truncation range and explicit tail mass for the given estimate
    /// type.
    pub fn privacy_loss_tail(&self, estimate_type: EstimateType) -> PrivacyLossTail {
        match self {
            AdditiveNoisePrivacyLoss::Laplace(m) => m.privacy_loss_tail(),
            AdditiveNoisePrivacyLoss::Gaussian(m) => m.privacy_loss_tail(estimate_type),
            AdditiveNoisePrivacyLoss::DiscreteLaplace(m) => m.privacy_loss_tail(),
            AdditiveNoisePrivacyLoss::DiscreteGaussian(m) => m.privacy_loss_tail(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn laplace_loss_has_three_regions() {
        let m = LaplacePrivacyLoss::new(1.0, 1.0).unwrap();
        assert!((m.privacy_loss(-3.0) - 1.0).abs() < 1e-12);
        assert!((m.privacy_loss(0.25) - 0.5).abs() < 1e-12);
        assert!((m.privacy_loss(4.0) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn laplace_inverse_matches_loss_on_mid_section() {
        let m = LaplacePrivacyLoss::new(2.0, 1.5).unwrap();
        for &loss in &[-0.5, 0.0, 0.3, 0.7] {
            let x = m.inverse_privacy_loss(loss);
            assert!((m.privacy_loss(x) - loss).abs() < 1e-12);
        }
    }

    #[test]
    fn laplace_tail_mass_is_exact() {
        let m = LaplacePrivacyLoss::new(1.0, 1.0).unwrap();
        let tail = m.privacy_loss_tail();
        let total: f64 = tail.probability_mass.iter().map(|&(_, mass)| mass).sum();
        let mid = m.mu_upper_cdf(tail.upper_x_truncation) - m.mu_upper_cdf(tail.lower_x_truncation);
        assert!((total + mid - 1.0).abs() < 1e-12);
    }

    #[test]
    fn gaussian_loss_is_decreasing() {
        let m = GaussianPrivacyLoss::new(1.0, 1.0, -50.0).unwrap();
        assert!(m.privacy_loss(-1.0) > m.privacy_loss(0.0));
        assert!(m.privacy_loss(0.0) > m.privacy_loss(1.0));
        let x = m.inverse_privacy_loss(0.37);
        assert!((m.privacy_loss(x) - 0.37).abs() < 1e-10);
    }

    #[test]
    fn gaussian_pessimistic_tail_sends_high_losses_to_infinity() {
        let m = GaussianPrivacyLoss::new(1.0, 1.0, -50.0).unwrap();
        let tail = m.privacy_loss_tail(EstimateType::Pessimistic);
        assert_eq!(tail.probability_mass.len(), 2);
        assert!(tail.probability_mass[0].0.is_infinite());
        let optimistic = m.privacy_loss_tail(EstimateType::Optimistic);
        assert_eq!(optimistic.probability_mass.len(), 1);
        assert!(optimistic.probability_mass[0].0.is_finite());
    }

    #[test]
    fn gaussian_rejects_bad_parameters() {
        assert!(GaussianPrivacyLoss::new(0.0, 1.0, -50.0).is_err());
        assert!(GaussianPrivacyLoss::new(1.0, -1.0, -50.0).is_err());
        assert!(GaussianPrivacyLoss::new(1.0, 1.0, 1.0).is_err());
    }

    #[test]
    fn discrete_laplace_probabilities_sum_to_one() {
        let m = DiscreteLaplacePrivacyLoss::new(0.5, 2).unwrap();
        let total: f64 = (-200..=200).map(|k| m.mu_upper_probability(k)).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn discrete_laplace_tail_matches_enumeration() {
        let m = DiscreteLaplacePrivacyLoss::new(0.5, 3).unwrap();
        let tail = m.privacy_loss_tail();
        let low: f64 = (-400..=0).map(|k| m.mu_upper_probability(k)).sum();
        let high: f64 = (3..=400).map(|k| m.mu_upper_probability(k)).sum();
        assert!((tail.probability_mass[0].1 - low).abs() < 1e-12);
        assert!((tail.probability_mass[1].1 - high).abs() < 1e-12);
        assert!((tail.probability_mass[0].0 - 1.5).abs() < 1e-12);
    }

    #[test]
    fn discrete_laplace_cdf_matches_mass() {
        let m = DiscreteLaplacePrivacyLoss::new(0.7, 1).unwrap();
        let direct: f64 = (-300..=2).map(|k| m.mu_upper_probability(k)).sum();
        assert!((m.mu_upper_cdf(2.0) - direct).abs() < 1e-12);
        assert!((m.mu_upper_cdf(2.9) - direct).abs() < 1e-12);
    }

    #[test]
    fn discrete_gaussian_support_is_truncated() {
        let m = DiscreteGaussianPrivacyLoss::new(1.0, 1, Some(3)).unwrap();
        assert_eq!(m.truncation_bound(), 3);
        assert_eq!(m.mu_upper_probability(4), 0.0);
        let total: f64 = (-3..=3).map(|k| m.mu_upper_probability(k)).sum();
        assert!((total - 1.0).abs() < 1e-12);
        // Outcomes below sensitivity - bound are impossible under the
        // lower distribution.
        assert!(m.privacy_loss(-3.0).is_infinite());
        assert!(m.privacy_loss(-2.0).is_finite());
    }

    #[test]
    fn discrete_gaussian_default_truncation_is_wide() {
        let m = DiscreteGaussianPrivacyLoss::new(2.0, 1, None).unwrap();
        assert_eq!(m.truncation_bound(), 24);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(LaplacePrivacyLoss::new(-1.0, 1.0).is_err());
        assert!(LaplacePrivacyLoss::new(1.0, 0.0).is_err());
        assert!(DiscreteLaplacePrivacyLoss::new(0.5, 0).is_err());
        assert!(DiscreteGaussianPrivacyLoss::new(1.0, 1, Some(0)).is_err());
        assert!(DiscreteGaussianPrivacyLoss::new(-1.0, 1, None).is_err());
    }
}
