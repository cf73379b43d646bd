//! Sparse probability mass function over discretized privacy loss values.
//!
//! Keys are grid indices: a key `k` stands for the loss value
//! `k * discretization_interval` of the owning distribution. Convolution
//! between wide supports is transform-based (FFT): at the default
//! interval of `1e-4` a single additive-noise mechanism already occupies
//! 10^4 to 10^6 grid keys, where a direct O(n^2) convolution is
//! impractical. When either operand has only a handful of entries the
//! exact direct convolution is used instead.

use std::collections::HashMap;

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Numerical slack allowed when checking that the total probability mass
/// (finite entries plus infinity mass) does not exceed one.
pub const MASS_SUM_TOLERANCE: f64 = 1e-6;

/// Sparse mapping from discretized privacy loss value to probability mass.
///
/// The container itself imposes no ordering; ordering is applied when
/// iterating for convolution or cumulative queries.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProbabilityMassFunction {
    masses: HashMap<i64, f64>,
}

/// Contiguous view of a sparse PMF, used for convolution.
#[derive(Clone, Debug)]
pub(crate) struct DensePmf {
    /// Grid index of `probs[0]`.
    pub lower_key: i64,
    /// Mass per consecutive grid index.
    pub probs: Vec<f64>,
}

impl ProbabilityMassFunction {
    /// Create an empty PMF.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate `mass` at grid index `key`. Zero mass is not stored.
    pub fn add_mass(&mut self, key: i64, mass: f64) {
        debug_assert!(mass >= 0.0, "probability mass must be non-negative");
        if mass <= 0.0 {
            return;
        }
        *self.masses.entry(key).or_insert(0.0) += mass;
    }

    /// The mass at `key`, zero if absent.
    pub fn mass_at(&self, key: i64) -> f64 {
        self.masses.get(&key).copied().unwrap_or(0.0)
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.masses.len()
    }

    /// Whether no finite loss value carries mass.
    pub fn is_empty(&self) -> bool {
        self.masses.is_empty()
    }

    /// Iterate over `(key, mass)` entries in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.masses.iter().map(|(&k, &m)| (k, m))
    }

    /// Sum of all finite masses.
    pub fn total_mass(&self) -> f64 {
        self.masses.values().sum()
    }

    /// Smallest grid index carrying mass.
    pub fn min_key(&self) -> Option<i64> {
        self.masses.keys().min().copied()
    }

    /// Largest grid index carrying mass.
    pub fn max_key(&self) -> Option<i64> {
        self.masses.keys().max().copied()
    }

    /// Entries sorted by ascending grid index.
    pub fn sorted_entries(&self) -> Vec<(i64, f64)> {
        let mut entries: Vec<(i64, f64)> = self.iter().collect();
        entries.sort_by_key(|&(k, _)| k);
        entries
    }

    /// Describe the first mass invariant violation, if any: a negative or
    /// non-finite entry, or total mass above one beyond tolerance.
    pub(crate) fn mass_violation(&self, infinity_mass: f64) -> Option<String> {
        for (key, mass) in self.iter() {
            if !mass.is_finite() || mass < 0.0 {
                return Some(format!("mass {mass} at key {key} is not a probability"));
            }
        }
        if !(0.0..=1.0 + MASS_SUM_TOLERANCE).contains(&infinity_mass) {
            return Some(format!("infinity mass {infinity_mass} is not a probability"));
        }
        let total = self.total_mass() + infinity_mass;
        if total > 1.0 + MASS_SUM_TOLERANCE {
            return Some(format!("total probability mass {total} exceeds one"));
        }
        None
    }

    /// Contiguous view spanning `[min_key, max_key]`, or `None` when empty.
    pub(crate) fn to_dense(&self) -> Option<DensePmf> {
        let min = self.min_key()?;
        let max = self.max_key()?;
        let mut probs = vec![0.0_f64; (max - min + 1) as usize];
        for (key, mass) in self.iter() {
            probs[(key - min) as usize] += mass;
        }
        Some(DensePmf {
            lower_key: min,
            probs,
        })
    }

    /// Rebuild a sparse PMF from a dense view, skipping empty bins.
    pub(crate) fn from_dense(lower_key: i64, probs: &[f64]) -> Self {
        let mut pmf = Self::new();
        for (i, &mass) in probs.iter().enumerate() {
            if mass > 0.0 {
                pmf.add_mass(lower_key + i as i64, mass);
            }
        }
        pmf
    }

    /// Remove the smallest-loss entries whose cumulative mass stays at or
    /// below `tail_mass_truncation`, returning the removed mass.
    ///
    /// The caller decides what the removed mass becomes: infinity mass for
    /// pessimistic estimates, nothing for optimistic ones. The large-loss
    /// tail is never truncated here since dropping it would understate
    /// delta.
    pub(crate) fn truncate_smallest(&mut self, tail_mass_truncation: f64) -> f64 {
        if tail_mass_truncation <= 0.0 {
            return 0.0;
        }
        let mut removed = 0.0;
        for (key, mass) in self.sorted_entries() {
            if removed + mass > tail_mass_truncation {
                break;
            }
            removed += mass;
            self.masses.remove(&key);
        }
        removed
    }
}

/// Entry count below which direct convolution beats the transform and is
/// exact: point-mass distributions (identity, imported (epsilon, delta)
/// guarantees) stay free of FFT round-off.
const DIRECT_CONVOLUTION_MAX_ENTRIES: usize = 64;

/// Convolve two sparse PMFs: the mass function of the sum of the two
/// independent loss variables.
///
/// Direct O(|a|·|b|) convolution when either operand is small, FFT
/// otherwise.
pub(crate) fn convolve_pmfs(
    a: &ProbabilityMassFunction,
    b: &ProbabilityMassFunction,
) -> ProbabilityMassFunction {
    if a.len().min(b.len()) <= DIRECT_CONVOLUTION_MAX_ENTRIES {
        let mut out = ProbabilityMassFunction::new();
        for (key_a, mass_a) in a.iter() {
            for (key_b, mass_b) in b.iter() {
                out.add_mass(key_a + key_b, mass_a * mass_b);
            }
        }
        return out;
    }
    match (a.to_dense(), b.to_dense()) {
        (Some(da), Some(db)) => {
            let probs = convolve(&da.probs, &db.probs);
            ProbabilityMassFunction::from_dense(da.lower_key + db.lower_key, &probs)
        }
        _ => ProbabilityMassFunction::new(),
    }
}

/// Linear convolution of two mass vectors via FFT.
///
/// Round-off can leave slightly negative bins; they are clamped to zero so
/// every output is a valid mass.
pub(crate) fn convolve(a: &[f64], b: &[f64]) -> Vec<f64> {
    let n = a.len() + b.len() - 1;
    let size = n.next_power_of_two();

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(size);
    let ifft = planner.plan_fft_inverse(size);

    let mut fa = vec![Complex::new(0.0, 0.0); size];
    let mut fb = vec![Complex::new(0.0, 0.0); size];
    for (i, &val) in a.iter().enumerate() {
        fa[i].re = val;
    }
    for (i, &val) in b.iter().enumerate() {
        fb[i].re = val;
    }
    fft.process(&mut fa);
    fft.process(&mut fb);
    for (a_i, b_i) in fa.iter_mut().zip(fb.iter()) {
        *a_i *= *b_i;
    }
    ifft.process(&mut fa);

    let scale = 1.0 / size as f64;
    (0..n).map(|i| (fa[i].re * scale).max(0.0)).collect()
}
