//! Lossless serialization of privacy loss distributions.
//!
//! The records here are the logical schema only; callers pick the serde
//! format. Only pessimistic distributions are serializable. The
//! optimistic restriction is a deliberate, documented limitation: an
//! understated delta curve must never be mistaken for a guarantee after
//! a round trip through storage.

use serde::{Deserialize, Serialize};

use pld_core::{DpError, EstimateType, Result};

use crate::pld::PrivacyLossDistribution;
use crate::pmf::ProbabilityMassFunction;

/// One finite entry of a serialized mass function.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PmfEntry {
    /// Grid index of the loss value (a multiple of the interval).
    pub loss_value_key: i64,
    /// Probability mass at that loss value.
    pub probability_mass: f64,
}

/// Logical serialized form of a privacy loss distribution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PldRecord {
    /// Grid spacing of the discretized loss values.
    pub discretization_interval: f64,
    /// Probability mass at privacy loss `+infinity`.
    pub infinity_mass: f64,
    /// Rounding discipline of the serialized distribution.
    pub estimate_type: EstimateType,
    /// Finite entries; zero-mass entries are never emitted.
    pub pmf: Vec<PmfEntry>,
}

impl PrivacyLossDistribution {
    /// Serialize to the logical record. Fails with `Unimplemented` for
    /// optimistic distributions.
    pub fn serialize(&self) -> Result<PldRecord> {
        if self.estimate_type() == EstimateType::Optimistic {
            return Err(DpError::unimplemented(
                "serialization of optimistic estimates is not supported",
            ));
        }
        let pmf = self
            .pmf()
            .sorted_entries()
            .into_iter()
            .filter(|&(_, mass)| mass > 0.0)
            .map(|(loss_value_key, probability_mass)| PmfEntry {
                loss_value_key,
                probability_mass,
            })
            .collect();
        Ok(PldRecord {
            discretization_interval: self.discretization_interval(),
            infinity_mass: self.infinity_mass(),
            estimate_type: self.estimate_type(),
            pmf,
        })
    }

    /// Reconstruct a distribution with identical query behavior from a
    /// record. Malformed fields are rejected; duplicate keys accumulate.
    pub fn deserialize(record: &PldRecord) -> Result<Self> {
        if record.estimate_type == EstimateType::Optimistic {
            return Err(DpError::unimplemented(
                "deserialization of optimistic estimates is not supported",
            ));
        }
        if !record.discretization_interval.is_finite() || record.discretization_interval <= 0.0 {
            return Err(DpError::malformed(
                "discretization interval must be positive",
            ));
        }
        if !record.infinity_mass.is_finite() || !(0.0..=1.0).contains(&record.infinity_mass) {
            return Err(DpError::malformed("infinity mass must be in [0, 1]"));
        }

        let mut pmf = ProbabilityMassFunction::new();
        for entry in &record.pmf {
            if !entry.probability_mass.is_finite() || entry.probability_mass < 0.0 {
                return Err(DpError::malformed(format!(
                    "probability mass {} at key {} is not a probability",
                    entry.probability_mass, entry.loss_value_key
                )));
            }
            pmf.add_mass(entry.loss_value_key, entry.probability_mass);
        }
        if let Some(violation) = pmf.mass_violation(record.infinity_mass) {
            return Err(DpError::malformed(violation));
        }

        Ok(Self::from_parts(
            record.discretization_interval,
            record.infinity_mass,
            pmf,
            record.estimate_type,
        ))
    }
}
