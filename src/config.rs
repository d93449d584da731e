//! Numerical configuration shared by every stage of the engine.
//!
//! The defaults are process-wide constants. A [`DistributionSpec`] carries its
//! own copy of [`EngineConfig`], so a single specification can override them
//! without affecting any other.
//!
//! [`DistributionSpec`]: crate::distributions::DistributionSpec

use crate::error::{DistBoostError, Result};
use serde::{Deserialize, Serialize};

/// Distance kept from the open boundary of a parameter domain.
pub const DEFAULT_PARAM_EPS: f64 = 1e-6;
/// Largest magnitude of a materialized parameter.
pub const DEFAULT_PARAM_MAX: f64 = 1e15;
/// Smallest Hessian entry handed back to the boosting library.
pub const DEFAULT_HESSIAN_FLOOR: f64 = 1e-6;
/// Smallest divisor used by MAD and L2 stabilization.
pub const DEFAULT_DENOMINATOR_FLOOR: f64 = 1e-4;
/// Consistency constant turning a MAD into a standard-deviation estimate.
pub const DEFAULT_MAD_SCALE: f64 = 1.4826;
/// Atoms used by the quadrature CRPS estimator.
pub const DEFAULT_CRPS_POINTS: usize = 200;

/// How the CRPS of a continuous distribution is approximated.
///
/// Discrete families always enumerate their support; this choice only
/// matters for `Sampling`, which replaces the enumeration as well.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CrpsEstimator {
    /// Deterministic atoms at the quantile midpoints `F^-1((k - 0.5) / n_points)`.
    Quadrature { n_points: usize },
    /// Monte-Carlo draws from the materialized distribution, seeded per row.
    Sampling { n_samples: usize, seed: u64 },
}

impl Default for CrpsEstimator {
    fn default() -> Self {
        CrpsEstimator::Quadrature {
            n_points: DEFAULT_CRPS_POINTS,
        }
    }
}

/// Epsilon floors, stabilization constants and the CRPS estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Materialized parameters are kept this far inside open domain boundaries.
    pub param_eps: f64,
    /// Unbounded domains are capped at this magnitude.
    pub param_max: f64,
    /// Hessian entries are floored at this value after stabilization.
    pub hessian_floor: f64,
    /// MAD and L2 divisors are floored at this value.
    pub denominator_floor: f64,
    /// Multiplier applied to the raw median absolute deviation.
    pub mad_scale: f64,
    /// CRPS approximation strategy.
    pub crps: CrpsEstimator,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            param_eps: DEFAULT_PARAM_EPS,
            param_max: DEFAULT_PARAM_MAX,
            hessian_floor: DEFAULT_HESSIAN_FLOOR,
            denominator_floor: DEFAULT_DENOMINATOR_FLOOR,
            mad_scale: DEFAULT_MAD_SCALE,
            crps: CrpsEstimator::default(),
        }
    }
}

impl EngineConfig {
    /// Check that every constant is usable.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("param_eps", self.param_eps),
            ("param_max", self.param_max),
            ("hessian_floor", self.hessian_floor),
            ("denominator_floor", self.denominator_floor),
            ("mad_scale", self.mad_scale),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(DistBoostError::InvalidParameter(format!(
                    "{name} must be finite and positive, got {value}"
                )));
            }
        }
        if self.param_eps >= 0.5 {
            return Err(DistBoostError::InvalidParameter(format!(
                "param_eps must be below 0.5, got {}",
                self.param_eps
            )));
        }
        if self.param_max <= 1.0 {
            return Err(DistBoostError::InvalidParameter(format!(
                "param_max must exceed 1, got {}",
                self.param_max
            )));
        }
        match self.crps {
            CrpsEstimator::Quadrature { n_points } if n_points < 2 => {
                Err(DistBoostError::InvalidParameter(format!(
                    "CRPS quadrature needs at least 2 points, got {n_points}"
                )))
            }
            CrpsEstimator::Sampling { n_samples, .. } if n_samples < 2 => {
                Err(DistBoostError::InvalidParameter(format!(
                    "CRPS sampling needs at least 2 samples, got {n_samples}"
                )))
            }
            _ => Ok(()),
        }
    }
}
