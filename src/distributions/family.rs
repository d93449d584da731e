//! Closed set of supported distribution families.
//!
//! Adding a family means adding a module with a [`FamilySpec`], a log-density
//! generic over [`Real`] and a sampler, then one variant here.

use super::base::FamilySpec;
use super::{gamma, gaussian, negative_binomial, poisson, student_t, zinb, zipoisson};
use crate::autodiff::Real;
use crate::error::{format_choices, DistBoostError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Family {
    Gaussian,
    Gamma,
    Poisson,
    NegativeBinomial,
    StudentT,
    #[serde(rename = "ZIPoisson")]
    ZiPoisson,
    #[serde(rename = "ZINB")]
    Zinb,
}

impl Family {
    pub const ALL: [Family; 7] = [
        Family::Gaussian,
        Family::Gamma,
        Family::Poisson,
        Family::NegativeBinomial,
        Family::StudentT,
        Family::ZiPoisson,
        Family::Zinb,
    ];

    pub fn spec(&self) -> &'static FamilySpec {
        match self {
            Family::Gaussian => &gaussian::SPEC,
            Family::Gamma => &gamma::SPEC,
            Family::Poisson => &poisson::SPEC,
            Family::NegativeBinomial => &negative_binomial::SPEC,
            Family::StudentT => &student_t::SPEC,
            Family::ZiPoisson => &zipoisson::SPEC,
            Family::Zinb => &zinb::SPEC,
        }
    }

    /// Log-density (or log-mass) of `y` under materialized parameters.
    pub fn log_prob<S: Real>(&self, params: &[S], y: f64) -> S {
        match self {
            Family::Gaussian => gaussian::log_prob(params, y),
            Family::Gamma => gamma::log_prob(params, y),
            Family::Poisson => poisson::log_prob(params, y),
            Family::NegativeBinomial => negative_binomial::log_prob(params, y),
            Family::StudentT => student_t::log_prob(params, y),
            Family::ZiPoisson => zipoisson::log_prob(params, y),
            Family::Zinb => zinb::log_prob(params, y),
        }
    }

    /// Draw one value given materialized parameters.
    pub fn sample<R: Rng + ?Sized>(&self, params: &[f64], rng: &mut R) -> f64 {
        match self {
            Family::Gaussian => gaussian::sample(params, rng),
            Family::Gamma => gamma::sample(params, rng),
            Family::Poisson => poisson::sample(params, rng),
            Family::NegativeBinomial => negative_binomial::sample(params, rng),
            Family::StudentT => student_t::sample(params, rng),
            Family::ZiPoisson => zipoisson::sample(params, rng),
            Family::Zinb => zinb::sample(params, rng),
        }
    }

    /// Quantile function; `None` for discrete families.
    pub fn inverse_cdf(&self, params: &[f64], p: f64) -> Option<f64> {
        match self {
            Family::Gaussian => Some(gaussian::inverse_cdf(params, p)),
            Family::Gamma => Some(gamma::inverse_cdf(params, p)),
            Family::StudentT => Some(student_t::inverse_cdf(params, p)),
            Family::Poisson | Family::NegativeBinomial | Family::ZiPoisson | Family::Zinb => None,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec().name)
    }
}

impl FromStr for Family {
    type Err = DistBoostError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        Family::ALL
            .into_iter()
            .find(|f| f.spec().name.eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| DistBoostError::UnknownName {
                kind: "distribution",
                got: s.to_string(),
                valid: format_choices(Family::ALL.iter().map(|f| f.spec().name)),
            })
    }
}
