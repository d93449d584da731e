//! NegativeBinomial distribution implementation.
//!
//! `total_count` failures, success probability `probs`:
//! p(k) = C(k + r - 1, k) (1 - p)^r p^k, mean r p / (1 - p).

use super::base::{DistributionSpec, FamilySpec, LossFn, ParamDef, Stabilization};
use super::family::Family;
use crate::autodiff::Real;
use crate::error::Result;
use crate::utils::ResponseFn;
use rand::Rng;
use rand_distr::{Distribution as RandDistribution, Gamma as RandGamma, Poisson as RandPoisson};
use statrs::function::gamma::ln_gamma;

pub(crate) const TOTAL_COUNT_FNS: &[ResponseFn] =
    &[ResponseFn::Relu, ResponseFn::Exp, ResponseFn::Softplus];
pub(crate) const PROBS_FNS: &[ResponseFn] = &[ResponseFn::Sigmoid];

pub(crate) const SPEC: FamilySpec = FamilySpec {
    name: "NegativeBinomial",
    params: &[
        ParamDef::new("total_count", TOTAL_COUNT_FNS),
        ParamDef::new("probs", PROBS_FNS),
    ],
    discrete: true,
    univariate: true,
};

pub struct NegativeBinomial;

impl NegativeBinomial {
    #[allow(clippy::new_ret_no_self)]
    pub fn new(
        stabilization: Stabilization,
        response_fn_total_count: ResponseFn,
        response_fn_probs: ResponseFn,
        loss_fn: LossFn,
    ) -> Result<DistributionSpec> {
        DistributionSpec::new(
            Family::NegativeBinomial,
            &[
                ("total_count", response_fn_total_count),
                ("probs", response_fn_probs),
            ],
            stabilization,
            loss_fn,
        )
    }
}

pub(crate) fn log_prob<S: Real>(params: &[S], y: f64) -> S {
    let (total_count, probs) = (params[0], params[1]);
    if y < 0.0 {
        return S::constant(f64::NEG_INFINITY);
    }
    let lp = (total_count + S::constant(y)).ln_gamma()
        - S::constant(ln_gamma(y + 1.0))
        - total_count.ln_gamma()
        + total_count * (-probs).ln_1p();
    if y > 0.0 {
        lp + S::constant(y) * probs.ln()
    } else {
        lp
    }
}

/// Gamma-Poisson mixture.
pub(crate) fn sample<R: Rng + ?Sized>(params: &[f64], rng: &mut R) -> f64 {
    let (total_count, probs) = (params[0], params[1]);
    let Ok(gamma) = RandGamma::new(total_count, probs / (1.0 - probs)) else {
        return 0.0;
    };
    let lambda: f64 = gamma.sample(rng);
    match RandPoisson::new(lambda) {
        Ok(poisson) => poisson.sample(rng),
        Err(_) => 0.0,
    }
}
