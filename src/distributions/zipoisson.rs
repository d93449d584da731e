//! Zero-Inflated Poisson distribution implementation.

use super::base::{DistributionSpec, FamilySpec, LossFn, ParamDef, Stabilization};
use super::family::Family;
use super::poisson;
use crate::autodiff::Real;
use crate::error::Result;
use crate::utils::ResponseFn;
use rand::Rng;

pub(crate) const SPEC: FamilySpec = FamilySpec {
    name: "ZIPoisson",
    params: &[
        ParamDef::new(
            "rate",
            &[ResponseFn::Relu, ResponseFn::Exp, ResponseFn::Softplus],
        ),
        ParamDef::new("gate", &[ResponseFn::Sigmoid]),
    ],
    discrete: true,
    univariate: true,
};

/// Poisson with an extra point mass at zero of probability `gate`.
pub struct ZIPoisson;

impl ZIPoisson {
    /// `response_fn` applies to `rate`; `gate` always uses sigmoid.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(
        stabilization: Stabilization,
        response_fn: ResponseFn,
        loss_fn: LossFn,
    ) -> Result<DistributionSpec> {
        DistributionSpec::new(
            Family::ZiPoisson,
            &[("rate", response_fn)],
            stabilization,
            loss_fn,
        )
    }
}

pub(crate) fn log_prob<S: Real>(params: &[S], y: f64) -> S {
    let gate = params[1];
    zero_inflate(gate, poisson::log_prob(&params[..1], y), y)
}

/// Mix a base log-probability with a point mass at zero.
pub(crate) fn zero_inflate<S: Real>(gate: S, base_log_prob: S, y: f64) -> S {
    let log_keep = (-gate).ln_1p() + base_log_prob;
    if y == 0.0 {
        (gate + log_keep.exp()).ln()
    } else {
        log_keep
    }
}

pub(crate) fn sample<R: Rng + ?Sized>(params: &[f64], rng: &mut R) -> f64 {
    if rng.random::<f64>() < params[1] {
        0.0
    } else {
        poisson::sample(&params[..1], rng)
    }
}
