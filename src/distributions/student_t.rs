//! Student-T distribution implementation.

use super::base::{DistributionSpec, FamilySpec, LossFn, ParamDef, Stabilization};
use super::family::Family;
use crate::autodiff::Real;
use crate::error::Result;
use crate::utils::ResponseFn;
use rand::Rng;
use rand_distr::{Distribution as RandDistribution, StudentT as RandStudentT};
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::f64::consts::PI;

const POSITIVE_FNS: &[ResponseFn] = &[ResponseFn::Exp, ResponseFn::Softplus];

pub(crate) const SPEC: FamilySpec = FamilySpec {
    name: "StudentT",
    params: &[
        // df > 2 keeps the variance finite
        ParamDef::shifted("df", POSITIVE_FNS, 2.0),
        ParamDef::new("loc", &[ResponseFn::Identity]),
        ParamDef::tied("scale", POSITIVE_FNS, "df"),
    ],
    discrete: false,
    univariate: true,
};

/// Student-T distribution with parameters `df`, `loc` and `scale`.
pub struct StudentT;

impl StudentT {
    /// `response_fn` ("exp" or "softplus") is used for both `df` and `scale`.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(
        stabilization: Stabilization,
        response_fn: ResponseFn,
        loss_fn: LossFn,
    ) -> Result<DistributionSpec> {
        DistributionSpec::new(
            Family::StudentT,
            &[("df", response_fn), ("scale", response_fn)],
            stabilization,
            loss_fn,
        )
    }
}

/// log p(y|v,m,s) = lgamma((v+1)/2) - lgamma(v/2) - 0.5 log(v pi) - log s
///                  - (v+1)/2 log(1 + ((y-m)/s)^2 / v)
pub(crate) fn log_prob<S: Real>(params: &[S], y: f64) -> S {
    let (df, loc, scale) = (params[0], params[1], params[2]);
    let half = S::constant(0.5);
    let one = S::constant(1.0);

    let z = (S::constant(y) - loc) / scale;
    let normalizer = scale.ln() + half * df.ln() + S::constant(0.5 * PI.ln()) + (half * df).ln_gamma()
        - (half * (df + one)).ln_gamma();
    -half * (df + one) * (z * z / df).ln_1p() - normalizer
}

pub(crate) fn sample<R: Rng + ?Sized>(params: &[f64], rng: &mut R) -> f64 {
    let (df, loc, scale) = (params[0], params[1], params[2]);
    match RandStudentT::new(df) {
        Ok(dist) => loc + scale * dist.sample(rng),
        Err(_) => loc,
    }
}

pub(crate) fn inverse_cdf(params: &[f64], p: f64) -> f64 {
    match StudentsT::new(params[1], params[2], params[0]) {
        Ok(dist) => dist.inverse_cdf(p),
        Err(_) => f64::NAN,
    }
}
