//! Gaussian (Normal) distribution implementation.

use super::base::{DistributionSpec, FamilySpec, LossFn, ParamDef, Stabilization};
use super::family::Family;
use crate::autodiff::Real;
use crate::error::Result;
use crate::utils::ResponseFn;
use rand::Rng;
use rand_distr::{Distribution as RandDistribution, Normal};
use statrs::distribution::{ContinuousCDF, Normal as StatrsNormal};
use std::f64::consts::PI;

pub(crate) const SPEC: FamilySpec = FamilySpec {
    name: "Gaussian",
    params: &[
        ParamDef::new("loc", &[ResponseFn::Identity]),
        ParamDef::new("scale", &[ResponseFn::Exp, ResponseFn::Softplus]),
    ],
    discrete: false,
    univariate: true,
};

/// Gaussian (Normal) distribution for distributional regression.
pub struct Gaussian;

impl Gaussian {
    /// `response_fn` applies to `scale`: "exp" (default) or "softplus".
    #[allow(clippy::new_ret_no_self)]
    pub fn new(
        stabilization: Stabilization,
        response_fn: ResponseFn,
        loss_fn: LossFn,
    ) -> Result<DistributionSpec> {
        DistributionSpec::new(
            Family::Gaussian,
            &[("scale", response_fn)],
            stabilization,
            loss_fn,
        )
    }
}

pub(crate) fn log_prob<S: Real>(params: &[S], y: f64) -> S {
    let (loc, scale) = (params[0], params[1]);
    let z = (S::constant(y) - loc) / scale;
    S::constant(-0.5 * (2.0 * PI).ln()) - scale.ln() - S::constant(0.5) * z * z
}

pub(crate) fn sample<R: Rng + ?Sized>(params: &[f64], rng: &mut R) -> f64 {
    match Normal::new(params[0], params[1]) {
        Ok(dist) => dist.sample(rng),
        Err(_) => params[0],
    }
}

pub(crate) fn inverse_cdf(params: &[f64], p: f64) -> f64 {
    match StatrsNormal::new(params[0], params[1]) {
        Ok(dist) => dist.inverse_cdf(p),
        Err(_) => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use statrs::distribution::Continuous;

    #[test]
    fn test_gaussian_log_prob() {
        // Test standard normal at mean
        let expected = -0.5 * (2.0 * PI).ln();
        assert_relative_eq!(log_prob(&[0.0, 1.0], 0.0), expected, epsilon = 1e-12);

        let reference = StatrsNormal::new(5.0, 2.0).unwrap().ln_pdf(7.5);
        assert_relative_eq!(log_prob(&[5.0, 2.0], 7.5), reference, epsilon = 1e-12);
    }

    #[test]
    fn test_gaussian_inverse_cdf() {
        assert_relative_eq!(inverse_cdf(&[3.0, 2.0], 0.5), 3.0, epsilon = 1e-9);
        assert_relative_eq!(inverse_cdf(&[0.0, 1.0], 0.975), 1.959_963_984_540_054, epsilon = 1e-8);
    }

    #[test]
    fn test_gaussian_params() {
        let dist = Gaussian::new(Stabilization::None, ResponseFn::Softplus, LossFn::Crps).unwrap();
        assert_eq!(dist.param_names(), vec!["loc", "scale"]);
        assert_eq!(dist.loss_fn(), LossFn::Crps);
        assert!(Gaussian::new(Stabilization::None, ResponseFn::Identity, LossFn::Nll).is_err());
    }
}
