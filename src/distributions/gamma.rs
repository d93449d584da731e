//! Gamma distribution implementation.

use super::base::{DistributionSpec, FamilySpec, LossFn, ParamDef, Stabilization};
use super::family::Family;
use crate::autodiff::Real;
use crate::error::Result;
use crate::utils::ResponseFn;
use rand::Rng;
use rand_distr::{Distribution as RandDistribution, Gamma as RandGamma};
use statrs::distribution::{ContinuousCDF, Gamma as StatrsGamma};

const POSITIVE_FNS: &[ResponseFn] = &[ResponseFn::Exp, ResponseFn::Softplus];

pub(crate) const SPEC: FamilySpec = FamilySpec {
    name: "Gamma",
    params: &[
        ParamDef::new("concentration", POSITIVE_FNS),
        ParamDef::tied("rate", POSITIVE_FNS, "concentration"),
    ],
    discrete: false,
    univariate: true,
};

/// Gamma distribution with `concentration` (shape) and `rate`.
pub struct Gamma;

impl Gamma {
    /// `response_fn` ("exp" or "softplus") is used for both parameters.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(
        stabilization: Stabilization,
        response_fn: ResponseFn,
        loss_fn: LossFn,
    ) -> Result<DistributionSpec> {
        DistributionSpec::new(
            Family::Gamma,
            &[("concentration", response_fn), ("rate", response_fn)],
            stabilization,
            loss_fn,
        )
    }
}

pub(crate) fn log_prob<S: Real>(params: &[S], y: f64) -> S {
    let (concentration, rate) = (params[0], params[1]);
    if y <= 0.0 {
        return S::constant(f64::NEG_INFINITY);
    }
    let one = S::constant(1.0);
    concentration * rate.ln() + (concentration - one) * S::constant(y.ln())
        - rate * S::constant(y)
        - concentration.ln_gamma()
}

pub(crate) fn sample<R: Rng + ?Sized>(params: &[f64], rng: &mut R) -> f64 {
    match RandGamma::new(params[0], 1.0 / params[1]) {
        Ok(dist) => dist.sample(rng),
        Err(_) => 0.0,
    }
}

pub(crate) fn inverse_cdf(params: &[f64], p: f64) -> f64 {
    match StatrsGamma::new(params[0], params[1]) {
        Ok(dist) => dist.inverse_cdf(p),
        Err(_) => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use statrs::distribution::Continuous;

    #[test]
    fn test_gamma_log_prob() {
        for &(a, b, y) in &[(2.0, 1.0, 1.5), (0.7, 3.0, 0.2), (9.0, 0.5, 20.0)] {
            let expected = StatrsGamma::new(a, b).unwrap().ln_pdf(y);
            assert_relative_eq!(log_prob(&[a, b], y), expected, epsilon = 1e-10);
        }
        assert_eq!(log_prob(&[2.0, 1.0], 0.0), f64::NEG_INFINITY);
    }

    #[test]
    fn test_gamma_sample_mean() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let n = 20_000;
        let mean = (0..n).map(|_| sample(&[3.0, 2.0], &mut rng)).sum::<f64>() / n as f64;
        assert_relative_eq!(mean, 1.5, epsilon = 0.05);
    }

    #[test]
    fn test_gamma_inverse_cdf_is_monotone() {
        let lo = inverse_cdf(&[2.0, 1.0], 0.1);
        let hi = inverse_cdf(&[2.0, 1.0], 0.9);
        assert!(lo > 0.0 && lo < hi);
    }
}
