//! Poisson distribution.

use super::base::{DistributionSpec, FamilySpec, LossFn, ParamDef, Stabilization};
use super::family::Family;
use crate::autodiff::Real;
use crate::error::Result;
use crate::utils::ResponseFn;
use rand::Rng;
use rand_distr::{Distribution as RandDistribution, Poisson as RandPoisson};
use statrs::function::gamma::ln_gamma;

pub(crate) const SPEC: FamilySpec = FamilySpec {
    name: "Poisson",
    params: &[ParamDef::new(
        "rate",
        &[ResponseFn::Relu, ResponseFn::Exp, ResponseFn::Softplus],
    )],
    discrete: true,
    univariate: true,
};

/// Poisson distribution with parameter `rate`.
pub struct Poisson;

impl Poisson {
    /// `response_fn` applies to `rate`: "relu" (default), "exp" or "softplus".
    #[allow(clippy::new_ret_no_self)]
    pub fn new(
        stabilization: Stabilization,
        response_fn: ResponseFn,
        loss_fn: LossFn,
    ) -> Result<DistributionSpec> {
        DistributionSpec::new(
            Family::Poisson,
            &[("rate", response_fn)],
            stabilization,
            loss_fn,
        )
    }
}

pub(crate) fn log_prob<S: Real>(params: &[S], y: f64) -> S {
    let rate = params[0];
    if y < 0.0 {
        return S::constant(f64::NEG_INFINITY);
    }
    let lp = -rate - S::constant(ln_gamma(y + 1.0));
    if y > 0.0 {
        lp + S::constant(y) * rate.ln()
    } else {
        lp
    }
}

pub(crate) fn sample<R: Rng + ?Sized>(params: &[f64], rng: &mut R) -> f64 {
    match RandPoisson::new(params[0]) {
        Ok(dist) => dist.sample(rng),
        Err(_) => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use statrs::distribution::{Discrete, Poisson as StatrsPoisson};

    #[test]
    fn test_poisson_creation() {
        let dist = Poisson::new(Stabilization::None, ResponseFn::Relu, LossFn::Nll).unwrap();
        assert_eq!(dist.n_params(), 1);
        assert_eq!(dist.param_names(), vec!["rate"]);
        assert!(dist.is_discrete());
    }

    #[test]
    fn test_poisson_rejects_sigmoid() {
        let err = Poisson::new(Stabilization::None, ResponseFn::Sigmoid, LossFn::Nll).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'relu', 'exp' or 'softplus'"), "{msg}");
    }

    #[test]
    fn test_poisson_log_prob() {
        for &(rate, y) in &[(5.0, 3.0), (0.2, 0.0), (12.5, 20.0)] {
            let expected = StatrsPoisson::new(rate).unwrap().ln_pmf(y as u64);
            assert_relative_eq!(log_prob(&[rate], y), expected, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_poisson_log_prob_at_tiny_rate_is_finite() {
        assert!(log_prob(&[1e-6], 4.0).is_finite());
        assert!(log_prob(&[1e-6], 0.0).is_finite());
    }

    #[test]
    fn test_poisson_sample_mean() {
        let mut rng = ChaCha8Rng::seed_from_u64(123);
        let n = 20_000;
        let mean = (0..n).map(|_| sample(&[4.0], &mut rng)).sum::<f64>() / n as f64;
        assert_relative_eq!(mean, 4.0, epsilon = 0.1);
    }
}
