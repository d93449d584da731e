//! Zero-Inflated Negative Binomial distribution implementation.

use super::base::{DistributionSpec, FamilySpec, LossFn, ParamDef, Stabilization};
use super::family::Family;
use super::negative_binomial::{self, PROBS_FNS, TOTAL_COUNT_FNS};
use super::zipoisson::zero_inflate;
use crate::autodiff::Real;
use crate::error::Result;
use crate::utils::ResponseFn;
use rand::Rng;

pub(crate) const SPEC: FamilySpec = FamilySpec {
    name: "ZINB",
    params: &[
        ParamDef::new("total_count", TOTAL_COUNT_FNS),
        ParamDef::new("probs", PROBS_FNS),
        ParamDef::new("gate", &[ResponseFn::Sigmoid]),
    ],
    discrete: true,
    univariate: true,
};

/// Negative binomial with an extra point mass at zero of probability `gate`.
#[allow(clippy::upper_case_acronyms)]
pub struct ZINB;

impl ZINB {
    /// `total_count` accepts "relu" (default), "exp" or "softplus"; `probs`
    /// only accepts "sigmoid". `gate` always uses sigmoid.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(
        stabilization: Stabilization,
        response_fn_total_count: ResponseFn,
        response_fn_probs: ResponseFn,
        loss_fn: LossFn,
    ) -> Result<DistributionSpec> {
        DistributionSpec::new(
            Family::Zinb,
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
    let gate = params[2];
    zero_inflate(gate, negative_binomial::log_prob(&params[..2], y), y)
}

pub(crate) fn sample<R: Rng + ?Sized>(params: &[f64], rng: &mut R) -> f64 {
    if rng.random::<f64>() < params[2] {
        0.0
    } else {
        negative_binomial::sample(&params[..2], rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DistBoostError;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use statrs::distribution::{Discrete, NegativeBinomial as StatrsNegativeBinomial};

    #[test]
    fn test_zinb_creation() {
        let dist = ZINB::new(
            Stabilization::None,
            ResponseFn::Relu,
            ResponseFn::Sigmoid,
            LossFn::Nll,
        )
        .unwrap();
        assert_eq!(dist.n_params(), 3);
        assert_eq!(dist.param_names(), vec!["total_count", "probs", "gate"]);
        assert!(dist.is_discrete());
    }

    #[test]
    fn test_zinb_probs_must_be_sigmoid() {
        let err = ZINB::new(
            Stabilization::None,
            ResponseFn::Relu,
            ResponseFn::Exp,
            LossFn::Nll,
        )
        .unwrap_err();
        match err {
            DistBoostError::InvalidResponseFn {
                ref param,
                ref valid,
                ..
            } => {
                assert_eq!(param, "probs");
                assert_eq!(valid, "'sigmoid'");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zinb_log_prob() {
        let nb_dist = StatrsNegativeBinomial::new(5.0, 0.5).unwrap();

        let log_p_zero = log_prob(&[5.0, 0.5, 0.1], 0.0);
        let expected_zero = (0.1 + (1.0 - 0.1) * nb_dist.pmf(0)).ln();
        assert_relative_eq!(log_p_zero, expected_zero, epsilon = 1e-10);

        let log_p_non_zero = log_prob(&[5.0, 0.5, 0.1], 3.0);
        let expected_non_zero = (1.0 - 0.1f64).ln() + nb_dist.ln_pmf(3);
        assert_relative_eq!(log_p_non_zero, expected_non_zero, epsilon = 1e-10);
    }

    #[test]
    fn test_zinb_zero_fraction() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let n = 20_000;
        let zeros = (0..n)
            .filter(|_| sample(&[5.0, 0.5, 0.3], &mut rng) == 0.0)
            .count() as f64
            / n as f64;
        let expected = 0.3 + 0.7 * 0.5f64.powi(5);
        assert_relative_eq!(zeros, expected, epsilon = 0.02);
    }
}
