//! Unconditional start values.
//!
//! Before boosting, one raw parameter vector shared by every row is fitted by
//! minimizing the summed loss with L-BFGS. Boosting then starts from this
//! offset instead of from zero.

use crate::autodiff::{Dual2, Real};
use crate::distributions::{DistributionSpec, LossFn};
use crate::error::{DistBoostError, Result};
use crate::loss::{row_loss, Atoms};
use argmin::core::{CostFunction, Error as ArgminError, Executor, Gradient, State};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use ndarray::{Array1, ArrayView1};

/// Raw value used when the optimizer cannot produce a finite start value.
pub const FALLBACK_START_VALUE: f64 = 0.5;

/// Default iteration limit for [`start_values`].
pub const DEFAULT_MAX_ITER: u64 = 50;

struct StartValueProblem {
    spec: DistributionSpec,
    target: Vec<f64>,
}

impl StartValueProblem {
    /// Summed loss with every row sharing the raw vector `raw`.
    fn total_loss<S: Real>(&self, raw: &[S]) -> S {
        let atom_params = match self.spec.loss_fn() {
            LossFn::Crps => {
                let values: Vec<f64> = raw.iter().map(|x| x.value()).collect();
                Some(self.spec.materialize_row(&values))
            }
            LossFn::Nll => None,
        };

        self.target
            .iter()
            .enumerate()
            .fold(S::constant(0.0), |acc, (i, &y)| {
                let atoms = atom_params
                    .as_ref()
                    .map(|params| Atoms::for_row(&self.spec, params, y, i));
                acc + row_loss(&self.spec, raw, y, atoms.as_ref())
            })
    }
}

impl CostFunction for StartValueProblem {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> std::result::Result<Self::Output, ArgminError> {
        let loss = self.total_loss(params.as_slice());
        if loss.is_finite() {
            Ok(loss)
        } else {
            Ok(f64::MAX)
        }
    }
}

impl Gradient for StartValueProblem {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, params: &Self::Param) -> std::result::Result<Self::Gradient, ArgminError> {
        let mut seeded: Vec<Dual2> = params.iter().map(|&x| Dual2::new(x, 0.0, 0.0)).collect();
        let mut grad = vec![0.0; params.len()];

        for j in 0..params.len() {
            seeded[j] = Dual2::variable(params[j]);
            let d1 = self.total_loss(seeded.as_slice()).d1;
            seeded[j] = Dual2::new(params[j], 0.0, 0.0);
            grad[j] = if d1.is_finite() { d1 } else { 0.0 };
        }

        Ok(grad)
    }
}

/// Fit unconditional raw start values.
///
/// # Arguments
/// * `target` - Observed target values
/// * `max_iter` - Maximum number of L-BFGS iterations
///
/// # Returns
/// The summed loss at the start values and the raw start values, one per
/// parameter.
pub fn start_values(
    spec: &DistributionSpec,
    target: &ArrayView1<f64>,
    max_iter: u64,
) -> Result<(f64, Array1<f64>)> {
    if target.is_empty() {
        return Err(DistBoostError::InvalidInput(
            "cannot fit start values on an empty target".to_string(),
        ));
    }
    if target.iter().any(|y| !y.is_finite()) {
        return Err(DistBoostError::InvalidInput(
            "target contains non-finite values".to_string(),
        ));
    }

    let n_params = spec.n_params();
    let problem = StartValueProblem {
        spec: spec.clone(),
        target: target.to_vec(),
    };
    let fallback = vec![FALLBACK_START_VALUE; n_params];
    let fallback_loss = problem.total_loss(fallback.as_slice());

    let linesearch = MoreThuenteLineSearch::new();
    let solver = LBFGS::new(linesearch, 7);

    let result = Executor::new(problem, solver)
        .configure(|state| state.param(fallback.clone()).max_iters(max_iter))
        .run();

    match result {
        Ok(res) => {
            let best_params = res
                .state()
                .get_best_param()
                .cloned()
                .unwrap_or_else(|| fallback.clone());
            let best_cost = res.state().get_best_cost();

            if best_cost.is_finite() && best_params.iter().all(|v| v.is_finite()) {
                log::debug!(
                    "{}: start values {:?} with loss {:.6}",
                    spec.name(),
                    best_params,
                    best_cost
                );
                Ok((best_cost, Array1::from_vec(best_params)))
            } else {
                log::warn!(
                    "{}: start value optimization did not reach a finite loss, using {}",
                    spec.name(),
                    FALLBACK_START_VALUE
                );
                Ok((fallback_loss, Array1::from_vec(fallback)))
            }
        }
        Err(e) => {
            log::warn!(
                "{}: start value optimization failed ({}), using {}",
                spec.name(),
                e,
                FALLBACK_START_VALUE
            );
            Ok((fallback_loss, Array1::from_vec(fallback)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::{Gaussian, Poisson, Stabilization};
    use crate::utils::ResponseFn;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_poisson_start_value_is_log_mean() {
        let spec = Poisson::new(Stabilization::None, ResponseFn::Exp, LossFn::Nll).unwrap();
        let target = array![0.0, 1.0, 2.0, 3.0, 4.0, 2.0];
        let (loss, start) = start_values(&spec, &target.view(), DEFAULT_MAX_ITER).unwrap();
        assert_eq!(start.len(), 1);
        assert_relative_eq!(start[0], 2.0f64.ln(), epsilon = 1e-4);
        assert!(loss.is_finite());
    }

    #[test]
    fn test_gaussian_start_values() {
        let spec = Gaussian::new(Stabilization::None, ResponseFn::Exp, LossFn::Nll).unwrap();
        let target = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let (_, start) = start_values(&spec, &target.view(), 100).unwrap();
        // Maximum likelihood: mean 3, population std sqrt(2)
        assert_relative_eq!(start[0], 3.0, epsilon = 1e-3);
        assert_relative_eq!(start[1], 2.0f64.sqrt().ln(), epsilon = 1e-3);
    }

    #[test]
    fn test_start_values_improve_on_fallback() {
        let spec = Poisson::new(Stabilization::None, ResponseFn::Softplus, LossFn::Nll).unwrap();
        let target = array![10.0, 12.0, 9.0, 11.0];
        let problem = StartValueProblem {
            spec: spec.clone(),
            target: target.to_vec(),
        };
        let fallback_loss: f64 = problem.total_loss(&[FALLBACK_START_VALUE][..]);
        let (loss, _) = start_values(&spec, &target.view(), DEFAULT_MAX_ITER).unwrap();
        assert!(loss < fallback_loss);
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let spec = Gaussian::new(Stabilization::None, ResponseFn::Softplus, LossFn::Nll).unwrap();
        let problem = StartValueProblem {
            spec,
            target: vec![0.3, -1.2, 2.5],
        };
        let x = vec![0.4, 0.1];
        let grad = problem.gradient(&x).unwrap();
        let h = 1e-6;
        for j in 0..2 {
            let mut up = x.clone();
            let mut down = x.clone();
            up[j] += h;
            down[j] -= h;
            let fd = (problem.cost(&up).unwrap() - problem.cost(&down).unwrap()) / (2.0 * h);
            assert_relative_eq!(grad[j], fd, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_rejects_empty_target() {
        let spec = Poisson::new(Stabilization::None, ResponseFn::Exp, LossFn::Nll).unwrap();
        let target = Array1::<f64>::zeros(0);
        assert!(start_values(&spec, &target.view(), 10).is_err());
    }
}
