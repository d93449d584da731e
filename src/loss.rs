//! Loss evaluators: negative log-likelihood and CRPS.
//!
//! Both are written per row and generic over [`Real`], so the derivative
//! engine gets exact derivatives by evaluating them with dual numbers.
//!
//! The CRPS uses the energy form `E|X - y| - 0.5 E|X - X'|` over a set of
//! weighted atoms (see [`Atoms`]). Atom positions are fixed for the current
//! iteration; parameters enter only through the atom weights, which are
//! self-normalized likelihood ratios `p_theta(x_k) / p_theta0(x_k)`. At the
//! current parameters the ratios are one, so the value is the ordinary atom
//! estimator while the gradient flows through the log-density.

use crate::autodiff::Real;
use crate::config::CrpsEstimator;
use crate::distributions::{DistributionSpec, Family, LossFn};
use crate::error::{DistBoostError, Result};
use crate::utils::nan_to_num;
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Cumulative mass at which discrete support enumeration stops.
const SUPPORT_MASS: f64 = 1.0 - 1e-10;
/// Largest count enumerated for a discrete CRPS.
const MAX_SUPPORT: usize = 100_000;

/// Weighted support points for one row's CRPS.
#[derive(Debug, Clone)]
pub struct Atoms {
    /// Sorted atom positions.
    values: Vec<f64>,
    /// Weight of each atom at the current parameters, summing to one.
    base_weight: Vec<f64>,
    /// Log-density of each atom at the current parameters.
    base_log_prob: Vec<f64>,
    /// Apply the small-sample correction to the pair term.
    fair: bool,
}

impl Atoms {
    /// Build the atoms for one row given its materialized parameters.
    ///
    /// `row` only seeds the sampler, so every row of a batch draws an
    /// independent but reproducible sample.
    pub fn for_row(spec: &DistributionSpec, params: &[f64], y: f64, row: usize) -> Atoms {
        let family = spec.family();
        match spec.config().crps {
            CrpsEstimator::Sampling { n_samples, seed } => {
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(row as u64));
                Self::sampled(family, params, n_samples, &mut rng)
            }
            CrpsEstimator::Quadrature { n_points } => {
                if spec.is_discrete() {
                    Self::enumerate_support(family, params, y).unwrap_or_else(|| {
                        let mut rng = ChaCha8Rng::seed_from_u64(row as u64);
                        Self::sampled(family, params, n_points, &mut rng)
                    })
                } else {
                    let values: Vec<f64> = (0..n_points)
                        .filter_map(|k| {
                            family.inverse_cdf(params, (k as f64 + 0.5) / n_points as f64)
                        })
                        .collect();
                    Self::equally_weighted(family, params, values, false)
                }
            }
        }
    }

    fn sampled(family: Family, params: &[f64], n_samples: usize, rng: &mut ChaCha8Rng) -> Atoms {
        let values: Vec<f64> = (0..n_samples).map(|_| family.sample(params, rng)).collect();
        Self::equally_weighted(family, params, values, true)
    }

    fn equally_weighted(family: Family, params: &[f64], values: Vec<f64>, fair: bool) -> Atoms {
        let weighted = values.into_iter().map(|x| (x, 1.0)).collect();
        Self::from_weighted(family, params, weighted, fair)
    }

    /// Atoms `0..=K` weighted by the probability mass function.
    ///
    /// Returns `None` when the mass cannot be covered within [`MAX_SUPPORT`]
    /// counts, e.g. for a very large mean or target.
    fn enumerate_support(family: Family, params: &[f64], y: f64) -> Option<Atoms> {
        // the CRPS of a non-finite target is undefined whatever the atoms
        if !y.is_finite() {
            return Some(Self::from_weighted(family, params, Vec::new(), false));
        }

        let mut weighted = Vec::new();
        let mut cumulative = 0.0;
        let mut k = 0usize;
        loop {
            let mass = family.log_prob(params, k as f64).exp();
            if mass.is_finite() && mass > 0.0 {
                weighted.push((k as f64, mass));
                cumulative += mass;
            }
            if (cumulative >= SUPPORT_MASS && k as f64 >= y) || !cumulative.is_finite() {
                break;
            }
            if k >= MAX_SUPPORT {
                log::warn!(
                    "{} CRPS support exceeds {} counts with cumulative mass {:.3e}, sampling atoms instead",
                    family,
                    MAX_SUPPORT,
                    cumulative
                );
                return None;
            }
            k += 1;
        }

        let atoms = Self::from_weighted(family, params, weighted, false);
        (!atoms.is_empty()).then_some(atoms)
    }

    fn from_weighted(
        family: Family,
        params: &[f64],
        mut weighted: Vec<(f64, f64)>,
        fair: bool,
    ) -> Atoms {
        weighted.retain(|(x, w)| x.is_finite() && w.is_finite() && *w > 0.0);
        weighted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut values = Vec::with_capacity(weighted.len());
        let mut base_weight = Vec::with_capacity(weighted.len());
        let mut base_log_prob = Vec::with_capacity(weighted.len());
        for (x, w) in weighted {
            let lp = family.log_prob(params, x);
            if lp.is_finite() {
                values.push(x);
                base_weight.push(w);
                base_log_prob.push(lp);
            }
        }

        let total: f64 = base_weight.iter().sum();
        if total > 0.0 {
            base_weight.iter_mut().for_each(|w| *w /= total);
        }

        Atoms {
            values,
            base_weight,
            base_log_prob,
            fair,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Negative log-likelihood of `y`.
pub fn nll<S: Real>(family: Family, params: &[S], y: f64) -> S {
    -family.log_prob(params, y)
}

/// CRPS of `y` over weighted atoms.
pub fn crps<S: Real>(family: Family, params: &[S], atoms: &Atoms, y: f64) -> S {
    if atoms.is_empty() {
        return S::constant(f64::NAN);
    }

    let weights: Vec<S> = atoms
        .values
        .iter()
        .zip(&atoms.base_weight)
        .zip(&atoms.base_log_prob)
        .map(|((&x, &q), &lp0)| {
            S::constant(q) * (family.log_prob(params, x) - S::constant(lp0)).exp()
        })
        .collect();
    let total = weights
        .iter()
        .fold(S::constant(0.0), |acc, &w| acc + w);

    let one = S::constant(1.0);
    let two = S::constant(2.0);
    let mut abs_term = S::constant(0.0);
    let mut pair_term = S::constant(0.0);
    let mut sum_sq = S::constant(0.0);
    // mass of atoms left of the current one
    let mut below = S::constant(0.0);

    for (w, &x) in weights.into_iter().zip(&atoms.values) {
        let w = w / total;
        abs_term = abs_term + w * S::constant((x - y).abs());
        // sum_kl w_k w_l |x_k - x_l| = 2 sum_k w_k x_k (2 W_below + w_k - 1) for sorted x
        pair_term = pair_term + w * S::constant(x) * (two * below + w - one);
        sum_sq = sum_sq + w * w;
        below = below + w;
    }
    pair_term = two * pair_term;

    if atoms.fair {
        pair_term = pair_term / (one - sum_sq);
    }

    abs_term - S::constant(0.5) * pair_term
}

/// Loss of one row from its raw (pre-response) predictions.
///
/// `atoms` is required for [`LossFn::Crps`] and ignored otherwise.
pub fn row_loss<S: Real>(spec: &DistributionSpec, raw: &[S], y: f64, atoms: Option<&Atoms>) -> S {
    let params = spec.materialize_row(raw);
    match (spec.loss_fn(), atoms) {
        (LossFn::Nll, _) => nll(spec.family(), &params, y),
        (LossFn::Crps, Some(atoms)) => crps(spec.family(), &params, atoms, y),
        (LossFn::Crps, None) => S::constant(f64::NAN),
    }
}

/// Per-row loss values under the specification's loss function.
///
/// # Arguments
/// * `predictions` - Raw predictions with shape (n_samples, n_params)
/// * `target` - Observed target with length n_samples
pub fn row_losses(
    spec: &DistributionSpec,
    predictions: &ArrayView2<f64>,
    target: &ArrayView1<f64>,
) -> Result<Array1<f64>> {
    spec.check_columns(predictions)?;
    if predictions.nrows() != target.len() {
        return Err(DistBoostError::ShapeMismatch {
            expected_shape: format!("target of length {}", predictions.nrows()),
            actual_shape: format!("length {}", target.len()),
        });
    }

    let mut raw = predictions.to_owned();
    for mut col in raw.columns_mut() {
        let clean = nan_to_num(&col.view());
        col.assign(&clean);
    }

    let losses = raw
        .rows()
        .into_iter()
        .zip(target.iter())
        .enumerate()
        .map(|(i, (row, &y))| {
            let raw_row = row.to_vec();
            match spec.loss_fn() {
                LossFn::Nll => row_loss::<f64>(spec, &raw_row, y, None),
                LossFn::Crps => {
                    let params = spec.materialize_row(&raw_row);
                    let atoms = Atoms::for_row(spec, &params, y, i);
                    crps(spec.family(), &params, &atoms, y)
                }
            }
        })
        .collect();
    Ok(losses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::Dual2;
    use crate::config::EngineConfig;
    use crate::distributions::{Gaussian, Poisson, Stabilization};
    use crate::utils::ResponseFn;
    use approx::assert_relative_eq;
    use ndarray::array;
    use statrs::distribution::{Continuous, ContinuousCDF, DiscreteCDF, Normal, Poisson as StatrsPoisson};

    fn gaussian_crps(loc: f64, scale: f64, y: f64) -> f64 {
        let z = (y - loc) / scale;
        let std = Normal::new(0.0, 1.0).unwrap();
        scale * (z * (2.0 * std.cdf(z) - 1.0) + 2.0 * std.pdf(z) - 1.0 / std::f64::consts::PI.sqrt())
    }

    fn gaussian_spec() -> DistributionSpec {
        Gaussian::new(Stabilization::None, ResponseFn::Exp, LossFn::Crps).unwrap()
    }

    #[test]
    fn test_nll_is_negative_log_prob() {
        let family = Family::Gaussian;
        let value = nll(family, &[0.0, 1.0], 0.0);
        assert_relative_eq!(value, 0.5 * (2.0 * std::f64::consts::PI).ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_quadrature_crps_matches_closed_form() {
        let spec = gaussian_spec();
        for &(loc, scale, y) in &[(0.0, 1.0, 0.0), (1.0, 2.0, -1.5), (-3.0, 0.5, -2.0)] {
            let params = [loc, scale];
            let atoms = Atoms::for_row(&spec, &params, y, 0);
            assert_eq!(atoms.len(), 200);
            let value = crps(Family::Gaussian, &params, &atoms, y);
            assert_relative_eq!(value, gaussian_crps(loc, scale, y), epsilon = 5e-3 * scale);
        }
    }

    #[test]
    fn test_quadrature_crps_gradient_matches_closed_form() {
        let spec = gaussian_spec();
        let (loc, scale, y) = (0.5, 1.5, 1.7);
        let params = [loc, scale];
        let atoms = Atoms::for_row(&spec, &params, y, 0);
        let z = (y - loc) / scale;
        let std = Normal::new(0.0, 1.0).unwrap();

        let d_loc = crps(
            Family::Gaussian,
            &[Dual2::variable(loc), Dual2::constant(scale)],
            &atoms,
            y,
        );
        assert_relative_eq!(d_loc.d1, -(2.0 * std.cdf(z) - 1.0), epsilon = 1e-2);

        let d_scale = crps(
            Family::Gaussian,
            &[Dual2::constant(loc), Dual2::variable(scale)],
            &atoms,
            y,
        );
        let expected = 2.0 * std.pdf(z) - 1.0 / std::f64::consts::PI.sqrt();
        assert_relative_eq!(d_scale.d1, expected, epsilon = 2e-2);
    }

    #[test]
    fn test_sampling_crps_is_close_to_closed_form() {
        let config = EngineConfig {
            crps: CrpsEstimator::Sampling {
                n_samples: 4000,
                seed: 123,
            },
            ..Default::default()
        };
        let spec = gaussian_spec().with_config(config).unwrap();
        let params = [0.0, 1.0];
        let atoms = Atoms::for_row(&spec, &params, 0.3, 0);
        let value = crps(Family::Gaussian, &params, &atoms, 0.3);
        assert_relative_eq!(value, gaussian_crps(0.0, 1.0, 0.3), epsilon = 0.03);
    }

    #[test]
    fn test_sampling_atoms_are_reproducible_per_row() {
        let config = EngineConfig {
            crps: CrpsEstimator::Sampling {
                n_samples: 50,
                seed: 9,
            },
            ..Default::default()
        };
        let spec = gaussian_spec().with_config(config).unwrap();
        let a = Atoms::for_row(&spec, &[0.0, 1.0], 0.0, 3);
        let b = Atoms::for_row(&spec, &[0.0, 1.0], 0.0, 3);
        let c = Atoms::for_row(&spec, &[0.0, 1.0], 0.0, 4);
        assert_eq!(a.values(), b.values());
        assert_ne!(a.values(), c.values());
    }

    #[test]
    fn test_discrete_crps_is_exact() {
        let spec = Poisson::new(Stabilization::None, ResponseFn::Exp, LossFn::Crps).unwrap();
        let rate = 3.5;
        for &y in &[0.0, 2.0, 9.0] {
            let atoms = Atoms::for_row(&spec, &[rate], y, 0);
            let value = crps(Family::Poisson, &[rate], &atoms, y);

            let reference = StatrsPoisson::new(rate).unwrap();
            let expected: f64 = (0..200u64)
                .map(|k| {
                    let indicator = if k as f64 >= y { 1.0 } else { 0.0 };
                    (reference.cdf(k) - indicator).powi(2)
                })
                .sum();
            assert_relative_eq!(value, expected, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_row_losses() {
        let spec = Gaussian::new(Stabilization::None, ResponseFn::Exp, LossFn::Nll).unwrap();
        let raw = array![[0.0, 0.0], [1.0, 0.0]];
        let target = array![0.0, 0.0];
        let losses = row_losses(&spec, &raw.view(), &target.view()).unwrap();
        assert!(losses[1] > losses[0]);

        let short = array![0.0];
        assert!(row_losses(&spec, &raw.view(), &short.view()).is_err());
    }

    #[test]
    fn test_discrete_support_with_nan_target_is_empty() {
        let spec = Poisson::new(Stabilization::None, ResponseFn::Exp, LossFn::Crps).unwrap();
        let atoms = Atoms::for_row(&spec, &[3.0], f64::NAN, 0);
        assert!(atoms.is_empty());
        assert!(crps(Family::Poisson, &[3.0], &atoms, f64::NAN).is_nan());
    }

    #[test]
    fn test_discrete_support_falls_back_to_sampling() {
        let spec = Poisson::new(Stabilization::None, ResponseFn::Exp, LossFn::Crps).unwrap();
        let rate = 25.0f64.exp();
        let atoms = Atoms::for_row(&spec, &[rate], 2.0, 0);
        assert_eq!(atoms.len(), 200);
        assert!(atoms.values().iter().all(|x| (x - rate).abs() < 10.0 * rate.sqrt()));

        let value = crps(Family::Poisson, &[rate], &atoms, 2.0);
        assert!(value.is_finite());
        assert_relative_eq!(value, rate, max_relative = 1e-3);

        // a count far beyond the enumerated range also falls back
        let atoms = Atoms::for_row(&spec, &[1.0], 1e6, 0);
        assert_eq!(atoms.len(), 200);
    }

    #[test]
    fn test_overflowing_rate_keeps_nll_finite() {
        let spec =
            DistributionSpec::new(Family::Gamma, &[], Stabilization::None, LossFn::Nll).unwrap();
        let raw = array![[0.0, 800.0], [0.0, 0.0]];
        let target = array![1.0, 1.0];
        let losses = row_losses(&spec, &raw.view(), &target.view()).unwrap();
        assert!(losses.iter().all(|l| l.is_finite()));
        assert_relative_eq!(losses[0], 1e15 - 1e15f64.ln(), max_relative = 1e-12);
    }
}
