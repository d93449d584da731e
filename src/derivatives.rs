//! Derivative engine.
//!
//! For every row and every parameter column the loss is evaluated with the
//! raw prediction of that column seeded as a [`Dual2`] variable, which gives
//! the exact gradient and the exact diagonal Hessian through the whole chain
//! raw value -> response function -> parameter -> log-density -> loss.
//! Cross-parameter second derivatives are never formed.

use crate::autodiff::Dual2;
use crate::distributions::{DistributionSpec, LossFn};
use crate::error::{DistBoostError, Result};
use crate::loss::{row_loss, Atoms};
use crate::stabilization::{floor_hessians, stabilize_derivatives};
use crate::utils::nan_to_num;
use ndarray::{Array2, ArrayView1, ArrayView2};

/// Container for gradients and hessians.
#[derive(Debug, Clone)]
pub struct GradientsAndHessians {
    /// Gradients with shape (n_samples, n_params).
    pub gradients: Array2<f64>,
    /// Hessians with shape (n_samples, n_params).
    pub hessians: Array2<f64>,
}

/// Compute gradients and hessians for the objective function.
///
/// Non-finite derivatives are repaired (gradient 0, hessian floor), the
/// configured stabilization is applied, optional sample weights are
/// multiplied in, and hessians are floored last. With [`LossFn::Crps`] every
/// hessian entry is exactly 1 and weights only scale the gradients.
///
/// # Arguments
/// * `predictions` - Raw predictions with shape (n_samples, n_params)
/// * `target` - Target values
/// * `weights` - Optional sample weights
///
/// # Returns
/// Gradients and hessians with the shape of `predictions`.
pub fn compute_gradients_and_hessians(
    spec: &DistributionSpec,
    predictions: &ArrayView2<f64>,
    target: &ArrayView1<f64>,
    weights: Option<&ArrayView1<f64>>,
) -> Result<GradientsAndHessians> {
    check_inputs(spec, predictions, target, weights)?;
    let config = spec.config();
    let is_crps = spec.loss_fn() == LossFn::Crps;

    let (mut gradients, mut hessians) = raw_derivatives(spec, predictions, target);

    let replaced = replace_non_finite(&mut gradients, &mut hessians, config.hessian_floor);
    if replaced > 0 {
        log::debug!(
            "{}: replaced {} non-finite derivative entries",
            spec.name(),
            replaced
        );
    }

    stabilize_derivatives(
        spec.stabilization(),
        &mut gradients,
        &mut hessians,
        config,
        !is_crps,
    );

    if let Some(w) = weights {
        for (mut g_row, (mut h_row, &wi)) in gradients
            .rows_mut()
            .into_iter()
            .zip(hessians.rows_mut().into_iter().zip(w.iter()))
        {
            g_row.mapv_inplace(|g| g * wi);
            if !is_crps {
                h_row.mapv_inplace(|h| h * wi);
            }
        }
    }

    floor_hessians(&mut hessians, config.hessian_floor);

    Ok(GradientsAndHessians {
        gradients,
        hessians,
    })
}

/// Unstabilized derivatives, one row at a time.
fn raw_derivatives(
    spec: &DistributionSpec,
    predictions: &ArrayView2<f64>,
    target: &ArrayView1<f64>,
) -> (Array2<f64>, Array2<f64>) {
    let (n_samples, n_params) = predictions.dim();
    let is_crps = spec.loss_fn() == LossFn::Crps;

    let mut raw = predictions.to_owned();
    for mut col in raw.columns_mut() {
        let clean = nan_to_num(&col.view());
        col.assign(&clean);
    }

    let mut gradients = Array2::zeros((n_samples, n_params));
    let mut hessians = Array2::ones((n_samples, n_params));

    for (i, row) in raw.rows().into_iter().enumerate() {
        let y = target[i];
        let raw_row = row.to_vec();

        let atoms = if is_crps {
            let params = spec.materialize_row(&raw_row);
            Some(Atoms::for_row(spec, &params, y, i))
        } else {
            None
        };

        let mut seeded: Vec<Dual2> = raw_row.iter().map(|&x| Dual2::new(x, 0.0, 0.0)).collect();
        for j in 0..n_params {
            seeded[j] = Dual2::variable(raw_row[j]);
            let loss = row_loss(spec, &seeded, y, atoms.as_ref());
            seeded[j] = Dual2::new(raw_row[j], 0.0, 0.0);

            gradients[[i, j]] = loss.d1;
            // CRPS curvature is not used
            if !is_crps {
                hessians[[i, j]] = loss.d2;
            }
        }
    }

    (gradients, hessians)
}

/// Replace NaN/inf gradients with 0 and hessians with `hessian_floor`.
fn replace_non_finite(
    gradients: &mut Array2<f64>,
    hessians: &mut Array2<f64>,
    hessian_floor: f64,
) -> usize {
    let mut replaced = 0;
    for g in gradients.iter_mut().filter(|g| !g.is_finite()) {
        *g = 0.0;
        replaced += 1;
    }
    for h in hessians.iter_mut().filter(|h| !h.is_finite()) {
        *h = hessian_floor;
        replaced += 1;
    }
    replaced
}

fn check_inputs(
    spec: &DistributionSpec,
    predictions: &ArrayView2<f64>,
    target: &ArrayView1<f64>,
    weights: Option<&ArrayView1<f64>>,
) -> Result<()> {
    spec.check_columns(predictions)?;
    let n_samples = predictions.nrows();
    if n_samples == 0 {
        return Err(DistBoostError::InvalidInput(
            "cannot compute derivatives for an empty batch".to_string(),
        ));
    }
    if target.len() != n_samples {
        return Err(DistBoostError::ShapeMismatch {
            expected_shape: format!("target of length {n_samples}"),
            actual_shape: format!("length {}", target.len()),
        });
    }
    if let Some(w) = weights {
        if w.len() != n_samples {
            return Err(DistBoostError::ShapeMismatch {
                expected_shape: format!("weights of length {n_samples}"),
                actual_shape: format!("length {}", w.len()),
            });
        }
        if w.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(DistBoostError::InvalidInput(
                "weights must be finite and non-negative".to_string(),
            ));
        }
    }
    Ok(())
}
