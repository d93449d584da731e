//! Stabilization of gradients and hessians.
//!
//! A pure per-call transform: every column (distribution parameter) is
//! rescaled independently using statistics of that column's gradients in the
//! current batch. Nothing is carried between boosting iterations.

use crate::config::EngineConfig;
use crate::distributions::Stabilization;
use ndarray::{Array2, ArrayView1};

/// Rescale each column of `gradients` (and `hessians`, if `scale_hessians`).
///
/// The divisor is computed from the gradient column only, so multiplying a
/// gradient column by a positive constant leaves the stabilized gradient
/// unchanged (as long as the divisor stays above `denominator_floor`).
pub fn stabilize_derivatives(
    method: Stabilization,
    gradients: &mut Array2<f64>,
    hessians: &mut Array2<f64>,
    config: &EngineConfig,
    scale_hessians: bool,
) {
    if method == Stabilization::None {
        return;
    }

    for j in 0..gradients.ncols() {
        let divisor = match method {
            Stabilization::None => 1.0,
            Stabilization::Mad => config.mad_scale * median_absolute_deviation(&gradients.column(j)),
            Stabilization::L2 => l2_norm(&gradients.column(j)),
        }
        .max(config.denominator_floor);

        gradients.column_mut(j).mapv_inplace(|g| g / divisor);
        if scale_hessians {
            hessians.column_mut(j).mapv_inplace(|h| h / divisor);
        }
    }
}

/// Floor every hessian entry at `floor`; non-finite entries become `floor`.
pub fn floor_hessians(hessians: &mut Array2<f64>, floor: f64) {
    hessians.mapv_inplace(|h| if h.is_finite() { h.max(floor) } else { floor });
}

/// Unscaled median absolute deviation from the median.
pub fn median_absolute_deviation(values: &ArrayView1<f64>) -> f64 {
    let median = compute_median(&values.to_vec());
    let deviations: Vec<f64> = values.iter().map(|&v| (v - median).abs()).collect();
    compute_median(&deviations)
}

pub fn l2_norm(values: &ArrayView1<f64>) -> f64 {
    values
        .iter()
        .filter(|v| v.is_finite())
        .map(|v| v * v)
        .sum::<f64>()
        .sqrt()
}

/// Compute median of a slice, ignoring non-finite values.
fn compute_median(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values.iter().filter(|v| v.is_finite()).copied().collect();
    if sorted.is_empty() {
        return 0.0;
    }

    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
