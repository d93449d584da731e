//! Custom objective adapter for gradient boosting libraries.
//!
//! Boosting libraries hand a custom objective a flat vector of raw margins
//! holding `n_rows * n_params` values and expect flat gradients and hessians
//! back in the same order. [`DistributionObjective`] converts between that
//! flat layout and the `(n_rows, n_params)` matrices used by the engine.
//!
//! Start values are an offset on the raw margins. Boosters that accept a
//! base margin receive them through [`DistributionObjective::init_score`];
//! the margins they pass back to the objective then already include it.

use crate::derivatives::compute_gradients_and_hessians;
use crate::distributions::DistributionSpec;
use crate::error::{DistBoostError, Result};
use crate::loss::row_losses;
use crate::start_values::start_values;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Order of the flattened `(n_rows, n_params)` matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlatLayout {
    /// `[row0_param0, row0_param1, ..., row1_param0, ...]` (XGBoost).
    #[default]
    RowMajor,
    /// `[param0_row0, param0_row1, ..., param1_row0, ...]` (LightGBM).
    ColumnMajor,
}

impl FlatLayout {
    /// Flatten a `(n_rows, n_params)` matrix.
    pub fn flatten(&self, values: &Array2<f64>) -> Array1<f64> {
        match self {
            FlatLayout::RowMajor => Array1::from_iter(values.iter().copied()),
            FlatLayout::ColumnMajor => Array1::from_iter(values.t().iter().copied()),
        }
    }

    /// Reshape a flat vector of `n_rows * n_params` values.
    pub fn unflatten(
        &self,
        values: &ArrayView1<f64>,
        n_rows: usize,
        n_params: usize,
    ) -> Result<Array2<f64>> {
        if values.len() != n_rows * n_params {
            return Err(DistBoostError::ShapeMismatch {
                expected_shape: format!("({}, {})", n_rows, n_params),
                actual_shape: format!("{} values", values.len()),
            });
        }

        let values = values.to_vec();
        match self {
            FlatLayout::RowMajor => Ok(Array2::from_shape_vec((n_rows, n_params), values)?),
            FlatLayout::ColumnMajor => {
                let transposed = Array2::from_shape_vec((n_params, n_rows), values)?;
                Ok(transposed.reversed_axes().as_standard_layout().to_owned())
            }
        }
    }
}

/// Interface a boosting library calls once per iteration.
pub trait CustomObjective: Send + Sync {
    /// Flat gradients and hessians for flat raw margins `predt`.
    fn gradient_hessian(
        &self,
        predt: &ArrayView1<f64>,
        labels: &ArrayView1<f64>,
        weights: Option<&ArrayView1<f64>>,
    ) -> Result<(Array1<f64>, Array1<f64>)>;

    /// Evaluation metric for flat raw margins; lower is better.
    fn eval_metric(&self, predt: &ArrayView1<f64>, labels: &ArrayView1<f64>) -> Result<f64>;

    fn metric_name(&self) -> &str;
}

/// Custom objective backed by a [`DistributionSpec`].
#[derive(Debug, Clone)]
pub struct DistributionObjective {
    spec: Arc<DistributionSpec>,
    layout: FlatLayout,
    start_values: Option<Array1<f64>>,
}

impl DistributionObjective {
    pub fn new(spec: Arc<DistributionSpec>, layout: FlatLayout) -> Self {
        Self {
            spec,
            layout,
            start_values: None,
        }
    }

    pub fn spec(&self) -> &DistributionSpec {
        &self.spec
    }

    pub fn layout(&self) -> FlatLayout {
        self.layout
    }

    /// Use precomputed raw start values, one per parameter.
    pub fn with_start_values(mut self, start_values: Array1<f64>) -> Result<Self> {
        if start_values.len() != self.spec.n_params() {
            return Err(DistBoostError::ShapeMismatch {
                expected_shape: format!("{} start values", self.spec.n_params()),
                actual_shape: format!("{} start values", start_values.len()),
            });
        }
        self.start_values = Some(start_values);
        Ok(self)
    }

    /// Fit start values on `labels` and store them. Returns the fitted loss.
    pub fn fit_start_values(&mut self, labels: &ArrayView1<f64>, max_iter: u64) -> Result<f64> {
        let (loss, values) = start_values(&self.spec, labels, max_iter)?;
        self.start_values = Some(values);
        Ok(loss)
    }

    pub fn start_values(&self) -> Option<&Array1<f64>> {
        self.start_values.as_ref()
    }

    /// Flat initial margins for `n_rows` rows; zeros without start values.
    pub fn init_score(&self, n_rows: usize) -> Array1<f64> {
        let n_params = self.spec.n_params();
        let mut init_score = Array2::zeros((n_rows, n_params));
        if let Some(ref start_vals) = self.start_values {
            for mut row in init_score.rows_mut() {
                row.assign(start_vals);
            }
        }
        self.layout.flatten(&init_score)
    }

    /// Add the start values to raw predictions made without a base margin.
    pub fn offset_predictions(&self, predictions: &ArrayView2<f64>) -> Result<Array2<f64>> {
        self.spec.check_columns(predictions)?;
        let mut preds = predictions.to_owned();
        if let Some(ref start_vals) = self.start_values {
            for mut row in preds.rows_mut() {
                row += start_vals;
            }
        }
        Ok(preds)
    }

    fn unflatten(&self, predt: &ArrayView1<f64>, labels: &ArrayView1<f64>) -> Result<Array2<f64>> {
        self.layout.unflatten(predt, labels.len(), self.spec.n_params())
    }
}

impl CustomObjective for DistributionObjective {
    fn gradient_hessian(
        &self,
        predt: &ArrayView1<f64>,
        labels: &ArrayView1<f64>,
        weights: Option<&ArrayView1<f64>>,
    ) -> Result<(Array1<f64>, Array1<f64>)> {
        let predictions = self.unflatten(predt, labels)?;
        let gh = compute_gradients_and_hessians(&self.spec, &predictions.view(), labels, weights)?;
        Ok((self.layout.flatten(&gh.gradients), self.layout.flatten(&gh.hessians)))
    }

    fn eval_metric(&self, predt: &ArrayView1<f64>, labels: &ArrayView1<f64>) -> Result<f64> {
        let predictions = self.unflatten(predt, labels)?;
        Ok(row_losses(&self.spec, &predictions.view(), labels)?.sum())
    }

    fn metric_name(&self) -> &str {
        self.spec.loss_fn().name()
    }
}
