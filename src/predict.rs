//! Predictions from raw boosting margins.

use crate::distributions::DistributionSpec;
use crate::error::{DistBoostError, Result};
use ndarray::{Array2, ArrayView2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Prediction types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredType {
    /// Return distributional parameters.
    Parameters,
    /// Draw samples from the predicted distribution.
    Samples,
    /// Calculate quantiles from samples.
    Quantiles,
}

/// Prediction output types.
#[derive(Debug, Clone)]
pub enum PredictionOutput {
    /// Materialized parameters with shape (n_rows, n_params).
    Parameters(Array2<f64>),
    /// Samples with shape (n_rows, n_samples).
    Samples(Array2<f64>),
    /// Quantiles with shape (n_rows, n_quantiles).
    Quantiles(Array2<f64>),
}

impl PredictionOutput {
    pub fn values(&self) -> &Array2<f64> {
        match self {
            PredictionOutput::Parameters(v)
            | PredictionOutput::Samples(v)
            | PredictionOutput::Quantiles(v) => v,
        }
    }
}

/// Predict from raw margins.
///
/// # Arguments
/// * `raw` - Raw predictions with shape (n_rows, n_params), start values included
/// * `pred_type` - What to return
/// * `n_samples` - Draws per row for `Samples` and `Quantiles`
/// * `quantiles` - Quantile levels in [0, 1] for `Quantiles`
/// * `seed` - Seed of the sampler
pub fn predict_dist(
    spec: &DistributionSpec,
    raw: &ArrayView2<f64>,
    pred_type: PredType,
    n_samples: usize,
    quantiles: &[f64],
    seed: u64,
) -> Result<PredictionOutput> {
    let params = spec.transform_params(raw)?;

    match pred_type {
        PredType::Parameters => Ok(PredictionOutput::Parameters(params)),

        PredType::Samples => {
            let samples = sample_params(spec, &params.view(), n_samples, seed)?;
            Ok(PredictionOutput::Samples(samples))
        }

        PredType::Quantiles => {
            if let Some(q) = quantiles.iter().find(|q| !(0.0..=1.0).contains(*q)) {
                return Err(DistBoostError::InvalidParameter(format!(
                    "quantiles must lie in [0, 1], got {q}"
                )));
            }

            let samples = sample_params(spec, &params.view(), n_samples, seed)?;
            let mut quant_result = Array2::zeros((samples.nrows(), quantiles.len()));

            for (i, row) in samples.rows().into_iter().enumerate() {
                let mut obs_samples: Vec<f64> = row.to_vec();
                obs_samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

                for (q_idx, &q) in quantiles.iter().enumerate() {
                    let idx = ((obs_samples.len() as f64 - 1.0) * q) as usize;
                    quant_result[[i, q_idx]] = obs_samples[idx.min(obs_samples.len() - 1)];
                }
            }
            Ok(PredictionOutput::Quantiles(quant_result))
        }
    }
}

/// Draw `n_samples` values per row from materialized parameters.
///
/// Rows are drawn in order from a single generator, so the result depends
/// only on `params` and `seed`.
pub fn sample_params(
    spec: &DistributionSpec,
    params: &ArrayView2<f64>,
    n_samples: usize,
    seed: u64,
) -> Result<Array2<f64>> {
    if n_samples == 0 {
        return Err(DistBoostError::InvalidParameter(
            "n_samples must be at least 1".to_string(),
        ));
    }
    spec.check_columns(params)?;

    let family = spec.family();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut samples = Array2::zeros((params.nrows(), n_samples));

    for (i, row) in params.rows().into_iter().enumerate() {
        let row_params = row.to_vec();
        for s in 0..n_samples {
            samples[[i, s]] = family.sample(&row_params, &mut rng);
        }
    }

    Ok(samples)
}
