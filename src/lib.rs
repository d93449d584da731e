//! # distboost
//!
//! Distribution plugins for distributional gradient boosting.
//!
//! A boosting library fits one raw margin per distributional parameter. This
//! crate turns those margins into valid distribution parameters and returns
//! the gradients and diagonal hessians of the negative log-likelihood or the
//! CRPS with respect to the margins, ready for a custom objective.
//!
//! ## Example
//!
//! ```ignore
//! use distboost::prelude::*;
//! use distboost::distributions::Poisson;
//! use ndarray::array;
//!
//! let dist = Poisson::new(Stabilization::None, ResponseFn::Exp, LossFn::Nll)?;
//! let raw = array![[0.0], [1.0]];
//! let target = array![1.0, 3.0];
//! let gh = compute_gradients_and_hessians(&dist, &raw.view(), &target.view(), None)?;
//! ```

pub mod autodiff;
pub mod config;
pub mod derivatives;
pub mod distributions;
pub mod error;
pub mod loss;
pub mod objective;
pub mod predict;
pub mod stabilization;
pub mod start_values;
pub mod utils;

pub mod prelude {
    //! Convenient re-exports of commonly used types.
    pub use crate::config::{CrpsEstimator, EngineConfig};
    pub use crate::derivatives::{compute_gradients_and_hessians, GradientsAndHessians};
    pub use crate::distributions::{DistributionSpec, Family, LossFn, Stabilization};
    pub use crate::error::{DistBoostError, Result};
    pub use crate::loss::row_losses;
    pub use crate::objective::{CustomObjective, DistributionObjective, FlatLayout};
    pub use crate::predict::{predict_dist, PredType, PredictionOutput};
    pub use crate::start_values::start_values;
    pub use crate::utils::ResponseFn;
}
