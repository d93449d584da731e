//! Distribution specifications for distboost.
//!
//! A distribution is data, not a type hierarchy: a [`Family`] names the
//! log-density and sampler, and a [`DistributionSpec`] records the response
//! function chosen for each parameter together with the loss and
//! stabilization settings. The typed constructors (`Poisson::new`,
//! `ZINB::new`, ...) are thin, validated shortcuts for building one.

pub mod base;
mod family;
mod gamma;
mod gaussian;
mod negative_binomial;
mod poisson;
mod student_t;
mod zinb;
mod zipoisson;

pub use base::{
    DistributionParam, DistributionSpec, FamilySpec, LossFn, ParamDef, Stabilization,
};
pub use family::Family;
pub use gamma::Gamma;
pub use gaussian::Gaussian;
pub use negative_binomial::NegativeBinomial;
pub use poisson::Poisson;
pub use student_t::StudentT;
pub use zinb::ZINB;
pub use zipoisson::ZIPoisson;
