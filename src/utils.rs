//! Response functions for parameter transformations.
//!
//! These response functions map unconstrained tree outputs to the domain of
//! each distributional parameter. Every function is written once over
//! [`Real`], so the same code produces values and exact derivatives.

use crate::autodiff::Real;
use crate::error::{format_choices, DistBoostError};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Response function types for transforming distributional parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFn {
    /// Identity transformation (no change).
    Identity,
    /// Exponential transformation for strictly positive values.
    Exp,
    /// Softplus transformation for strictly positive values.
    Softplus,
    /// ReLU transformation for non-negative values.
    Relu,
    /// Sigmoid transformation for values in (0, 1).
    Sigmoid,
}

/// Range a response function maps into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// The whole real line.
    Real,
    /// `(0, inf)`.
    Positive,
    /// `[0, inf)`; the boundary is still excluded when materializing.
    NonNegative,
    /// `[0, 1)`; both ends are excluded when materializing.
    UnitInterval,
}

impl ResponseFn {
    pub const ALL: [ResponseFn; 5] = [
        ResponseFn::Identity,
        ResponseFn::Exp,
        ResponseFn::Softplus,
        ResponseFn::Relu,
        ResponseFn::Sigmoid,
    ];

    /// Get the configuration name of the response function.
    pub fn name(&self) -> &'static str {
        match self {
            ResponseFn::Identity => "identity",
            ResponseFn::Exp => "exp",
            ResponseFn::Softplus => "softplus",
            ResponseFn::Relu => "relu",
            ResponseFn::Sigmoid => "sigmoid",
        }
    }

    pub fn domain(&self) -> Domain {
        match self {
            ResponseFn::Identity => Domain::Real,
            ResponseFn::Exp | ResponseFn::Softplus => Domain::Positive,
            ResponseFn::Relu => Domain::NonNegative,
            ResponseFn::Sigmoid => Domain::UnitInterval,
        }
    }

    /// Evaluate the response function, generic over values and dual numbers.
    ///
    /// No clamping happens here; see [`Domain::clamp`].
    pub fn apply_real<S: Real>(&self, x: S) -> S {
        let one = S::constant(1.0);
        match self {
            ResponseFn::Identity => x,
            ResponseFn::Exp => x.exp(),
            ResponseFn::Softplus => {
                // log(1 + e^x) = x + log(1 + e^-x) for positive x
                if x.value() > 0.0 {
                    x + (-x).exp().ln_1p()
                } else {
                    x.exp().ln_1p()
                }
            }
            ResponseFn::Relu => {
                // torch convention: the derivative at 0 is 0
                if x.value() > 0.0 {
                    x
                } else {
                    S::constant(0.0)
                }
            }
            ResponseFn::Sigmoid => {
                if x.value() >= 0.0 {
                    (one + (-x).exp()).recip()
                } else {
                    let e = x.exp();
                    e / (one + e)
                }
            }
        }
    }

    /// Apply the response function to a single value.
    pub fn apply_scalar(&self, x: f64) -> f64 {
        self.apply_real(nan_to_num_scalar(x, 0.0))
    }

    /// Apply the response function to an array of values.
    pub fn apply(&self, x: &ArrayView1<f64>) -> Array1<f64> {
        nan_to_num(x).mapv(|v| self.apply_real(v))
    }

    /// Closed-form derivative of the response function at x.
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            ResponseFn::Identity => 1.0,
            ResponseFn::Exp => x.exp(),
            // d/dx softplus(x) = sigmoid(x)
            ResponseFn::Softplus => ResponseFn::Sigmoid.apply_real(x),
            ResponseFn::Relu => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            ResponseFn::Sigmoid => {
                let s = ResponseFn::Sigmoid.apply_real(x);
                s * (1.0 - s)
            }
        }
    }
}

impl fmt::Display for ResponseFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResponseFn {
    type Err = DistBoostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        ResponseFn::ALL
            .into_iter()
            .find(|r| r.name() == lowered)
            .ok_or_else(|| DistBoostError::UnknownName {
                kind: "response function",
                got: s.to_string(),
                valid: format_choices(ResponseFn::ALL.iter().map(|r| r.name())),
            })
    }
}

impl Domain {
    /// Clamp a value into the domain, `eps` away from any open boundary.
    ///
    /// Out-of-range and non-finite values become the boundary constant, with
    /// zero derivatives.
    pub fn clamp<S: Real>(&self, v: S, eps: f64, max: f64) -> S {
        let (lo, hi) = self.bounds(eps, max);
        let value = v.value();
        if value.is_nan() || value < lo {
            S::constant(lo)
        } else if value > hi {
            S::constant(hi)
        } else {
            v
        }
    }

    /// Closed bounds used by [`Domain::clamp`].
    ///
    /// `max` caps the magnitude of unbounded domains so that losses built
    /// from the parameter stay finite.
    pub fn bounds(&self, eps: f64, max: f64) -> (f64, f64) {
        match self {
            Domain::Real => (-max, max),
            Domain::Positive | Domain::NonNegative => (eps, max),
            Domain::UnitInterval => (eps, 1.0 - eps),
        }
    }
}

/// Replace NaN values with the mean of the finite values.
///
/// Infinite values are kept; they are clamped later by the parameter domain.
pub fn nan_to_num(x: &ArrayView1<f64>) -> Array1<f64> {
    let valid_values: Vec<f64> = x.iter().filter(|v| v.is_finite()).copied().collect();
    let mean = if valid_values.is_empty() {
        0.0
    } else {
        valid_values.iter().sum::<f64>() / valid_values.len() as f64
    };

    x.mapv(|v| if v.is_nan() { mean } else { v })
}

/// Replace a NaN scalar with `replacement`.
fn nan_to_num_scalar(x: f64, replacement: f64) -> f64 {
    if x.is_nan() {
        replacement
    } else {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::Dual2;
    use approx::assert_relative_eq;
    use ndarray::array;

    const GRID: [f64; 9] = [-30.0, -4.0, -1.0, -0.25, 0.3, 1.0, 2.5, 7.0, 30.0];

    #[test]
    fn test_autodiff_matches_closed_form_derivative() {
        for response_fn in ResponseFn::ALL {
            for &x in &GRID {
                let d = response_fn.apply_real(Dual2::variable(x));
                assert_relative_eq!(
                    d.d1,
                    response_fn.derivative(x),
                    epsilon = 1e-12,
                    max_relative = 1e-10
                );
            }
        }
    }

    #[test]
    fn test_softplus_derivative_is_sigmoid() {
        for &x in &GRID {
            let d = ResponseFn::Softplus.apply_real(Dual2::variable(x));
            assert_relative_eq!(d.d1, ResponseFn::Sigmoid.apply_scalar(x), epsilon = 1e-12);
            let s = ResponseFn::Sigmoid.apply_scalar(x);
            assert_relative_eq!(d.d2, s * (1.0 - s), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_relu_one_sided_derivative() {
        let at_zero = ResponseFn::Relu.apply_real(Dual2::variable(0.0));
        assert_eq!(at_zero.re, 0.0);
        assert_eq!(at_zero.d1, 0.0);
        let above = ResponseFn::Relu.apply_real(Dual2::variable(0.5));
        assert_eq!(above.d1, 1.0);
        assert_eq!(above.d2, 0.0);
    }

    #[test]
    fn test_softplus_is_stable_for_large_inputs() {
        assert_relative_eq!(ResponseFn::Softplus.apply_scalar(800.0), 800.0, epsilon = 1e-9);
        let tiny = ResponseFn::Softplus.apply_scalar(-800.0);
        assert!(tiny.is_finite() && tiny >= 0.0);
        assert_relative_eq!(
            ResponseFn::Softplus.apply_scalar(0.0),
            2.0_f64.ln(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_sigmoid_fn() {
        assert_relative_eq!(ResponseFn::Sigmoid.apply_scalar(0.0), 0.5, epsilon = 1e-12);
        assert!(ResponseFn::Sigmoid.apply_scalar(-800.0) >= 0.0);
        assert!(ResponseFn::Sigmoid.apply_scalar(800.0) <= 1.0);
    }

    #[test]
    fn test_exp_fn() {
        let x = array![0.0, 1.0];
        let result = ResponseFn::Exp.apply(&x.view());
        assert_relative_eq!(result[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(result[1], std::f64::consts::E, epsilon = 1e-12);
    }

    #[test]
    fn test_domain_clamp() {
        assert_eq!(Domain::NonNegative.clamp(0.0, 1e-6, 1e15), 1e-6);
        assert_eq!(Domain::Positive.clamp(f64::INFINITY, 1e-6, 1e15), 1e15);
        assert_eq!(Domain::UnitInterval.clamp(1.0, 1e-6, 1e15), 1.0 - 1e-6);
        assert_eq!(Domain::Real.clamp(-3.0, 1e-6, 1e15), -3.0);
        assert_eq!(Domain::Real.clamp(f64::NEG_INFINITY, 1e-6, 1e15), -1e15);

        let clamped = Domain::Positive.clamp(Dual2::new(0.0, 1.0, 0.5), 1e-6, 1e15);
        assert_eq!(clamped, Dual2::new(1e-6, 0.0, 0.0));
    }

    #[test]
    fn test_nan_handling() {
        let x = array![1.0, f64::NAN, 3.0];
        let result = nan_to_num(&x.view());
        // Mean of valid values is 2.0
        assert_eq!(result[0], 1.0);
        assert_eq!(result[1], 2.0);
        assert_eq!(result[2], 3.0);

        // infinities are left for the domain clamp
        let x = array![f64::NEG_INFINITY, 2.0, f64::NAN, 4.0];
        let result = nan_to_num(&x.view());
        assert_eq!(result[0], f64::NEG_INFINITY);
        assert_eq!(result[2], 3.0);
        assert_eq!(ResponseFn::Exp.apply_scalar(f64::NEG_INFINITY), 0.0);
    }

    #[test]
    fn test_parse_response_fn() {
        assert_eq!("Softplus".parse::<ResponseFn>().unwrap(), ResponseFn::Softplus);
        assert_eq!(" relu ".parse::<ResponseFn>().unwrap(), ResponseFn::Relu);
        let err = "squareplus".parse::<ResponseFn>().unwrap_err();
        assert!(err.to_string().contains("'sigmoid'"));
    }
}
