//! Error types for distboost.

use ndarray::ShapeError;
use thiserror::Error;

/// Result type alias for distboost operations.
pub type Result<T> = std::result::Result<T, DistBoostError>;

/// Errors that can occur while configuring or running the engine.
///
/// Configuration problems are reported when a [`DistributionSpec`] is built.
/// Runtime derivative computation only fails on structural problems with its
/// inputs; numerical trouble is repaired in place.
///
/// [`DistributionSpec`]: crate::distributions::DistributionSpec
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DistBoostError {
    /// A response function that the parameter does not accept.
    #[error(
        "Invalid response function '{got}' for parameter '{param}' of {distribution}. Please choose from {valid}"
    )]
    InvalidResponseFn {
        distribution: String,
        param: String,
        got: String,
        valid: String,
    },
    /// A parameter name the distribution does not have.
    #[error("{distribution} has no parameter '{param}'. Known parameters: {known}")]
    UnknownParameter {
        distribution: String,
        param: String,
        known: String,
    },
    /// A configuration string that does not name a known option.
    #[error("Unknown {kind} '{got}'. Please choose from {valid}")]
    UnknownName {
        kind: &'static str,
        got: String,
        valid: String,
    },
    /// Invalid parameter value.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// Invalid input data.
    #[error("Invalid input data: {0}")]
    InvalidInput(String),
    /// Shape mismatch in arrays.
    #[error("Shape mismatch: expected {expected_shape}, got {actual_shape}")]
    ShapeMismatch {
        expected_shape: String,
        actual_shape: String,
    },
    /// The start value optimizer failed.
    #[error("Optimization error: {0}")]
    OptimizationError(String),
}

impl From<argmin::core::Error> for DistBoostError {
    fn from(err: argmin::core::Error) -> Self {
        DistBoostError::OptimizationError(err.to_string())
    }
}

impl From<ShapeError> for DistBoostError {
    fn from(err: ShapeError) -> Self {
        DistBoostError::ShapeMismatch {
            expected_shape: "unknown".to_string(),
            actual_shape: err.to_string(),
        }
    }
}

/// Join option names for error messages: `'a', 'b' or 'c'`.
pub(crate) fn format_choices<I, S>(names: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let quoted: Vec<String> = names
        .into_iter()
        .map(|n| format!("'{}'", n.as_ref()))
        .collect();
    match quoted.len() {
        0 => String::new(),
        1 => quoted[0].clone(),
        n => format!("{} or {}", quoted[..n - 1].join(", "), quoted[n - 1]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_choices() {
        assert_eq!(format_choices(["sigmoid"]), "'sigmoid'");
        assert_eq!(format_choices(["exp", "softplus"]), "'exp' or 'softplus'");
        assert_eq!(
            format_choices(["relu", "exp", "softplus"]),
            "'relu', 'exp' or 'softplus'"
        );
    }

    #[test]
    fn test_invalid_response_fn_message() {
        let err = DistBoostError::InvalidResponseFn {
            distribution: "ZINB".to_string(),
            param: "probs".to_string(),
            got: "exp".to_string(),
            valid: format_choices(["sigmoid"]),
        };
        let msg = err.to_string();
        assert!(msg.contains("probs"));
        assert!(msg.contains("'sigmoid'"));
    }
}
