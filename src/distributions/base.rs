//! Distribution specification record and parameter materialization.

use super::family::Family;
use crate::autodiff::Real;
use crate::config::EngineConfig;
use crate::error::{format_choices, DistBoostError, Result};
use crate::utils::{nan_to_num, ResponseFn};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Loss function types for distributional regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LossFn {
    /// Negative log-likelihood loss.
    Nll,
    /// Continuous Ranked Probability Score.
    Crps,
}

impl LossFn {
    pub const ALL: [LossFn; 2] = [LossFn::Nll, LossFn::Crps];

    /// Get the string name of the loss function.
    pub fn name(&self) -> &'static str {
        match self {
            LossFn::Nll => "nll",
            LossFn::Crps => "crps",
        }
    }
}

impl fmt::Display for LossFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LossFn {
    type Err = DistBoostError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        LossFn::ALL
            .into_iter()
            .find(|l| l.name() == lowered)
            .ok_or_else(|| DistBoostError::UnknownName {
                kind: "loss function",
                got: s.to_string(),
                valid: format_choices(LossFn::ALL.iter().map(|l| l.name())),
            })
    }
}

/// Stabilization methods for gradients and hessians.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stabilization {
    /// No stabilization.
    None,
    /// Median Absolute Deviation stabilization.
    Mad,
    /// L2 norm stabilization.
    L2,
}

impl Stabilization {
    pub const ALL: [Stabilization; 3] = [Stabilization::None, Stabilization::Mad, Stabilization::L2];

    pub fn name(&self) -> &'static str {
        match self {
            Stabilization::None => "None",
            Stabilization::Mad => "MAD",
            Stabilization::L2 => "L2",
        }
    }
}

impl fmt::Display for Stabilization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stabilization {
    type Err = DistBoostError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        Stabilization::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| DistBoostError::UnknownName {
                kind: "stabilization",
                got: s.to_string(),
                valid: format_choices(Stabilization::ALL.iter().map(|m| m.name())),
            })
    }
}

/// Static description of one parameter of a family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamDef {
    pub name: &'static str,
    /// Response functions this parameter accepts; the first is the default.
    pub allowed: &'static [ResponseFn],
    /// Constant added after the response function (Student-T `df = f(x) + 2`).
    pub shift: f64,
    /// Parameter whose response function this one must share.
    pub tied_to: Option<&'static str>,
}

impl ParamDef {
    pub const fn new(name: &'static str, allowed: &'static [ResponseFn]) -> Self {
        Self {
            name,
            allowed,
            shift: 0.0,
            tied_to: None,
        }
    }

    pub const fn shifted(name: &'static str, allowed: &'static [ResponseFn], shift: f64) -> Self {
        Self {
            name,
            allowed,
            shift,
            tied_to: None,
        }
    }

    /// A parameter that always uses the response function of `leader`.
    pub const fn tied(
        name: &'static str,
        allowed: &'static [ResponseFn],
        leader: &'static str,
    ) -> Self {
        Self {
            name,
            allowed,
            shift: 0.0,
            tied_to: Some(leader),
        }
    }

    /// Name shared by every parameter of this parameter's tie group.
    fn group(&self) -> &'static str {
        self.tied_to.unwrap_or(self.name)
    }

    pub fn default_response_fn(&self) -> ResponseFn {
        self.allowed[0]
    }
}

/// Declarative description of a distribution family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FamilySpec {
    pub name: &'static str,
    pub params: &'static [ParamDef],
    pub discrete: bool,
    pub univariate: bool,
}

/// A distributional parameter with its response function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionParam {
    /// Name of the parameter (e.g., "loc", "scale").
    pub name: String,
    /// Response function to transform predictions to parameter space.
    pub response_fn: ResponseFn,
    /// Constant added to the response function output.
    #[serde(default)]
    pub shift: f64,
}

impl DistributionParam {
    /// Create a new distribution parameter.
    pub fn new(name: impl Into<String>, response_fn: ResponseFn) -> Self {
        Self {
            name: name.into(),
            response_fn,
            shift: 0.0,
        }
    }

    /// Map one raw prediction to the parameter's domain.
    ///
    /// The response function output is clamped `param_eps` inside its domain
    /// (and to at most `param_max`) before the shift is added, so neither
    /// overflow nor an infinite raw value leaks a non-finite parameter.
    pub fn materialize<S: Real>(&self, raw: S, config: &EngineConfig) -> S {
        let value = self.response_fn.domain().clamp(
            self.response_fn.apply_real(raw),
            config.param_eps,
            config.param_max,
        );
        if self.shift == 0.0 {
            value
        } else {
            value + S::constant(self.shift)
        }
    }
}

/// Immutable configuration of one pluggable distribution.
///
/// Built once, validated at construction, and then shared read-only by every
/// boosting iteration (and by any number of concurrently trained models).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SpecRecord", into = "SpecRecord")]
pub struct DistributionSpec {
    family: Family,
    params: Vec<DistributionParam>,
    loss_fn: LossFn,
    stabilization: Stabilization,
    config: EngineConfig,
}

impl DistributionSpec {
    /// Build a specification, validating every requested response function.
    ///
    /// `response_fns` lists `(parameter name, response function)` overrides;
    /// parameters not mentioned keep their family default.
    pub fn new(
        family: Family,
        response_fns: &[(&str, ResponseFn)],
        stabilization: Stabilization,
        loss_fn: LossFn,
    ) -> Result<Self> {
        let spec = family.spec();

        for (name, _) in response_fns {
            if !spec.params.iter().any(|p| p.name == *name) {
                return Err(DistBoostError::UnknownParameter {
                    distribution: spec.name.to_string(),
                    param: name.to_string(),
                    known: format_choices(spec.params.iter().map(|p| p.name)),
                });
            }
        }

        let requested = |name: &str| {
            response_fns
                .iter()
                .rev()
                .find(|(n, _)| *n == name)
                .map(|(_, r)| *r)
        };

        let mut params = Vec::with_capacity(spec.params.len());
        for def in spec.params {
            // a choice for any member of a tie group applies to the whole group
            let mut chosen: Option<(&str, ResponseFn)> = None;
            for member in spec.params.iter().filter(|m| m.group() == def.group()) {
                let Some(response_fn) = requested(member.name) else {
                    continue;
                };
                match chosen {
                    Some((other, previous)) if previous != response_fn => {
                        return Err(DistBoostError::InvalidParameter(format!(
                            "{} requires '{}' and '{}' to share a response function, got '{}' and '{}'",
                            spec.name,
                            other,
                            member.name,
                            previous.name(),
                            response_fn.name()
                        )));
                    }
                    _ => chosen = Some((member.name, response_fn)),
                }
            }
            let response_fn = chosen
                .map(|(_, r)| r)
                .unwrap_or_else(|| def.default_response_fn());

            if !def.allowed.contains(&response_fn) {
                return Err(DistBoostError::InvalidResponseFn {
                    distribution: spec.name.to_string(),
                    param: def.name.to_string(),
                    got: response_fn.name().to_string(),
                    valid: format_choices(def.allowed.iter().map(|r| r.name())),
                });
            }

            params.push(DistributionParam {
                name: def.name.to_string(),
                response_fn,
                shift: def.shift,
            });
        }

        Ok(Self {
            family,
            params,
            loss_fn,
            stabilization,
            config: EngineConfig::default(),
        })
    }

    /// Build a specification from configuration strings.
    pub fn from_names(
        family: &str,
        response_fns: &[(&str, &str)],
        stabilization: &str,
        loss_fn: &str,
    ) -> Result<Self> {
        let family: Family = family.parse()?;
        let parsed = response_fns
            .iter()
            .map(|(param, name)| Ok((*param, name.parse::<ResponseFn>()?)))
            .collect::<Result<Vec<_>>>()?;
        Self::new(family, &parsed, stabilization.parse()?, loss_fn.parse()?)
    }

    /// Replace the numerical constants for this specification only.
    pub fn with_config(mut self, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn family(&self) -> Family {
        self.family
    }

    /// Get the name of this distribution (e.g., "Poisson", "ZINB").
    pub fn name(&self) -> &'static str {
        self.family.spec().name
    }

    pub fn is_discrete(&self) -> bool {
        self.family.spec().discrete
    }

    pub fn is_univariate(&self) -> bool {
        self.family.spec().univariate
    }

    /// Number of distributional parameters.
    pub fn n_params(&self) -> usize {
        self.params.len()
    }

    /// Get the distribution parameters with their response functions.
    pub fn params(&self) -> &[DistributionParam] {
        &self.params
    }

    /// Get the parameter names.
    pub fn param_names(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn loss_fn(&self) -> LossFn {
        self.loss_fn
    }

    pub fn stabilization(&self) -> Stabilization {
        self.stabilization
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Materialize one row of raw predictions.
    pub fn materialize_row<S: Real>(&self, raw: &[S]) -> Vec<S> {
        self.params
            .iter()
            .zip(raw.iter())
            .map(|(param, &x)| param.materialize(x, &self.config))
            .collect()
    }

    /// Transform raw predictions to the parameter space.
    ///
    /// # Arguments
    /// * `predictions` - Raw predictions with shape (n_samples, n_params)
    ///
    /// # Returns
    /// Materialized parameters with the same shape. NaN raw entries are
    /// replaced by their column mean first; infinite ones are clamped by the
    /// parameter domain.
    pub fn transform_params(&self, predictions: &ArrayView2<f64>) -> Result<Array2<f64>> {
        self.check_columns(predictions)?;
        let mut result = Array2::zeros(predictions.dim());
        for (i, param) in self.params.iter().enumerate() {
            let col = nan_to_num(&predictions.column(i));
            result
                .column_mut(i)
                .assign(&col.mapv(|x| param.materialize(x, &self.config)));
        }
        Ok(result)
    }

    pub(crate) fn check_columns(&self, predictions: &ArrayView2<f64>) -> Result<()> {
        if predictions.ncols() != self.n_params() {
            return Err(DistBoostError::ShapeMismatch {
                expected_shape: format!("(n_samples, {})", self.n_params()),
                actual_shape: format!("{:?}", predictions.dim()),
            });
        }
        Ok(())
    }
}

/// Serialized form of a [`DistributionSpec`]; loading re-runs validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SpecRecord {
    family: Family,
    response_fns: Vec<(String, ResponseFn)>,
    loss_fn: LossFn,
    stabilization: Stabilization,
    #[serde(default)]
    config: EngineConfig,
}

impl From<DistributionSpec> for SpecRecord {
    fn from(spec: DistributionSpec) -> Self {
        Self {
            family: spec.family,
            response_fns: spec
                .params
                .into_iter()
                .map(|p| (p.name, p.response_fn))
                .collect(),
            loss_fn: spec.loss_fn,
            stabilization: spec.stabilization,
            config: spec.config,
        }
    }
}

impl TryFrom<SpecRecord> for DistributionSpec {
    type Error = DistBoostError;

    fn try_from(record: SpecRecord) -> Result<Self> {
        let overrides: Vec<(&str, ResponseFn)> = record
            .response_fns
            .iter()
            .map(|(name, r)| (name.as_str(), *r))
            .collect();
        DistributionSpec::new(
            record.family,
            &overrides,
            record.stabilization,
            record.loss_fn,
        )?
        .with_config(record.config)
    }
}
