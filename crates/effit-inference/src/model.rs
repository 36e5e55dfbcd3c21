//! Parametric efficiency model `f(x; θ)`.
//!
//! A [`ModelFunction`] pairs a shared formula with a private parameter
//! buffer: parameters are set, then the function is evaluated. Cloning
//! shares the formula but copies the buffer, which is how the fitter gets
//! one independent working instance per sampling chain.

use crate::quadrature;
use effit_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Formula signature: `f(x, params)`.
pub type ModelFormula = dyn Fn(f64, &[f64]) -> f64 + Send + Sync;

/// A named model parameter with its prior range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Parameter name.
    pub name: String,
    /// Starting value for sampling and optimization.
    pub init: f64,
    /// Allowed range `(min, max)`; the prior is flat inside it.
    pub bounds: (f64, f64),
}

impl ParameterSpec {
    /// Parameter starting at the middle of its range.
    pub fn new(name: impl Into<String>, min: f64, max: f64) -> Self {
        Self { name: name.into(), init: 0.5 * (min + max), bounds: (min, max) }
    }

    /// Override the starting value.
    pub fn with_init(mut self, init: f64) -> Self {
        self.init = init;
        self
    }
}

/// Efficiency model with a per-instance parameter buffer.
#[derive(Clone)]
pub struct ModelFunction {
    name: String,
    formula: Arc<ModelFormula>,
    parameters: Vec<ParameterSpec>,
    values: Vec<f64>,
}

impl fmt::Debug for ModelFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelFunction")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("values", &self.values)
            .finish()
    }
}

impl ModelFunction {
    /// Create a model from its parameters and formula.
    ///
    /// Bounds must be finite with `min < max`; initial values must lie inside.
    pub fn new<F>(name: impl Into<String>, parameters: Vec<ParameterSpec>, formula: F) -> Result<Self>
    where
        F: Fn(f64, &[f64]) -> f64 + Send + Sync + 'static,
    {
        let name = name.into();
        for p in &parameters {
            let (lo, hi) = p.bounds;
            if !(lo.is_finite() && hi.is_finite() && lo < hi) {
                return Err(Error::Validation(format!(
                    "model '{}': parameter '{}' has invalid bounds ({lo}, {hi})",
                    name, p.name
                )));
            }
            if !(lo..=hi).contains(&p.init) {
                return Err(Error::Validation(format!(
                    "model '{}': initial value {} of '{}' outside ({lo}, {hi})",
                    name, p.init, p.name
                )));
            }
        }
        let values = parameters.iter().map(|p| p.init).collect();
        Ok(Self { name, formula: Arc::new(formula), parameters, values })
    }

    /// Model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of parameters.
    pub fn n_parameters(&self) -> usize {
        self.parameters.len()
    }

    /// Parameter definitions.
    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    /// Parameter names.
    pub fn parameter_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }

    /// Parameter bounds (min, max).
    pub fn parameter_bounds(&self) -> Vec<(f64, f64)> {
        self.parameters.iter().map(|p| p.bounds).collect()
    }

    /// Initial parameter values.
    pub fn initial_values(&self) -> Vec<f64> {
        self.parameters.iter().map(|p| p.init).collect()
    }

    /// Load `params` into this instance's buffer. Not validated.
    #[inline]
    pub fn set_parameters(&mut self, params: &[f64]) {
        self.values.clear();
        self.values.extend_from_slice(params);
    }

    /// Current parameter buffer.
    pub fn current_parameters(&self) -> &[f64] {
        &self.values
    }

    /// `f(x)` at the current parameters.
    #[inline]
    pub fn eval(&self, x: f64) -> f64 {
        (self.formula)(x, &self.values)
    }

    /// `∫_a^b f(x) dx` at the current parameters.
    pub fn integral(&self, a: f64, b: f64) -> f64 {
        quadrature::integrate(a, b, |x| self.eval(x))
    }

    /// Average of `f` over `[a, b]`.
    pub fn bin_average(&self, a: f64, b: f64) -> f64 {
        self.integral(a, b) / (b - a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn linear() -> ModelFunction {
        ModelFunction::new(
            "linear",
            vec![ParameterSpec::new("a", 0.0, 1.0), ParameterSpec::new("b", -1.0, 1.0).with_init(0.0)],
            |x, p| p[0] + p[1] * x,
        )
        .unwrap()
    }

    #[test]
    fn test_initial_values_loaded() {
        let f = linear();
        assert_eq!(f.current_parameters(), &[0.5, 0.0]);
        assert_eq!(f.eval(3.0), 0.5);
        assert_eq!(f.parameter_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_clone_has_independent_buffer() {
        let mut a = linear();
        let mut b = a.clone();
        a.set_parameters(&[0.2, 0.1]);
        b.set_parameters(&[0.9, 0.0]);
        assert_relative_eq!(a.eval(1.0), 0.3, epsilon = 1e-15);
        assert_relative_eq!(b.eval(1.0), 0.9, epsilon = 1e-15);
    }

    #[test]
    fn test_bin_average_linear() {
        let mut f = linear();
        f.set_parameters(&[0.1, 0.2]);
        // Average of a linear function equals its midpoint value.
        assert_relative_eq!(f.bin_average(1.0, 2.0), 0.1 + 0.2 * 1.5, epsilon = 1e-13);
        assert_relative_eq!(f.integral(0.0, 1.0), 0.2, epsilon = 1e-13);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let bad_bounds = ModelFunction::new("m", vec![ParameterSpec::new("a", 1.0, 1.0)], |_, p| p[0]);
        assert!(bad_bounds.is_err());
        let bad_init =
            ModelFunction::new("m", vec![ParameterSpec::new("a", 0.0, 1.0).with_init(2.0)], |_, p| p[0]);
        assert!(bad_init.is_err());
    }

    #[test]
    fn test_parameterless_model() {
        let f = ModelFunction::new("half", vec![], |_, _| 0.5).unwrap();
        assert_eq!(f.n_parameters(), 0);
        assert_eq!(f.eval(-4.0), 0.5);
    }
}
