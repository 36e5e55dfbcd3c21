//! # effit-inference
//!
//! Bayesian fitting of binned efficiencies.
//!
//! This crate provides:
//! - the binomial log-likelihood of a model over histogram bins
//! - per-bin credible intervals from the binomial posterior
//! - a fast goodness-of-fit p-value from a Metropolis walk over toy datasets
//! - multi-chain Metropolis sampling and L-BFGS mode refinement
//! - plot-ready data points, fit curves and error bands
//!
//! ```no_run
//! use effit_core::Histogram;
//! use effit_inference::{EfficiencyFitter, FitterConfig, ModelFunction, ParameterSpec};
//!
//! # fn main() -> effit_core::Result<()> {
//! let total = Histogram::uniform("total", 0.0, 10.0, vec![100.0; 10])?;
//! let passed = Histogram::uniform("passed", 0.0, 10.0, vec![50.0; 10])?;
//! let model = ModelFunction::new("flat", vec![ParameterSpec::new("eff", 0.0, 1.0)], |_, p| p[0])?;
//!
//! let fitter = EfficiencyFitter::with_data(&total, &passed, model, FitterConfig::default())?;
//! let fit = fitter.fit()?;
//! println!("p-value = {}", fit.result.pvalue);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Chain storage and multi-chain parallel runner.
pub mod chain;
/// Fitter configuration.
pub mod config;
/// Binned trial/success counts.
pub mod data;
/// MCMC diagnostics: split R-hat, bulk ESS.
pub mod diagnostics;
/// Efficiency fitter: log-likelihood, fit driver, p-value entry point.
pub mod fitter;
/// Per-bin credible intervals.
pub mod interval;
/// Random-walk Metropolis sampler.
pub mod metropolis;
/// Parametric efficiency models.
pub mod model;
/// Posterior mode refinement (L-BFGS).
pub mod optimizer;
/// Fast MCMC p-value.
pub mod pvalue;
/// Gauss-Legendre quadrature.
pub mod quadrature;
/// Data points, fit curves and error bands.
pub mod report;

pub use chain::{Chain, SamplerResult, sample_metropolis_multichain};
pub use config::{EvaluationMode, FitterConfig};
pub use data::{Bin, BinnedCounts};
pub use diagnostics::{SamplingDiagnostics, compute_diagnostics, r_hat};
pub use fitter::{EfficiencyFit, EfficiencyFitter};
pub use interval::{IntervalPolicy, credible_interval};
pub use metropolis::{MetropolisConfig, sample_metropolis};
pub use model::{ModelFunction, ParameterSpec};
pub use optimizer::{ModeFinder, ModeResult, OptimizerConfig};
pub use pvalue::{PValueCallback, fast_pvalue};
pub use report::{EfficiencyPoint, ErrorBand, FitCurve};
