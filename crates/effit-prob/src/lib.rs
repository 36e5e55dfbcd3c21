//! Probability building blocks for effit.
//!
//! - binomial log-probabilities tolerant of degenerate success probabilities
//! - the fit-bias correction applied to goodness-of-fit p-values

pub mod binomial;
pub mod pvalue;

pub use binomial::{LOG_ZERO, approx_binomial, log_approx_binomial};
pub use pvalue::correct_pvalue;
