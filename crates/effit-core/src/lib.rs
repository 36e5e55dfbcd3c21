//! # effit-core
//!
//! Shared building blocks for the effit workspace: the error type, the
//! 1-D histogram input type, result containers and the chain-aware
//! log-density trait the sampler is written against.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod histogram;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use histogram::Histogram;
pub use traits::ChainLogDensity;
pub use types::{EfficiencyEstimate, EfficiencyFitResult, PValueResult};
