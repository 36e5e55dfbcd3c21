//! Posterior mode refinement.
//!
//! L-BFGS from argmin on the negative log-density of a [`ChainLogDensity`],
//! with box constraints handled by clamping and a projected gradient.

use argmin::core::{CostFunction, Executor, Gradient, State, TerminationReason, TerminationStatus};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use effit_core::{ChainLogDensity, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Configuration for the L-BFGS mode finder
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Maximum number of iterations
    pub max_iter: u64,
    /// Convergence tolerance for gradient norm
    pub tol: f64,
    /// Number of corrections to approximate inverse Hessian
    pub m: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self { max_iter: 1000, tol: 1e-6, m: 10 }
    }
}

/// Result of a mode search
#[derive(Debug, Clone)]
pub struct ModeResult {
    /// Parameters at the mode
    pub parameters: Vec<f64>,
    /// Log-density at the mode
    pub log_density: f64,
    /// Number of iterations
    pub n_iter: u64,
    /// Number of log-density evaluations.
    pub n_fev: usize,
    /// Number of gradient evaluations.
    pub n_gev: usize,
    /// Convergence status
    pub converged: bool,
    /// Termination message
    pub message: String,
}

impl fmt::Display for ModeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ModeResult(log_density={:.6}, n_iter={}, n_fev={}, n_gev={}, converged={})",
            self.log_density, self.n_iter, self.n_fev, self.n_gev, self.converged
        )
    }
}

fn clamp_params(params: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    params.iter().zip(bounds.iter()).map(|(&v, &(lo, hi))| v.clamp(lo, hi)).collect()
}

#[derive(Default)]
struct EvalCounts {
    cost: AtomicUsize,
    grad: AtomicUsize,
}

/// `-log_density` on chain 0, as argmin minimizes.
struct NegLogDensity<'a> {
    target: &'a dyn ChainLogDensity,
    bounds: &'a [(f64, f64)],
    counts: Arc<EvalCounts>,
}

impl NegLogDensity<'_> {
    fn value(&self, params: &[f64]) -> std::result::Result<f64, argmin::core::Error> {
        let lp = self.target.log_density(0, params);
        if lp.is_finite() {
            Ok(-lp)
        } else {
            Err(argmin::core::Error::msg(format!("non-finite log-density {lp} at {params:?}")))
        }
    }
}

impl CostFunction for NegLogDensity<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
        self.counts.cost.fetch_add(1, Ordering::Relaxed);
        self.value(&clamp_params(params, self.bounds))
    }
}

impl Gradient for NegLogDensity<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(
        &self,
        params: &Self::Param,
    ) -> std::result::Result<Self::Gradient, argmin::core::Error> {
        self.counts.grad.fetch_add(1, Ordering::Relaxed);
        let x = clamp_params(params, self.bounds);
        let mut g = vec![0.0; x.len()];
        let mut probe = x.clone();

        for i in 0..x.len() {
            let (lo, hi) = self.bounds[i];
            // Central differences, shifted inwards at a bound.
            let eps = 1e-8 * x[i].abs().max(1.0);
            let up = (x[i] + eps).min(hi);
            let down = (x[i] - eps).max(lo);
            if up <= down {
                continue;
            }
            probe[i] = up;
            let f_up = self.value(&probe)?;
            probe[i] = down;
            let f_down = self.value(&probe)?;
            probe[i] = x[i];
            g[i] = (f_up - f_down) / (up - down);
        }

        // At a bound, drop components that push further outside.
        const EPS: f64 = 1e-12;
        for (i, (&xi, &(lo, hi))) in x.iter().zip(self.bounds.iter()).enumerate() {
            if (xi <= lo + EPS && g[i] > 0.0) || (xi >= hi - EPS && g[i] < 0.0) {
                g[i] = 0.0;
            }
        }

        Ok(g)
    }
}

/// Finds the maximum of a log-density inside its parameter bounds.
#[derive(Debug, Clone, Default)]
pub struct ModeFinder {
    config: OptimizerConfig,
}

impl ModeFinder {
    /// Create a mode finder with given configuration
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Maximize `target` starting at `start`, evaluating on chain 0.
    pub fn find_mode(&self, target: &dyn ChainLogDensity, start: &[f64]) -> Result<ModeResult> {
        let bounds = target.parameter_bounds();
        if start.len() != bounds.len() {
            return Err(Error::Validation(format!(
                "Parameter and bounds length mismatch: {} != {}",
                start.len(),
                bounds.len()
            )));
        }

        let init = clamp_params(start, &bounds);
        if init.is_empty() {
            let log_density = target.log_density(0, &init);
            return Ok(ModeResult {
                parameters: init,
                log_density,
                n_iter: 0,
                n_fev: 1,
                n_gev: 0,
                converged: log_density.is_finite(),
                message: "no free parameters".to_string(),
            });
        }

        let counts = Arc::new(EvalCounts::default());
        let problem = NegLogDensity { target, bounds: &bounds, counts: counts.clone() };

        let linesearch = MoreThuenteLineSearch::new();
        let tol_cost = if self.config.tol == 0.0 { 0.0 } else { (0.1 * self.config.tol).max(1e-12) };
        let solver = LBFGS::new(linesearch, self.config.m)
            .with_tolerance_grad(self.config.tol)
            .map_err(|e| Error::Validation(format!("Invalid optimizer configuration (tol): {e}")))?
            .with_tolerance_cost(tol_cost)
            .map_err(|e| Error::Validation(format!("Invalid optimizer configuration (tol_cost): {e}")))?;

        let res = Executor::new(problem, solver)
            .configure(|state| state.param(init).max_iters(self.config.max_iter))
            .run()
            .map_err(|e| Error::Computation(format!("Mode search failed: {e}")))?;

        let state = res.state();
        let best = state
            .get_best_param()
            .ok_or_else(|| Error::Computation("No best parameters found".to_string()))?;
        let parameters = clamp_params(best, &bounds);
        let log_density = -state.get_best_cost();
        let n_iter = state.get_iter();
        let termination = state.get_termination_status();
        let converged = matches!(
            termination,
            TerminationStatus::Terminated(TerminationReason::SolverConverged)
                | TerminationStatus::Terminated(TerminationReason::TargetCostReached)
        );
        let message = termination.to_string();
        let n_fev = counts.cost.load(Ordering::Relaxed);
        let n_gev = counts.grad.load(Ordering::Relaxed);

        Ok(ModeResult { parameters, log_density, n_iter, n_fev, n_gev, converged, message })
    }
}
