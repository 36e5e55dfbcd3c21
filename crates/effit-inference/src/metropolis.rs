//! Random-walk Metropolis sampling in parameter space.
//!
//! Parameters are updated one at a time with Gaussian proposals under a flat
//! prior inside the target's bounds. During warmup the per-parameter proposal
//! widths are rescaled every `adapt_interval` iterations to keep the
//! acceptance rate inside `[0.15, 0.5]`.

use crate::chain::Chain;
use effit_core::{ChainLogDensity, Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

const ACCEPT_MIN: f64 = 0.15;
const ACCEPT_MAX: f64 = 0.5;
const MAX_INIT_ATTEMPTS: usize = 1000;

/// Metropolis sampler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetropolisConfig {
    /// Number of independent chains (also the number of model instances).
    pub n_chains: usize,
    /// Warmup iterations per chain (discarded).
    pub n_warmup: usize,
    /// Recorded iterations per chain.
    pub n_samples: usize,
    /// Initial proposal width as a fraction of each parameter range.
    pub initial_scale: f64,
    /// Warmup iterations between proposal-width updates.
    pub adapt_interval: usize,
    /// Start-point jitter for chains other than 0, as a fraction of each range.
    pub init_jitter: f64,
}

impl Default for MetropolisConfig {
    fn default() -> Self {
        Self {
            n_chains: 4,
            n_warmup: 1000,
            n_samples: 2000,
            initial_scale: 0.05,
            adapt_interval: 100,
            init_jitter: 0.1,
        }
    }
}

impl MetropolisConfig {
    /// Check that the configuration can run.
    pub fn validate(&self) -> Result<()> {
        if self.n_chains == 0 {
            return Err(Error::Validation("n_chains must be at least 1".to_string()));
        }
        if self.n_samples == 0 {
            return Err(Error::Validation("n_samples must be at least 1".to_string()));
        }
        if self.adapt_interval == 0 {
            return Err(Error::Validation("adapt_interval must be at least 1".to_string()));
        }
        if !(self.initial_scale.is_finite() && self.initial_scale > 0.0 && self.initial_scale <= 1.0) {
            return Err(Error::Validation(format!(
                "initial_scale must be in (0, 1], got {}",
                self.initial_scale
            )));
        }
        if !(self.init_jitter.is_finite() && self.init_jitter >= 0.0) {
            return Err(Error::Validation(format!("init_jitter must be >= 0, got {}", self.init_jitter)));
        }
        Ok(())
    }
}

/// Run one chain with index `chain_id`; the target is always queried with that index.
pub fn sample_metropolis(
    target: &dyn ChainLogDensity,
    chain_id: usize,
    config: &MetropolisConfig,
    seed: u64,
) -> Result<Chain> {
    let bounds = target.parameter_bounds();
    let dim = target.dim();
    if bounds.len() != dim {
        return Err(Error::Validation(format!(
            "target reports {} parameters but {} bounds",
            dim,
            bounds.len()
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let (mut x, mut lp) = initial_state(target, &bounds, chain_id, config, &mut rng)?;

    let mut scales: Vec<f64> = bounds.iter().map(|&(lo, hi)| config.initial_scale * (hi - lo)).collect();
    let mut window_accepts = vec![0usize; dim];
    let mut window_len = 0usize;
    let mut n_accept = 0usize;
    let mut n_trials = 0usize;

    let mut draws = Vec::with_capacity(config.n_samples);
    let mut log_densities = Vec::with_capacity(config.n_samples);

    for iter in 0..config.n_warmup + config.n_samples {
        let warmup = iter < config.n_warmup;

        for i in 0..dim {
            let (lo, hi) = bounds[i];
            let step: f64 = rng.sample(StandardNormal);
            let proposal = x[i] + scales[i] * step;

            let mut accepted = false;
            if (lo..=hi).contains(&proposal) {
                let current = x[i];
                x[i] = proposal;
                let lp_new = target.log_density(chain_id, &x);
                let u: f64 = rng.random();
                if lp_new.is_finite() && u.ln() < lp_new - lp {
                    lp = lp_new;
                    accepted = true;
                } else {
                    x[i] = current;
                }
            }

            if accepted {
                window_accepts[i] += 1;
            }
            if !warmup {
                n_trials += 1;
                n_accept += usize::from(accepted);
            }
        }

        if warmup {
            window_len += 1;
            if window_len == config.adapt_interval {
                adapt_scales(&mut scales, &window_accepts, window_len, &bounds);
                window_accepts.iter_mut().for_each(|a| *a = 0);
                window_len = 0;
            }
        } else {
            draws.push(x.clone());
            log_densities.push(lp);
        }
    }

    let acceptance_rate = if n_trials > 0 { n_accept as f64 / n_trials as f64 } else { f64::NAN };

    Ok(Chain { draws, log_densities, acceptance_rate, proposal_scales: scales })
}

/// Starting point of a chain: the target's initial values, jittered for
/// chains other than 0, then uniform retries if the density is not finite.
fn initial_state(
    target: &dyn ChainLogDensity,
    bounds: &[(f64, f64)],
    chain_id: usize,
    config: &MetropolisConfig,
    rng: &mut StdRng,
) -> Result<(Vec<f64>, f64)> {
    let init = target.initial_values();
    let mut x: Vec<f64> = bounds
        .iter()
        .enumerate()
        .map(|(i, &(lo, hi))| {
            let base = init.get(i).copied().unwrap_or(0.5 * (lo + hi));
            let jitter = if chain_id > 0 {
                let z: f64 = rng.sample(StandardNormal);
                config.init_jitter * (hi - lo) * z
            } else {
                0.0
            };
            (base + jitter).clamp(lo, hi)
        })
        .collect();

    let mut lp = target.log_density(chain_id, &x);
    let mut attempts = 0;
    while !lp.is_finite() && attempts < MAX_INIT_ATTEMPTS {
        x = bounds.iter().map(|&(lo, hi)| lo + (hi - lo) * rng.random::<f64>()).collect();
        lp = target.log_density(chain_id, &x);
        attempts += 1;
    }
    if !lp.is_finite() {
        return Err(Error::Computation(format!(
            "chain {chain_id}: no starting point with finite log-density after {MAX_INIT_ATTEMPTS} attempts"
        )));
    }
    Ok((x, lp))
}

fn adapt_scales(scales: &mut [f64], accepts: &[usize], window_len: usize, bounds: &[(f64, f64)]) {
    for ((scale, &acc), &(lo, hi)) in scales.iter_mut().zip(accepts).zip(bounds) {
        let rate = acc as f64 / window_len as f64;
        if rate < ACCEPT_MIN {
            *scale *= 0.5;
        } else if rate > ACCEPT_MAX {
            *scale *= 2.0;
        }
        let range = hi - lo;
        *scale = scale.clamp(1e-9 * range, range);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Standard normal restricted to [-5, 5] per dimension.
    struct TruncatedNormal {
        dim: usize,
    }

    impl ChainLogDensity for TruncatedNormal {
        fn dim(&self) -> usize {
            self.dim
        }

        fn parameter_names(&self) -> Vec<String> {
            (0..self.dim).map(|i| format!("x{i}")).collect()
        }

        fn parameter_bounds(&self) -> Vec<(f64, f64)> {
            vec![(-5.0, 5.0); self.dim]
        }

        fn initial_values(&self) -> Vec<f64> {
            vec![1.0; self.dim]
        }

        fn log_density(&self, _chain: usize, params: &[f64]) -> f64 {
            -0.5 * params.iter().map(|x| x * x).sum::<f64>()
        }
    }

    #[test]
    fn test_chain_shape_and_bounds() {
        let config = MetropolisConfig { n_warmup: 200, n_samples: 300, ..Default::default() };
        let chain = sample_metropolis(&TruncatedNormal { dim: 2 }, 0, &config, 7).unwrap();
        assert_eq!(chain.draws.len(), 300);
        assert_eq!(chain.log_densities.len(), 300);
        assert!(chain.draws.iter().flatten().all(|&v| (-5.0..=5.0).contains(&v)));
        assert!(chain.acceptance_rate > 0.05 && chain.acceptance_rate < 0.95, "{}", chain.acceptance_rate);
    }

    #[test]
    fn test_recovers_moments() {
        let config = MetropolisConfig { n_warmup: 1000, n_samples: 20000, ..Default::default() };
        let chain = sample_metropolis(&TruncatedNormal { dim: 1 }, 0, &config, 11).unwrap();
        let xs: Vec<f64> = chain.draws.iter().map(|d| d[0]).collect();
        let mean = xs.iter().sum::<f64>() / xs.len() as f64;
        let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / xs.len() as f64;
        assert!(mean.abs() < 0.1, "mean={mean}");
        assert!((var - 1.0).abs() < 0.15, "var={var}");
    }

    #[test]
    fn test_deterministic_for_seed() {
        let config = MetropolisConfig { n_warmup: 50, n_samples: 50, ..Default::default() };
        let a = sample_metropolis(&TruncatedNormal { dim: 3 }, 1, &config, 99).unwrap();
        let b = sample_metropolis(&TruncatedNormal { dim: 3 }, 1, &config, 99).unwrap();
        assert_eq!(a.draws, b.draws);
    }

    #[test]
    fn test_zero_dimensional_target() {
        let config = MetropolisConfig { n_warmup: 5, n_samples: 10, ..Default::default() };
        let chain = sample_metropolis(&TruncatedNormal { dim: 0 }, 0, &config, 1).unwrap();
        assert_eq!(chain.draws.len(), 10);
        assert!(chain.draws.iter().all(|d| d.is_empty()));
        assert!(chain.acceptance_rate.is_nan());
    }

    #[test]
    fn test_config_validation() {
        assert!(MetropolisConfig::default().validate().is_ok());
        assert!(MetropolisConfig { n_chains: 0, ..Default::default() }.validate().is_err());
        assert!(MetropolisConfig { initial_scale: 0.0, ..Default::default() }.validate().is_err());
        assert!(MetropolisConfig { adapt_interval: 0, ..Default::default() }.validate().is_err());
    }
}
