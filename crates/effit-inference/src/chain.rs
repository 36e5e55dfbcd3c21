//! Chain storage and multi-chain runner.

use crate::metropolis::{MetropolisConfig, sample_metropolis};
use effit_core::{ChainLogDensity, Result};

/// Post-warmup draws of one Metropolis chain.
#[derive(Debug, Clone)]
pub struct Chain {
    /// Parameter vector per draw.
    pub draws: Vec<Vec<f64>>,
    /// Log-density per draw.
    pub log_densities: Vec<f64>,
    /// Fraction of accepted single-parameter proposals after warmup.
    pub acceptance_rate: f64,
    /// Proposal widths at the end of warmup.
    pub proposal_scales: Vec<f64>,
}

/// Result of a multi-chain sampling run.
#[derive(Debug, Clone)]
pub struct SamplerResult {
    /// Individual chains.
    pub chains: Vec<Chain>,
    /// Parameter names.
    pub param_names: Vec<String>,
    /// Number of warmup iterations per chain.
    pub n_warmup: usize,
    /// Number of post-warmup samples per chain.
    pub n_samples: usize,
}

impl SamplerResult {
    /// Total number of post-warmup draws across all chains.
    pub fn total_draws(&self) -> usize {
        self.chains.iter().map(|c| c.draws.len()).sum()
    }

    /// Iterate over every draw of every chain.
    pub fn draws(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.chains.iter().flat_map(|c| c.draws.iter().map(Vec::as_slice))
    }

    /// Get draws for a single parameter (index) across all chains.
    pub fn param_draws(&self, param_idx: usize) -> Vec<Vec<f64>> {
        self.chains.iter().map(|c| c.draws.iter().map(|d| d[param_idx]).collect()).collect()
    }

    /// Mean of a parameter across all draws and chains.
    pub fn param_mean(&self, param_idx: usize) -> f64 {
        let n = self.total_draws();
        if n == 0 {
            return f64::NAN;
        }
        self.draws().map(|d| d[param_idx]).sum::<f64>() / n as f64
    }

    /// Standard deviation of a parameter across all draws and chains.
    pub fn param_std(&self, param_idx: usize) -> f64 {
        let n = self.total_draws();
        if n < 2 {
            return f64::NAN;
        }
        let mean = self.param_mean(param_idx);
        let ss: f64 = self.draws().map(|d| (d[param_idx] - mean).powi(2)).sum();
        (ss / (n as f64 - 1.0)).sqrt()
    }

    /// Draw with the highest log-density, and that log-density.
    pub fn global_mode(&self) -> Option<(&[f64], f64)> {
        self.chains
            .iter()
            .flat_map(|c| c.draws.iter().zip(c.log_densities.iter()))
            .filter(|(_, lp)| lp.is_finite())
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(d, &lp)| (d.as_slice(), lp))
    }
}

/// Run Metropolis sampling on multiple chains in parallel via Rayon.
///
/// Chain `c` uses seed `seed + c` and queries the target with chain index `c`,
/// so per-chain state in the target is never shared between workers.
pub fn sample_metropolis_multichain(
    target: &dyn ChainLogDensity,
    config: &MetropolisConfig,
    seed: u64,
) -> Result<SamplerResult> {
    use rayon::prelude::*;

    config.validate()?;

    let chains: Vec<Result<Chain>> = (0..config.n_chains)
        .into_par_iter()
        .map(|chain_id| sample_metropolis(target, chain_id, config, seed.wrapping_add(chain_id as u64)))
        .collect();

    let chains: Vec<Chain> = chains.into_iter().collect::<Result<Vec<_>>>()?;

    Ok(SamplerResult {
        chains,
        param_names: target.parameter_names(),
        n_warmup: config.n_warmup,
        n_samples: config.n_samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Normal(1, 0.5) on [-3, 3] that records which chain indices queried it.
    struct Recording {
        seen: Vec<AtomicUsize>,
    }

    impl ChainLogDensity for Recording {
        fn dim(&self) -> usize {
            1
        }

        fn parameter_names(&self) -> Vec<String> {
            vec!["mu".to_string()]
        }

        fn parameter_bounds(&self) -> Vec<(f64, f64)> {
            vec![(-3.0, 3.0)]
        }

        fn initial_values(&self) -> Vec<f64> {
            vec![0.0]
        }

        fn log_density(&self, chain: usize, params: &[f64]) -> f64 {
            self.seen[chain].fetch_add(1, Ordering::Relaxed);
            -0.5 * ((params[0] - 1.0) / 0.5).powi(2)
        }
    }

    fn recording(n: usize) -> Recording {
        Recording { seen: (0..n).map(|_| AtomicUsize::new(0)).collect() }
    }

    #[test]
    fn test_multichain_deterministic() {
        let config = MetropolisConfig { n_chains: 3, n_warmup: 100, n_samples: 100, ..Default::default() };
        let r1 = sample_metropolis_multichain(&recording(3), &config, 42).unwrap();
        let r2 = sample_metropolis_multichain(&recording(3), &config, 42).unwrap();
        for (c1, c2) in r1.chains.iter().zip(r2.chains.iter()) {
            assert_eq!(c1.draws, c2.draws, "Multi-chain should be deterministic");
        }
    }

    #[test]
    fn test_multichain_basic() {
        let target = recording(4);
        let config = MetropolisConfig { n_chains: 4, n_warmup: 500, n_samples: 2000, ..Default::default() };
        let result = sample_metropolis_multichain(&target, &config, 5).unwrap();

        assert_eq!(result.chains.len(), 4);
        assert_eq!(result.total_draws(), 8000);
        assert_eq!(result.param_names, vec!["mu"]);
        assert!(target.seen.iter().all(|s| s.load(Ordering::Relaxed) > 0), "every chain index used");

        let mean = result.param_mean(0);
        let sd = result.param_std(0);
        assert!((mean - 1.0).abs() < 0.1, "mean={mean}");
        assert!((sd - 0.5).abs() < 0.1, "sd={sd}");

        let (mode, lp) = result.global_mode().unwrap();
        assert!((mode[0] - 1.0).abs() < 0.1, "mode={mode:?}");
        assert!(lp <= 0.0);
    }

    #[test]
    fn test_rejects_zero_chains() {
        let config = MetropolisConfig { n_chains: 0, ..Default::default() };
        assert!(sample_metropolis_multichain(&recording(1), &config, 0).is_err());
    }
}
