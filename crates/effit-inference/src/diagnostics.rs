//! Convergence diagnostics for multi-chain Metropolis runs: split R-hat and bulk ESS.

use crate::chain::SamplerResult;

/// R-hat above this value is reported as poor mixing.
pub const R_HAT_WARN: f64 = 1.1;

/// Diagnostics for a multi-chain run.
#[derive(Debug, Clone)]
pub struct SamplingDiagnostics {
    /// Split R-hat per parameter.
    pub r_hat: Vec<f64>,
    /// Bulk ESS per parameter.
    pub ess_bulk: Vec<f64>,
    /// Post-warmup acceptance rate per chain.
    pub acceptance_rate: Vec<f64>,
}

impl SamplingDiagnostics {
    /// Largest finite R-hat across parameters, NaN if there is none.
    pub fn max_r_hat(&self) -> f64 {
        self.r_hat.iter().copied().filter(|r| r.is_finite()).fold(f64::NAN, f64::max)
    }

    /// Names of parameters whose R-hat exceeds [`R_HAT_WARN`].
    pub fn poorly_mixed<'a>(&self, names: &'a [String]) -> Vec<&'a str> {
        names
            .iter()
            .zip(&self.r_hat)
            .filter(|(_, r)| **r > R_HAT_WARN)
            .map(|(n, _)| n.as_str())
            .collect()
    }
}

/// Compute split R-hat for one parameter across multiple chains.
///
/// Each chain is split in half, giving 2*M half-chains.
/// R-hat = sqrt(var_hat+ / W) where var_hat+ = (N-1)/N * W + B/N.
/// NaN when a chain has fewer than 4 draws or the within-chain variance vanishes.
pub fn r_hat(chains: &[&[f64]]) -> f64 {
    let Some(halves) = split_chains(chains) else {
        return f64::NAN;
    };

    let m = halves.len() as f64;
    let n = halves[0].len() as f64;

    let stats: Vec<(f64, f64)> = halves.iter().map(|c| mean_and_var(c)).collect();
    let grand_mean = stats.iter().map(|(mu, _)| mu).sum::<f64>() / m;

    // Between-chain variance: B = n/(m-1) * sum((chain_mean - grand_mean)^2)
    let b = stats.iter().map(|(mu, _)| (mu - grand_mean).powi(2)).sum::<f64>() * n / (m - 1.0);
    let w = stats.iter().map(|(_, v)| v).sum::<f64>() / m;

    if w < 1e-30 {
        return f64::NAN;
    }

    let var_hat_plus = (n - 1.0) / n * w + b / n;
    (var_hat_plus / w).sqrt()
}

/// Bulk effective sample size using Geyer's initial monotone sequence on
/// variogram-based autocorrelations of the split chains.
pub fn ess_bulk(chains: &[&[f64]]) -> f64 {
    let Some(split) = split_chains(chains) else {
        return 0.0;
    };

    let m = split.len() as f64;
    let n = split[0].len();
    let n_f = n as f64;
    let total_draws = m * n_f;

    let stats: Vec<(f64, f64)> = split.iter().map(|c| mean_and_var(c)).collect();
    let mean_all = stats.iter().map(|(mu, _)| mu).sum::<f64>() / m;
    let b = stats.iter().map(|(mu, _)| (mu - mean_all).powi(2)).sum::<f64>() * n_f / (m - 1.0);
    let w = stats.iter().map(|(_, v)| v).sum::<f64>() / m;
    let var_hat_plus = (n_f - 1.0) / n_f * w + b / n_f;

    if !var_hat_plus.is_finite() || var_hat_plus < 1e-30 {
        return total_draws;
    }

    // rho_t = 1 - V_t / (2 var_hat_plus), V_t the mean squared lag-t difference.
    let mut rho: Vec<f64> = Vec::new();
    for lag in 1..n {
        let mut sum = 0.0;
        for c in &split {
            sum += c.windows(lag + 1).map(|w| (w[0] - w[lag]).powi(2)).sum::<f64>();
        }
        let v = sum / (m * (n - lag) as f64);
        rho.push((1.0 - v / (2.0 * var_hat_plus)).clamp(-1.0, 1.0));

        let k = rho.len();
        if k % 2 == 0 && rho[k - 2] + rho[k - 1] < 0.0 {
            break;
        }
    }

    let mut tau = 1.0;
    let mut prev = f64::INFINITY;
    for pair in rho.chunks_exact(2) {
        let g = pair[0] + pair[1];
        if g < 0.0 {
            break;
        }
        let g = g.min(prev);
        tau += 2.0 * g;
        prev = g;
    }
    if !tau.is_finite() || tau <= 0.0 {
        return total_draws;
    }

    (total_draws / tau).clamp(1.0, total_draws)
}

/// Compute diagnostics for every parameter of a sampling run.
pub fn compute_diagnostics(result: &SamplerResult) -> SamplingDiagnostics {
    let n_params = result.param_names.len();
    let mut r_hat_vals = Vec::with_capacity(n_params);
    let mut ess_vals = Vec::with_capacity(n_params);

    for p in 0..n_params {
        let draws = result.param_draws(p);
        let refs: Vec<&[f64]> = draws.iter().map(Vec::as_slice).collect();
        r_hat_vals.push(r_hat(&refs));
        ess_vals.push(ess_bulk(&refs));
    }

    SamplingDiagnostics {
        r_hat: r_hat_vals,
        ess_bulk: ess_vals,
        acceptance_rate: result.chains.iter().map(|c| c.acceptance_rate).collect(),
    }
}

/// Halve every chain and truncate the halves to a common length.
fn split_chains<'a>(chains: &[&'a [f64]]) -> Option<Vec<&'a [f64]>> {
    if chains.is_empty() || chains.iter().any(|c| c.len() < 4) {
        return None;
    }
    let min_half = chains.iter().map(|c| c.len() / 2).min()?;
    let mut halves = Vec::with_capacity(2 * chains.len());
    for c in chains {
        let mid = c.len() / 2;
        halves.push(&c[..min_half]);
        halves.push(&c[mid..mid + min_half]);
    }
    Some(halves)
}

fn mean_and_var(chain: &[f64]) -> (f64, f64) {
    let n = chain.len() as f64;
    let mean = chain.iter().sum::<f64>() / n;
    let var = chain.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (n.max(2.0) - 1.0);
    (mean, var)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    fn iid(seed: u64, n: usize) -> Vec<f64> {
        let normal = Normal::new(0.0, 1.0).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| normal.sample(&mut rng)).collect()
    }

    #[test]
    fn test_rhat_well_mixed() {
        let (c1, c2) = (iid(1, 500), iid(2, 500));
        let rhat = r_hat(&[c1.as_slice(), c2.as_slice()]);
        assert!(rhat < 1.05, "R-hat for IID chains should be ~1: {}", rhat);
    }

    #[test]
    fn test_rhat_diverged_chains() {
        let chain1: Vec<f64> = (0..200).map(|i| i as f64 * 0.01).collect();
        let chain2: Vec<f64> = (0..200).map(|i| 10.0 + i as f64 * 0.01).collect();
        let rhat = r_hat(&[chain1.as_slice(), chain2.as_slice()]);
        assert!(rhat > 1.5, "R-hat for diverged chains should be >> 1: {}", rhat);
    }

    #[test]
    fn test_rhat_short_or_constant() {
        assert!(r_hat(&[]).is_nan());
        let short = [1.0, 2.0, 3.0];
        assert!(r_hat(&[short.as_slice()]).is_nan());
        let flat = [1.0; 10];
        assert!(r_hat(&[flat.as_slice(), flat.as_slice()]).is_nan());
    }

    #[test]
    fn test_ess_iid_close_to_draws() {
        let (c1, c2) = (iid(3, 1000), iid(4, 1000));
        let ess = ess_bulk(&[c1.as_slice(), c2.as_slice()]);
        assert!(ess > 1000.0, "ESS for IID draws should be near 2000: {}", ess);
    }

    #[test]
    fn test_ess_autocorrelated_is_small() {
        // AR(1) with phi = 0.95: tau ~ 39.
        let noise = iid(5, 2000);
        let mut x = Vec::with_capacity(noise.len());
        let mut prev = 0.0;
        for e in noise {
            prev = 0.95 * prev + e;
            x.push(prev);
        }
        let ess = ess_bulk(&[x.as_slice()]);
        assert!(ess < 300.0, "ESS for AR(1) chain should be small: {}", ess);
    }

    #[test]
    fn test_compute_diagnostics_shapes() {
        let mk = |seed| Chain {
            draws: iid(seed, 100).into_iter().map(|v| vec![v, 2.0 * v]).collect(),
            log_densities: vec![0.0; 100],
            acceptance_rate: 0.3,
            proposal_scales: vec![0.1, 0.2],
        };
        let result = SamplerResult {
            chains: vec![mk(10), mk(11)],
            param_names: vec!["a".to_string(), "b".to_string()],
            n_warmup: 0,
            n_samples: 100,
        };
        let d = compute_diagnostics(&result);
        assert_eq!(d.r_hat.len(), 2);
        assert_eq!(d.ess_bulk.len(), 2);
        assert_eq!(d.acceptance_rate, vec![0.3, 0.3]);
        assert!(d.max_r_hat() < R_HAT_WARN);
        assert!(d.poorly_mixed(&result.param_names).is_empty());
    }
}
