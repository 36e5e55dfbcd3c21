//! Per-bin efficiency estimates from the binomial posterior.
//!
//! With a flat prior the posterior of the efficiency ε given `k` successes in
//! `n` trials is proportional to the binomial probability of `k` at ε. It is
//! tabulated on a fixed grid of [`POSTERIOR_GRID_BINS`] bins over `[0, 1]`
//! and summarized according to an [`IntervalPolicy`].

use effit_core::EfficiencyEstimate;
use effit_prob::log_approx_binomial;
use serde::{Deserialize, Serialize};

/// Resolution of the discretized posterior over `[0, 1]`.
pub const POSTERIOR_GRID_BINS: usize = 1000;

/// Number of lower-tail masses scanned when searching the smallest interval.
const SMALLEST_INTERVAL_STEPS: usize = 1000;

/// How the central value and interval of a bin are derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalPolicy {
    /// Posterior mean ± posterior RMS (may leave `[0, 1]`).
    MeanRms,
    /// `k/n` with the narrowest interval holding the requested probability.
    #[default]
    SmallestInterval,
    /// Median with equal-tailed quantiles.
    CentralInterval,
}

/// Estimate the efficiency of `k` out of `n` at `confidence_level`.
///
/// Returns `None` when there is nothing to estimate (`n == 0`) or the
/// confidence level is outside `(0, 1)`; callers wanting the all-zero
/// placeholder use `unwrap_or_default()`. For
/// A posterior that cannot be normalized (non-finite weights) gives an
/// all-zero estimate for every policy, still wrapped in `Some`.
pub fn credible_interval(
    n: u64,
    k: u64,
    confidence_level: f64,
    policy: IntervalPolicy,
) -> Option<EfficiencyEstimate> {
    if n == 0 {
        return None;
    }
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        log::warn!("confidence level must be in (0, 1), got {confidence_level}");
        return None;
    }

    log::debug!("Calculating efficiency data-point of type {policy:?} for (n,k) = ({n},{k})");

    let posterior = PosteriorGrid::new(n, k);
    if !posterior.normalized {
        log::warn!("posterior for (n,k) = ({n},{k}) cannot be normalized; reporting zeros");
        return Some(EfficiencyEstimate::default());
    }
    let estimate = match policy {
        IntervalPolicy::MeanRms => mean_rms(&posterior),
        IntervalPolicy::SmallestInterval => smallest_interval(&posterior, n, k, confidence_level),
        IntervalPolicy::CentralInterval => central_interval(&posterior, confidence_level),
    };

    log::debug!(
        " - efficiency = {:.6} , range ({:.6} - {:.6})",
        estimate.central,
        estimate.lower,
        estimate.upper
    );
    Some(estimate)
}

fn mean_rms(posterior: &PosteriorGrid) -> EfficiencyEstimate {
    let mean = posterior.mean();
    let rms = posterior.rms(mean);
    log::debug!(" - mean = {mean:.6} , rms = {rms:.6}");
    EfficiencyEstimate { central: mean, lower: mean - rms, upper: mean + rms }
}

fn smallest_interval(posterior: &PosteriorGrid, n: u64, k: u64, cl: f64) -> EfficiencyEstimate {
    match posterior.smallest_interval(cl) {
        Some((lower, upper)) => EfficiencyEstimate { central: k as f64 / n as f64, lower, upper },
        None => {
            log::warn!("no smallest interval at {cl} for (n,k) = ({n},{k}); reporting zeros");
            EfficiencyEstimate::default()
        }
    }
}

fn central_interval(posterior: &PosteriorGrid, cl: f64) -> EfficiencyEstimate {
    EfficiencyEstimate {
        lower: posterior.quantile((1.0 - cl) / 2.0),
        central: posterior.quantile(0.5),
        upper: posterior.quantile((1.0 + cl) / 2.0),
    }
}

/// Normalized posterior weights on equal-width bins over `[0, 1]`.
struct PosteriorGrid {
    weights: Vec<f64>,
    /// `cumulative[i]` is the mass below bin `i`; length `bins + 1`.
    cumulative: Vec<f64>,
    normalized: bool,
}

impl PosteriorGrid {
    fn new(n: u64, k: u64) -> Self {
        // Scaled by the largest weight so the peak never underflows.
        let log_weights: Vec<f64> =
            (0..POSTERIOR_GRID_BINS).map(|i| log_approx_binomial(n, k, Self::center(i))).collect();
        let max = log_weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut weights: Vec<f64> = log_weights.iter().map(|&lw| (lw - max).exp()).collect();

        let total: f64 = weights.iter().sum();
        let normalized = max.is_finite() && total > 0.0 && total.is_finite();
        if normalized {
            for w in weights.iter_mut() {
                *w /= total;
            }
        }

        let mut cumulative = Vec::with_capacity(weights.len() + 1);
        let mut acc = 0.0;
        cumulative.push(acc);
        for &w in &weights {
            acc += w;
            cumulative.push(acc);
        }

        Self { weights, cumulative, normalized }
    }

    fn width() -> f64 {
        1.0 / POSTERIOR_GRID_BINS as f64
    }

    fn low_edge(i: usize) -> f64 {
        i as f64 * Self::width()
    }

    fn center(i: usize) -> f64 {
        (i as f64 + 0.5) * Self::width()
    }

    fn mean(&self) -> f64 {
        self.weights.iter().enumerate().map(|(i, &w)| w * Self::center(i)).sum()
    }

    fn rms(&self, mean: f64) -> f64 {
        let var: f64 =
            self.weights.iter().enumerate().map(|(i, &w)| w * (Self::center(i) - mean).powi(2)).sum();
        var.max(0.0).sqrt()
    }

    /// Inverse CDF, linear inside the bin containing `prob`.
    fn quantile(&self, prob: f64) -> f64 {
        let nbins = self.weights.len();
        let i = self.cumulative.partition_point(|&c| c <= prob).saturating_sub(1).min(nbins - 1);
        let dint = self.cumulative[i + 1] - self.cumulative[i];
        let mut x = Self::low_edge(i);
        if dint > 0.0 {
            x += Self::width() * ((prob - self.cumulative[i]) / dint).clamp(0.0, 1.0);
        }
        x
    }

    /// Narrowest `[Q(a), Q(a + cl)]` over scanned lower-tail masses `a`.
    fn smallest_interval(&self, cl: f64) -> Option<(f64, f64)> {
        let spare = 1.0 - cl;
        (0..=SMALLEST_INTERVAL_STEPS)
            .map(|j| {
                let a = (j as f64 / SMALLEST_INTERVAL_STEPS as f64) * spare;
                (self.quantile(a), self.quantile(a + cl))
            })
            .filter(|(lo, hi)| lo.is_finite() && hi.is_finite())
            .min_by(|x, y| (x.1 - x.0).total_cmp(&(y.1 - y.0)))
    }
}
