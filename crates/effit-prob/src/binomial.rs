//! Binomial distribution utilities.

use statrs::function::gamma::ln_gamma;

/// Log-probability reported for impossible outcomes (finite, unlike `ln 0`).
pub const LOG_ZERO: f64 = -1e99;

fn ln_choose(n: u64, k: u64) -> f64 {
    // Exact: ln_gamma(1) is not exactly zero.
    if k == 0 || k == n {
        return 0.0;
    }
    // ln(n choose k) = ln Γ(n+1) - ln Γ(k+1) - ln Γ(n-k+1)
    let n1 = (n as f64) + 1.0;
    let k1 = (k as f64) + 1.0;
    let nk1 = ((n - k) as f64) + 1.0;
    ln_gamma(n1) - ln_gamma(k1) - ln_gamma(nk1)
}

/// Log-probability of `k` successes in `n` trials at success probability `p`.
///
/// Uses log-gamma for the binomial coefficient, so it stays accurate for
/// large `n`. Degenerate probabilities are handled without producing NaN:
/// - `p <= 0`: `0` if `k == 0`, else [`LOG_ZERO`]
/// - `p >= 1`: `0` if `k == n`, else [`LOG_ZERO`]
/// - non-finite `p`, or `k > n`: [`LOG_ZERO`]
pub fn log_approx_binomial(n: u64, k: u64, p: f64) -> f64 {
    if k > n || p.is_nan() {
        return LOG_ZERO;
    }
    if p <= 0.0 {
        return if k == 0 { 0.0 } else { LOG_ZERO };
    }
    if p >= 1.0 {
        return if k == n { 0.0 } else { LOG_ZERO };
    }
    let kf = k as f64;
    let nf = n as f64;
    ln_choose(n, k) + kf * p.ln() + (nf - kf) * (-p).ln_1p()
}

/// Probability mass of `k` successes in `n` trials at success probability `p`.
pub fn approx_binomial(n: u64, k: u64, p: f64) -> f64 {
    log_approx_binomial(n, k, p).exp()
}
