//! Gauss-Legendre quadrature on bounded 1-D intervals.
//!
//! Used to average a model function over a histogram bin. 64 nodes integrate
//! polynomials up to degree 127 exactly, far beyond what a smooth efficiency
//! curve needs over one bin.

use std::sync::OnceLock;

/// Number of nodes of the shared rule.
pub const GAUSS_LEGENDRE_ORDER: usize = 64;

/// Compute Gauss-Legendre nodes and weights on `[-1, 1]` for the given order.
///
/// Uses Newton iteration to find roots of the Legendre polynomial P_n(x),
/// then computes weights from the derivative P'_n at each root.
/// Exploits symmetry: only computes half the roots.
fn gauss_legendre_nodes_weights(n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut nodes = vec![0.0f64; n];
    let mut weights = vec![0.0f64; n];

    if n == 0 {
        return (nodes, weights);
    }
    if n == 1 {
        weights[0] = 2.0;
        return (nodes, weights);
    }

    let nf = n as f64;
    let m = n.div_ceil(2);

    for i in 0..m {
        // Chebyshev initial guess.
        let mut x = ((std::f64::consts::PI * (i as f64 + 0.75)) / (nf + 0.5)).cos();

        for _ in 0..100 {
            let (pn, pn1) = legendre_pair(n, x);
            // P'_n(x) = n * (x * P_n(x) - P_{n-1}(x)) / (x^2 - 1)
            let dp = nf * (x * pn - pn1) / (x * x - 1.0);
            let dx = pn / dp;
            x -= dx;
            if dx.abs() < 1e-15 {
                break;
            }
        }

        let (pn, pn1) = legendre_pair(n, x);
        let dp = nf * (x * pn - pn1) / (x * x - 1.0);
        let w = 2.0 / ((1.0 - x * x) * dp * dp);
        nodes[i] = -x;
        nodes[n - 1 - i] = x;
        weights[i] = w;
        weights[n - 1 - i] = w;
    }

    (nodes, weights)
}

/// `(P_n(x), P_{n-1}(x))` via the three-term recurrence.
fn legendre_pair(n: usize, x: f64) -> (f64, f64) {
    let mut p0 = 1.0f64;
    let mut p1 = x;
    for j in 2..=n {
        let jf = j as f64;
        let p2 = ((2.0 * jf - 1.0) * x * p1 - (jf - 1.0) * p0) / jf;
        p0 = p1;
        p1 = p2;
    }
    (p1, p0)
}

fn reference_rule() -> &'static (Vec<f64>, Vec<f64>) {
    static RULE: OnceLock<(Vec<f64>, Vec<f64>)> = OnceLock::new();
    RULE.get_or_init(|| gauss_legendre_nodes_weights(GAUSS_LEGENDRE_ORDER))
}

/// Integrate `f` over `[a, b]`.
pub fn integrate(a: f64, b: f64, mut f: impl FnMut(f64) -> f64) -> f64 {
    let (nodes, weights) = reference_rule();
    let half_len = 0.5 * (b - a);
    let mid = 0.5 * (a + b);
    let sum: f64 = nodes.iter().zip(weights.iter()).map(|(&t, &w)| w * f(mid + half_len * t)).sum();
    sum * half_len
}
