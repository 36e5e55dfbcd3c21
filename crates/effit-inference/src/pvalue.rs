//! Fast goodness-of-fit p-value from a Metropolis walk over toy datasets.
//!
//! Starting from the observed successes, each iteration proposes a unit step
//! up or down in every bin and accepts it with the binomial probability
//! ratio at the predicted efficiency. The walk therefore samples toy
//! datasets from the fitted model; the p-value is the fraction of
//! iterations whose toy is less likely than the observed data.

use crate::data::BinnedCounts;
use crate::model::ModelFunction;
use effit_core::PValueResult;
use effit_prob::{correct_pvalue, log_approx_binomial};
use rand::Rng;
use rand::rngs::StdRng;

/// Observer called after every iteration with the per-bin expectations
/// and the current toy successes.
pub type PValueCallback<'a> = &'a mut dyn FnMut(&[f64], &[u64]);

/// Run the walk for `iterations` steps with `model` set to `params`.
///
/// `iterations == 0` yields `NaN` for both values.
pub fn fast_pvalue(
    data: &BinnedCounts,
    model: &mut ModelFunction,
    params: &[f64],
    iterations: usize,
    rng: &mut StdRng,
    mut callback: Option<PValueCallback<'_>>,
) -> PValueResult {
    if iterations == 0 {
        log::warn!("fast p-value requested with zero iterations; returning NaN");
        return PValueResult { pvalue: f64::NAN, corrected_pvalue: f64::NAN };
    }

    model.set_parameters(params);
    let bins = data.bins();

    let mut expectation = Vec::with_capacity(bins.len());
    let mut toy = Vec::with_capacity(bins.len());
    let mut logp_start = 0.0;
    for bin in bins {
        let eff = model.bin_average(bin.xmin, bin.xmax);
        expectation.push(bin.n as f64 * eff);
        toy.push(bin.k);
        logp_start += log_approx_binomial(bin.n, bin.k, eff);
    }

    let mut logp = logp_start;
    let mut counter = 0usize;

    for _ in 0..iterations {
        for (i, bin) in bins.iter().enumerate() {
            let up = rng.random::<f64>() - 0.5 > 0.0;

            let n = bin.n;
            let p = if n > 0 { expectation[i] / n as f64 } else { 0.0 };
            if p <= 0.0 || p >= 1.0 || p.is_nan() {
                continue;
            }

            let k = toy[i];
            let (ratio, next) = if up {
                if k >= n {
                    continue;
                }
                ((n - k) as f64 / (k + 1) as f64 * p / (1.0 - p), k + 1)
            } else {
                if k == 0 {
                    continue;
                }
                (k as f64 / (n - k + 1) as f64 * (1.0 - p) / p, k - 1)
            };

            if rng.random::<f64>() < ratio {
                toy[i] = next;
                logp += ratio.ln();
            }
        }

        if let Some(cb) = callback.as_mut() {
            cb(&expectation, &toy);
        }

        if logp < logp_start {
            counter += 1;
        }
    }

    let pvalue = counter as f64 / iterations as f64;
    let corrected_pvalue = correct_pvalue(pvalue, params.len(), bins.len());
    log::debug!("fast p-value: {pvalue:.6} (corrected {corrected_pvalue:.6}) after {iterations} iterations");

    PValueResult { pvalue, corrected_pvalue }
}
