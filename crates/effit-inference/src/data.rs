//! Binned trial/success counts built from a pair of histograms.

use effit_core::{Error, Histogram, Result};

/// One bin: edges, trials `n` and successes `k` (`k <= n`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bin {
    /// Lower bin edge.
    pub xmin: f64,
    /// Upper bin edge.
    pub xmax: f64,
    /// Number of trials.
    pub n: u64,
    /// Number of successes.
    pub k: u64,
}

impl Bin {
    /// Bin centre.
    pub fn center(&self) -> f64 {
        0.5 * (self.xmin + self.xmax)
    }

    /// Bin width.
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }
}

/// Validated, read-only binned counts.
#[derive(Debug, Clone)]
pub struct BinnedCounts {
    bins: Vec<Bin>,
    x_title: String,
}

impl BinnedCounts {
    /// Combine a "total" (trials) and a "passed" (successes) histogram.
    ///
    /// Both must have the same number of bins and the same edges within
    /// `f64::EPSILON` (the upper edge of the last bin included), and every
    /// bin must satisfy `total >= passed`. Contents are truncated to integers.
    pub fn from_histograms(total: &Histogram, passed: &Histogram) -> Result<Self> {
        total.validate()?;
        passed.validate()?;

        if total.n_bins() != passed.n_bins() {
            return Err(Error::Validation(format!(
                "histograms do not have the same number of bins ({} vs {})",
                total.n_bins(),
                passed.n_bins()
            )));
        }

        let mut bins = Vec::with_capacity(total.n_bins());
        for i in 0..total.n_bins() {
            if (total.bin_low_edge(i) - passed.bin_low_edge(i)).abs() > f64::EPSILON {
                return Err(Error::Validation(format!(
                    "histograms '{}' and '{}' don't have the same bins (bin {i})",
                    total.name, passed.name
                )));
            }
            let n = count(total, i)?;
            let k = count(passed, i)?;
            if total.bin_content[i] < passed.bin_content[i] {
                return Err(Error::Validation(format!(
                    "histogram '{}' has fewer entries than '{}' in bin {i} ({} < {})",
                    total.name, passed.name, total.bin_content[i], passed.bin_content[i]
                )));
            }
            bins.push(Bin { xmin: total.bin_low_edge(i), xmax: total.bin_up_edge(i), n, k });
        }
        if (total.x_max() - passed.x_max()).abs() > f64::EPSILON {
            return Err(Error::Validation(format!(
                "histograms '{}' and '{}' don't have the same bins (upper edge)",
                total.name, passed.name
            )));
        }

        Ok(Self { bins, x_title: total.x_title.clone() })
    }

    /// Build directly from bins, checking `k <= n` and `xmin < xmax`.
    pub fn from_bins(bins: Vec<Bin>) -> Result<Self> {
        if bins.is_empty() {
            return Err(Error::Validation("no bins".to_string()));
        }
        for (i, b) in bins.iter().enumerate() {
            if b.k > b.n {
                return Err(Error::Validation(format!("bin {i}: k={} exceeds n={}", b.k, b.n)));
            }
            if !(b.xmin.is_finite() && b.xmax.is_finite() && b.xmin < b.xmax) {
                return Err(Error::Validation(format!("bin {i}: invalid edges [{}, {}]", b.xmin, b.xmax)));
            }
        }
        Ok(Self { bins, x_title: String::new() })
    }

    /// All bins in order.
    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }

    /// Number of bins.
    pub fn n_bins(&self) -> usize {
        self.bins.len()
    }

    /// Lower edge of the first bin.
    pub fn x_min(&self) -> f64 {
        self.bins[0].xmin
    }

    /// Upper edge of the last bin.
    pub fn x_max(&self) -> f64 {
        self.bins[self.bins.len() - 1].xmax
    }

    /// Axis title carried over from the total histogram.
    pub fn x_title(&self) -> &str {
        &self.x_title
    }
}

fn count(h: &Histogram, i: usize) -> Result<u64> {
    let c = h.bin_content[i];
    if !c.is_finite() || c < 0.0 {
        return Err(Error::Validation(format!(
            "histogram '{}': bin {i} content {c} is not a non-negative count",
            h.name
        )));
    }
    Ok(c as u64)
}
