//! 1-D count histogram used as fitter input.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A 1D histogram of event counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// Histogram name.
    pub name: String,
    /// Axis title of the binned variable.
    #[serde(default)]
    pub x_title: String,
    /// Bin edges (length = n_bins + 1, strictly increasing).
    pub bin_edges: Vec<f64>,
    /// Bin contents (length = n_bins, excluding under/overflow).
    pub bin_content: Vec<f64>,
}

impl Histogram {
    /// Create a histogram from explicit edges and contents.
    pub fn from_edges(name: impl Into<String>, bin_edges: Vec<f64>, bin_content: Vec<f64>) -> Result<Self> {
        let h = Self { name: name.into(), x_title: String::new(), bin_edges, bin_content };
        h.validate()?;
        Ok(h)
    }

    /// Create a histogram with `bin_content.len()` equal-width bins on `[x_min, x_max]`.
    pub fn uniform(name: impl Into<String>, x_min: f64, x_max: f64, bin_content: Vec<f64>) -> Result<Self> {
        let n_bins = bin_content.len();
        if n_bins == 0 {
            return Err(Error::Validation("histogram needs at least one bin".to_string()));
        }
        if !(x_min.is_finite() && x_max.is_finite() && x_max > x_min) {
            return Err(Error::Validation(format!("invalid histogram range [{x_min}, {x_max}]")));
        }
        let width = (x_max - x_min) / n_bins as f64;
        let mut bin_edges: Vec<f64> = (0..n_bins).map(|i| x_min + i as f64 * width).collect();
        bin_edges.push(x_max);
        Self::from_edges(name, bin_edges, bin_content)
    }

    /// Parse a histogram from JSON and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let h: Self = serde_json::from_str(json)?;
        h.validate()?;
        Ok(h)
    }

    /// Read a histogram from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Attach an axis title.
    pub fn with_x_title(mut self, title: impl Into<String>) -> Self {
        self.x_title = title.into();
        self
    }

    /// Check edge/content shapes and edge ordering.
    pub fn validate(&self) -> Result<()> {
        if self.bin_content.is_empty() {
            return Err(Error::Validation(format!("histogram '{}' has no bins", self.name)));
        }
        if self.bin_edges.len() != self.bin_content.len() + 1 {
            return Err(Error::Validation(format!(
                "histogram '{}': expected {} bin edges, got {}",
                self.name,
                self.bin_content.len() + 1,
                self.bin_edges.len()
            )));
        }
        if self.bin_edges.iter().any(|e| !e.is_finite()) {
            return Err(Error::Validation(format!("histogram '{}' has non-finite bin edges", self.name)));
        }
        if self.bin_edges.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::Validation(format!(
                "histogram '{}': bin edges must be strictly increasing",
                self.name
            )));
        }
        Ok(())
    }

    /// Number of bins (excluding under/overflow).
    pub fn n_bins(&self) -> usize {
        self.bin_content.len()
    }

    /// Lower edge of the first bin.
    pub fn x_min(&self) -> f64 {
        self.bin_edges[0]
    }

    /// Upper edge of the last bin.
    pub fn x_max(&self) -> f64 {
        self.bin_edges[self.bin_edges.len() - 1]
    }

    /// Lower edge of bin `i` (0-based).
    pub fn bin_low_edge(&self, i: usize) -> f64 {
        self.bin_edges[i]
    }

    /// Upper edge of bin `i` (0-based).
    pub fn bin_up_edge(&self, i: usize) -> f64 {
        self.bin_edges[i + 1]
    }

    /// Centre of bin `i` (0-based).
    pub fn bin_center(&self, i: usize) -> f64 {
        0.5 * (self.bin_edges[i] + self.bin_edges[i + 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_edges() {
        let h = Histogram::uniform("h", 0.0, 10.0, vec![1.0; 5]).unwrap();
        assert_eq!(h.n_bins(), 5);
        assert_eq!(h.bin_edges, vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(h.bin_center(2), 5.0);
        assert_eq!(h.x_max(), 10.0);
    }

    #[test]
    fn test_rejects_bad_shapes() {
        assert!(Histogram::from_edges("h", vec![0.0, 1.0], vec![1.0, 2.0]).is_err());
        assert!(Histogram::from_edges("h", vec![0.0, 1.0, 1.0], vec![1.0, 2.0]).is_err());
        assert!(Histogram::uniform("h", 1.0, 0.0, vec![1.0]).is_err());
        assert!(Histogram::uniform("h", 0.0, 1.0, vec![]).is_err());
    }

    #[test]
    fn test_from_json() {
        let json = r#"{"name":"total","bin_edges":[0.0,1.0,2.0],"bin_content":[10.0,20.0]}"#;
        let h = Histogram::from_json_str(json).unwrap();
        assert_eq!(h.name, "total");
        assert_eq!(h.n_bins(), 2);
        assert!(h.x_title.is_empty());

        let bad = r#"{"name":"total","bin_edges":[0.0,2.0,1.0],"bin_content":[10.0,20.0]}"#;
        assert!(Histogram::from_json_str(bad).is_err());
    }
}
