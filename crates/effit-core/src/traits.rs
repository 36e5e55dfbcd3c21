//! Core traits for effit
//!
//! The sampler and optimizer in `effit-inference` are written against
//! [`ChainLogDensity`], not against the efficiency fitter itself.

/// Log-density addressable per sampling chain.
///
/// Implementations must be callable concurrently for distinct `chain`
/// indices. A non-finite return marks the point as infeasible.
pub trait ChainLogDensity: Send + Sync {
    /// Number of parameters
    fn dim(&self) -> usize;

    /// Parameter names
    fn parameter_names(&self) -> Vec<String>;

    /// Parameter bounds (min, max)
    fn parameter_bounds(&self) -> Vec<(f64, f64)>;

    /// Starting point for chain 0.
    fn initial_values(&self) -> Vec<f64>;

    /// Log-density at `params`, evaluated with the working state of `chain`.
    fn log_density(&self, chain: usize, params: &[f64]) -> f64;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Quadratic;

    impl ChainLogDensity for Quadratic {
        fn dim(&self) -> usize {
            1
        }

        fn parameter_names(&self) -> Vec<String> {
            vec!["x".to_string()]
        }

        fn parameter_bounds(&self) -> Vec<(f64, f64)> {
            vec![(-1.0, 1.0)]
        }

        fn initial_values(&self) -> Vec<f64> {
            vec![0.0]
        }

        fn log_density(&self, _chain: usize, params: &[f64]) -> f64 {
            -0.5 * params[0] * params[0]
        }
    }

    #[test]
    fn test_trait_object_usable() {
        let target: &dyn ChainLogDensity = &Quadratic;
        assert_eq!(target.dim(), 1);
        assert_eq!(target.log_density(3, &[0.0]), 0.0);
    }
}
