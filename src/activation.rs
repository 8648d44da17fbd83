use ndarray::Array2;

/// Logistic function, used by the update, output and forget gates
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Squashes candidate memory and the outgoing cell state
pub fn tanh(x: f64) -> f64 {
    x.tanh()
}

/// Values saved by an activation for its derivative
#[derive(Clone, Debug)]
pub struct ActivationCache {
    pub pre_activation: Array2<f64>,
    pub output: Array2<f64>,
}

/// Elementwise nonlinearities used by the LSTM gates
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activation {
    Sigmoid,
    Tanh,
}

impl Activation {
    /// Applies the activation elementwise, returning the output and its cache
    pub fn activate(self, pre_activation: &Array2<f64>) -> (Array2<f64>, ActivationCache) {
        let output = match self {
            Activation::Sigmoid => pre_activation.mapv(sigmoid),
            Activation::Tanh => pre_activation.mapv(tanh),
        };
        let cache = ActivationCache {
            pre_activation: pre_activation.clone(),
            output: output.clone(),
        };
        (output, cache)
    }

    /// Elementwise derivative with respect to the pre-activation input
    ///
    /// - σ'(x) = σ(x)(1 - σ(x))
    /// - tanh'(x) = 1 - tanh²(x)
    pub fn derivative(self, cache: &ActivationCache) -> Array2<f64> {
        match self {
            Activation::Sigmoid => cache.output.mapv(|s| s * (1.0 - s)),
            Activation::Tanh => cache.output.mapv(|t| 1.0 - t * t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_activation_fixed_points_and_symmetry() {
        let z = arr2(&[[0.0, 2.5], [-2.5, 700.0]]);

        let (sig, _) = Activation::Sigmoid.activate(&z);
        assert_eq!(sig[[0, 0]], 0.5);
        assert!((sig[[0, 1]] + sig[[1, 0]] - 1.0).abs() < 1e-12);
        assert_eq!(sig[[1, 1]], 1.0);

        let (th, _) = Activation::Tanh.activate(&z);
        assert_eq!(th[[0, 0]], 0.0);
        assert_eq!(th[[0, 1]], -th[[1, 0]]);
        assert_eq!(th[[1, 1]], 1.0);
    }

    #[test]
    fn test_sigmoid_does_not_overflow() {
        assert_eq!(sigmoid(-800.0), 0.0);
        assert!(sigmoid(-30.0) > 0.0);
    }

    #[test]
    fn test_activate_keeps_pre_activation() {
        let z = arr2(&[[0.0, 1.0], [-2.0, 0.5]]);
        let (out, cache) = Activation::Sigmoid.activate(&z);

        assert_eq!(cache.pre_activation, z);
        assert_eq!(cache.output, out);
        assert!((out[[0, 0]] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_derivative_matches_finite_difference() {
        let eps = 1e-6;
        for activation in [Activation::Sigmoid, Activation::Tanh] {
            let z = arr2(&[[-1.5, 0.3], [0.0, 2.0]]);
            let (_, cache) = activation.activate(&z);
            let analytic = activation.derivative(&cache);

            let (plus, _) = activation.activate(&z.mapv(|v| v + eps));
            let (minus, _) = activation.activate(&z.mapv(|v| v - eps));
            let numeric = (plus - minus) / (2.0 * eps);

            assert!((analytic - numeric).mapv(f64::abs).sum() < 1e-8);
        }
    }
}
