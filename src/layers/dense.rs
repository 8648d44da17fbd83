use std::collections::VecDeque;

use ndarray::{Array2, Axis};

use crate::error::{ensure_shape, LSTMError, Result};
use crate::init::Initializer;

/// Maps hidden activations to predictions and trains itself
///
/// Everything is feature-major: `hidden` is (input_dim, batch_size) and
/// predictions are (output_dim, batch_size). Backward calls arrive in the
/// same time order as the forward calls of the current sequence; gradients
/// are accumulated internally and applied by `update_params`.
pub trait OutputProjection {
    fn build<I: Initializer + ?Sized>(input_dim: usize, output_dim: usize, learning_rate: f64, init: &mut I) -> Self
    where
        Self: Sized;

    /// Training forward pass; remembers its input for the matching backward call
    fn forward(&mut self, hidden: &Array2<f64>) -> Result<Array2<f64>>;

    /// Inference forward pass; leaves the layer untouched
    fn infer(&self, hidden: &Array2<f64>) -> Result<Array2<f64>>;

    /// Gradient w.r.t. the hidden input of the oldest unconsumed forward call
    fn backward(&mut self, grad_output: &Array2<f64>) -> Result<Array2<f64>>;

    /// Applies and clears the accumulated gradient
    fn update_params(&mut self);

    /// Drops remembered inputs and accumulated gradients
    fn reset(&mut self);
}

/// Holds gradients for dense layer parameters during backpropagation
#[derive(Clone, Debug)]
pub struct DenseGradients {
    pub weight: Array2<f64>,
    pub bias: Array2<f64>,
}

/// A fully connected (linear) output layer
///
/// Performs the transformation: output = weight · input + bias
/// where weight has shape (output_dim, input_dim) and bias has shape (output_dim, 1)
#[derive(Clone, Debug)]
pub struct Dense {
    pub weight: Array2<f64>,
    pub bias: Array2<f64>,
    pub input_dim: usize,
    pub output_dim: usize,
    pub learning_rate: f64,
    inputs: VecDeque<Array2<f64>>,
    grads: DenseGradients,
}

impl Dense {
    /// Create a dense layer from existing weights
    pub fn from_weights(weight: Array2<f64>, bias: Array2<f64>, learning_rate: f64) -> Result<Self> {
        let (output_dim, input_dim) = weight.dim();
        ensure_shape("dense bias", &[output_dim, 1], bias.shape())?;

        Ok(Dense {
            grads: DenseGradients {
                weight: Array2::zeros(weight.raw_dim()),
                bias: Array2::zeros(bias.raw_dim()),
            },
            weight,
            bias,
            input_dim,
            output_dim,
            learning_rate,
            inputs: VecDeque::new(),
        })
    }

    /// Gradient accumulated since the last update
    pub fn gradients(&self) -> &DenseGradients {
        &self.grads
    }

    /// Number of forward inputs still waiting for a backward call
    pub fn pending(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_parameters(&self) -> usize {
        self.weight.len() + self.bias.len()
    }

    fn check_hidden(&self, hidden: &Array2<f64>) -> Result<()> {
        ensure_shape("dense input", &[self.input_dim, hidden.ncols()], hidden.shape())
    }
}

impl OutputProjection for Dense {
    fn build<I: Initializer + ?Sized>(input_dim: usize, output_dim: usize, learning_rate: f64, init: &mut I) -> Self {
        let weight = init.init(output_dim, input_dim);
        Dense {
            grads: DenseGradients {
                weight: Array2::zeros((output_dim, input_dim)),
                bias: Array2::zeros((output_dim, 1)),
            },
            weight,
            bias: Array2::zeros((output_dim, 1)),
            input_dim,
            output_dim,
            learning_rate,
            inputs: VecDeque::new(),
        }
    }

    fn forward(&mut self, hidden: &Array2<f64>) -> Result<Array2<f64>> {
        let output = self.infer(hidden)?;
        self.inputs.push_back(hidden.clone());
        Ok(output)
    }

    fn infer(&self, hidden: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_hidden(hidden)?;
        Ok(&self.weight.dot(hidden) + &self.bias)
    }

    fn backward(&mut self, grad_output: &Array2<f64>) -> Result<Array2<f64>> {
        let input = self.inputs.pop_front().ok_or(LSTMError::MissingCache)?;
        ensure_shape("dense gradient", &[self.output_dim, input.ncols()], grad_output.shape())?;

        self.grads.weight += &grad_output.dot(&input.t());
        self.grads.bias += &grad_output.sum_axis(Axis(1)).insert_axis(Axis(1));

        Ok(self.weight.t().dot(grad_output))
    }

    fn update_params(&mut self) {
        self.weight.scaled_add(-self.learning_rate, &self.grads.weight);
        self.bias.scaled_add(-self.learning_rate, &self.grads.bias);
        self.grads.weight.fill(0.0);
        self.grads.bias.fill(0.0);
    }

    fn reset(&mut self) {
        self.inputs.clear();
        self.grads.weight.fill(0.0);
        self.grads.bias.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::WeightInit;
    use ndarray::arr2;

    #[test]
    fn test_dense_creation() {
        let mut init = WeightInit::xavier(Some(1));
        let layer = Dense::build(10, 5, 0.1, &mut init);
        assert_eq!(layer.weight.shape(), &[5, 10]);
        assert_eq!(layer.bias.shape(), &[5, 1]);
        assert_eq!(layer.num_parameters(), 10 * 5 + 5);
    }

    #[test]
    fn test_dense_forward() {
        let mut layer = Dense::from_weights(arr2(&[[1.0, 0.0, -1.0], [0.5, 0.5, 0.5]]), arr2(&[[0.1], [0.0]]), 0.1).unwrap();
        let input = arr2(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);

        let output = layer.forward(&input).unwrap();
        let expected = arr2(&[[-3.9, -3.9], [4.5, 6.0]]);
        assert!((output - expected).mapv(f64::abs).sum() < 1e-12);
        assert_eq!(layer.pending(), 1);
    }

    #[test]
    fn test_dense_backward_consumes_inputs_in_order() {
        let mut layer = Dense::from_weights(arr2(&[[2.0, -1.0]]), arr2(&[[0.0]]), 0.1).unwrap();
        let first = arr2(&[[1.0], [0.0]]);
        let second = arr2(&[[0.0], [1.0]]);
        layer.forward(&first).unwrap();
        layer.forward(&second).unwrap();

        let dh = layer.backward(&arr2(&[[1.0]])).unwrap();
        assert_eq!(dh, arr2(&[[2.0], [-1.0]]));
        assert_eq!(layer.gradients().weight, arr2(&[[1.0, 0.0]]));

        layer.backward(&arr2(&[[3.0]])).unwrap();
        assert_eq!(layer.gradients().weight, arr2(&[[1.0, 3.0]]));
        assert_eq!(layer.gradients().bias, arr2(&[[4.0]]));

        assert!(matches!(layer.backward(&arr2(&[[1.0]])), Err(LSTMError::MissingCache)));
    }

    #[test]
    fn test_dense_update_applies_and_clears() {
        let mut layer = Dense::from_weights(arr2(&[[1.0, 1.0]]), arr2(&[[0.0]]), 0.5).unwrap();
        layer.forward(&arr2(&[[1.0], [2.0]])).unwrap();
        layer.backward(&arr2(&[[1.0]])).unwrap();

        layer.update_params();

        assert_eq!(layer.weight, arr2(&[[0.5, 0.0]]));
        assert_eq!(layer.bias, arr2(&[[-0.5]]));
        assert!(layer.gradients().weight.iter().all(|&g| g == 0.0));
    }

    #[test]
    fn test_dense_rejects_wrong_input() {
        let mut init = WeightInit::xavier(Some(1));
        let mut layer = Dense::build(3, 1, 0.1, &mut init);
        assert!(layer.forward(&Array2::zeros((2, 4))).is_err());
        assert_eq!(layer.pending(), 0);
    }
}
