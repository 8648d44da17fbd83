use ndarray::{Array1, Array3, ArrayView2, Axis};

/// Loss function used to score predictions and drive backpropagation
///
/// Predictions and targets are laid out batch-major: each row is one
/// sample and each column one output feature. Sequence-level tensors are
/// time-major, `(time_steps, batch_size, output_dim)`.
pub trait Loss {
    /// Loss for each batch row of a single time step
    fn loss(&self, prediction: ArrayView2<f64>, target: ArrayView2<f64>) -> Array1<f64>;

    /// Gradient of the loss with respect to every prediction element
    fn dloss(&self, predictions: &Array3<f64>, targets: &Array3<f64>) -> Array3<f64>;
}

/// Half squared error summed over output features: 0.5 Σ (p - t)²
#[derive(Clone, Copy, Debug, Default)]
pub struct L2Loss;

impl Loss for L2Loss {
    fn loss(&self, prediction: ArrayView2<f64>, target: ArrayView2<f64>) -> Array1<f64> {
        let diff = &prediction - &target;
        (&diff * &diff).sum_axis(Axis(1)) * 0.5
    }

    fn dloss(&self, predictions: &Array3<f64>, targets: &Array3<f64>) -> Array3<f64> {
        predictions - targets
    }
}

/// Mean Squared Error over output features
#[derive(Clone, Copy, Debug, Default)]
pub struct MSELoss;

impl Loss for MSELoss {
    fn loss(&self, prediction: ArrayView2<f64>, target: ArrayView2<f64>) -> Array1<f64> {
        let diff = &prediction - &target;
        let output_dim = prediction.ncols().max(1) as f64;
        (&diff * &diff).sum_axis(Axis(1)) / output_dim
    }

    fn dloss(&self, predictions: &Array3<f64>, targets: &Array3<f64>) -> Array3<f64> {
        let output_dim = predictions.len_of(Axis(2)).max(1) as f64;
        2.0 * (predictions - targets) / output_dim
    }
}

/// Mean Absolute Error over output features
#[derive(Clone, Copy, Debug, Default)]
pub struct MAELoss;

impl Loss for MAELoss {
    fn loss(&self, prediction: ArrayView2<f64>, target: ArrayView2<f64>) -> Array1<f64> {
        let diff = &prediction - &target;
        let output_dim = prediction.ncols().max(1) as f64;
        diff.mapv(f64::abs).sum_axis(Axis(1)) / output_dim
    }

    fn dloss(&self, predictions: &Array3<f64>, targets: &Array3<f64>) -> Array3<f64> {
        let output_dim = predictions.len_of(Axis(2)).max(1) as f64;
        (predictions - targets).mapv(|x| if x > 0.0 { 1.0 } else if x < 0.0 { -1.0 } else { 0.0 }) / output_dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, arr3};

    #[test]
    fn test_l2_loss() {
        let loss_fn = L2Loss;
        let predictions = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        let targets = arr2(&[[1.5, 2.5], [2.5, 3.5]]);

        let loss = loss_fn.loss(predictions.view(), targets.view());
        assert_eq!(loss.len(), 2);
        assert!((loss[0] - 0.25).abs() < 1e-12);
        assert!((loss[1] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_mse_loss() {
        let loss_fn = MSELoss;
        let predictions = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        let targets = arr2(&[[1.5, 2.5], [2.5, 3.5]]);

        let loss = loss_fn.loss(predictions.view(), targets.view());
        assert!(loss.iter().all(|&l| (l - 0.25).abs() < 1e-12));
    }

    #[test]
    fn test_mae_loss() {
        let loss_fn = MAELoss;
        let predictions = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        let targets = arr2(&[[1.5, 2.5], [2.5, 3.5]]);

        let loss = loss_fn.loss(predictions.view(), targets.view());
        assert!(loss.iter().all(|&l| (l - 0.5).abs() < 1e-12));

        let preds = arr3(&[[[1.0, 2.0]], [[3.0, 3.5]]]);
        let targs = arr3(&[[[1.5, 2.0]], [[2.5, 3.5]]]);
        let grad = loss_fn.dloss(&preds, &targs);
        assert_eq!(grad, arr3(&[[[-0.5, 0.0]], [[0.5, 0.0]]]));
    }

    #[test]
    fn test_dloss_matches_finite_difference() {
        let eps = 1e-6;
        let preds = arr3(&[[[0.3, -1.2], [0.7, 0.1]]]);
        let targs = arr3(&[[[0.0, 0.5], [1.0, -0.4]]]);

        let losses: [&dyn Loss; 2] = [&L2Loss, &MSELoss];
        for loss_fn in losses {
            let grad = loss_fn.dloss(&preds, &targs);
            for b in 0..2 {
                for o in 0..2 {
                    let mut plus = preds.clone();
                    plus[[0, b, o]] += eps;
                    let mut minus = preds.clone();
                    minus[[0, b, o]] -= eps;

                    let lp = loss_fn.loss(plus.index_axis(Axis(0), 0), targs.index_axis(Axis(0), 0))[b];
                    let lm = loss_fn.loss(minus.index_axis(Axis(0), 0), targs.index_axis(Axis(0), 0))[b];
                    let numeric = (lp - lm) / (2.0 * eps);

                    assert!((grad[[0, b, o]] - numeric).abs() < 1e-6);
                }
            }
        }
    }
}
