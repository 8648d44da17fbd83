//! # LSTM BPTT
//!
//! A Long Short-Term Memory sequence model built directly on `ndarray`
//! matrix primitives and trained with truncated backpropagation through time.
//!
//! ## Core Components
//!
//! - **LSTM Cell**: four gates (candidate, update, output, forget) over the
//!   concatenated `[a_prev; xᵀ]` input, with exact forward and backward steps
//! - **Sequence Model**: unrolls the cell over time, projects each hidden
//!   activation through an output layer, accumulates gradients in reverse
//!   time order and applies one (optionally clipped) SGD update per sequence
//! - **Collaborators**: activations, losses, a dense output projection and
//!   weight initializers behind small traits
//! - **Training**: an epoch loop with optional hidden-state carry-over
//!
//! ## Quick Start
//!
//! ```rust
//! use lstm_bptt::{LSTM, LSTMConfig};
//! use ndarray::Array3;
//!
//! // 4 hidden units over 3 input features, one output per step
//! let config = LSTMConfig::new(4, 3).with_learning_rate(1e-2).with_seed(7);
//! let mut model = LSTM::new(config).unwrap();
//!
//! // (time_steps, batch_size, features)
//! let x = Array3::<f64>::zeros((5, 2, 3));
//! let y = Array3::<f64>::zeros((5, 2, 1));
//!
//! let losses = model.fit(&x, &y, None, None).unwrap();
//! assert_eq!(losses.shape(), &[5, 2]);
//! ```

pub mod activation;
pub mod config;
pub mod error;
pub mod init;
pub mod layers;
pub mod loss;
pub mod models;
pub mod training;

// Re-export commonly used items
pub use config::LSTMConfig;
pub use error::{LSTMError, Result};
pub use init::{InitScheme, Initializer, WeightInit};
pub use layers::dense::{Dense, OutputProjection};
pub use layers::lstm_cell::{CellGradients, CellState, Gate, Gates, LSTMCell};
pub use loss::{L2Loss, Loss, MAELoss, MSELoss};
pub use models::lstm::{FitOutput, ForwardPass, Prediction, LSTM};
pub use training::{LSTMTrainer, TrainingConfig, TrainingMetrics};
