use ndarray::{Array2, Array3, Axis};
use std::time::Instant;
use tracing::{debug, info};

use crate::config::LSTMConfig;
use crate::error::Result;
use crate::layers::dense::{Dense, OutputProjection};
use crate::loss::{L2Loss, Loss};
use crate::models::lstm::LSTM;

/// One training or validation batch: inputs (time_steps, batch_size, x_dim)
/// and targets (time_steps, batch_size, output_dim)
pub type SequenceBatch = (Array3<f64>, Array3<f64>);

/// Configuration for the epoch loop
#[derive(Clone, Debug)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub log_every: usize,
    /// Thread the final hidden/cell state of each batch into the next one
    pub carry_state: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            epochs: 100,
            log_every: 10,
            carry_state: false,
        }
    }
}

/// Training metrics tracked during training
#[derive(Debug, Clone)]
pub struct TrainingMetrics {
    pub epoch: usize,
    pub train_loss: f64,
    pub validation_loss: Option<f64>,
    pub time_elapsed: f64,
}

/// Runs `LSTM::fit` over a dataset for a number of epochs
pub struct LSTMTrainer<L: Loss = L2Loss, P: OutputProjection = Dense> {
    pub model: LSTM<L, P>,
    pub config: TrainingConfig,
    pub metrics_history: Vec<TrainingMetrics>,
}

impl<L: Loss, P: OutputProjection> LSTMTrainer<L, P> {
    pub fn new(model: LSTM<L, P>) -> Self {
        LSTMTrainer {
            model,
            config: TrainingConfig::default(),
            metrics_history: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: TrainingConfig) -> Self {
        self.config = config;
        self
    }

    /// One pass over `data`, returning the mean per-element loss
    pub fn train_epoch(&mut self, data: &[SequenceBatch]) -> Result<f64> {
        let mut carried: Option<(Array2<f64>, Array2<f64>)> = None;
        let mut total_loss = 0.0;
        let mut count = 0usize;

        for (x, y) in data {
            let batch_size = x.len_of(Axis(1));
            let state = match carried.take() {
                Some((a, c)) if a.ncols() == batch_size => Some((a, c)),
                Some(_) => {
                    debug!(batch_size, "batch size changed, dropping carried state");
                    None
                }
                None => None,
            };

            let output = self.model.fit_with_state(
                x,
                y,
                state.as_ref().map(|(a, _)| a),
                state.as_ref().map(|(_, c)| c),
            )?;

            total_loss += output.losses.sum();
            count += output.losses.len();

            if self.config.carry_state {
                carried = Some((output.a_last, output.c_last));
            }
        }

        Ok(if count > 0 { total_loss / count as f64 } else { 0.0 })
    }

    /// Train for multiple epochs with optional validation
    pub fn train(&mut self, train_data: &[SequenceBatch], validation_data: Option<&[SequenceBatch]>) -> Result<()> {
        info!(epochs = self.config.epochs, batches = train_data.len(), "starting training");

        for epoch in 0..self.config.epochs {
            let start_time = Instant::now();
            let train_loss = self.train_epoch(train_data)?;

            let validation_loss = match validation_data {
                Some(val_data) => Some(self.evaluate(val_data)?),
                None => None,
            };

            let time_elapsed = start_time.elapsed().as_secs_f64();
            self.metrics_history.push(TrainingMetrics {
                epoch,
                train_loss,
                validation_loss,
                time_elapsed,
            });

            if self.config.log_every > 0 && epoch % self.config.log_every == 0 {
                match validation_loss {
                    Some(val_loss) => info!(epoch, train_loss, val_loss, time_elapsed, "epoch complete"),
                    None => info!(epoch, train_loss, time_elapsed, "epoch complete"),
                }
            }
        }

        info!("training completed");
        Ok(())
    }

    /// Mean per-element loss over `data` without updating parameters
    pub fn evaluate(&self, data: &[SequenceBatch]) -> Result<f64> {
        let mut total_loss = 0.0;
        let mut count = 0usize;

        for (x, y) in data {
            let losses = self.model.evaluate(x, y, None, None)?;
            total_loss += losses.sum();
            count += losses.len();
        }

        Ok(if count > 0 { total_loss / count as f64 } else { 0.0 })
    }

    pub fn get_latest_metrics(&self) -> Option<&TrainingMetrics> {
        self.metrics_history.last()
    }

    pub fn get_metrics_history(&self) -> &[TrainingMetrics] {
        &self.metrics_history
    }
}

/// Create a trainer around a default model (L2 loss, dense projection)
pub fn create_basic_trainer(config: LSTMConfig) -> Result<LSTMTrainer> {
    Ok(LSTMTrainer::new(LSTM::new(config)?))
}
