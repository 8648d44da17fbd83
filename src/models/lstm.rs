use ndarray::{stack, Array1, Array2, Array3, ArrayView2, Axis};
use tracing::{debug, warn};

use crate::config::LSTMConfig;
use crate::error::{ensure_shape, LSTMError, Result};
use crate::init::Initializer;
use crate::layers::dense::{Dense, OutputProjection};
use crate::layers::lstm_cell::{CellCache, CellState, LSTMCell};
use crate::loss::{L2Loss, Loss};

/// Everything a sequence forward pass produced, in time order
#[derive(Clone, Debug)]
pub struct ForwardPass {
    pub states: Vec<CellState>,
    pub caches: Vec<CellCache>,
    /// (time_steps, batch_size, output_dim)
    pub predictions: Array3<f64>,
    /// Targets passed through unchanged
    pub targets: Array3<f64>,
}

impl ForwardPass {
    pub fn time_steps(&self) -> usize {
        self.states.len()
    }

    /// Hidden activation and cell memory after the last time step
    pub fn final_state(&self) -> Option<(&Array2<f64>, &Array2<f64>)> {
        self.states.last().map(|s| (&s.a_out, &s.c_out))
    }
}

/// Losses from one training step plus the state to carry into the next batch
#[derive(Clone, Debug)]
pub struct FitOutput {
    /// (time_steps, batch_size)
    pub losses: Array2<f64>,
    pub a_last: Array2<f64>,
    pub c_last: Array2<f64>,
}

/// Predictions from an inference run plus the final recurrent state
#[derive(Clone, Debug)]
pub struct Prediction {
    pub predictions: Array3<f64>,
    pub a_last: Array2<f64>,
    pub c_last: Array2<f64>,
}

/// LSTM sequence model trained with truncated BPTT
///
/// Unrolls one `LSTMCell` over the time axis of a (time_steps, batch_size,
/// x_dim) input, projects every hidden activation to a prediction, then
/// backpropagates through the whole sequence before updating parameters once.
#[derive(Clone, Debug)]
pub struct LSTM<L: Loss = L2Loss, P: OutputProjection = Dense> {
    pub cell: LSTMCell,
    pub projection: P,
    pub loss: L,
    pub grad_clip: Option<f64>,
    pub output_dim: usize,
}

impl LSTM<L2Loss, Dense> {
    /// Creates a model with the default L2 loss and dense projection
    pub fn new(config: LSTMConfig) -> Result<Self> {
        Self::with_loss(config, L2Loss)
    }
}

impl<L: Loss, P: OutputProjection> LSTM<L, P> {
    pub fn with_loss(config: LSTMConfig, loss: L) -> Result<Self> {
        let mut init = config.initializer()?;
        Self::with_initializer(config, loss, &mut init)
    }

    /// Creates a model drawing every weight matrix from `init`
    pub fn with_initializer<I: Initializer + ?Sized>(config: LSTMConfig, loss: L, init: &mut I) -> Result<Self> {
        config.validate()?;
        if config.peephole {
            warn!("peephole connections are not implemented; the flag has no effect");
        }

        let cell = LSTMCell::new(config.hidden_dim, config.x_dim, config.learning_rate, init)
            .with_store_grads(config.store_grads)
            .with_peephole(config.peephole);
        let projection = P::build(config.hidden_dim, config.output_dim, config.learning_rate, init);

        Ok(LSTM {
            cell,
            projection,
            loss,
            grad_clip: config.grad_clip,
            output_dim: config.output_dim,
        })
    }

    fn check_sequence(&self, x: &Array3<f64>) -> Result<(usize, usize)> {
        let (time_steps, batch_size, _) = x.dim();
        if time_steps == 0 {
            return Err(LSTMError::EmptySequence);
        }
        ensure_shape("x", &[time_steps, batch_size, self.cell.x_dim], x.shape())?;
        Ok((time_steps, batch_size))
    }

    /// Forward pass over a whole sequence
    ///
    /// `x` is (time_steps, batch_size, x_dim) and `y` is (time_steps,
    /// batch_size, output_dim). `a_prev`/`c_prev` seed the recurrence; when
    /// absent the cell starts from zeros.
    pub fn forward(
        &mut self,
        x: &Array3<f64>,
        y: &Array3<f64>,
        a_prev: Option<&Array2<f64>>,
        c_prev: Option<&Array2<f64>>,
    ) -> Result<ForwardPass> {
        let (time_steps, batch_size) = self.check_sequence(x)?;
        ensure_shape("y", &[time_steps, batch_size, self.output_dim], y.shape())?;

        self.projection.reset();

        let mut states: Vec<CellState> = Vec::with_capacity(time_steps);
        let mut caches = Vec::with_capacity(time_steps);
        let mut preds = Vec::with_capacity(time_steps);

        for xt in x.outer_iter() {
            let xt = xt.to_owned();
            let (state, cache) = match states.last() {
                Some(prev) => self.cell.forward_step(&xt, &prev.a_out, &prev.c_out)?,
                None => self.cell.forward(&xt, a_prev, c_prev)?,
            };
            let pred = self.projection.forward(&state.a_out)?;
            preds.push(pred.reversed_axes());
            states.push(state);
            caches.push(cache);
        }

        let views: Vec<ArrayView2<f64>> = preds.iter().map(|p| p.view()).collect();
        let predictions = stack(Axis(0), &views)?;

        Ok(ForwardPass {
            states,
            caches,
            predictions,
            targets: y.to_owned(),
        })
    }

    /// Backpropagation through time followed by a single parameter update
    ///
    /// Returns the predictions and targets unchanged.
    pub fn backward(&mut self, pass: ForwardPass) -> Result<(Array3<f64>, Array3<f64>)> {
        let ForwardPass { states, predictions, targets, .. } = pass;
        let first = states.first().ok_or(LSTMError::EmptySequence)?;

        let d_loss = self.loss.dloss(&predictions, &targets);
        ensure_shape("loss gradient", predictions.shape(), d_loss.shape())?;

        // Direct loss contribution to each step's hidden activation, in forward order
        let mut das = Vec::with_capacity(states.len());
        for dl in d_loss.outer_iter() {
            let da = self.projection.backward(&dl.t().to_owned())?;
            ensure_shape("projection gradient", first.a_out.shape(), da.shape())?;
            das.push(da);
        }

        let mut da_next = Array2::zeros(first.a_out.raw_dim());
        let mut dc_next = Array2::zeros(first.c_out.raw_dim());
        let mut grads = self.cell.init_grads();

        for (state, da) in states.iter().rev().zip(das.iter().rev()) {
            // Accumulate, never overwrite: da_next already carries the gradient from step t+1
            da_next += da;
            let (da_in, dc_in, step_grads) = self.cell.backward(state, &da_next, &dc_next)?;
            grads.accumulate(&step_grads);
            da_next = da_in;
            dc_next = dc_in;
        }

        self.cell.update_params(grads, self.grad_clip);
        self.projection.update_params();

        Ok((predictions, targets))
    }

    /// One training step: forward, backward and update over a sequence batch
    ///
    /// Returns the per-time-step, per-batch-row loss, shape (time_steps, batch_size).
    pub fn fit(
        &mut self,
        x: &Array3<f64>,
        targets: &Array3<f64>,
        a_prev: Option<&Array2<f64>>,
        c_prev: Option<&Array2<f64>>,
    ) -> Result<Array2<f64>> {
        Ok(self.fit_with_state(x, targets, a_prev, c_prev)?.losses)
    }

    /// Like `fit`, also returning the final hidden/cell state for carry-over
    pub fn fit_with_state(
        &mut self,
        x: &Array3<f64>,
        targets: &Array3<f64>,
        a_prev: Option<&Array2<f64>>,
        c_prev: Option<&Array2<f64>>,
    ) -> Result<FitOutput> {
        let pass = self.forward(x, targets, a_prev, c_prev)?;
        let (a_last, c_last) = match pass.final_state() {
            Some((a, c)) => (a.clone(), c.clone()),
            None => return Err(LSTMError::EmptySequence),
        };

        let (preds, targets) = self.backward(pass)?;
        let losses = self.stack_losses(&preds, &targets)?;

        let mean_loss = losses.mean().unwrap_or(0.0);
        if !mean_loss.is_finite() {
            warn!(mean_loss, "non-finite training loss");
        }
        debug!(
            time_steps = losses.nrows(),
            batch_size = losses.ncols(),
            mean_loss,
            "fit step complete"
        );

        Ok(FitOutput { losses, a_last, c_last })
    }

    /// Runs the recurrence without touching any parameter or cached state
    pub fn predict(
        &self,
        x: &Array3<f64>,
        a_prev: Option<&Array2<f64>>,
        c_prev: Option<&Array2<f64>>,
    ) -> Result<Prediction> {
        let (time_steps, batch_size) = self.check_sequence(x)?;

        let mut a = match a_prev {
            Some(a) => a.clone(),
            None => self.cell.zero_state(batch_size),
        };
        let mut c = match c_prev {
            Some(c) => c.clone(),
            None => self.cell.zero_state(batch_size),
        };

        let mut preds = Vec::with_capacity(time_steps);
        for xt in x.outer_iter() {
            let (state, _) = self.cell.forward_step(&xt.to_owned(), &a, &c)?;
            preds.push(self.projection.infer(&state.a_out)?.reversed_axes());
            a = state.a_out;
            c = state.c_out;
        }

        let views: Vec<ArrayView2<f64>> = preds.iter().map(|p| p.view()).collect();
        Ok(Prediction {
            predictions: stack(Axis(0), &views)?,
            a_last: a,
            c_last: c,
        })
    }

    /// Per-time-step, per-batch-row loss of the current parameters, without updating
    pub fn evaluate(
        &self,
        x: &Array3<f64>,
        targets: &Array3<f64>,
        a_prev: Option<&Array2<f64>>,
        c_prev: Option<&Array2<f64>>,
    ) -> Result<Array2<f64>> {
        let prediction = self.predict(x, a_prev, c_prev)?;
        ensure_shape("targets", prediction.predictions.shape(), targets.shape())?;
        self.stack_losses(&prediction.predictions, targets)
    }

    fn stack_losses(&self, preds: &Array3<f64>, targets: &Array3<f64>) -> Result<Array2<f64>> {
        let losses: Vec<Array1<f64>> = preds
            .outer_iter()
            .zip(targets.outer_iter())
            .map(|(p, t)| self.loss.loss(p, t))
            .collect();
        let views: Vec<_> = losses.iter().map(|l| l.view()).collect();
        Ok(stack(Axis(0), &views)?)
    }

    pub fn hidden_dim(&self) -> usize {
        self.cell.hidden_dim
    }

    pub fn x_dim(&self) -> usize {
        self.cell.x_dim
    }

    /// Step size of the cell update
    pub fn learning_rate(&self) -> f64 {
        self.cell.learning_rate
    }
}
