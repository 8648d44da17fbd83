use ndarray::{concatenate, s, Array2, Axis};
use tracing::{debug, trace};

use crate::activation::{tanh, Activation, ActivationCache};
use crate::error::{ensure_shape, Result};
use crate::init::Initializer;

/// The four learned gates of an LSTM cell
///
/// Gate outputs lie in (-1, 1) for tanh and (0, 1) for sigmoid. Saturated
/// pre-activations (|z| beyond roughly 37 for sigmoid, 19 for tanh) round to
/// the closed bound in f64.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Gate {
    /// Candidate memory, tanh-activated
    Candidate,
    /// Update (input) gate, sigmoid-activated
    Update,
    /// Output gate, sigmoid-activated
    Output,
    /// Forget gate, sigmoid-activated
    Forget,
}

impl Gate {
    pub const ALL: [Gate; 4] = [Gate::Candidate, Gate::Update, Gate::Output, Gate::Forget];

    pub fn activation(self) -> Activation {
        match self {
            Gate::Candidate => Activation::Tanh,
            Gate::Update | Gate::Output | Gate::Forget => Activation::Sigmoid,
        }
    }
}

/// One value per gate, always all four present
#[derive(Clone, Debug, PartialEq)]
pub struct Gates<T> {
    pub candidate: T,
    pub update: T,
    pub output: T,
    pub forget: T,
}

impl<T> Gates<T> {
    pub fn from_fn<F: FnMut(Gate) -> T>(mut f: F) -> Self {
        Gates {
            candidate: f(Gate::Candidate),
            update: f(Gate::Update),
            output: f(Gate::Output),
            forget: f(Gate::Forget),
        }
    }

    pub fn get(&self, gate: Gate) -> &T {
        match gate {
            Gate::Candidate => &self.candidate,
            Gate::Update => &self.update,
            Gate::Output => &self.output,
            Gate::Forget => &self.forget,
        }
    }

    pub fn get_mut(&mut self, gate: Gate) -> &mut T {
        match gate {
            Gate::Candidate => &mut self.candidate,
            Gate::Update => &mut self.update,
            Gate::Output => &mut self.output,
            Gate::Forget => &mut self.forget,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Gate, &T)> + '_ {
        Gate::ALL.into_iter().map(move |gate| (gate, self.get(gate)))
    }

    pub fn map<U, F: FnMut(Gate, &T) -> U>(&self, mut f: F) -> Gates<U> {
        Gates::from_fn(|gate| f(gate, self.get(gate)))
    }
}

impl<A, B> Gates<(A, B)> {
    pub fn unzip(self) -> (Gates<A>, Gates<B>) {
        let Gates { candidate, update, output, forget } = self;
        (
            Gates { candidate: candidate.0, update: update.0, output: output.0, forget: forget.0 },
            Gates { candidate: candidate.1, update: update.1, output: output.1, forget: forget.1 },
        )
    }
}

/// Trainable parameters of a single gate
#[derive(Clone, Debug, PartialEq)]
pub struct GateParams {
    pub weight: Array2<f64>, // (hidden_dim, hidden_dim + x_dim)
    pub bias: Array2<f64>,   // (hidden_dim, 1)
}

/// Gradients for a single gate's parameters
#[derive(Clone, Debug, PartialEq)]
pub struct GateGradients {
    pub weight: Array2<f64>,
    pub bias: Array2<f64>,
}

/// Gradients for every gate of the cell
pub type CellGradients = Gates<GateGradients>;

/// Per-gate activation caches produced by one forward step
pub type CellCache = Gates<ActivationCache>;

impl Gates<GateGradients> {
    /// Adds another step's gradients into this accumulator
    pub fn accumulate(&mut self, other: &CellGradients) {
        for gate in Gate::ALL {
            let total = self.get_mut(gate);
            let step = other.get(gate);
            total.weight += &step.weight;
            total.bias += &step.bias;
        }
    }

    /// Clamps every element into [-bound, bound], returning how many were clipped
    ///
    /// NaN entries pass through unchanged so a diverged step stays visible.
    pub fn clip(&mut self, bound: f64) -> usize {
        let bound = bound.abs();
        let mut clipped = 0;
        for gate in Gate::ALL {
            let grad = self.get_mut(gate);
            for x in grad.weight.iter_mut().chain(grad.bias.iter_mut()) {
                if x.abs() > bound {
                    clipped += 1;
                }
                *x = x.clamp(-bound, bound);
            }
        }
        clipped
    }
}

/// Everything one forward step produced that its backward step needs
#[derive(Clone, Debug)]
pub struct CellState {
    /// Incoming cell memory, (hidden_dim, batch_size)
    pub c_in: Array2<f64>,
    /// Previous hidden activation stacked on the transposed input, (concat_dim, batch_size)
    pub z: Array2<f64>,
    /// Activated gate outputs, each (hidden_dim, batch_size)
    pub gates: Gates<Array2<f64>>,
    pub c_out: Array2<f64>,
    pub a_out: Array2<f64>,
}

/// LSTM cell with one weight matrix and bias per gate over the concatenated input
///
/// Implements, with z = [a_prev; xᵀ]:
/// - c̃ = tanh(W_c z + b_c)
/// - u = σ(W_u z + b_u)
/// - o = σ(W_o z + b_o)
/// - f = σ(W_f z + b_f)
/// - c_out = f ⊙ c_prev + u ⊙ c̃
/// - a_out = o ⊙ tanh(c_out)
#[derive(Clone, Debug)]
pub struct LSTMCell {
    pub params: Gates<GateParams>,
    pub hidden_dim: usize,
    pub x_dim: usize,
    pub concat_dim: usize,
    pub learning_rate: f64,
    pub store_grads: bool,
    /// Peephole connections are not implemented; the flag is carried but never read by the math.
    pub peephole: bool,
    stored_grads: Option<CellGradients>,
}

impl LSTMCell {
    /// Creates a cell whose gate weights come from `init` and whose biases start at zero
    pub fn new<I: Initializer + ?Sized>(hidden_dim: usize, x_dim: usize, learning_rate: f64, init: &mut I) -> Self {
        let concat_dim = hidden_dim + x_dim;
        let params = Gates::from_fn(|_| GateParams {
            weight: init.init(hidden_dim, concat_dim),
            bias: Array2::zeros((hidden_dim, 1)),
        });

        LSTMCell {
            params,
            hidden_dim,
            x_dim,
            concat_dim,
            learning_rate,
            store_grads: false,
            peephole: false,
            stored_grads: None,
        }
    }

    pub fn with_store_grads(mut self, store_grads: bool) -> Self {
        self.store_grads = store_grads;
        self
    }

    pub fn with_peephole(mut self, peephole: bool) -> Self {
        self.peephole = peephole;
        self
    }

    /// Zero hidden activation / cell memory for a batch
    pub fn zero_state(&self, batch_size: usize) -> Array2<f64> {
        Array2::zeros((self.hidden_dim, batch_size))
    }

    /// One time step forward
    ///
    /// `x` is (batch_size, x_dim). Absent `a_prev`/`c_prev` default to zeros
    /// of shape (hidden_dim, batch_size).
    pub fn forward(
        &self,
        x: &Array2<f64>,
        a_prev: Option<&Array2<f64>>,
        c_prev: Option<&Array2<f64>>,
    ) -> Result<(CellState, CellCache)> {
        let batch_size = x.nrows();
        let a_prev = a_prev.cloned().unwrap_or_else(|| self.zero_state(batch_size));
        let c_prev = c_prev.cloned().unwrap_or_else(|| self.zero_state(batch_size));
        self.forward_step(x, &a_prev, &c_prev)
    }

    /// One time step forward with a concrete previous state
    pub fn forward_step(&self, x: &Array2<f64>, a_prev: &Array2<f64>, c_prev: &Array2<f64>) -> Result<(CellState, CellCache)> {
        let batch_size = x.nrows();
        ensure_shape("x", &[batch_size, self.x_dim], x.shape())?;
        ensure_shape("a_prev", &[self.hidden_dim, batch_size], a_prev.shape())?;
        ensure_shape("c_prev", &[self.hidden_dim, batch_size], c_prev.shape())?;

        let z = concatenate(Axis(0), &[a_prev.view(), x.t()])?;

        let (gates, cache) = self
            .params
            .map(|gate, p| gate.activation().activate(&(p.weight.dot(&z) + &p.bias)))
            .unzip();

        let c_out = &gates.forget * c_prev + &gates.update * &gates.candidate;
        let a_out = &gates.output * &c_out.mapv(tanh);

        let state = CellState {
            c_in: c_prev.clone(),
            z,
            gates,
            c_out,
            a_out,
        };
        Ok((state, cache))
    }

    /// One time step backward
    ///
    /// `da_next` is the gradient reaching this step's hidden output (the
    /// caller has already added any direct output-layer contribution) and
    /// `dc_next` the gradient reaching its outgoing cell memory.
    ///
    /// Returns (da_in, dc_in, gradients) where da_in/dc_in flow into the
    /// previous time step.
    pub fn backward(
        &self,
        state: &CellState,
        da_next: &Array2<f64>,
        dc_next: &Array2<f64>,
    ) -> Result<(Array2<f64>, Array2<f64>, CellGradients)> {
        ensure_shape("da_next", state.a_out.shape(), da_next.shape())?;
        ensure_shape("dc_next", state.c_out.shape(), dc_next.shape())?;

        let g = &state.gates;
        let tanh_c = state.c_out.mapv(tanh);

        // Both paths into c_out: through o ⊙ tanh(c_out), and directly from step t+1
        let dc_out = &g.output * da_next * tanh_c.mapv(|t| 1.0 - t * t) + dc_next;

        let local = Gates {
            candidate: g.candidate.mapv(|c| 1.0 - c * c) * &g.update * &dc_out,
            update: &g.update * &g.update.mapv(|u| 1.0 - u) * &g.candidate * &dc_out,
            output: &g.output * &g.output.mapv(|o| 1.0 - o) * &tanh_c * da_next,
            forget: &g.forget * &g.forget.mapv(|f| 1.0 - f) * &state.c_in * &dc_out,
        };

        let grads = local.map(|_, d| GateGradients {
            weight: d.dot(&state.z.t()),
            bias: d.sum_axis(Axis(1)).insert_axis(Axis(1)),
        });

        // Only the hidden-activation rows of z carry gradient further back
        let mut da_in: Array2<f64> = Array2::zeros(da_next.raw_dim());
        for (gate, d) in local.iter() {
            let w_a = self.params.get(gate).weight.slice(s![.., ..self.hidden_dim]);
            da_in += &w_a.t().dot(d);
        }

        let dc_in = &dc_out * &g.forget;

        trace!(batch_size = da_next.ncols(), "cell backward step");
        Ok((da_in, dc_in, grads))
    }

    /// Zero gradients shaped like each gate's parameters
    pub fn init_grads(&self) -> CellGradients {
        self.params.map(|_, p| GateGradients {
            weight: Array2::zeros(p.weight.raw_dim()),
            bias: Array2::zeros(p.bias.raw_dim()),
        })
    }

    /// SGD step: param -= learning_rate * grad, after optional elementwise clipping
    pub fn update_params(&mut self, mut grads: CellGradients, clip: Option<f64>) {
        if let Some(bound) = clip {
            let clipped = grads.clip(bound);
            if clipped > 0 {
                debug!(clipped, bound, "clipped cell gradients");
            }
        }

        let lr = self.learning_rate;
        for gate in Gate::ALL {
            let grad = grads.get(gate);
            let param = self.params.get_mut(gate);
            param.weight.scaled_add(-lr, &grad.weight);
            param.bias.scaled_add(-lr, &grad.bias);
        }

        if self.store_grads {
            self.stored_grads = Some(grads);
        }
    }

    /// Gradients applied by the most recent update, when `store_grads` is on
    pub fn stored_gradients(&self) -> Option<&CellGradients> {
        self.stored_grads.as_ref()
    }

    pub fn num_parameters(&self) -> usize {
        self.params.iter().map(|(_, p)| p.weight.len() + p.bias.len()).sum()
    }
}
