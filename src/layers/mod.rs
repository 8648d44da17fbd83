/// Single-step LSTM cell and its per-gate records.
pub mod lstm_cell;

/// Dense output projection.
pub mod dense;
