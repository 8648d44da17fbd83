/// Module for the LSTM sequence model.
pub mod lstm;
