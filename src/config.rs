use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LSTMError, Result};
use crate::init::{InitScheme, WeightInit};

fn default_learning_rate() -> f64 {
    1e-4
}

fn default_output_dim() -> usize {
    1
}

/// Construction options for an `LSTM` sequence model
///
/// Loss function and output projection are chosen through the model's type
/// parameters; everything else lives here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LSTMConfig {
    pub hidden_dim: usize,
    pub x_dim: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_output_dim")]
    pub output_dim: usize,
    /// Elementwise clip bound for accumulated cell gradients; `None` disables clipping
    #[serde(default)]
    pub grad_clip: Option<f64>,
    #[serde(default)]
    pub init: InitScheme,
    #[serde(default)]
    pub seed: Option<u64>,
    /// Keep the last applied cell gradients for inspection
    #[serde(default)]
    pub store_grads: bool,
    /// Accepted but unused: peephole connections are not implemented
    #[serde(default)]
    pub peephole: bool,
}

impl LSTMConfig {
    pub fn new(hidden_dim: usize, x_dim: usize) -> Self {
        LSTMConfig {
            hidden_dim,
            x_dim,
            learning_rate: default_learning_rate(),
            output_dim: default_output_dim(),
            grad_clip: None,
            init: InitScheme::default(),
            seed: None,
            store_grads: false,
            peephole: false,
        }
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_output_dim(mut self, output_dim: usize) -> Self {
        self.output_dim = output_dim;
        self
    }

    pub fn with_grad_clip(mut self, grad_clip: Option<f64>) -> Self {
        self.grad_clip = grad_clip;
        self
    }

    pub fn with_init(mut self, init: InitScheme) -> Self {
        self.init = init;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_store_grads(mut self, store_grads: bool) -> Self {
        self.store_grads = store_grads;
        self
    }

    pub fn with_peephole(mut self, peephole: bool) -> Self {
        self.peephole = peephole;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.hidden_dim == 0 {
            return Err(LSTMError::InvalidConfig("hidden_dim must be positive".to_string()));
        }
        if self.x_dim == 0 {
            return Err(LSTMError::InvalidConfig("x_dim must be positive".to_string()));
        }
        if self.output_dim == 0 {
            return Err(LSTMError::InvalidConfig("output_dim must be positive".to_string()));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(LSTMError::InvalidConfig(format!(
                "learning_rate must be positive and finite, got {}",
                self.learning_rate
            )));
        }
        if let Some(clip) = self.grad_clip {
            if !clip.is_finite() || clip < 0.0 {
                return Err(LSTMError::InvalidConfig(format!(
                    "grad_clip must be non-negative and finite, got {}",
                    clip
                )));
            }
        }
        self.init.validate()
    }

    /// Weight initializer described by `init` and `seed`
    pub fn initializer(&self) -> Result<WeightInit> {
        WeightInit::new(self.init.clone(), self.seed)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: LSTMConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LSTMConfig::new(4, 3);
        assert_eq!(config.learning_rate, 1e-4);
        assert_eq!(config.output_dim, 1);
        assert_eq!(config.grad_clip, None);
        assert_eq!(config.init, InitScheme::Xavier);
        assert!(!config.store_grads);
        assert!(!config.peephole);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = LSTMConfig::from_json_str(r#"{"hidden_dim": 8, "x_dim": 2, "grad_clip": 5.0}"#).unwrap();
        assert_eq!(config.hidden_dim, 8);
        assert_eq!(config.grad_clip, Some(5.0));
        assert_eq!(config.learning_rate, 1e-4);
    }

    #[test]
    fn test_init_scheme_json() {
        let json = r#"{"hidden_dim": 2, "x_dim": 2, "init": {"kind": "normal", "std_dev": 0.05}, "seed": 9}"#;
        let config = LSTMConfig::from_json_str(json).unwrap();
        assert_eq!(config.init, InitScheme::Normal { std_dev: 0.05 });
        assert_eq!(config.seed, Some(9));
    }

    #[test]
    fn test_validation_failures() {
        assert!(LSTMConfig::new(0, 3).validate().is_err());
        assert!(LSTMConfig::new(3, 0).validate().is_err());
        assert!(LSTMConfig::new(3, 3).with_output_dim(0).validate().is_err());
        assert!(LSTMConfig::new(3, 3).with_learning_rate(-0.1).validate().is_err());
        assert!(LSTMConfig::new(3, 3).with_learning_rate(f64::NAN).validate().is_err());
        assert!(LSTMConfig::new(3, 3).with_grad_clip(Some(-1.0)).validate().is_err());
        assert!(LSTMConfig::new(3, 3).with_grad_clip(Some(0.0)).validate().is_ok());
    }

    #[test]
    fn test_json_round_trip() {
        let config = LSTMConfig::new(5, 2).with_grad_clip(Some(1.0)).with_seed(3);
        let json = config.to_json_string().unwrap();
        assert_eq!(LSTMConfig::from_json_str(&json).unwrap(), config);
    }
}
