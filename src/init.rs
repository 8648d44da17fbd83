use ndarray::Array2;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Normal, Uniform};
use serde::{Deserialize, Serialize};

use crate::error::{LSTMError, Result};

/// Produces a weight matrix of the requested shape
pub trait Initializer {
    fn init(&mut self, rows: usize, cols: usize) -> Array2<f64>;
}

impl<F> Initializer for F
where
    F: FnMut(usize, usize) -> Array2<f64>,
{
    fn init(&mut self, rows: usize, cols: usize) -> Array2<f64> {
        self(rows, cols)
    }
}

/// Weight initialization schemes recognized by the configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InitScheme {
    /// Xavier/Glorot uniform in ±sqrt(2 / (rows + cols))
    #[default]
    Xavier,
    Uniform { range: f64 },
    Normal { std_dev: f64 },
}

impl InitScheme {
    pub fn validate(&self) -> Result<()> {
        match *self {
            InitScheme::Xavier => Ok(()),
            InitScheme::Uniform { range } if range.is_finite() && range > 0.0 => Ok(()),
            InitScheme::Uniform { range } => Err(LSTMError::InvalidConfig(format!(
                "uniform init range must be positive and finite, got {}",
                range
            ))),
            InitScheme::Normal { std_dev } if std_dev.is_finite() && std_dev > 0.0 => Ok(()),
            InitScheme::Normal { std_dev } => Err(LSTMError::InvalidConfig(format!(
                "normal init std_dev must be positive and finite, got {}",
                std_dev
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Sampler {
    Xavier,
    Uniform(Uniform<f64>),
    Normal(Normal<f64>),
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Random initializer built from an `InitScheme`, optionally seeded
pub struct WeightInit {
    scheme: InitScheme,
    sampler: Sampler,
    rng: StdRng,
}

impl WeightInit {
    pub fn new(scheme: InitScheme, seed: Option<u64>) -> Result<Self> {
        scheme.validate()?;
        let sampler = match scheme {
            InitScheme::Xavier => Sampler::Xavier,
            InitScheme::Uniform { range } => Sampler::Uniform(Uniform::new(-range, range)),
            InitScheme::Normal { std_dev } => Sampler::Normal(
                Normal::new(0.0, std_dev).map_err(|e| LSTMError::InvalidConfig(e.to_string()))?,
            ),
        };
        Ok(WeightInit {
            scheme,
            sampler,
            rng: seeded_rng(seed),
        })
    }

    pub fn xavier(seed: Option<u64>) -> Self {
        WeightInit {
            scheme: InitScheme::Xavier,
            sampler: Sampler::Xavier,
            rng: seeded_rng(seed),
        }
    }

    pub fn scheme(&self) -> &InitScheme {
        &self.scheme
    }
}

impl Initializer for WeightInit {
    fn init(&mut self, rows: usize, cols: usize) -> Array2<f64> {
        match self.sampler {
            Sampler::Xavier => {
                let limit = (2.0 / (rows + cols).max(1) as f64).sqrt();
                Array2::random_using((rows, cols), Uniform::new(-limit, limit), &mut self.rng)
            }
            Sampler::Uniform(dist) => Array2::random_using((rows, cols), dist, &mut self.rng),
            Sampler::Normal(dist) => Array2::random_using((rows, cols), dist, &mut self.rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xavier_bounds() {
        let mut init = WeightInit::xavier(Some(7));
        let w = init.init(4, 6);
        let limit = (2.0 / 10.0f64).sqrt();

        assert_eq!(w.shape(), &[4, 6]);
        assert!(w.iter().all(|&x| x.abs() <= limit));
    }

    #[test]
    fn test_seeded_init_is_reproducible() {
        let mut a = WeightInit::new(InitScheme::Normal { std_dev: 0.1 }, Some(42)).unwrap();
        let mut b = WeightInit::new(InitScheme::Normal { std_dev: 0.1 }, Some(42)).unwrap();

        assert_eq!(a.init(3, 5), b.init(3, 5));
    }

    #[test]
    fn test_default_scheme_is_xavier() {
        assert_eq!(InitScheme::default(), InitScheme::Xavier);
        assert_eq!(WeightInit::new(InitScheme::default(), Some(1)).unwrap().scheme(), &InitScheme::Xavier);
    }

    #[test]
    fn test_invalid_scheme_rejected() {
        assert!(WeightInit::new(InitScheme::Uniform { range: -1.0 }, None).is_err());
        assert!(WeightInit::new(InitScheme::Normal { std_dev: f64::NAN }, None).is_err());
    }

    #[test]
    fn test_closure_initializer() {
        let mut ones = |rows: usize, cols: usize| -> Array2<f64> { Array2::ones((rows, cols)) };
        let w = ones.init(2, 3);
        assert!(w.iter().all(|&x| x == 1.0));
    }
}
