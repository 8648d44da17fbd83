use lstm_bptt::training::{LSTMTrainer, SequenceBatch, TrainingConfig};
use lstm_bptt::{LSTMConfig, LSTM};
use ndarray::Array3;

/// Generate sine wave training data for next-value prediction
///
/// Each batch holds `batch_size` phase-shifted waves of `sequence_length` steps.
fn generate_sine_data(num_batches: usize, batch_size: usize, sequence_length: usize) -> Vec<SequenceBatch> {
    (0..num_batches)
        .map(|i| {
            let phase = |b: usize| (i * batch_size + b) as f64 * 0.37;
            let x = Array3::from_shape_fn((sequence_length, batch_size, 1), |(t, b, _)| {
                (phase(b) + t as f64 * 0.1 * 2.0 * std::f64::consts::PI).sin()
            });
            let y = Array3::from_shape_fn((sequence_length, batch_size, 1), |(t, b, _)| {
                (phase(b) + (t + 1) as f64 * 0.1 * 2.0 * std::f64::consts::PI).sin()
            });
            (x, y)
        })
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("=== LSTM BPTT Training Demonstration ===\n");

    let train_data = generate_sine_data(20, 4, 12);
    let val_data = generate_sine_data(4, 4, 12);
    println!(
        "Generated {} training batches and {} validation batches",
        train_data.len(),
        val_data.len()
    );

    let config = LSTMConfig::new(16, 1)
        .with_learning_rate(0.02)
        .with_grad_clip(Some(5.0))
        .with_seed(2024);
    println!("Model: {} input -> {} hidden -> {} output\n", config.x_dim, config.hidden_dim, config.output_dim);

    let model = LSTM::new(config)?;
    let mut trainer = LSTMTrainer::new(model).with_config(TrainingConfig {
        epochs: 50,
        log_every: 10,
        carry_state: false,
    });

    let before = trainer.evaluate(&val_data)?;
    trainer.train(&train_data, Some(&val_data))?;
    let after = trainer.evaluate(&val_data)?;

    println!("Validation loss: {:.6} -> {:.6}", before, after);

    // Continue a sequence from the state the first half left behind
    let (x, _) = &val_data[0];
    let half = x.len_of(ndarray::Axis(0)) / 2;
    let head = trainer.model.predict(&x.slice(ndarray::s![..half, .., ..]).to_owned(), None, None)?;
    let tail = trainer.model.predict(
        &x.slice(ndarray::s![half.., .., ..]).to_owned(),
        Some(&head.a_last),
        Some(&head.c_last),
    )?;
    println!("First continued prediction: {:.4}", tail.predictions[[0, 0, 0]]);

    Ok(())
}
