use board_vision::{
    backend::{self, TrainingBackend},
    model::DigitModelConfig,
    training::{train_digits, DigitTrainingConfig},
    Error,
};
use burn::optim::AdamConfig;
use clap::Parser;

/// Train the handwritten-digit classifier on MNIST.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Where the config, checkpoints and trained model are written.
    #[arg(long, default_value = "/tmp/board-vision/digits")]
    artifact_dir: String,

    #[arg(long, default_value_t = 10)]
    num_epochs: usize,

    #[arg(long, default_value_t = 128)]
    batch_size: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    let config = DigitTrainingConfig::new(DigitModelConfig::new(), AdamConfig::new())
        .with_num_epochs(cli.num_epochs)
        .with_batch_size(cli.batch_size)
        .with_seed(cli.seed);

    train_digits::<TrainingBackend>(&cli.artifact_dir, config, backend::device())?;

    Ok(())
}
