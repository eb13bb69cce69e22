use std::path::PathBuf;

use board_vision::{
    backend::{self, TrainingBackend},
    model::TileModelConfig,
    training::{train_tiles, TileTrainingConfig},
    Error,
};
use burn::optim::AdamConfig;
use clap::Parser;

/// Train the chessboard-tile classifier on boards labeled by their file names.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Where the config, checkpoints and trained model are written.
    #[arg(long, default_value = "/tmp/board-vision/tiles")]
    artifact_dir: String,

    /// Directory of labeled `*.jpeg` training boards.
    #[arg(long, default_value = "archive/train")]
    train_dir: PathBuf,

    /// Directory of labeled `*.jpeg` test boards.
    #[arg(long, default_value = "archive/test")]
    test_dir: PathBuf,

    #[arg(long, default_value_t = 500)]
    train_size: usize,

    #[arg(long, default_value_t = 500)]
    test_size: usize,

    #[arg(long, default_value_t = 5)]
    num_epochs: usize,

    #[arg(long, default_value_t = 100)]
    batch_size: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    let config = TileTrainingConfig::new(TileModelConfig::new(), AdamConfig::new())
        .with_train_size(cli.train_size)
        .with_test_size(cli.test_size)
        .with_num_epochs(cli.num_epochs)
        .with_batch_size(cli.batch_size)
        .with_seed(cli.seed);

    train_tiles::<TrainingBackend>(
        &cli.artifact_dir,
        &cli.train_dir,
        &cli.test_dir,
        config,
        backend::device(),
    )?;

    Ok(())
}
