use std::io;

use board_vision::{
    backend::{self, Backend},
    inference::{serve_lines, Predictor},
    Error,
};
use tracing_subscriber::filter::LevelFilter;

const ARTIFACT_DIR: &str = "/tmp/board-vision/tiles";

fn main() -> Result<(), Error> {
    // Stdout carries the predictions.
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(LevelFilter::INFO)
        .init();

    let predictor = Predictor::<Backend>::load(ARTIFACT_DIR, backend::device())?;

    let served = serve_lines(&predictor, io::stdin().lock(), io::stdout().lock())?;
    log::info!("Labeled {served} boards");

    Ok(())
}
