use std::io::{BufRead, Write};
use std::path::Path;

use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use image::RgbImage;

use crate::board::{BoardState, NUM_SQUARES};
use crate::data::tiles_to_tensor;
use crate::model::TileModel;
use crate::tile;
use crate::training::{TileTrainingConfig, CONFIG_FILE, MODEL_FILE};
use crate::Error;

/// A trained tile classifier ready to label boards.
pub struct Predictor<B: Backend> {
    model: TileModel<B>,
    device: B::Device,
}

impl<B: Backend> Predictor<B> {
    pub fn new(model: TileModel<B>, device: B::Device) -> Self {
        Self { model, device }
    }

    /// Rebuild the model saved by a training run in `artifact_dir`.
    pub fn load(artifact_dir: &str, device: B::Device) -> Result<Self, Error> {
        let config = TileTrainingConfig::load(format!("{artifact_dir}/{CONFIG_FILE}"))?;
        let record = CompactRecorder::new()
            .load(format!("{artifact_dir}/{MODEL_FILE}").into(), &device)?;

        let model = config.model.init::<B>(&device).load_record(record);
        log::info!("Loaded tile model from {artifact_dir}");

        Ok(Self::new(model, device))
    }

    /// Classify the 64 tiles of a board, in row-major order.
    pub fn predict_tiles(&self, tiles: &[RgbImage]) -> Result<BoardState, Error> {
        if tiles.len() != NUM_SQUARES {
            return Err(Error::TileGeometry(format!(
                "expected {NUM_SQUARES} tiles, found {}",
                tiles.len()
            )));
        }

        let images = tiles_to_tensor::<B, _>(
            tiles.iter().map(|tile| tile.as_raw().as_slice()),
            &self.device,
        );
        let probabilities: Vec<f32> = self
            .model
            .probabilities(images)
            .into_data()
            .iter::<f32>()
            .collect();

        Ok(BoardState::from_distributions(&probabilities)?)
    }

    pub fn predict_board(&self, board: &RgbImage) -> Result<BoardState, Error> {
        self.predict_tiles(&tile::slice_board(board)?)
    }

    pub fn predict_path<P: AsRef<Path>>(&self, path: P) -> Result<BoardState, Error> {
        self.predict_board(&tile::load_board(path)?)
    }
}

/// Label the board image named on each input line until a blank line or the end of the
/// input. Each answer is written on its own line and flushed right away.
///
/// Returns the number of boards labeled.
pub fn serve_lines<B, R, W>(
    predictor: &Predictor<B>,
    reader: R,
    mut writer: W,
) -> Result<usize, Error>
where
    B: Backend,
    R: BufRead,
    W: Write,
{
    let mut served = 0;

    for line in reader.lines() {
        let line = line?;
        let path = line.trim();
        if path.is_empty() {
            break;
        }

        let board = predictor.predict_path(path)?;
        log::debug!("{path} => {}", board.to_compact());

        writeln!(writer, "{board}")?;
        writer.flush()?;
        served += 1;
    }

    Ok(served)
}
