use std::path::PathBuf;

use burn::config::ConfigError;
use burn::record::RecorderError;
use thiserror::Error;

use crate::board::LabelError;

/// Error type shared by the training and inference pipelines.
#[derive(Error, Debug)]
pub enum Error {
    /// The board-state string could not be decoded.
    #[error("invalid board label: {0}")]
    Label(#[from] LabelError),

    /// The image could not be opened or decoded.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O operation error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A trained model could not be saved or loaded.
    #[error("record error: {0}")]
    Record(#[from] RecorderError),

    /// A training config could not be saved or loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// A report could not be serialized.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The data directory does not exist.
    #[error("directory `{}` does not exist", .0.display())]
    MissingDirectory(PathBuf),

    /// The directory could not be walked.
    #[error("cannot list images: {0}")]
    Glob(String),

    /// An image or tile has the wrong geometry for slicing.
    #[error("tile geometry: {0}")]
    TileGeometry(String),
}
