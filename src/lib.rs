//! Image classifiers for handwritten digits and chessboard tiles.
//!
//! The tile classifier labels each of the 64 squares of a 200x200 board image with one of
//! 13 classes (twelve pieces and the empty square), and turns the predictions back into a
//! board-state string.

pub mod backend;
pub mod board;
pub mod data;
pub mod inference;
pub mod model;
pub mod tile;
pub mod training;

mod error;

pub use error::Error;
