//! Slicing board images into square tiles.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::board::NUM_SQUARES;
use crate::Error;

/// Side of a board image, in pixels.
pub const BOARD_SIZE: u32 = 200;

/// Side of a tile, in pixels.
pub const TILE_SIZE: u32 = 25;

/// Number of tiles along each side of the board.
pub const TILES_PER_SIDE: u32 = BOARD_SIZE / TILE_SIZE;

/// Number of color channels of a tile.
pub const CHANNELS: usize = 3;

/// Number of bytes of a tile in HWC order.
pub const TILE_LEN: usize = (TILE_SIZE * TILE_SIZE) as usize * CHANNELS;

/// Open a board image as RGB, resized to [`BOARD_SIZE`] when it is not already that size.
pub fn load_board<P: AsRef<Path>>(path: P) -> Result<RgbImage, Error> {
    let board = image::open(path.as_ref())?.into_rgb8();

    if board.dimensions() == (BOARD_SIZE, BOARD_SIZE) {
        return Ok(board);
    }

    log::debug!(
        "Resizing {} from {:?} to {BOARD_SIZE}x{BOARD_SIZE}",
        path.as_ref().display(),
        board.dimensions()
    );

    Ok(imageops::resize(
        &board,
        BOARD_SIZE,
        BOARD_SIZE,
        FilterType::Triangle,
    ))
}

/// Split a board into its 64 tiles, row by row starting from the top-left corner.
pub fn slice_board(board: &RgbImage) -> Result<Vec<RgbImage>, Error> {
    if board.dimensions() != (BOARD_SIZE, BOARD_SIZE) {
        return Err(Error::TileGeometry(format!(
            "board is {}x{}, expected {BOARD_SIZE}x{BOARD_SIZE}",
            board.width(),
            board.height()
        )));
    }

    let tiles = (0..TILES_PER_SIDE)
        .flat_map(|row| (0..TILES_PER_SIDE).map(move |col| (row, col)))
        .map(|(row, col)| {
            imageops::crop_imm(
                board,
                col * TILE_SIZE,
                row * TILE_SIZE,
                TILE_SIZE,
                TILE_SIZE,
            )
            .to_image()
        })
        .collect();

    Ok(tiles)
}

/// Put 64 tiles back together, inverse of [`slice_board`].
pub fn assemble_board(tiles: &[RgbImage]) -> Result<RgbImage, Error> {
    if tiles.len() != NUM_SQUARES {
        return Err(Error::TileGeometry(format!(
            "expected {NUM_SQUARES} tiles, found {}",
            tiles.len()
        )));
    }

    let mut board = RgbImage::new(BOARD_SIZE, BOARD_SIZE);

    for (index, tile) in tiles.iter().enumerate() {
        if tile.dimensions() != (TILE_SIZE, TILE_SIZE) {
            return Err(Error::TileGeometry(format!(
                "tile {index} is {}x{}, expected {TILE_SIZE}x{TILE_SIZE}",
                tile.width(),
                tile.height()
            )));
        }

        let index = index as u32;
        let x = (index % TILES_PER_SIDE) * TILE_SIZE;
        let y = (index / TILES_PER_SIDE) * TILE_SIZE;
        imageops::replace(&mut board, tile, x as i64, y as i64);
    }

    Ok(board)
}
