use std::path::{Path, PathBuf};

use burn::{
    data::{
        dataloader::batcher::Batcher,
        dataset::{vision::MnistItem, Dataset},
    },
    prelude::*,
};
use globwalk::DirEntry;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::board::BoardState;
use crate::tile::{self, CHANNELS, TILE_LEN, TILE_SIZE};
use crate::Error;

/// Number of pixels of an MNIST image.
pub const DIGIT_PIXELS: usize = 28 * 28;

/// Number of digit classes.
pub const NUM_DIGITS: usize = 10;

/// A single board square with its class.
#[derive(Clone, Debug, PartialEq)]
pub struct TileItem {
    /// RGB pixels in row-major HWC order.
    pub pixels: Vec<u8>,

    /// Tile class index.
    pub class: usize,
}

/// All `*.jpeg` board images of a directory, sorted by path.
pub fn board_image_paths<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>, Error> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(Error::MissingDirectory(dir.to_path_buf()));
    }

    let walker = globwalk::GlobWalkerBuilder::from_patterns(dir, &["*.jpeg"])
        .max_depth(1)
        .sort_by(|p1: &DirEntry, p2: &DirEntry| p1.path().cmp(p2.path()))
        .build()
        .map_err(|err| Error::Glob(format!("{err:?}")))?
        .filter_map(Result::ok);

    Ok(walker.map(|entry| entry.path().to_path_buf()).collect())
}

/// Shuffle `paths` with a seeded generator and keep at most `size` of them.
pub fn sample_paths(mut paths: Vec<PathBuf>, size: usize, seed: u64) -> Vec<PathBuf> {
    let mut rng = StdRng::seed_from_u64(seed);
    paths.shuffle(&mut rng);
    paths.truncate(size);
    paths
}

/// In-memory dataset of labeled tiles, 64 consecutive items per board.
#[derive(Clone, Debug, Default)]
pub struct BoardDataset {
    items: Vec<TileItem>,
}

impl Dataset<TileItem> for BoardDataset {
    fn get(&self, index: usize) -> Option<TileItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

impl BoardDataset {
    pub fn new(items: Vec<TileItem>) -> Self {
        Self { items }
    }

    /// Slice every board and label its tiles from the board's file name.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self, Error> {
        let mut items = Vec::with_capacity(paths.len() * tile::TILES_PER_SIDE.pow(2) as usize);

        for path in paths {
            let label = BoardState::from_image_path(path)?;
            let board = tile::load_board(path)?;
            let tiles = tile::slice_board(&board)?;

            items.extend(
                tiles
                    .into_iter()
                    .zip(label.squares())
                    .map(|(tile, class)| TileItem {
                        pixels: tile.into_raw(),
                        class: class.index(),
                    }),
            );
        }

        log::info!("Loaded {} tiles from {} boards", items.len(), paths.len());

        Ok(Self { items })
    }

    /// Hold out the trailing `ratio` of the items for validation.
    pub fn split(mut self, ratio: f64) -> (Self, Self) {
        let held_out = (self.items.len() as f64 * ratio.clamp(0.0, 1.0)).round() as usize;
        let valid = self.items.split_off(self.items.len() - held_out);

        (self, Self { items: valid })
    }

    pub fn items(&self) -> &[TileItem] {
        &self.items
    }
}

/// Stack HWC tile bytes into a `[N, 3, 25, 25]` tensor scaled to `[0, 1]`.
pub fn tiles_to_tensor<'a, B, I>(tiles: I, device: &B::Device) -> Tensor<B, 4>
where
    B: Backend,
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut pixels = Vec::new();
    for tile in tiles {
        pixels.extend_from_slice(tile);
    }
    let count = pixels.len() / TILE_LEN;
    let size = TILE_SIZE as usize;

    let data = TensorData::new(pixels, [count, size, size, CHANNELS]);

    Tensor::<B, 4>::from_data(data.convert::<B::FloatElem>(), device)
        .permute([0, 3, 1, 2])
        .div_scalar(255.0)
}

fn classes_to_tensor<B: Backend>(classes: Vec<i64>, device: &B::Device) -> Tensor<B, 1, Int> {
    let count = classes.len();

    Tensor::<B, 1, Int>::from_data(
        TensorData::new(classes, [count]).convert::<B::IntElem>(),
        device,
    )
}

#[derive(Clone, Debug, Default)]
pub struct TileBatcher;

#[derive(Clone, Debug)]
pub struct TileBatch<B: Backend> {
    pub images: Tensor<B, 4>,
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> Batcher<B, TileItem, TileBatch<B>> for TileBatcher {
    fn batch(&self, items: Vec<TileItem>, device: &B::Device) -> TileBatch<B> {
        let images =
            tiles_to_tensor::<B, _>(items.iter().map(|item| item.pixels.as_slice()), device);
        let targets = classes_to_tensor(
            items.iter().map(|item| item.class as i64).collect(),
            device,
        );

        TileBatch { images, targets }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DigitBatcher;

#[derive(Clone, Debug)]
pub struct DigitBatch<B: Backend> {
    pub images: Tensor<B, 2>,
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> Batcher<B, MnistItem, DigitBatch<B>> for DigitBatcher {
    fn batch(&self, items: Vec<MnistItem>, device: &B::Device) -> DigitBatch<B> {
        let pixels: Vec<f32> = items
            .iter()
            .flat_map(|item| item.image.iter().flatten().copied())
            .collect();
        let data = TensorData::new(pixels, [items.len(), DIGIT_PIXELS]);

        // Raw pixels are in [0, 255].
        let images =
            Tensor::<B, 2>::from_data(data.convert::<B::FloatElem>(), device).div_scalar(255.0);
        let targets = classes_to_tensor(
            items.iter().map(|item| item.label as i64).collect(),
            device,
        );

        DigitBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{ndarray::NdArrayDevice, NdArray};
    use image::{Rgb, RgbImage};

    type TestBackend = NdArray;

    const LABEL: &str = "1B1B1K2-3p1N2-6k1-R7-5P2-4q3-7R-1B6";

    fn write_board(dir: &Path, label: &str) -> PathBuf {
        let path = dir.join(format!("{label}.jpeg"));
        RgbImage::from_fn(200, 200, |x, y| Rgb([x as u8, y as u8, 128]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn lists_jpeg_boards_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write_board(dir.path(), "8-8-8-8-8-8-8-8");
        write_board(dir.path(), LABEL);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let paths = board_image_paths(dir.path()).unwrap();

        assert_eq!(paths.len(), 2);
        assert!(paths[0] < paths[1]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            board_image_paths(dir.path().join("absent")),
            Err(Error::MissingDirectory(_))
        ));
    }

    #[test]
    fn sampling_is_seeded() {
        let paths: Vec<PathBuf> = (0..20).map(|i| PathBuf::from(format!("{i}.jpeg"))).collect();

        let first = sample_paths(paths.clone(), 5, 42);
        let second = sample_paths(paths, 5, 42);

        assert_eq!(first.len(), 5);
        assert_eq!(first, second);
    }

    #[test]
    fn labels_every_tile_of_a_board() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_board(dir.path(), LABEL);

        let dataset = BoardDataset::from_paths(&[path]).unwrap();
        let label: BoardState = LABEL.parse().unwrap();

        assert_eq!(dataset.len(), 64);
        for (item, class) in dataset.items().iter().zip(label.squares()) {
            assert_eq!(item.pixels.len(), TILE_LEN);
            assert_eq!(item.class, class.index());
        }
    }

    #[test]
    fn split_holds_out_the_tail() {
        let items = (0..10)
            .map(|class| TileItem {
                pixels: vec![0; TILE_LEN],
                class,
            })
            .collect();

        let (train, valid) = BoardDataset::new(items).split(0.2);

        assert_eq!(train.len(), 8);
        assert_eq!(valid.len(), 2);
        assert_eq!(valid.get(0).unwrap().class, 8);
    }

    #[test]
    fn batches_tiles_channels_first() {
        let device = NdArrayDevice::Cpu;
        let mut pixels = vec![0u8; TILE_LEN];
        // Pixel (row 0, col 1), green channel.
        pixels[CHANNELS + 1] = 255;
        let items = vec![
            TileItem { pixels, class: 3 },
            TileItem {
                pixels: vec![51; TILE_LEN],
                class: 0,
            },
        ];

        let batch: TileBatch<TestBackend> = TileBatcher.batch(items, &device);

        assert_eq!(batch.images.dims(), [2, 3, 25, 25]);
        let green = batch
            .images
            .clone()
            .slice([0..1, 1..2, 0..1, 1..2])
            .into_scalar();
        assert_eq!(green, 1.0);
        let gray = batch
            .images
            .slice([1..2, 2..3, 24..25, 24..25])
            .into_scalar();
        assert!((gray - 0.2).abs() < 1e-6);
        assert_eq!(
            batch.targets.into_data().iter::<i64>().collect::<Vec<_>>(),
            vec![3, 0]
        );
    }

    #[test]
    fn batches_digits_flattened() {
        let device = NdArrayDevice::Cpu;
        let mut image = [[0.0; 28]; 28];
        image[1][0] = 255.0;
        let items = vec![MnistItem { image, label: 7 }];

        let batch: DigitBatch<TestBackend> = DigitBatcher.batch(items, &device);

        assert_eq!(batch.images.dims(), [1, DIGIT_PIXELS]);
        assert_eq!(batch.images.slice([0..1, 28..29]).into_scalar(), 1.0);
        assert_eq!(
            batch.targets.into_data().iter::<i64>().collect::<Vec<_>>(),
            vec![7]
        );
    }
}
