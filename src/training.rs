use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use burn::{
    data::{
        dataloader::{DataLoader, DataLoaderBuilder},
        dataset::{transform::PartialDataset, vision::MnistDataset, Dataset},
    },
    module::AutodiffModule,
    optim::AdamConfig,
    prelude::*,
    record::CompactRecorder,
    tensor::{backend::AutodiffBackend, ElementConversion},
    train::{
        metric::{AccuracyMetric, LossMetric},
        ClassificationOutput, LearnerBuilder, ValidStep,
    },
};

use serde::{Deserialize, Serialize};

use crate::board::TileClass;
use crate::data::{
    board_image_paths, sample_paths, tiles_to_tensor, BoardDataset, DigitBatcher, TileBatcher,
    DIGIT_PIXELS,
};
use crate::model::{DigitModel, DigitModelConfig, TileModel, TileModelConfig};
use crate::Error;

/// File name of the training config inside an artifact directory.
pub const CONFIG_FILE: &str = "config.json";

/// File name (without extension) of the trained model inside an artifact directory.
pub const MODEL_FILE: &str = "model";

/// Test tile shown after training.
const SAMPLE_TILE: usize = 300;

#[derive(Config)]
pub struct TileTrainingConfig {
    pub model: TileModelConfig,
    pub optimizer: AdamConfig,
    /// Number of boards drawn from the train directory.
    #[config(default = 500)]
    pub train_size: usize,
    /// Number of boards drawn from the test directory.
    #[config(default = 500)]
    pub test_size: usize,
    #[config(default = 5)]
    pub num_epochs: usize,
    #[config(default = 100)]
    pub batch_size: usize,
    #[config(default = 2)]
    pub num_workers: usize,
    #[config(default = 42)]
    pub seed: u64,
    /// Trailing fraction of the training tiles held out for validation.
    #[config(default = 0.2)]
    pub validation_split: f64,
    #[config(default = 1.0e-3)]
    pub learning_rate: f64,
}

#[derive(Config)]
pub struct DigitTrainingConfig {
    pub model: DigitModelConfig,
    pub optimizer: AdamConfig,
    #[config(default = 10)]
    pub num_epochs: usize,
    #[config(default = 128)]
    pub batch_size: usize,
    #[config(default = 4)]
    pub num_workers: usize,
    #[config(default = 42)]
    pub seed: u64,
    #[config(default = 0.2)]
    pub validation_split: f64,
    #[config(default = 1.0e-3)]
    pub learning_rate: f64,
}

/// File name of the test-set evaluation inside an artifact directory.
pub const EVALUATION_FILE: &str = "evaluation.json";

/// Mean loss and accuracy of a model over a dataset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub loss: f64,
    pub accuracy: f64,
    pub samples: usize,
}

/// Run a validation pass of `model` over every batch of `dataloader`.
pub fn evaluate<B, M, I>(model: &M, dataloader: Arc<dyn DataLoader<B, I>>) -> Evaluation
where
    B: Backend,
    M: ValidStep<I, ClassificationOutput<B>>,
{
    let mut loss = 0.0;
    let mut correct = 0;
    let mut samples = 0;

    for batch in dataloader.iter() {
        let item = model.step(batch);
        let [batch_size, _] = item.output.dims();

        let predicted = item.output.argmax(1).squeeze::<1>(1);
        correct += predicted
            .equal(item.targets)
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>() as usize;
        loss += item.loss.into_scalar().elem::<f64>() * batch_size as f64;
        samples += batch_size;
    }

    if samples == 0 {
        return Evaluation::default();
    }

    Evaluation {
        loss: loss / samples as f64,
        accuracy: correct as f64 / samples as f64,
        samples,
    }
}

fn create_artifact_dir(artifact_dir: &str) -> Result<(), Error> {
    // Stale checkpoints from a previous run must not be picked up.
    std::fs::remove_dir_all(artifact_dir).ok();
    std::fs::create_dir_all(artifact_dir)?;
    Ok(())
}

impl Evaluation {
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

fn report_evaluation(artifact_dir: &str, evaluation: &Evaluation) -> Result<(), Error> {
    println!("Test score: {}", evaluation.loss);
    println!("Test accuracy: {}", evaluation.accuracy);
    evaluation.save(format!("{artifact_dir}/{EVALUATION_FILE}"))
}

/// Train the tile classifier on labeled boards from `train_dir`, evaluate it on boards
/// from `test_dir` and save it to `artifact_dir`.
pub fn train_tiles<B: AutodiffBackend>(
    artifact_dir: &str,
    train_dir: &Path,
    test_dir: &Path,
    config: TileTrainingConfig,
    device: B::Device,
) -> Result<Evaluation, Error> {
    create_artifact_dir(artifact_dir)?;
    config.save(format!("{artifact_dir}/{CONFIG_FILE}"))?;

    B::seed(config.seed);

    let learner = LearnerBuilder::new(artifact_dir)
        .metric_train_numeric(AccuracyMetric::new())
        .metric_valid_numeric(AccuracyMetric::new())
        .metric_train_numeric(LossMetric::new())
        .metric_valid_numeric(LossMetric::new())
        .with_file_checkpointer(CompactRecorder::new())
        .devices(vec![device.clone()])
        .num_epochs(config.num_epochs)
        .summary()
        .build(
            config.model.init::<B>(&device),
            config.optimizer.init(),
            config.learning_rate,
        );

    let train_paths = sample_paths(
        board_image_paths(train_dir)?,
        config.train_size,
        config.seed,
    );
    let test_paths = sample_paths(
        board_image_paths(test_dir)?,
        config.test_size,
        config.seed,
    );
    log::info!(
        "Using {} train boards and {} test boards",
        train_paths.len(),
        test_paths.len()
    );

    let (dataset_train, dataset_valid) =
        BoardDataset::from_paths(&train_paths)?.split(config.validation_split);
    let dataset_test = BoardDataset::from_paths(&test_paths)?;

    println!("Train tiles: {}", dataset_train.len());
    println!("Validation tiles: {}", dataset_valid.len());
    println!("Test tiles: {}", dataset_test.len());
    if let Some(item) = dataset_train.get(0) {
        println!("First tile: {} bytes", item.pixels.len());
        let one_hot = TileClass::from_index(item.class)
            .map(|class| class.one_hot())
            .unwrap_or_default();
        println!("First label: {one_hot:?}");
    }

    let dataloader_train = DataLoaderBuilder::new(TileBatcher)
        .batch_size(config.batch_size)
        .shuffle(config.seed)
        .num_workers(config.num_workers)
        .build(dataset_train);

    let dataloader_valid = DataLoaderBuilder::new(TileBatcher)
        .batch_size(config.batch_size)
        .num_workers(config.num_workers)
        .build(dataset_valid);

    let now = Instant::now();
    let model_trained: TileModel<B> = learner.fit(dataloader_train, dataloader_valid);
    let elapsed = now.elapsed().as_secs();
    println!("Training completed in {}m{}s", (elapsed / 60), elapsed % 60);

    model_trained
        .clone()
        .save_file(format!("{artifact_dir}/{MODEL_FILE}"), &CompactRecorder::new())?;
    log::info!("Saved trained model to {artifact_dir}/{MODEL_FILE}");

    let model = model_trained.valid();
    let sample = dataset_test
        .get(SAMPLE_TILE)
        .or_else(|| dataset_test.get(dataset_test.len().saturating_sub(1)));

    let dataloader_test = DataLoaderBuilder::new(TileBatcher)
        .batch_size(config.batch_size)
        .num_workers(config.num_workers)
        .build(dataset_test);
    let evaluation = evaluate(&model, dataloader_test);
    report_evaluation(artifact_dir, &evaluation)?;

    if let Some(item) = sample {
        let images = tiles_to_tensor::<B::InnerBackend, _>([item.pixels.as_slice()], &device);
        let predicted = model
            .forward(images)
            .argmax(1)
            .into_scalar()
            .elem::<i64>();

        let expected = TileClass::from_index(item.class).map(TileClass::symbol);
        let predicted = TileClass::from_index(predicted as usize).map(TileClass::symbol);
        println!("Sample tile: expected {expected:?}, predicted {predicted:?}");
    }

    Ok(evaluation)
}

/// Train the digit classifier on MNIST and evaluate it on the MNIST test split.
pub fn train_digits<B: AutodiffBackend>(
    artifact_dir: &str,
    config: DigitTrainingConfig,
    device: B::Device,
) -> Result<Evaluation, Error> {
    create_artifact_dir(artifact_dir)?;
    config.save(format!("{artifact_dir}/{CONFIG_FILE}"))?;

    B::seed(config.seed);

    let learner = LearnerBuilder::new(artifact_dir)
        .metric_train_numeric(AccuracyMetric::new())
        .metric_valid_numeric(AccuracyMetric::new())
        .metric_train_numeric(LossMetric::new())
        .metric_valid_numeric(LossMetric::new())
        .with_file_checkpointer(CompactRecorder::new())
        .devices(vec![device.clone()])
        .num_epochs(config.num_epochs)
        .summary()
        .build(
            config.model.init::<B>(&device),
            config.optimizer.init(),
            config.learning_rate,
        );

    let dataset = Arc::new(MnistDataset::train());
    let held_out = (dataset.len() as f64 * config.validation_split.clamp(0.0, 1.0)).round();
    let split_at = dataset.len() - held_out as usize;
    let dataset_train = PartialDataset::new(dataset.clone(), 0, split_at);
    let dataset_valid = PartialDataset::new(dataset.clone(), split_at, dataset.len());
    let dataset_test = MnistDataset::test();

    println!("Train shape [{}, {DIGIT_PIXELS}]", dataset_train.len());
    println!("Validation shape [{}, {DIGIT_PIXELS}]", dataset_valid.len());
    println!("Test shape [{}, {DIGIT_PIXELS}]", dataset_test.len());

    let dataloader_train = DataLoaderBuilder::new(DigitBatcher)
        .batch_size(config.batch_size)
        .shuffle(config.seed)
        .num_workers(config.num_workers)
        .build(dataset_train);

    let dataloader_valid = DataLoaderBuilder::new(DigitBatcher)
        .batch_size(config.batch_size)
        .num_workers(config.num_workers)
        .build(dataset_valid);

    let dataloader_test = DataLoaderBuilder::new(DigitBatcher)
        .batch_size(config.batch_size)
        .num_workers(config.num_workers)
        .build(dataset_test);

    let now = Instant::now();
    let model_trained: DigitModel<B> = learner.fit(dataloader_train, dataloader_valid);
    let elapsed = now.elapsed().as_secs();
    println!("Training completed in {}m{}s", (elapsed / 60), elapsed % 60);

    model_trained
        .clone()
        .save_file(format!("{artifact_dir}/{MODEL_FILE}"), &CompactRecorder::new())?;

    let evaluation = evaluate(&model_trained.valid(), dataloader_test);
    report_evaluation(artifact_dir, &evaluation)?;

    Ok(evaluation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TileItem;
    use crate::tile::TILE_LEN;
    use burn::backend::{ndarray::NdArrayDevice, NdArray};
    use burn::data::dataset::InMemDataset;

    type TestBackend = NdArray;

    fn tiles(count: usize) -> BoardDataset {
        BoardDataset::new(
            (0..count)
                .map(|index| TileItem {
                    pixels: vec![(index * 17 % 256) as u8; TILE_LEN],
                    class: index % 13,
                })
                .collect(),
        )
    }

    #[test]
    fn evaluates_every_sample_once() {
        let device = NdArrayDevice::Cpu;
        let model = TileModelConfig::new().init::<TestBackend>(&device);
        let dataloader = DataLoaderBuilder::new(TileBatcher)
            .batch_size(4)
            .build(tiles(10));

        let evaluation = evaluate(&model, dataloader);

        assert_eq!(evaluation.samples, 10);
        assert!(evaluation.loss.is_finite());
        assert!((0.0..=1.0).contains(&evaluation.accuracy));
    }

    #[test]
    fn targets_equal_to_predictions_score_full_accuracy() {
        let device = NdArrayDevice::Cpu;
        let model = TileModelConfig::new().init::<TestBackend>(&device);
        let items = tiles(9).items().to_vec();
        let images = tiles_to_tensor::<TestBackend, _>(
            items.iter().map(|item| item.pixels.as_slice()),
            &device,
        );
        let predicted: Vec<i64> = model
            .forward(images)
            .argmax(1)
            .into_data()
            .iter::<i64>()
            .collect();
        let items = items
            .into_iter()
            .zip(predicted)
            .map(|(item, class)| TileItem {
                class: class as usize,
                ..item
            })
            .collect();
        let dataloader = DataLoaderBuilder::new(TileBatcher)
            .batch_size(4)
            .build(BoardDataset::new(items));

        let evaluation = evaluate(&model, dataloader);

        assert_eq!(evaluation.samples, 9);
        assert_eq!(evaluation.accuracy, 1.0);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let device = NdArrayDevice::Cpu;
        let model = TileModelConfig::new().init::<TestBackend>(&device);
        let build = || {
            DataLoaderBuilder::new(TileBatcher)
                .batch_size(3)
                .build(tiles(7))
        };

        assert_eq!(evaluate(&model, build()), evaluate(&model, build()));
    }

    #[test]
    fn empty_dataset_evaluates_to_zero() {
        let device = NdArrayDevice::Cpu;
        let model = DigitModelConfig::new().init::<TestBackend>(&device);
        let dataloader = DataLoaderBuilder::new(DigitBatcher)
            .batch_size(4)
            .build(InMemDataset::new(Vec::new()));

        assert_eq!(evaluate(&model, dataloader), Evaluation::default());
    }

    #[test]
    fn configs_round_trip_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let config = TileTrainingConfig::new(TileModelConfig::new(), AdamConfig::new())
            .with_num_epochs(1)
            .with_train_size(3);

        config.save(&path).unwrap();
        let loaded = TileTrainingConfig::load(&path).unwrap();

        assert_eq!(loaded.num_epochs, 1);
        assert_eq!(loaded.train_size, 3);
        assert_eq!(loaded.batch_size, 100);
        assert_eq!(loaded.model.num_classes, 13);
    }

    #[test]
    fn evaluation_is_saved_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(EVALUATION_FILE);
        let evaluation = Evaluation {
            loss: 0.25,
            accuracy: 0.5,
            samples: 64,
        };

        evaluation.save(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();

        assert_eq!(
            serde_json::from_str::<Evaluation>(&content).unwrap(),
            evaluation
        );
    }
}
