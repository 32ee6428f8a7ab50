// ============================================================
// Layer 2 — TestUseCase
// ============================================================
// Evaluates the latest checkpoint on the test partition.
//
//   Step 1: Read train_config.json if the model dir has one
//   Step 2: Alphabet and image width: CLI value, else saved, else default
//   Step 3: Load and split the examples          (Layer 4 - data)
//   Step 4: Build the model, restore weights     (Layer 5 - ml)
//   Step 5: Decode every test image              (Layer 5 - ml)
//
// The train/test ratio defaults to 0.0 for this command, which
// makes the whole example directory the test partition.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::application::train_use_case::{build_trainer, SavedRun, TrainConfig, TrainerSetup};
use crate::data::splitter;
use crate::domain::{
    alphabet::{Alphabet, DEFAULT_CHARSET},
    error::CrnnError,
};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{evaluator::TestSummary, trainer::TrainerSettings};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfig {
    pub examples_path:    String,
    pub model_path:       String,
    /// Overrides the alphabet saved with the checkpoints
    pub char_set:         Option<String>,
    /// Overrides the image width saved with the checkpoints
    pub max_image_width:  Option<usize>,
    pub batch_size:       usize,
    pub train_test_ratio: f64,
    pub beam_width:       usize,
    pub lazy_load:        bool,
}

pub struct TestUseCase {
    config: TestConfig,
}

impl TestUseCase {
    pub fn new(config: TestConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TestSummary> {
        let cfg = &self.config;
        splitter::validate_ratio(cfg.train_test_ratio)?;
        if cfg.batch_size == 0 {
            return Err(CrnnError::config("batch size must be at least 1").into());
        }

        let checkpoints = CheckpointManager::new(&cfg.model_path)?;
        let saved: Option<SavedRun> = checkpoints.load_config()?;
        if saved.is_none() {
            tracing::warn!("No train_config.json in '{}', using command line values", cfg.model_path);
        }

        let (alphabet, max_image_width) = resolve_model_inputs(cfg, saved.as_ref())?;

        let setup = TrainerSetup {
            examples_path:    &cfg.examples_path,
            alphabet,
            batch_size:       cfg.batch_size,
            max_image_width,
            train_test_ratio: cfg.train_test_ratio,
            lazy_load:        cfg.lazy_load,
            settings:         TrainerSettings { beam_width: cfg.beam_width, ..TrainerSettings::default() },
        };
        let mut trainer = build_trainer(setup, checkpoints)?;

        if !trainer.restore()? {
            tracing::warn!("Evaluating an untrained model");
        }
        trainer.test()
    }
}

/// Alphabet and image width the checkpoints must be rebuilt with
fn resolve_model_inputs(cfg: &TestConfig, saved: Option<&SavedRun>) -> Result<(Alphabet, usize)> {
    let alphabet = match (&cfg.char_set, saved) {
        (Some(source), _) => Alphabet::from_source(source)
            .with_context(|| format!("Invalid character set '{source}'"))?,
        (None, Some(run)) => run.alphabet.clone(),
        (None, None)      => Alphabet::new(DEFAULT_CHARSET)?,
    };
    let max_image_width = cfg
        .max_image_width
        .or(saved.map(|run| run.config.max_image_width))
        .unwrap_or(TrainConfig::default().max_image_width);
    Ok((alphabet, max_image_width))
}
