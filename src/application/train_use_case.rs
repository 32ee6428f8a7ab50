// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a training run in order:
//
//   Step 1: Validate the configuration          (Layer 2)
//   Step 2: Resolve the alphabet                (Layer 3 - domain)
//   Step 3: Derive max_char_count from width    (Layer 5 - ml)
//   Step 4: Load and split the example images   (Layer 4 - data)
//   Step 5: Save config for the test command    (Layer 6 - infra)
//   Step 6: Build the model, optionally restore (Layer 5 - ml)
//   Step 7: Run the training iterations         (Layer 5 - ml)
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::{Context, Result};
use burn::optim::AdamConfig;
use serde::{Deserialize, Serialize};

use crate::data::{label_codec::LabelCodec, manager::DataManager, splitter};
use crate::domain::{
    alphabet::{Alphabet, DEFAULT_CHARSET},
    error::{CrnnError, CrnnResult},
};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    cnn::output_steps,
    decoder::DEFAULT_BEAM_WIDTH,
    model::{CrnnConfig, CrnnModel},
    trainer::{TrainBackend, Trainer, TrainerSettings},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// Serialisable so it can be saved next to the checkpoints and
// reloaded by the test command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub examples_path:         String,
    pub model_path:            String,
    /// Literal alphabet, or a path to a file whose lines are the alphabet
    pub char_set:              String,
    pub batch_size:            usize,
    pub iteration_count:       usize,
    pub max_image_width:       usize,
    pub learning_rate:         f64,
    pub train_test_ratio:      f64,
    pub restore:               bool,
    pub max_batches_per_epoch: usize,
    pub beam_width:            usize,
    pub lazy_load:             bool,
    pub export_name:           String,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            examples_path:         "samples".to_string(),
            model_path:            "save".to_string(),
            char_set:              DEFAULT_CHARSET.to_string(),
            batch_size:            64,
            iteration_count:       10,
            max_image_width:       100,
            learning_rate:         1e-4,
            train_test_ratio:      0.70,
            restore:               false,
            max_batches_per_epoch: 100,
            beam_width:            DEFAULT_BEAM_WIDTH,
            lazy_load:             false,
            export_name:           "frozen".to_string(),
        }
    }
}

impl TrainConfig {
    /// Rejects settings that would fail later in the run
    pub fn validate(&self) -> CrnnResult<()> {
        splitter::validate_ratio(self.train_test_ratio)?;
        if self.batch_size == 0 {
            return Err(CrnnError::config("batch size must be at least 1"));
        }
        if self.max_batches_per_epoch == 0 {
            return Err(CrnnError::config("max batches per epoch must be at least 1"));
        }
        if self.beam_width == 0 {
            return Err(CrnnError::config("beam width must be at least 1"));
        }
        if self.export_name.trim().is_empty() {
            return Err(CrnnError::config("export name must not be empty"));
        }
        if output_steps(self.max_image_width) == 0 {
            return Err(CrnnError::config(format!(
                "max image width {} leaves no time steps after the CNN",
                self.max_image_width
            )));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(CrnnError::config(format!("learning rate {} must be positive", self.learning_rate)));
        }
        Ok(())
    }

    pub fn settings(&self) -> TrainerSettings {
        TrainerSettings {
            learning_rate:         self.learning_rate,
            max_batches_per_epoch: self.max_batches_per_epoch,
            beam_width:            self.beam_width,
            export_name:           self.export_name.clone(),
            ..TrainerSettings::default()
        }
    }
}

/// Contents of train_config.json: the run settings and the alphabet
/// the checkpoints were trained with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedRun {
    pub config:   TrainConfig,
    pub alphabet: Alphabet,
}

/// Everything needed to build a Trainer
pub(crate) struct TrainerSetup<'a> {
    pub examples_path:    &'a str,
    pub alphabet:         Alphabet,
    pub batch_size:       usize,
    pub max_image_width:  usize,
    pub train_test_ratio: f64,
    pub lazy_load:        bool,
    pub settings:         TrainerSettings,
}

pub(crate) fn build_trainer(
    setup:       TrainerSetup<'_>,
    checkpoints: CheckpointManager,
) -> Result<Trainer<TrainBackend, impl burn::optim::Optimizer<CrnnModel<TrainBackend>, TrainBackend> + Clone>> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);

    let model_cfg = CrnnConfig::new(setup.alphabet.num_classes(), setup.max_image_width);
    model_cfg.validate()?;
    let max_char_count = model_cfg.max_char_count();
    tracing::info!("max_char_count = {} for width {}", max_char_count, setup.max_image_width);

    let data = DataManager::from_directory(
        setup.batch_size,
        setup.examples_path,
        setup.max_image_width,
        setup.train_test_ratio,
        max_char_count,
        setup.alphabet.clone(),
        setup.lazy_load,
    )
    .with_context(|| format!("Cannot load examples from '{}'", setup.examples_path))?;

    // m = β1*m + (1-β1)*g        (mean)
    // v = β2*v + (1-β2)*g²       (variance)
    // θ = θ - lr * m / (√v + ε)  (update)
    let optim = AdamConfig::new().init::<TrainBackend, CrnnModel<TrainBackend>>();

    Trainer::build(
        model_cfg,
        LabelCodec::new(setup.alphabet),
        data,
        checkpoints,
        setup.settings,
        optim,
        device,
    )
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;
        cfg.validate()?;

        let alphabet = Alphabet::from_source(&cfg.char_set)
            .with_context(|| format!("Invalid character set '{}'", cfg.char_set))?;
        tracing::info!("Alphabet has {} symbols", alphabet.len());

        let checkpoints = CheckpointManager::new(&cfg.model_path)?;
        checkpoints.save_config(&SavedRun { config: cfg.clone(), alphabet: alphabet.clone() })?;

        let setup = TrainerSetup {
            examples_path:    &cfg.examples_path,
            alphabet,
            batch_size:       cfg.batch_size,
            max_image_width:  cfg.max_image_width,
            train_test_ratio: cfg.train_test_ratio,
            lazy_load:        cfg.lazy_load,
            settings:         cfg.settings(),
        };
        let mut trainer = build_trainer(setup, checkpoints)?;

        if cfg.restore {
            trainer.restore()?;
        }
        trainer.train(cfg.iteration_count)?;
        tracing::info!("Next step: {}", trainer.step());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(TrainConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            TrainConfig { train_test_ratio: 1.5, ..Default::default() },
            TrainConfig { batch_size: 0, ..Default::default() },
            TrainConfig { max_batches_per_epoch: 0, ..Default::default() },
            TrainConfig { beam_width: 0, ..Default::default() },
            TrainConfig { export_name: "  ".into(), ..Default::default() },
            TrainConfig { learning_rate: 0.0, ..Default::default() },
            TrainConfig { max_image_width: 4, ..Default::default() },
        ];
        for cfg in &bad {
            assert!(matches!(cfg.validate(), Err(CrnnError::Configuration(_))), "{cfg:?}");
        }
    }

    #[test]
    fn test_settings_carry_run_values() {
        let cfg = TrainConfig { beam_width: 7, learning_rate: 0.01, ..Default::default() };
        let settings = cfg.settings();
        assert_eq!(settings.beam_width, 7);
        assert_eq!(settings.learning_rate, 0.01);
        assert_eq!(settings.samples_to_log, 2);
    }

    #[test]
    fn test_saved_run_round_trip() {
        let run = SavedRun { config: TrainConfig::default(), alphabet: Alphabet::new("xyz\n").unwrap() };
        let json = serde_json::to_string(&run).unwrap();
        let back: SavedRun = serde_json::from_str(&json).unwrap();
        assert_eq!(back.alphabet.as_string(), "xyz\n");
        assert_eq!(back.config.max_image_width, 100);
    }
}
