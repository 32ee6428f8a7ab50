// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Owns the model parameters, the optimiser and the data manager
// and drives them through training iterations and test passes.
//
//   build()/restore()  → Ready
//   train(n)           → n iterations, each:
//       up to max_batches_per_epoch training batches
//         forward → CTC loss → beam decode → Adam update
//       save checkpoint ckp-{step}
//       export the evaluation model
//       append a metrics row, step += 1
//   test()             → one pass over the test partition
//
// Per-batch failures that only invalidate the batch (non-finite
// loss, decoded index outside the alphabet, unreadable image in
// lazy mode) are logged with iteration and batch index and the
// batch is skipped. Anything else ends the run.
//
// Key Burn insight:
//   - Training uses B (Autodiff<Wgpu>) for gradients
//   - model.valid() returns the model on B::InnerBackend
//   - Exports and test passes run on the inner backend
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{Context, Result};
use burn::{
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::{
    batcher::{OcrBatch, OcrBatcher},
    label_codec::LabelCodec,
    manager::DataManager,
};
use crate::domain::error::{CrnnError, CrnnResult};
use crate::infra::{
    checkpoint::{CheckpointManager, InferenceManifest},
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::{
    ctc::{CtcLoss, CtcLossConfig},
    decoder::{BeamSearchDecoder, DecodedBatch, DEFAULT_BEAM_WIDTH},
    edit_distance::mean_edit_distance,
    evaluator::{Evaluator, TestSummary},
    model::{CrnnConfig, CrnnModel},
};

pub type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

#[derive(Debug, Clone)]
pub struct TrainerSettings {
    pub learning_rate:         f64,
    /// Hard ceiling on batches per iteration
    pub max_batches_per_epoch: usize,
    pub beam_width:            usize,
    /// File stem of the exported evaluation model
    pub export_name:           String,
    /// Predictions logged per training batch
    pub samples_to_log:        usize,
}

impl Default for TrainerSettings {
    fn default() -> Self {
        Self {
            learning_rate:         1e-4,
            max_batches_per_epoch: 100,
            beam_width:            DEFAULT_BEAM_WIDTH,
            export_name:           "frozen".into(),
            samples_to_log:        2,
        }
    }
}

/// What one successful optimiser step reports
#[derive(Debug, Clone)]
pub struct StepOutput {
    pub loss:        f64,
    pub error_rate:  f64,
    /// Samples whose label could not be aligned and did not contribute
    pub ignored:     usize,
    /// (ground truth, prediction) of the first samples of the batch
    pub predictions: Vec<(String, String)>,
}

pub struct Trainer<B: AutodiffBackend, O: Optimizer<CrnnModel<B>, B>> {
    model:        CrnnModel<B>,
    optim:        O,
    model_config: CrnnConfig,
    codec:        LabelCodec,
    data:         DataManager,
    batcher:      OcrBatcher<B>,
    loss:         CtcLoss,
    decoder:      BeamSearchDecoder,
    checkpoints:  CheckpointManager,
    metrics:      MetricsLogger,
    settings:     TrainerSettings,
    device:       B::Device,
    step:         usize,
}

impl<B: AutodiffBackend, O: Optimizer<CrnnModel<B>, B> + Clone> Trainer<B, O> {
    /// Fresh parameters for `model_config`; call `restore` to resume instead
    pub fn build(
        model_config: CrnnConfig,
        codec:        LabelCodec,
        data:         DataManager,
        checkpoints:  CheckpointManager,
        settings:     TrainerSettings,
        optim:        O,
        device:       B::Device,
    ) -> Result<Self> {
        model_config.validate()?;
        let alphabet = codec.alphabet();
        if model_config.num_classes != alphabet.num_classes() {
            return Err(CrnnError::config(format!(
                "model has {} classes but the alphabet needs {}",
                model_config.num_classes,
                alphabet.num_classes()
            ))
            .into());
        }

        let decoder = BeamSearchDecoder::new(settings.beam_width, alphabet.blank_index())?;
        let loss    = CtcLossConfig::new(alphabet.blank_index()).init();
        let metrics = MetricsLogger::new(checkpoints.dir())?;
        let model: CrnnModel<B> = model_config.init(&device);

        tracing::info!(
            "Model ready: {} classes, {} time steps for width {}, batch size {}, {} training batches per pass",
            model_config.num_classes,
            model_config.max_char_count(),
            model_config.max_image_width,
            data.batch_size(),
            data.train_batches_per_pass(),
        );

        Ok(Self {
            model,
            optim,
            model_config,
            codec,
            data,
            batcher: OcrBatcher::new(device.clone()),
            loss,
            decoder,
            checkpoints,
            metrics,
            settings,
            device,
            step: 0,
        })
    }

    /// Loads the latest checkpoint, with its Adam moments when they
    /// were saved, and resumes its step
    pub fn restore(&mut self) -> Result<bool> {
        tracing::info!("Restoring");
        let (model, step) = self.checkpoints.load_latest(self.model.clone(), &self.device)?;
        self.model = model;
        match step {
            Some(step) => {
                tracing::info!("Checkpoint is valid, resuming at step {}", step);
                let optim_record = self
                    .checkpoints
                    .load_optimizer::<B, <O as Optimizer<CrnnModel<B>, B>>::Record>(step, &self.device)?;
                match optim_record {
                    Some(record) => self.optim = self.optim.clone().load_record(record),
                    None => tracing::warn!("Checkpoint {} has no optimizer state, Adam starts cold", step),
                }
                self.step = step;
                Ok(true)
            }
            None => {
                tracing::warn!("No checkpoint in '{}', starting fresh", self.checkpoints.dir().display());
                Ok(false)
            }
        }
    }

    pub fn step(&self) -> usize {
        self.step
    }

    /// images → time-major logits [T, batch, classes]
    pub fn forward(&self, batch: &OcrBatch<B>) -> Tensor<B, 3> {
        self.model.forward(batch.images.clone())
    }

    /// One optimiser update on `batch`.
    ///
    /// Loss and decoding are checked before the update is applied,
    /// so a failing batch leaves the parameters untouched.
    pub fn train_step(&mut self, batch: OcrBatch<B>) -> CrnnResult<StepOutput> {
        let (ctc, logits) = self.model.forward_loss(batch.images, &batch.targets, &self.loss);
        let loss = ctc.mean();

        let loss_value: f64 = loss.clone().into_scalar().elem::<f64>();
        if !loss_value.is_finite() {
            return Err(CrnnError::NonFiniteLoss(loss_value));
        }

        let decoded     = self.decoder.decode(logits.detach())?;
        let error_rate  = mean_edit_distance(&decoded.sequences, &batch.targets.sequences());
        let predictions = self.predictions(&batch.labels, &decoded)?;

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        self.model = self.optim.step(self.settings.learning_rate, self.model.clone(), grads);

        Ok(StepOutput { loss: loss_value, error_rate, ignored: ctc.ignored, predictions })
    }

    /// Runs `iteration_count` iterations starting at the current step
    pub fn train(&mut self, iteration_count: usize) -> Result<()> {
        tracing::info!("Training");
        for _ in 0..iteration_count {
            let metrics = self.train_iteration()?;
            self.finish_iteration(&metrics)?;
        }
        tracing::info!("Training complete!");
        Ok(())
    }

    fn train_iteration(&mut self) -> Result<EpochMetrics> {
        let step = self.step;
        tracing::info!("Processing iteration {}", step);
        let mut metrics = EpochMetrics::new(step);

        let mut batch_index = 0;
        while batch_index < self.settings.max_batches_per_epoch {
            let Some(raw) = self.data.next_train_batch() else { break };
            let result = match raw {
                Ok(raw) => {
                    let batch = self.batcher.batch(raw);
                    self.train_step(batch)
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(out) => {
                    for (truth, prediction) in &out.predictions {
                        tracing::info!("{} | {}", truth, prediction);
                    }
                    tracing::info!(
                        "---- {} | {} ---- loss {:.4} error rate {:.4}",
                        step, batch_index, out.loss, out.error_rate,
                    );
                    if out.ignored > 0 {
                        tracing::debug!("{} samples without a valid alignment were ignored", out.ignored);
                    }
                    metrics.record_batch(out.loss, out.error_rate, out.predictions);
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(iteration = step, batch = batch_index, "Skipping batch: {}", e);
                    metrics.record_skip();
                }
                Err(e) => {
                    tracing::error!(iteration = step, batch = batch_index, "Training failed: {}", e);
                    return Err(e).with_context(|| format!("iteration {step}, batch {batch_index}"));
                }
            }
            batch_index += 1;
        }
        tracing::debug!("Iteration {} stopped at train cursor {}", step, self.data.train_cursor());
        Ok(metrics)
    }

    fn finish_iteration(&mut self, metrics: &EpochMetrics) -> Result<()> {
        self.save()?;
        self.export()?;
        self.metrics.log(metrics)?;

        let max_weight: f64 = self.model.classifier.weight.val().max().into_scalar().elem::<f64>();
        println!(
            "[{}] Iteration loss: {:.4} (mean {:.4}) Error rate: {:.4} ({} batches, {} skipped)",
            metrics.step, metrics.loss, metrics.mean_loss(), metrics.error_rate, metrics.batches, metrics.skipped,
        );
        for (truth, prediction) in &metrics.samples {
            println!("    {truth} | {prediction}");
        }
        tracing::debug!("max weight {:.6}", max_weight);

        self.step += 1;
        Ok(())
    }

    /// Persists the parameters and the optimiser state as checkpoint ckp-{step}
    pub fn save(&self) -> Result<String> {
        self.checkpoints.save_optimizer::<B, _>(self.optim.to_record(), self.step)?;
        self.checkpoints.save_model(&self.model, self.step)
    }

    /// Writes the evaluation model and its manifest next to the checkpoints
    pub fn export(&self) -> Result<()> {
        let manifest = InferenceManifest::new(
            format!("{}.bin", self.settings.export_name),
            self.codec.alphabet().as_string(),
            self.model_config.max_image_width,
            self.model_config.max_char_count(),
            self.model_config.num_classes,
            self.decoder.beam_width(),
        );
        self.checkpoints
            .export_inference_model(&self.model.valid(), &self.settings.export_name, &manifest)?;
        Ok(())
    }

    /// One pass over the remaining test batches with the evaluation model
    pub fn test(&mut self) -> Result<TestSummary> {
        let evaluator = Evaluator::<B::InnerBackend>::new(
            self.device.clone(),
            self.codec.clone(),
            self.decoder.clone(),
        );
        evaluator.run(&self.model.valid(), &mut self.data)
    }

    fn predictions(&self, labels: &[String], decoded: &DecodedBatch) -> CrnnResult<Vec<(String, String)>> {
        labels
            .iter()
            .zip(decoded.to_dense())
            .take(self.settings.samples_to_log)
            .map(|(truth, row)| Ok((truth.clone(), self.codec.decode(&row)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{Autodiff, NdArray},
        optim::AdamConfig,
    };

    use crate::data::test_support::{lazy_image_manager, synthetic_samples};
    use crate::domain::alphabet::Alphabet;

    type TestBackend = Autodiff<NdArray>;

    const WIDTH: usize = 16;

    fn trainer(
        dir: &std::path::Path,
        sample_count: usize,
        ratio: f64,
    ) -> Trainer<TestBackend, impl Optimizer<CrnnModel<TestBackend>, TestBackend> + Clone> {
        let alphabet = Alphabet::new("ab").unwrap();
        let data = DataManager::new(&synthetic_samples(sample_count, WIDTH), 2, WIDTH, ratio).unwrap();
        let settings = TrainerSettings { max_batches_per_epoch: 2, beam_width: 4, ..Default::default() };
        Trainer::build(
            CrnnConfig::new(alphabet.num_classes(), WIDTH).with_hidden_size(4),
            LabelCodec::new(alphabet),
            data,
            CheckpointManager::new(dir).unwrap(),
            settings,
            AdamConfig::new().init::<TestBackend, CrnnModel<TestBackend>>(),
            Default::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_train_step_reports_finite_loss() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = trainer(dir.path(), 4, 1.0);
        let raw = t.data.next_train_batch().unwrap().unwrap();
        let batch = t.batcher.batch(raw);
        assert_eq!(t.forward(&batch).dims(), [3, 2, 3]);

        let out = t.train_step(batch).unwrap();
        assert!(out.loss.is_finite());
        assert!(out.loss > 0.0);
        assert_eq!(out.predictions.len(), 2);
        assert_eq!(out.predictions[0].0, "s0");
    }

    #[test]
    fn test_iterations_checkpoint_and_advance_step() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = trainer(dir.path(), 10, 0.8);
        t.train(2).unwrap();

        assert_eq!(t.step(), 2);
        // two capped iterations of 2 batches walk the 4-batch partition once
        assert_eq!(t.data.train_cursor(), 8);
        let steps = t.checkpoints.saved_steps().unwrap();
        assert_eq!(steps, vec![0, 1]);
        assert!(dir.path().join("frozen.json").exists());

        let csv = std::fs::read_to_string(dir.path().join("metrics.csv")).unwrap();
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn test_iteration_keeps_last_batch_samples() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = trainer(dir.path(), 10, 0.8);
        let metrics = t.train_iteration().unwrap();
        assert_eq!(metrics.batches, 2);
        assert_eq!(metrics.samples.len(), 2);
        assert_eq!(metrics.samples[0].0, "s2");
        assert_eq!(metrics.samples[1].0, "s3");
    }

    #[test]
    fn test_restore_resumes_step() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = trainer(dir.path(), 4, 1.0);
        assert!(!first.restore().unwrap());
        first.train(1).unwrap();
        assert!(dir.path().join("ckp-0-optim.mpk.gz").exists());

        let mut second = trainer(dir.path(), 4, 1.0);
        assert!(second.restore().unwrap());
        assert_eq!(second.step(), 0);
    }

    #[test]
    fn test_pass_covers_test_partition() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = trainer(dir.path(), 6, 0.5);
        let summary = t.test().unwrap();
        assert_eq!(summary.predictions.len(), 2); // 3 test samples, batch 2
        assert_eq!(summary.predictions[0].0, "s3");
        assert!(summary.mean_error_rate >= 0.0);
    }

    #[test]
    fn test_unreadable_image_skips_only_its_batch() {
        let images = tempfile::tempdir().unwrap();
        let model_dir = tempfile::tempdir().unwrap();
        let data = lazy_image_manager(images.path(), WIDTH, 1.0);
        std::fs::write(images.path().join("ab_2.png"), b"not a png").unwrap();

        let alphabet = Alphabet::new("ab").unwrap();
        let settings = TrainerSettings { beam_width: 4, ..Default::default() };
        let mut t = Trainer::<TestBackend, _>::build(
            CrnnConfig::new(alphabet.num_classes(), WIDTH).with_hidden_size(4),
            LabelCodec::new(alphabet),
            data,
            CheckpointManager::new(model_dir.path()).unwrap(),
            settings,
            AdamConfig::new().init::<TestBackend, CrnnModel<TestBackend>>(),
            Default::default(),
        )
        .unwrap();
        t.train(1).unwrap();

        assert_eq!(t.step(), 1);
        assert_eq!(t.checkpoints.saved_steps().unwrap(), vec![0]);
        let csv = std::fs::read_to_string(model_dir.path().join("metrics.csv")).unwrap();
        let row: Vec<&str> = csv.lines().nth(1).unwrap().split(',').collect();
        assert_eq!(row[0], "0");
        assert_eq!(row[3], "2"); // batches
        assert_eq!(row[4], "1"); // skipped
    }

    #[test]
    fn test_alphabet_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let data = DataManager::new(&synthetic_samples(4, WIDTH), 2, WIDTH, 1.0).unwrap();
        let result = Trainer::<TestBackend, _>::build(
            CrnnConfig::new(7, WIDTH),
            LabelCodec::new(Alphabet::new("ab").unwrap()),
            data,
            CheckpointManager::new(dir.path()).unwrap(),
            TrainerSettings::default(),
            AdamConfig::new().init::<TestBackend, CrnnModel<TestBackend>>(),
            Default::default(),
        );
        assert!(result.is_err());
    }
}
