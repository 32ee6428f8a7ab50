// ============================================================
// Layer 5 — Evaluator
// ============================================================
// One pass over the test partition with the evaluation model
// (inner backend, batch-norm running statistics, no autodiff).
//
// For every image the ground truth and the decoded prediction are
// printed; the pass reports the mean normalised edit distance over
// every evaluated sample.
//
// The test cursor is not rewound, a second pass on the same data
// manager sees no batches.

use anyhow::Result;
use burn::prelude::*;

use crate::data::{batcher::OcrBatcher, label_codec::LabelCodec, manager::DataManager};
use crate::ml::{decoder::BeamSearchDecoder, edit_distance::normalized_edit_distance, model::CrnnModel};

#[derive(Debug, Clone, Default)]
pub struct TestSummary {
    /// (ground truth, prediction) for every evaluated image
    pub predictions:     Vec<(String, String)>,
    pub mean_error_rate: f64,
    pub batches:         usize,
    pub skipped:         usize,
}

pub struct Evaluator<B: Backend> {
    batcher: OcrBatcher<B>,
    codec:   LabelCodec,
    decoder: BeamSearchDecoder,
}

impl<B: Backend> Evaluator<B> {
    pub fn new(device: B::Device, codec: LabelCodec, decoder: BeamSearchDecoder) -> Self {
        Self { batcher: OcrBatcher::new(device), codec, decoder }
    }

    pub fn run(&self, model: &CrnnModel<B>, data: &mut DataManager) -> Result<TestSummary> {
        tracing::info!("Testing {} samples", data.test_count());
        let mut summary   = TestSummary::default();
        let mut distances = Vec::new();

        for raw in data.test_batches() {
            let raw = match raw {
                Ok(raw) => raw,
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(batch = summary.batches + summary.skipped, "Skipping test batch: {}", e);
                    summary.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let batch   = self.batcher.batch(raw);
            let logits  = model.forward(batch.images);
            let decoded = self.decoder.decode(logits)?;
            let truths  = batch.targets.sequences();
            let dense   = decoded.to_dense();

            for (i, label) in batch.labels.iter().enumerate() {
                let prediction = match self.codec.decode(&dense[i]) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("Cannot decode prediction for '{}': {}", label, e);
                        String::new()
                    }
                };
                println!("Ground truth {label}");
                println!("Test result {prediction}");

                distances.push(normalized_edit_distance(&decoded.sequences[i], &truths[i]));
                summary.predictions.push((label.clone(), prediction));
            }
            summary.batches += 1;
        }

        if !distances.is_empty() {
            summary.mean_error_rate = distances.iter().sum::<f64>() / distances.len() as f64;
        }
        tracing::info!(
            "Test pass done: {} samples, mean edit distance {:.4}",
            distances.len(),
            summary.mean_error_rate,
        );
        Ok(summary)
    }
}
