// ============================================================
// Layer 4 — OCR Batcher
// ============================================================
// Turns a host-side RawBatch into device tensors.
//
// Layout:
//   RawBatch.pixels  [N][W][32]  (column-major images)
//         │
//         ▼
//   images           [N, 1, W, 32]   (NCHW, 1 channel)
//
// The width axis sits where convolution expects "height", so the
// pooling arithmetic of the feature extractor shrinks it into the
// time axis of the recurrent encoder.
//
// Reference: Burn Book §4 (Batcher)

use burn::prelude::*;

use crate::data::manager::RawBatch;
use crate::domain::{labels::EncodedLabelSet, sample::IMAGE_HEIGHT};

#[derive(Debug, Clone)]
pub struct OcrBatch<B: Backend> {
    /// [batch, 1, width, 32]
    pub images:  Tensor<B, 4>,
    /// Ground-truth label text, one per image
    pub labels:  Vec<String>,
    /// Encoded labels for the loss
    pub targets: EncodedLabelSet,
}

impl<B: Backend> OcrBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.labels.len()
    }
}

#[derive(Clone, Debug)]
pub struct OcrBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> OcrBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    pub fn batch(&self, raw: RawBatch) -> OcrBatch<B> {
        let batch_size = raw.batch_size();

        let images = Tensor::<B, 1>::from_floats(raw.pixels.as_slice(), &self.device)
            .reshape([batch_size, 1, raw.width, IMAGE_HEIGHT]);

        OcrBatch { images, labels: raw.labels, targets: raw.targets }
    }
}
