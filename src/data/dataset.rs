use burn::data::dataset::Dataset;

use crate::domain::sample::Sample;

/// The full, ordered example set held by the data manager.
pub struct OcrDataset {
    samples: Vec<Sample>,
}

impl OcrDataset {
    pub fn new(samples: Vec<Sample>) -> Self { Self { samples } }
}

impl Dataset<Sample> for OcrDataset {
    fn get(&self, index: usize) -> Option<Sample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
