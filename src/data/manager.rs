// ============================================================
// Layer 4 — Data Manager
// ============================================================
// Holds the whole example set and hands out fixed-size batches
// in load order.
//
//   samples:  [ train ........ | test ...... ]
//             0           test_offset     total
//
// Train cursor:
//   starts at 0, advances by batch_size. When fewer than
//   batch_size samples remain before test_offset the traversal
//   ends (None) and the cursor is reset to 0. Stopping early
//   leaves the cursor where it stopped, so the next traversal
//   continues from there.
//
// Test cursor:
//   starts at test_offset and is never reset automatically.
//
// A trailing group smaller than batch_size is never yielded.

use std::{
    ops::Range,
    path::PathBuf,
};

use burn::data::dataset::Dataset;

use crate::data::{
    dataset::OcrDataset,
    label_codec::LabelCodec,
    loader::ExampleDirectory,
    preprocessor::ImagePreprocessor,
    splitter,
};
use crate::domain::{
    alphabet::Alphabet,
    error::{CrnnError, CrnnResult},
    labels::EncodedLabelSet,
    sample::{PixelSource, Sample, IMAGE_HEIGHT},
    traits::SampleSource,
};

/// One batch on the host, before it is turned into tensors
#[derive(Debug, Clone)]
pub struct RawBatch {
    pub labels:  Vec<String>,
    pub targets: EncodedLabelSet,
    /// [batch][width][IMAGE_HEIGHT], flattened
    pub pixels:  Vec<f32>,
    pub width:   usize,
}

impl RawBatch {
    pub fn batch_size(&self) -> usize {
        self.labels.len()
    }
}

pub struct DataManager {
    dataset:             OcrDataset,
    preprocessor:        ImagePreprocessor,
    batch_size:          usize,
    test_offset:         usize,
    current_train_offset: usize,
    current_test_offset: usize,
}

impl DataManager {
    pub fn new(
        source:           &impl SampleSource,
        batch_size:       usize,
        max_image_width:  usize,
        train_test_ratio: f64,
    ) -> CrnnResult<Self> {
        splitter::validate_ratio(train_test_ratio)?;
        if batch_size == 0 {
            return Err(CrnnError::config("batch size must be at least 1"));
        }

        let dataset = OcrDataset::new(source.load_all()?);
        let (train, _) = splitter::partitions(dataset.len(), train_test_ratio)?;

        tracing::info!(
            "Data manager ready: {} samples, {} train / {} test, batch size {}",
            dataset.len(),
            train.end,
            dataset.len() - train.end,
            batch_size,
        );

        Ok(Self {
            dataset,
            preprocessor: ImagePreprocessor::new(max_image_width),
            batch_size,
            test_offset: train.end,
            current_train_offset: 0,
            current_test_offset: train.end,
        })
    }

    /// Load `examples_path` and split it
    pub fn from_directory(
        batch_size:       usize,
        examples_path:    impl Into<PathBuf>,
        max_image_width:  usize,
        train_test_ratio: f64,
        max_char_count:   usize,
        alphabet:         Alphabet,
        lazy:             bool,
    ) -> CrnnResult<Self> {
        splitter::validate_ratio(train_test_ratio)?;
        let source = ExampleDirectory::new(
            examples_path,
            ImagePreprocessor::new(max_image_width),
            LabelCodec::new(alphabet),
            max_char_count,
        )
        .with_lazy(lazy);
        Self::new(&source, batch_size, max_image_width, train_test_ratio)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn train_count(&self) -> usize {
        self.test_offset
    }

    pub fn test_count(&self) -> usize {
        self.dataset.len() - self.test_offset
    }

    pub fn train_cursor(&self) -> usize {
        self.current_train_offset
    }

    /// Batches in one complete train traversal from cursor 0
    pub fn train_batches_per_pass(&self) -> usize {
        self.train_count() / self.batch_size
    }

    /// Next training batch, or None (and cursor back to 0) at the end of a pass
    pub fn next_train_batch(&mut self) -> Option<CrnnResult<RawBatch>> {
        let start = self.current_train_offset;
        let end   = start + self.batch_size;
        if end > self.test_offset {
            self.current_train_offset = 0;
            return None;
        }
        self.current_train_offset = end;
        Some(self.assemble(start..end))
    }

    /// Next test batch, or None once the test partition is used up
    pub fn next_test_batch(&mut self) -> Option<CrnnResult<RawBatch>> {
        let start = self.current_test_offset;
        let end   = start + self.batch_size;
        if end > self.dataset.len() {
            return None;
        }
        self.current_test_offset = end;
        Some(self.assemble(start..end))
    }

    pub fn test_batches(&mut self) -> TestBatches<'_> {
        TestBatches { manager: self }
    }

    fn assemble(&self, range: Range<usize>) -> CrnnResult<RawBatch> {
        let width = self.preprocessor.max_width();
        let mut labels    = Vec::with_capacity(range.len());
        let mut sequences = Vec::with_capacity(range.len());
        let mut pixels    = Vec::with_capacity(range.len() * width * IMAGE_HEIGHT);

        for index in range {
            let Sample { pixels: source, label, encoded } = self
                .dataset
                .get(index)
                .ok_or_else(|| CrnnError::config(format!("sample {index} out of range")))?;

            let grid = match source {
                PixelSource::Decoded(grid) => grid,
                PixelSource::File(path)    => self.preprocessor.load(&path)?.0,
            };
            pixels.extend(grid.to_column_major());
            labels.push(label);
            sequences.push(encoded);
        }

        Ok(RawBatch {
            labels,
            targets: EncodedLabelSet::from_sequences(&sequences),
            pixels,
            width,
        })
    }
}

/// The remaining test batches from the current test cursor
pub struct TestBatches<'a> {
    manager: &'a mut DataManager,
}

impl Iterator for TestBatches<'_> {
    type Item = CrnnResult<RawBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.manager.next_test_batch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::{synthetic_samples, write_png};

    fn manager(count: usize, batch_size: usize, ratio: f64) -> DataManager {
        DataManager::new(&synthetic_samples(count, 8), batch_size, 8, ratio).unwrap()
    }

    fn train_pass(m: &mut DataManager) -> Vec<RawBatch> {
        std::iter::from_fn(|| m.next_train_batch()).map(Result::unwrap).collect()
    }

    #[test]
    fn test_offset_and_counts() {
        let m = manager(10, 2, 0.75);
        assert_eq!(m.train_count(), 7);
        assert_eq!(m.test_count(), 3);
    }

    #[test]
    fn test_train_pass_drops_partial_batch_and_resets() {
        let mut m = manager(10, 2, 0.75);
        let batches = train_pass(&mut m);
        assert_eq!(batches.len(), 3); // floor(7 / 2)
        assert!(batches.iter().all(|b| b.batch_size() == 2));
        assert_eq!(m.train_cursor(), 0);
        assert_eq!(m.train_batches_per_pass(), 3);
    }

    #[test]
    fn test_batches_are_sequential() {
        let mut m = manager(6, 3, 1.0);
        let labels: Vec<Vec<String>> = train_pass(&mut m).into_iter().map(|b| b.labels).collect();
        assert_eq!(labels[0], vec!["s0", "s1", "s2"]);
        assert_eq!(labels[1], vec!["s3", "s4", "s5"]);
    }

    #[test]
    fn test_interrupted_pass_resumes_from_cursor() {
        let mut m = manager(8, 2, 1.0);
        let first = m.next_train_batch().unwrap().unwrap();
        assert_eq!(first.labels[0], "s0");
        assert_eq!(m.train_cursor(), 2);
        let rest = train_pass(&mut m);
        assert_eq!(rest.len(), 3);
        assert_eq!(rest[0].labels[0], "s2");
        assert_eq!(m.train_cursor(), 0);
    }

    #[test]
    fn test_end_of_pass_starts_over() {
        let mut m = manager(4, 2, 1.0);
        assert!(m.next_train_batch().is_some());
        assert!(m.next_train_batch().is_some());
        assert!(m.next_train_batch().is_none());
        let again = m.next_train_batch().unwrap().unwrap();
        assert_eq!(again.labels[0], "s0");
    }

    #[test]
    fn test_test_pass_does_not_reset() {
        let mut m = manager(10, 2, 0.5);
        assert_eq!(m.test_batches().count(), 2); // 5 test samples → 2 batches
        assert_eq!(m.test_batches().count(), 0);
        assert!(m.next_test_batch().is_none());
    }

    #[test]
    fn test_batch_pixels_and_targets() {
        let mut m = manager(4, 2, 1.0);
        let batch = m.next_train_batch().unwrap().unwrap();
        assert_eq!(batch.width, 8);
        assert_eq!(batch.pixels.len(), 2 * 8 * IMAGE_HEIGHT);
        assert_eq!(batch.targets.batch_size(), 2);
        assert_eq!(batch.targets.sequence(1), vec![1]);
    }

    #[test]
    fn test_invalid_configuration() {
        let source = synthetic_samples(4, 8);
        assert!(matches!(DataManager::new(&source, 2, 8, 1.2), Err(CrnnError::Configuration(_))));
        assert!(matches!(DataManager::new(&source, 0, 8, 0.5), Err(CrnnError::Configuration(_))));
    }

    #[test]
    fn test_two_file_directory_scenario() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a_1.png", 12, 32);
        write_png(dir.path(), "b_1.png", 12, 32);

        let alphabet = Alphabet::new("ab").unwrap();
        let mut m = DataManager::from_directory(2, dir.path(), 16, 1.0, 3, alphabet, false).unwrap();

        assert_eq!(m.train_count(), 2);
        let train = train_pass(&mut m);
        assert_eq!(train.len(), 1);
        assert_eq!(train[0].labels, vec!["a", "b"]);
        assert_eq!(m.test_batches().count(), 0);
    }

    #[test]
    fn test_lazy_directory_decodes_at_batch_time() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "ab_1.png", 12, 32);
        write_png(dir.path(), "ba_1.png", 12, 32);

        let alphabet = Alphabet::new("ab").unwrap();
        let mut m = DataManager::from_directory(2, dir.path(), 16, 1.0, 3, alphabet, true).unwrap();
        let batch = m.next_train_batch().unwrap().unwrap();
        // first column of the first sample carries image content
        assert_eq!(batch.pixels[0], 200.0);
        assert_eq!(batch.targets.sequence(0), vec![0, 1]);
    }
}
