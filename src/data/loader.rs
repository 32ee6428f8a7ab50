// ============================================================
// Layer 4 — Example Directory Loader
// ============================================================
// Loads every image file of a directory as one sample.
//
// The label is the file name up to its first '_':
//
//   hello_0001.png  →  "hello"
//   42_x.jpg        →  "42"
//
// Per-file policy:
//   - label longer than max_char_count → skipped (cannot be decoded)
//   - image cannot be decoded          → skipped with a warning
//   - label has a non-alphabet symbol  → the whole load fails
//
// Files are visited in file-name order so the dataset order (and
// therefore the train/test split) is stable across machines.
//
// Reference: Rust Book §9 (Error Handling), §12 (I/O)

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::{label_codec::LabelCodec, preprocessor::ImagePreprocessor};
use crate::domain::{
    error::{CrnnError, CrnnResult},
    sample::{PixelSource, Sample},
    traits::SampleSource,
};

pub struct ExampleDirectory {
    dir:            PathBuf,
    preprocessor:   ImagePreprocessor,
    codec:          LabelCodec,
    max_char_count: usize,
    /// Keep only paths in memory and decode at batch time
    lazy:           bool,
}

impl ExampleDirectory {
    pub fn new(
        dir:            impl Into<PathBuf>,
        preprocessor:   ImagePreprocessor,
        codec:          LabelCodec,
        max_char_count: usize,
    ) -> Self {
        Self { dir: dir.into(), preprocessor, codec, max_char_count, lazy: false }
    }

    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    fn load_single(&self, path: &Path, label: &str) -> CrnnResult<Option<Sample>> {
        let pixels = if self.lazy {
            self.preprocessor.probe(path).map(|_| PixelSource::File(path.to_path_buf()))
        } else {
            self.preprocessor.load(path).map(|(grid, _)| PixelSource::Decoded(grid))
        };

        let pixels = match pixels {
            Ok(p) => p,
            Err(e @ CrnnError::ImageDecode { .. }) => {
                tracing::warn!("Skipping {}", e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let encoded = self.codec.encode(label).map_err(|e| {
            tracing::error!("Label '{}' of '{}' cannot be encoded", label, path.display());
            e
        })?;

        Ok(Some(Sample { pixels, label: label.to_string(), encoded }))
    }
}

/// The label part of a sample file name
pub fn label_from_file_name(name: &str) -> &str {
    name.split('_').next().unwrap_or(name)
}

impl SampleSource for ExampleDirectory {
    fn load_all(&self) -> CrnnResult<Vec<Sample>> {
        if !self.dir.is_dir() {
            return Err(CrnnError::config(format!(
                "examples path '{}' is not a directory",
                self.dir.display()
            )));
        }

        tracing::info!("Loading data from '{}'", self.dir.display());

        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut samples   = Vec::with_capacity(paths.len());
        let mut too_long  = 0usize;
        let mut undecoded = 0usize;

        for path in &paths {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                tracing::warn!("Skipping non UTF-8 file name '{}'", path.display());
                continue;
            };
            let label = label_from_file_name(name);

            if label.chars().count() > self.max_char_count {
                too_long += 1;
                continue;
            }

            match self.load_single(path, label)? {
                Some(sample) => samples.push(sample),
                None         => undecoded += 1,
            }
        }

        tracing::info!(
            "Loaded {} samples ({} labels too long, {} unreadable images)",
            samples.len(),
            too_long,
            undecoded,
        );
        Ok(samples)
    }
}
