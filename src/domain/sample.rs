// ============================================================
// Layer 3 — Sample Domain Types
// ============================================================
// One labelled text-line image.
//
//   PixelGrid   — a fixed-height, fixed-width grayscale canvas
//                 stored row-major as [IMAGE_HEIGHT][width]
//   PixelSource — either the decoded canvas (eager loading) or
//                 the file it will be decoded from (lazy loading)
//   Sample      — pixels + label text + encoded label
//
// Reference: Rust Book §5 (Structs), §6 (Enums)

use std::path::PathBuf;

/// Every line image is normalised to this many pixel rows
pub const IMAGE_HEIGHT: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct PixelGrid {
    width:  usize,
    height: usize,
    /// Raw 0-255 intensities, row-major
    data:   Vec<f32>,
}

impl PixelGrid {
    /// A zero-filled canvas
    pub fn zeros(height: usize, width: usize) -> Self {
        Self { width, height, data: vec![0.0; width * height] }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.width + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        self.data[row * self.width + col] = value;
    }

    /// Pixels in column-major order: all rows of column 0, then column 1, ...
    /// This is the [width, height] layout the feature extractor consumes,
    /// where the width axis becomes the time axis.
    pub fn to_column_major(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.data.len());
        for col in 0..self.width {
            for row in 0..self.height {
                out.push(self.get(row, col));
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
pub enum PixelSource {
    Decoded(PixelGrid),
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Sample {
    pub pixels:  PixelSource,
    /// Label text as derived from the file name
    pub label:   String,
    /// Alphabet indices of the normalised label
    pub encoded: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_major_layout() {
        let mut g = PixelGrid::zeros(2, 3);
        g.set(0, 1, 1.0);
        g.set(1, 2, 2.0);
        // columns: [0,0] [1,0] [0,2]
        assert_eq!(g.to_column_major(), vec![0.0, 0.0, 1.0, 0.0, 0.0, 2.0]);
    }
}
