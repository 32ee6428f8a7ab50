// ============================================================
// Layer 4 — Image Preprocessor
// ============================================================
// Normalises a raw line image into a [32, max_width] grayscale
// canvas.
//
//   natural width > max_width:
//       resized straight to [32, max_width] (aspect ratio lost)
//
//   natural width <= max_width:
//       scaled so the height is 32, width follows the aspect
//       ratio, then copied left-aligned into a zero canvas.
//       Columns past max_width are cut off.
//
// The second value returned is the width actually covered by
// image content before padding.
//
// Reference: image crate documentation (imageops::resize)

use std::path::Path;

use image::{imageops::{self, FilterType}, DynamicImage, GrayImage};

use crate::domain::{
    error::{CrnnError, CrnnResult},
    sample::{PixelGrid, IMAGE_HEIGHT},
};

#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    max_width: usize,
    filter:    FilterType,
}

impl ImagePreprocessor {
    pub fn new(max_width: usize) -> Self {
        Self { max_width, filter: FilterType::CatmullRom }
    }

    pub fn max_width(&self) -> usize {
        self.max_width
    }

    /// Decode and resize one image file
    pub fn load(&self, path: &Path) -> CrnnResult<(PixelGrid, usize)> {
        let image = image::open(path).map_err(|e| CrnnError::ImageDecode {
            path:    path.to_path_buf(),
            message: e.to_string(),
        })?;
        self.resize(&image).map_err(|e| match e {
            CrnnError::Configuration(message) => CrnnError::ImageDecode {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// Cheap validity check used by lazy loading: reads the header only.
    pub fn probe(&self, path: &Path) -> CrnnResult<()> {
        match image::image_dimensions(path) {
            Ok((w, h)) if w > 0 && h > 0 => Ok(()),
            Ok((w, h)) => Err(CrnnError::ImageDecode {
                path:    path.to_path_buf(),
                message: format!("empty image ({w}x{h})"),
            }),
            Err(e) => Err(CrnnError::ImageDecode {
                path:    path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    pub fn resize(&self, image: &DynamicImage) -> CrnnResult<(PixelGrid, usize)> {
        let gray = image.to_luma8();
        let (cols, rows) = gray.dimensions();
        if cols == 0 || rows == 0 {
            return Err(CrnnError::config(format!("empty image ({cols}x{rows})")));
        }

        let height = IMAGE_HEIGHT as u32;

        if cols as usize > self.max_width {
            let resized = imageops::resize(&gray, self.max_width as u32, height, self.filter);
            let mut grid = PixelGrid::zeros(IMAGE_HEIGHT, self.max_width);
            blit(&resized, &mut grid, self.max_width);
            return Ok((grid, self.max_width));
        }

        let ratio    = IMAGE_HEIGHT as f64 / rows as f64;
        let scaled_w = ((cols as f64 * ratio) as u32).max(1);
        let resized  = imageops::resize(&gray, scaled_w, height, self.filter);

        let effective = (scaled_w as usize).min(self.max_width);
        let mut grid  = PixelGrid::zeros(IMAGE_HEIGHT, self.max_width);
        blit(&resized, &mut grid, effective);

        Ok((grid, effective))
    }
}

/// Copy the first `columns` columns of `src` into `dst`
fn blit(src: &GrayImage, dst: &mut PixelGrid, columns: usize) {
    for row in 0..IMAGE_HEIGHT {
        for col in 0..columns {
            let px = src.get_pixel(col as u32, row as u32).0[0];
            dst.set(row, col, px as f32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, RgbImage};

    fn white(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([255])))
    }

    #[test]
    fn test_narrow_image_is_padded() {
        let p = ImagePreprocessor::new(100);
        let (grid, effective) = p.resize(&white(20, 32)).unwrap();
        assert_eq!(grid.width(), 100);
        assert_eq!(grid.height(), IMAGE_HEIGHT);
        assert_eq!(effective, 20);
        assert_eq!(grid.get(10, 19), 255.0);
        assert_eq!(grid.get(10, 20), 0.0);
        assert_eq!(grid.get(31, 99), 0.0);
    }

    #[test]
    fn test_height_is_scaled_to_32() {
        let p = ImagePreprocessor::new(100);
        // 16 rows → ratio 2 → 40 columns
        let (_, effective) = p.resize(&white(20, 16)).unwrap();
        assert_eq!(effective, 40);
    }

    #[test]
    fn test_wide_image_fills_canvas() {
        let p = ImagePreprocessor::new(50);
        let (grid, effective) = p.resize(&white(300, 40)).unwrap();
        assert_eq!(grid.width(), 50);
        assert_eq!(grid.height(), IMAGE_HEIGHT);
        assert_eq!(effective, 50);
        assert_eq!(grid.get(0, 49), 255.0);
    }

    #[test]
    fn test_upscaled_overflow_is_truncated() {
        let p = ImagePreprocessor::new(30);
        // 20x8 → ratio 4 → 80 columns, only 30 fit
        let (grid, effective) = p.resize(&white(20, 8)).unwrap();
        assert_eq!(grid.width(), 30);
        assert_eq!(effective, 30);
    }

    #[test]
    fn test_width_always_equals_max_width() {
        let p = ImagePreprocessor::new(64);
        for (w, h) in [(1, 1), (10, 50), (64, 32), (65, 32), (500, 10)] {
            let (grid, _) = p.resize(&white(w, h)).unwrap();
            assert_eq!(grid.width(), 64, "input {w}x{h}");
        }
    }

    #[test]
    fn test_color_is_converted_to_gray() {
        let p   = ImagePreprocessor::new(40);
        let rgb = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, image::Rgb([255, 255, 255])));
        let (grid, _) = p.resize(&rgb).unwrap();
        assert_eq!(grid.get(5, 5), 255.0);
    }

    #[test]
    fn test_unreadable_file_is_decode_error() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("a_1.png");
        std::fs::write(&path, b"not an image").unwrap();
        let p = ImagePreprocessor::new(40);
        assert!(matches!(p.load(&path), Err(CrnnError::ImageDecode { .. })));
        assert!(matches!(p.probe(&path), Err(CrnnError::ImageDecode { .. })));
    }
}
