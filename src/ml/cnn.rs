// ============================================================
// Layer 5 — Convolutional Feature Extractor
// ============================================================
// Seven convolutions over a [batch, 1, width, 32] image tensor:
//
//   conv 3x3 →  64, ReLU, max-pool 2x2 / (2,2)
//   conv 3x3 → 128, ReLU, max-pool 2x2 / (2,2)
//   conv 3x3 → 256, ReLU, batch-norm
//   conv 3x3 → 256, ReLU, max-pool 2x2 / (1,2) "same"
//   conv 3x3 → 512, ReLU, batch-norm
//   conv 3x3 → 512, ReLU, max-pool 2x2 / (1,2) "same"
//   conv 2x2 → 512, ReLU, valid
//
// Shape walk for the image axes (width W, height 32):
//
//   W    → W/2  → W/4  → W/4 → W/4 → W/4 - 1
//   32   → 16   → 8    → 4   → 2   → 1
//
// The last feature map is [batch, 512, T, 1] with
// T = max_char_count, the number of time steps the recurrent
// encoder and the CTC loss see. It is squeezed to [batch, T, 512].
//
// "same" pooling pads at the end of each axis only (the window is
// even), which a symmetric padding config cannot express, so the
// padding is applied by hand with zeros. Inputs to those pools are
// ReLU outputs, so zero padding never wins the max over real data.
//
// Reference: Shi, Bai & Yao (2015) CRNN, Burn Book §3 (Building Blocks)

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

/// Channels of the final feature map (the per-step feature width)
pub const FEATURE_CHANNELS: usize = 512;

const WIDTH_POOL_STRIDE: [usize; 2] = [1, 2];

#[derive(Config, Debug)]
pub struct FeatureExtractorConfig {
    #[config(default = 1)]
    pub in_channels: usize,
}

impl FeatureExtractorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> FeatureExtractor<B> {
        let conv3x3 = |c_in: usize, c_out: usize| {
            Conv2dConfig::new([c_in, c_out], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device)
        };

        FeatureExtractor {
            conv1: conv3x3(self.in_channels, 64),
            conv2: conv3x3(64, 128),
            conv3: conv3x3(128, 256),
            norm1: BatchNormConfig::new(256).init(device),
            conv4: conv3x3(256, 256),
            conv5: conv3x3(256, 512),
            norm2: BatchNormConfig::new(512).init(device),
            conv6: conv3x3(512, 512),
            conv7: Conv2dConfig::new([512, FEATURE_CHANNELS], [2, 2])
                .with_padding(PaddingConfig2d::Valid)
                .init(device),
            halve:      MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            halve_rows: MaxPool2dConfig::new([2, 2]).with_strides(WIDTH_POOL_STRIDE).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct FeatureExtractor<B: Backend> {
    pub conv1: Conv2d<B>,
    pub conv2: Conv2d<B>,
    pub conv3: Conv2d<B>,
    pub norm1: BatchNorm<B, 2>,
    pub conv4: Conv2d<B>,
    pub conv5: Conv2d<B>,
    pub norm2: BatchNorm<B, 2>,
    pub conv6: Conv2d<B>,
    pub conv7: Conv2d<B>,
    pub halve:      MaxPool2d,
    pub halve_rows: MaxPool2d,
}

impl<B: Backend> FeatureExtractor<B> {
    /// images: [batch, 1, width, 32] → features: [batch, T, 512]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 3> {
        let x = self.halve.forward(relu(self.conv1.forward(images)));
        let x = self.halve.forward(relu(self.conv2.forward(x)));
        let x = self.norm1.forward(relu(self.conv3.forward(x)));

        let x = relu(self.conv4.forward(x));
        let x = self.halve_rows.forward(pad_same(x, WIDTH_POOL_STRIDE));
        let x = self.norm2.forward(relu(self.conv5.forward(x)));

        let x = relu(self.conv6.forward(x));
        let x = self.halve_rows.forward(pad_same(x, WIDTH_POOL_STRIDE));
        let x = relu(self.conv7.forward(x));

        let [batch, channels, steps, cols] = x.dims();
        debug_assert_eq!(cols, 1, "feature map must collapse the 32-pixel axis");
        x.reshape([batch, channels, steps * cols]).swap_dims(1, 2)
    }
}

/// Number of time steps produced for images `max_image_width` wide
pub fn output_steps(max_image_width: usize) -> usize {
    let t = pool_valid(max_image_width, 2, 2);
    let t = pool_valid(t, 2, 2);
    let t = pool_same(t, WIDTH_POOL_STRIDE[0]);
    let t = pool_same(t, WIDTH_POOL_STRIDE[0]);
    t.saturating_sub(1)
}

fn pool_valid(len: usize, kernel: usize, stride: usize) -> usize {
    if len < kernel { 0 } else { (len - kernel) / stride + 1 }
}

fn pool_same(len: usize, stride: usize) -> usize {
    len.div_ceil(stride)
}

/// (before, after) padding of a 2-wide "same" window
fn same_padding(len: usize, stride: usize) -> (usize, usize) {
    let out   = pool_same(len, stride);
    let total = ((out.saturating_sub(1)) * stride + 2).saturating_sub(len);
    (total / 2, total - total / 2)
}

/// Zero-pad the two spatial axes for a 2x2 "same" pool
fn pad_same<B: Backend>(x: Tensor<B, 4>, strides: [usize; 2]) -> Tensor<B, 4> {
    let [_, _, rows, cols] = x.dims();
    let (top, bottom) = same_padding(rows, strides[0]);
    let (left, right) = same_padding(cols, strides[1]);
    let x = zero_pad(x, 2, top, bottom);
    zero_pad(x, 3, left, right)
}

fn zero_pad<B: Backend>(x: Tensor<B, 4>, dim: usize, before: usize, after: usize) -> Tensor<B, 4> {
    if before == 0 && after == 0 {
        return x;
    }
    let device = x.device();
    let shape  = x.dims();
    let mut parts = Vec::with_capacity(3);
    if before > 0 {
        let mut s = shape;
        s[dim] = before;
        parts.push(Tensor::zeros(s, &device));
    }
    parts.push(x);
    if after > 0 {
        let mut s = shape;
        s[dim] = after;
        parts.push(Tensor::zeros(s, &device));
    }
    Tensor::cat(parts, dim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_output_steps() {
        assert_eq!(output_steps(100), 24);
        assert_eq!(output_steps(16), 3);
        assert_eq!(output_steps(17), 3);
        assert_eq!(output_steps(8), 1);
        assert_eq!(output_steps(4), 0);
    }

    #[test]
    fn test_same_padding() {
        // stride 1: one extra row at the end
        assert_eq!(same_padding(25, 1), (0, 1));
        // stride 2 over an even axis needs none
        assert_eq!(same_padding(8, 2), (0, 0));
        // stride 2 over an odd axis pads the end
        assert_eq!(same_padding(5, 2), (0, 1));
    }

    #[test]
    fn test_zero_pad_shape() {
        let device = Default::default();
        let x = Tensor::<NdArray, 4>::ones([1, 2, 3, 4], &device);
        assert_eq!(zero_pad(x, 2, 0, 1).dims(), [1, 2, 4, 4]);
    }

    #[test]
    fn test_forward_shape_matches_output_steps() {
        let device = Default::default();
        let cnn    = FeatureExtractorConfig::new().init::<NdArray>(&device);
        let images = Tensor::<NdArray, 4>::ones([2, 1, 16, 32], &device);
        let out    = cnn.forward(images);
        assert_eq!(out.dims(), [2, output_steps(16), FEATURE_CHANNELS]);
    }
}
