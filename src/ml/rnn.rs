// ============================================================
// Layer 5 — Bidirectional Sequence Encoder
// ============================================================
// Two stacked bidirectional LSTMs over the CNN feature columns.
//
//   [batch, T, 512] → BiLSTM(256 + 256) → BiLSTM(256 + 256) → [batch, T, 512]
//
// Each layer runs a forward and a backward LSTM over the same
// sequence and concatenates their outputs along the feature axis,
// so every time step sees context from both sides of the line.
// Time steps are never mixed with the batch axis.
//
// Reference: Graves & Schmidhuber (2005) Bidirectional LSTM

use burn::{
    nn::{BiLstm, BiLstmConfig},
    prelude::*,
};

#[derive(Config, Debug)]
pub struct SequenceEncoderConfig {
    pub d_input: usize,
    #[config(default = 256)]
    pub d_hidden: usize,
    #[config(default = 2)]
    pub num_layers: usize,
}

impl SequenceEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SequenceEncoder<B> {
        let layers = (0..self.num_layers)
            .map(|i| {
                let d_input = if i == 0 { self.d_input } else { self.d_output() };
                BiLstmConfig::new(d_input, self.d_hidden, true).init(device)
            })
            .collect();
        SequenceEncoder { layers }
    }

    /// Feature width of the encoder output
    pub fn d_output(&self) -> usize {
        2 * self.d_hidden
    }
}

#[derive(Module, Debug)]
pub struct SequenceEncoder<B: Backend> {
    pub layers: Vec<BiLstm<B>>,
}

impl<B: Backend> SequenceEncoder<B> {
    /// features: [batch, T, d_input] → [batch, T, 2 * d_hidden]
    pub fn forward(&self, features: Tensor<B, 3>) -> Tensor<B, 3> {
        let mut x = features;
        for layer in &self.layers {
            let (output, _state) = layer.forward(x, None);
            x = output;
        }
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_output_concatenates_directions() {
        let device  = Default::default();
        let config  = SequenceEncoderConfig::new(12).with_d_hidden(5);
        let encoder = config.init::<NdArray>(&device);
        assert_eq!(encoder.layers.len(), 2);

        let out = encoder.forward(Tensor::<NdArray, 3>::ones([3, 4, 12], &device));
        assert_eq!(out.dims(), [3, 4, config.d_output()]);
    }
}
