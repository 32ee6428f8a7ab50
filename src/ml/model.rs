use burn::{
    nn::{Initializer, Linear, LinearConfig},
    prelude::*,
};

use crate::domain::error::{CrnnError, CrnnResult};
use crate::domain::labels::EncodedLabelSet;
use crate::ml::cnn::{self, FeatureExtractor, FeatureExtractorConfig, FEATURE_CHANNELS};
use crate::ml::ctc::{CtcLoss, CtcOutput};
use crate::ml::rnn::{SequenceEncoder, SequenceEncoderConfig};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct CrnnConfig {
    /// Alphabet size + 1 (the CTC blank is the last class)
    pub num_classes:     usize,
    pub max_image_width: usize,
    #[config(default = 256)]
    pub hidden_size:     usize,
    #[config(default = 2)]
    pub num_rnn_layers:  usize,
}

impl CrnnConfig {
    /// Time steps the network emits for one image
    pub fn max_char_count(&self) -> usize {
        cnn::output_steps(self.max_image_width)
    }

    /// Rejects widths too narrow to produce a single time step
    pub fn validate(&self) -> CrnnResult<()> {
        if self.num_classes < 2 {
            return Err(CrnnError::config("alphabet must contain at least one symbol"));
        }
        if self.max_char_count() == 0 {
            return Err(CrnnError::config(format!(
                "max image width {} leaves no time steps after the CNN",
                self.max_image_width
            )));
        }
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> CrnnModel<B> {
        let cnn = FeatureExtractorConfig::new().init(device);
        let rnn_cfg = SequenceEncoderConfig::new(FEATURE_CHANNELS)
            .with_d_hidden(self.hidden_size)
            .with_num_layers(self.num_rnn_layers);
        let rnn = rnn_cfg.init(device);
        // Projection to class scores, weights ~ N(0, 0.1)
        let classifier = LinearConfig::new(rnn_cfg.d_output(), self.num_classes)
            .with_initializer(Initializer::Normal { mean: 0.0, std: 0.1 })
            .init(device);
        CrnnModel {
            cnn, rnn, classifier,
            num_classes: self.num_classes,
            max_char_count: self.max_char_count(),
        }
    }
}

#[derive(Module, Debug)]
pub struct CrnnModel<B: Backend> {
    pub cnn:            FeatureExtractor<B>,
    pub rnn:            SequenceEncoder<B>,
    pub classifier:     Linear<B>,
    pub num_classes:    usize,
    pub max_char_count: usize,
}

impl<B: Backend> CrnnModel<B> {
    /// images: [batch, 1, width, 32] → logits: [T, batch, num_classes]
    ///
    /// Time-major, the layout the CTC loss and the decoder consume.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 3> {
        let features = self.cnn.forward(images);    // [batch, T, 512]
        let encoded  = self.rnn.forward(features);  // [batch, T, 512]
        let logits   = self.classifier.forward(encoded);
        logits.swap_dims(0, 1)
    }

    pub fn forward_loss(
        &self,
        images:  Tensor<B, 4>,
        targets: &EncodedLabelSet,
        loss:    &CtcLoss,
    ) -> (CtcOutput<B>, Tensor<B, 3>) {
        let logits = self.forward(images);
        (loss.forward(logits.clone(), targets), logits)
    }
}
