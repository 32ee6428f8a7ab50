// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains the network, the loss and the training
// loop. Tensor code outside this layer is limited to the
// batcher that builds input tensors.
//
// What's in this layer:
//
//   cnn.rs           — convolutional feature extractor
//                      7 convolutions, 4 max-pools, 2 batch-norms
//                      [batch, 1, W, 32] → [batch, T, 512]
//
//   rnn.rs           — two stacked bidirectional LSTMs
//                      [batch, T, 512] → [batch, T, 512]
//
//   model.rs         — CrnnModel: CNN + RNN + linear classifier
//                      head producing time-major class logits
//
//   ctc.rs           — connectionist temporal classification loss
//                      in log space, differentiable through autodiff
//
//   decoder.rs       — CTC prefix beam search, dense -1 padded output
//
//   edit_distance.rs — normalised Levenshtein distance (error rate)
//
//   trainer.rs       — iterations, Adam updates, checkpoints, export
//
//   evaluator.rs     — test pass with the evaluation model
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Shi, Bai & Yao (2015) CRNN
//            Graves et al. (2006) CTC

/// Convolutional feature extractor
pub mod cnn;

/// CTC alignment loss
pub mod ctc;

/// CTC beam search decoder
pub mod decoder;

/// Levenshtein distance and error rate
pub mod edit_distance;

/// Test pass over the held-out partition
pub mod evaluator;

/// CRNN model architecture
pub mod model;

/// Bidirectional LSTM sequence encoder
pub mod rnn;

/// Training loop with checkpointing and export
pub mod trainer;
