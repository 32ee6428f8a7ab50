// ============================================================
// Layer 5 — CTC Alignment Loss
// ============================================================
// Negative log-likelihood of a label sequence summed over every
// frame-level alignment that collapses to it (Graves et al. 2006).
//
// A label l of length L is extended with blanks:
//
//   l      =    a     b     b
//   l'     = ␣  a  ␣  b  ␣  b  ␣        (S = 2L + 1 states)
//
// Forward variable, in log space:
//
//   α₀(0) = y₀(␣)         α₀(1) = y₀(l₁)
//   αₜ(s) = yₜ(l'ₛ) · [ αₜ₋₁(s) + αₜ₋₁(s-1) + αₜ₋₁(s-2)·skip(s) ]
//   skip(s) = l'ₛ ≠ ␣  and  l'ₛ ≠ l'ₛ₋₂
//
//   loss = -log( α_T-1(S-1) + α_T-1(S-2) )
//
// The recursion runs over the whole batch at once: every sample is
// padded to the longest label and the states beyond 2L are masked
// with LOG_ZERO. All masks are additive, so the computation stays a
// chain of differentiable tensor ops and autodiff supplies the
// gradient with respect to the logits.
//
// A label needs L + (number of adjacent repeats) frames. Samples
// with fewer frames than that have no valid alignment; they are
// ignored (zero loss, zero gradient) rather than poisoning the batch.
//
// Reference: Graves et al. (2006) Connectionist Temporal Classification

use burn::{prelude::*, tensor::activation::log_softmax};

use crate::domain::labels::EncodedLabelSet;

/// Stand-in for log(0) that keeps exp/log finite
const LOG_ZERO: f32 = -1.0e30;

#[derive(Config, Debug)]
pub struct CtcLossConfig {
    /// Class index of the blank, the last class of the classifier
    pub blank: usize,
}

impl CtcLossConfig {
    pub fn init(&self) -> CtcLoss {
        CtcLoss { blank: self.blank }
    }
}

#[derive(Clone, Debug)]
pub struct CtcLoss {
    blank: usize,
}

pub struct CtcOutput<B: Backend> {
    /// Negative log-likelihood per sample, 0 for ignored samples
    pub per_sample: Tensor<B, 1>,
    /// Samples whose label cannot be aligned within T frames
    pub ignored:    usize,
}

impl<B: Backend> CtcOutput<B> {
    /// Batch loss: mean over every sample, ignored ones count as 0
    pub fn mean(&self) -> Tensor<B, 1> {
        self.per_sample.clone().mean()
    }
}

impl CtcLoss {
    /// logits: [T, batch, classes] (unnormalised, time-major)
    pub fn forward<B: Backend>(&self, logits: Tensor<B, 3>, targets: &EncodedLabelSet) -> CtcOutput<B> {
        let [steps, batch, classes] = logits.dims();
        let device = logits.device();

        let sequences = targets.sequences();
        debug_assert_eq!(sequences.len(), batch, "one label per image");

        let lattice = Lattice::build(&sequences, targets.max_len(), self.blank, steps);
        if steps == 0 {
            return CtcOutput { per_sample: Tensor::zeros([batch], &device), ignored: batch };
        }
        let states = lattice.states;

        let to_float = |v: &[f32], shape: [usize; 2]| Tensor::<B, 1>::from_floats(v, &device).reshape(shape);
        let to_int   = |v: &[i32], shape: [usize; 2]| Tensor::<B, 1, Int>::from_ints(v, &device).reshape(shape);

        let extended   = to_int(&lattice.extended, [batch, states]);
        let skip       = to_float(&lattice.skip, [batch, states]);
        let valid      = to_float(&lattice.valid, [batch, states]);
        let init       = to_float(&lattice.init, [batch, states]);
        let finals     = to_int(&lattice.finals, [batch, 2]);
        let final_mask = to_float(&lattice.final_mask, [batch, 2]);
        let weights    = Tensor::<B, 1>::from_floats(lattice.weights.as_slice(), &device);

        let log_probs = log_softmax(logits, 2);
        // yₜ(l'ₛ) for every sample and state: [batch, states]
        let emit = |t: usize| {
            log_probs
                .clone()
                .slice([t..t + 1, 0..batch, 0..classes])
                .reshape([batch, classes])
                .gather(1, extended.clone())
        };

        let mut alpha = emit(0) + init + valid.clone();
        for t in 1..steps {
            let stay  = alpha.clone();
            let step  = shift_right(alpha.clone(), 1);
            let jump  = shift_right(alpha, 2) + skip.clone();
            alpha = log_sum_exp3(stay, step, jump) + emit(t) + valid.clone();
        }

        let ends = alpha.gather(1, finals) + final_mask; // [batch, 2]
        let max  = ends.clone().max_dim(1).detach();
        let log_likelihood = ((ends - max.clone()).exp().sum_dim(1).log() + max).reshape([batch]);

        CtcOutput { per_sample: log_likelihood.neg() * weights, ignored: lattice.ignored }
    }
}

/// Host-side description of the extended label lattice of a batch
struct Lattice {
    states:     usize,
    extended:   Vec<i32>,
    skip:       Vec<f32>,
    valid:      Vec<f32>,
    init:       Vec<f32>,
    finals:     Vec<i32>,
    final_mask: Vec<f32>,
    weights:    Vec<f32>,
    ignored:    usize,
}

impl Lattice {
    fn build(sequences: &[Vec<usize>], max_len: usize, blank: usize, steps: usize) -> Self {
        let states  = 2 * max_len + 1;
        let batch   = sequences.len();

        let mut lattice = Lattice {
            states,
            extended:   Vec::with_capacity(batch * states),
            skip:       Vec::with_capacity(batch * states),
            valid:      Vec::with_capacity(batch * states),
            init:       Vec::with_capacity(batch * states),
            finals:     Vec::with_capacity(batch * 2),
            final_mask: Vec::with_capacity(batch * 2),
            weights:    Vec::with_capacity(batch),
            ignored:    0,
        };

        for label in sequences {
            let len = label.len();
            let ext: Vec<usize> = (0..states)
                .map(|s| if s % 2 == 1 && s / 2 < len { label[s / 2] } else { blank })
                .collect();

            for s in 0..states {
                lattice.extended.push(ext[s] as i32);
                let skippable = s % 2 == 1 && s >= 2 && ext[s] != ext[s - 2];
                lattice.skip.push(if skippable { 0.0 } else { LOG_ZERO });
                lattice.valid.push(if s <= 2 * len { 0.0 } else { LOG_ZERO });
                let start = s == 0 || (s == 1 && len > 0);
                lattice.init.push(if start { 0.0 } else { LOG_ZERO });
            }

            // Last blank and last symbol; an empty label only ends on its blank
            let last_symbol = if len > 0 { 2 * len - 1 } else { 0 };
            lattice.finals.push((2 * len) as i32);
            lattice.finals.push(last_symbol as i32);
            lattice.final_mask.push(0.0);
            lattice.final_mask.push(if len > 0 { 0.0 } else { LOG_ZERO });

            if min_frames(label) <= steps {
                lattice.weights.push(1.0);
            } else {
                lattice.weights.push(0.0);
                lattice.ignored += 1;
            }
        }
        lattice
    }
}

/// Frames needed to emit `label`: one per symbol plus a blank between repeats
pub fn min_frames(label: &[usize]) -> usize {
    label.len() + label.windows(2).filter(|w| w[0] == w[1]).count()
}

/// αₜ₋₁(s - k), LOG_ZERO for s < k
fn shift_right<B: Backend>(x: Tensor<B, 2>, k: usize) -> Tensor<B, 2> {
    let [batch, states] = x.dims();
    let device = x.device();
    if k >= states {
        return Tensor::full([batch, states], LOG_ZERO, &device);
    }
    let pad = Tensor::full([batch, k], LOG_ZERO, &device);
    Tensor::cat(vec![pad, x.slice([0..batch, 0..states - k])], 1)
}

fn log_sum_exp3<B: Backend>(a: Tensor<B, 2>, b: Tensor<B, 2>, c: Tensor<B, 2>) -> Tensor<B, 2> {
    let max = a.clone().max_pair(b.clone()).max_pair(c.clone()).detach();
    let sum = (a - max.clone()).exp() + (b - max.clone()).exp() + (c - max.clone()).exp();
    sum.log() + max
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = NdArray;

    fn uniform_loss(steps: usize, classes: usize, labels: &[Vec<usize>]) -> (Vec<f32>, usize) {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 3>::zeros([steps, labels.len(), classes], &device);
        let out = CtcLossConfig::new(classes - 1)
            .init()
            .forward(logits, &EncodedLabelSet::from_sequences(labels));
        (out.per_sample.into_data().to_vec::<f32>().unwrap(), out.ignored)
    }

    fn assert_close(actual: f32, expected: f64) {
        assert!((actual as f64 - expected).abs() < 1e-4, "{actual} vs {expected}");
    }

    #[test]
    fn test_single_symbol_two_frames() {
        // alignments a a / a ␣ / ␣ a, each 0.25
        let (loss, ignored) = uniform_loss(2, 2, &[vec![0]]);
        assert_close(loss[0], -(0.75f64).ln());
        assert_eq!(ignored, 0);
    }

    #[test]
    fn test_repeated_symbol_needs_blank_between() {
        // only a ␣ a collapses to "aa"
        let (loss, _) = uniform_loss(3, 2, &[vec![0, 0]]);
        assert_close(loss[0], 8.0f64.ln());
    }

    #[test]
    fn test_empty_label_is_all_blanks() {
        let (loss, _) = uniform_loss(2, 2, &[vec![]]);
        assert_close(loss[0], 4.0f64.ln());
    }

    #[test]
    fn test_padded_batch_matches_individual_losses() {
        let (loss, _) = uniform_loss(2, 2, &[vec![0], vec![]]);
        assert_close(loss[0], -(0.75f64).ln());
        assert_close(loss[1], 4.0f64.ln());
    }

    #[test]
    fn test_infeasible_label_is_ignored() {
        let (loss, ignored) = uniform_loss(2, 2, &[vec![0, 0], vec![0]]);
        assert_eq!(ignored, 1);
        assert_eq!(loss[0], 0.0);
        assert_close(loss[1], -(0.75f64).ln());
    }

    #[test]
    fn test_min_frames() {
        assert_eq!(min_frames(&[]), 0);
        assert_eq!(min_frames(&[1, 2, 3]), 3);
        assert_eq!(min_frames(&[1, 1, 2, 2]), 6);
    }

    #[test]
    fn test_gradient_reaches_logits() {
        let device = Default::default();
        let logits = Tensor::<Autodiff<NdArray>, 3>::zeros([3, 1, 3], &device).require_grad();
        let loss = CtcLossConfig::new(2)
            .init()
            .forward(logits.clone(), &EncodedLabelSet::from_sequences(&[vec![0, 1]]))
            .mean();
        let grads = loss.backward();
        let grad  = logits.grad(&grads).unwrap().into_data().to_vec::<f32>().unwrap();
        assert!(grad.iter().all(|g| g.is_finite()));
        assert!(grad.iter().any(|g| *g != 0.0));
    }
}
