// ============================================================
// Layer 5 — CTC Beam Search Decoder
// ============================================================
// Turns per-frame class scores into label sequences.
//
// Prefix beam search: every hypothesis is a collapsed prefix with
// two scores, the probability of ending in a blank and of ending in
// its last symbol. Keeping both lets "a ␣ a" (→ "aa") and "a a"
// (→ "a") be told apart while merging every alignment of the same
// prefix into one beam entry.
//
// Per frame, for each prefix p with last symbol e:
//
//   blank      → p            (p_b  += P(p) · y(␣))
//   c == e     → p            (p_nb += p_nb(p) · y(c))
//              → p + c        (p_nb += p_b(p)  · y(c))
//   c != e     → p + c        (p_nb += P(p)    · y(c))
//
// Only the best `beam_width` prefixes survive each frame. Ties are
// broken by prefix order so the result never depends on hash order.
//
// Output is dense: one row per image, padded with -1 up to the
// longest decoded sequence of the batch.
//
// Reference: Hannun et al. (2014) First-Pass LVCSR with prefix search

use std::collections::HashMap;

use burn::{prelude::*, tensor::activation::log_softmax};

use crate::data::label_codec::NO_SYMBOL;
use crate::domain::error::{CrnnError, CrnnResult};

pub const DEFAULT_BEAM_WIDTH: usize = 100;

#[derive(Clone, Debug)]
pub struct BeamSearchDecoder {
    beam_width: usize,
    blank:      usize,
}

/// Decoded label indices of a whole batch
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedBatch {
    pub sequences: Vec<Vec<usize>>,
    /// Log-probability of each returned sequence
    pub log_probs: Vec<f32>,
}

impl DecodedBatch {
    pub fn max_len(&self) -> usize {
        self.sequences.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// [batch, max_len] with NO_SYMBOL padding
    pub fn to_dense(&self) -> Vec<Vec<i64>> {
        let width = self.max_len();
        self.sequences
            .iter()
            .map(|seq| {
                let mut row: Vec<i64> = seq.iter().map(|&i| i as i64).collect();
                row.resize(width, NO_SYMBOL);
                row
            })
            .collect()
    }
}

#[derive(Clone, Copy, Debug)]
struct PrefixScore {
    blank:     f32,
    non_blank: f32,
}

impl Default for PrefixScore {
    fn default() -> Self {
        Self { blank: f32::NEG_INFINITY, non_blank: f32::NEG_INFINITY }
    }
}

impl PrefixScore {
    fn total(&self) -> f32 {
        log_add(self.blank, self.non_blank)
    }
}

impl BeamSearchDecoder {
    pub fn new(beam_width: usize, blank: usize) -> CrnnResult<Self> {
        if beam_width == 0 {
            return Err(CrnnError::config("beam width must be at least 1"));
        }
        Ok(Self { beam_width, blank })
    }

    pub fn beam_width(&self) -> usize {
        self.beam_width
    }

    /// logits: [T, batch, classes], time-major and unnormalised
    pub fn decode<B: Backend>(&self, logits: Tensor<B, 3>) -> CrnnResult<DecodedBatch> {
        let [steps, batch, classes] = logits.dims();
        let scores = log_softmax(logits, 2)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| CrnnError::Tensor(format!("{e:?}")))?;

        let mut sequences = Vec::with_capacity(batch);
        let mut log_probs = Vec::with_capacity(batch);
        for n in 0..batch {
            let frames: Vec<&[f32]> = (0..steps)
                .map(|t| {
                    let start = (t * batch + n) * classes;
                    &scores[start..start + classes]
                })
                .collect();
            let (sequence, log_prob) = self.search(&frames);
            sequences.push(sequence);
            log_probs.push(log_prob);
        }
        Ok(DecodedBatch { sequences, log_probs })
    }

    /// Best collapsed sequence for one image; frames hold log-probabilities
    pub fn search(&self, frames: &[&[f32]]) -> (Vec<usize>, f32) {
        let mut beams = vec![(Vec::new(), PrefixScore { blank: 0.0, non_blank: f32::NEG_INFINITY })];

        for frame in frames {
            let mut next: HashMap<Vec<usize>, PrefixScore> = HashMap::new();

            for (prefix, score) in &beams {
                let total = score.total();
                for (class, &p) in frame.iter().enumerate() {
                    if class == self.blank {
                        let entry = next.entry(prefix.clone()).or_default();
                        entry.blank = log_add(entry.blank, total + p);
                        continue;
                    }

                    let mut extended = prefix.clone();
                    extended.push(class);
                    if prefix.last() == Some(&class) {
                        let entry = next.entry(extended).or_default();
                        entry.non_blank = log_add(entry.non_blank, score.blank + p);
                        let entry = next.entry(prefix.clone()).or_default();
                        entry.non_blank = log_add(entry.non_blank, score.non_blank + p);
                    } else {
                        let entry = next.entry(extended).or_default();
                        entry.non_blank = log_add(entry.non_blank, total + p);
                    }
                }
            }

            let mut ranked: Vec<_> = next.into_iter().collect();
            ranked.sort_by(|a, b| {
                b.1.total().total_cmp(&a.1.total()).then_with(|| a.0.cmp(&b.0))
            });
            ranked.truncate(self.beam_width);
            beams = ranked;
        }

        beams
            .into_iter()
            .next()
            .map(|(prefix, score)| (prefix, score.total()))
            .unwrap_or((Vec::new(), f32::NEG_INFINITY))
    }
}

fn log_add(a: f32, b: f32) -> f32 {
    if a == f32::NEG_INFINITY {
        return b;
    }
    if b == f32::NEG_INFINITY {
        return a;
    }
    let max = a.max(b);
    max + ((a - max).exp() + (b - max).exp()).ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    fn ln(frames: &[[f32; 3]]) -> Vec<Vec<f32>> {
        frames.iter().map(|f| f.iter().map(|p| p.ln()).collect()).collect()
    }

    fn search(decoder: &BeamSearchDecoder, frames: &[[f32; 3]]) -> Vec<usize> {
        let owned = ln(frames);
        let refs: Vec<&[f32]> = owned.iter().map(Vec::as_slice).collect();
        decoder.search(&refs).0
    }

    #[test]
    fn test_collapses_repeats_and_blanks() {
        // classes: a, b, blank
        let decoder = BeamSearchDecoder::new(10, 2).unwrap();
        let frames = [
            [0.9, 0.05, 0.05],
            [0.9, 0.05, 0.05],
            [0.05, 0.05, 0.9],
            [0.05, 0.9, 0.05],
        ];
        assert_eq!(search(&decoder, &frames), vec![0, 1]);
    }

    #[test]
    fn test_blank_separates_repeated_symbols() {
        let decoder = BeamSearchDecoder::new(10, 2).unwrap();
        let frames = [
            [0.9, 0.05, 0.05],
            [0.05, 0.05, 0.9],
            [0.9, 0.05, 0.05],
        ];
        assert_eq!(search(&decoder, &frames), vec![0, 0]);
    }

    #[test]
    fn test_beam_merges_alignments() {
        // Best path is "␣ ␣" but "a" wins once its alignments are summed:
        // P("")  = 0.4 * 0.4                    = 0.16
        // P("a") = 0.3*0.3 + 0.3*0.4 + 0.4*0.3  = 0.33
        let decoder = BeamSearchDecoder::new(10, 2).unwrap();
        let frames = [[0.3, 0.3, 0.4], [0.3, 0.3, 0.4]];
        let seq = search(&decoder, &frames);
        assert_eq!(seq.len(), 1);
    }

    #[test]
    fn test_no_frames_decodes_empty() {
        let decoder = BeamSearchDecoder::new(5, 0).unwrap();
        assert_eq!(decoder.search(&[]), (Vec::new(), 0.0));
    }

    #[test]
    fn test_zero_beam_width_rejected() {
        assert!(BeamSearchDecoder::new(0, 1).is_err());
    }

    #[test]
    fn test_dense_output_is_padded() {
        let batch = DecodedBatch {
            sequences: vec![vec![3, 1, 2], vec![], vec![4]],
            log_probs: vec![0.0; 3],
        };
        assert_eq!(
            batch.to_dense(),
            vec![vec![3, 1, 2], vec![-1, -1, -1], vec![4, -1, -1]]
        );
    }

    #[test]
    fn test_decode_reads_time_major_batch() {
        let device = Default::default();
        // T = 1, batch = 2, classes = 3; sample 0 → class 1, sample 1 → blank
        let logits = Tensor::<NdArray, 1>::from_floats(
            [0.0, 10.0, 0.0, 0.0, 0.0, 10.0],
            &device,
        )
        .reshape([1, 2, 3]);
        let decoded = BeamSearchDecoder::new(4, 2).unwrap().decode(logits).unwrap();
        assert_eq!(decoded.sequences, vec![vec![1], vec![]]);
    }
}
