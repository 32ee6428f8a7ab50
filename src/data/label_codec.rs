// ============================================================
// Layer 4 — Label Codec
// ============================================================
// Text ⇄ alphabet-index conversion.
//
// encode:
//   1. '&' → "_and_"   (file names cannot carry '&' reliably)
//   2. strip surrounding '\n'
//   3. drop every ' '
//   4. map each character to its alphabet index
//
// decode:
//   maps indices back to symbols, skipping the -1 padding the
//   beam decoder writes into empty positions.

use crate::domain::{
    alphabet::Alphabet,
    error::{CrnnError, CrnnResult},
};

/// Padding value in dense decoder output
pub const NO_SYMBOL: i64 = -1;

#[derive(Debug, Clone)]
pub struct LabelCodec {
    alphabet: Alphabet,
}

impl LabelCodec {
    pub fn new(alphabet: Alphabet) -> Self {
        Self { alphabet }
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    pub fn normalize(text: &str) -> String {
        text.replace('&', "_and_")
            .trim_matches('\n')
            .chars()
            .filter(|&c| c != ' ')
            .collect()
    }

    pub fn encode(&self, text: &str) -> CrnnResult<Vec<usize>> {
        Self::normalize(text)
            .chars()
            .map(|c| {
                self.alphabet.index_of(c).ok_or_else(|| CrnnError::UnknownSymbol {
                    label:  text.to_string(),
                    symbol: c,
                })
            })
            .collect()
    }

    pub fn decode(&self, indices: &[i64]) -> CrnnResult<String> {
        indices
            .iter()
            .filter(|&&i| i != NO_SYMBOL)
            .map(|&i| {
                usize::try_from(i)
                    .ok()
                    .and_then(|u| self.alphabet.symbol(u))
                    .ok_or(CrnnError::DecodeAnomaly {
                        index:        i,
                        alphabet_len: self.alphabet.len(),
                    })
            })
            .collect()
    }
}
