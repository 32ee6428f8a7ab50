// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Every failure the recogniser can raise, grouped by how the
// caller must react to it:
//
//   Configuration  → fatal, raised before any work starts
//   ImageDecode    → the sample is skipped at load time
//   UnknownSymbol  → fatal for the whole dataset load
//   DecodeAnomaly  → logged per batch, the loop carries on
//   NonFiniteLoss  → logged per batch, the update is skipped
//
// Reference: thiserror crate documentation
//            Rust Book §9 (Recoverable Errors with Result)

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrnnError {
    /// Invalid ratio, empty export path, impossible image width, ...
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A sample file could not be opened or decoded as an image
    #[error("cannot decode image '{path}': {message}")]
    ImageDecode { path: PathBuf, message: String },

    /// A label contains a character that is not part of the alphabet
    #[error("label '{label}' contains symbol {symbol:?} which is not in the alphabet")]
    UnknownSymbol { label: String, symbol: char },

    /// The decoder produced an index with no alphabet entry
    #[error("decoded index {index} is outside the alphabet (size {alphabet_len})")]
    DecodeAnomaly { index: i64, alphabet_len: usize },

    /// The batch loss was NaN or infinite
    #[error("loss is not finite ({0})")]
    NonFiniteLoss(f64),

    /// Tensor data could not be read back from the device
    #[error("tensor error: {0}")]
    Tensor(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CrnnError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Failures that only invalidate the current batch.
    /// Everything else stops the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DecodeAnomaly { .. } | Self::NonFiniteLoss(_) | Self::ImageDecode { .. }
        )
    }
}

pub type CrnnResult<T> = Result<T, CrnnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_categories() {
        assert!(CrnnError::NonFiniteLoss(f64::NAN).is_recoverable());
        assert!(CrnnError::DecodeAnomaly { index: 9, alphabet_len: 2 }.is_recoverable());
        assert!(!CrnnError::config("bad ratio").is_recoverable());
        assert!(!CrnnError::UnknownSymbol { label: "a#".into(), symbol: '#' }.is_recoverable());
    }

    #[test]
    fn test_unknown_symbol_message_names_label() {
        let e = CrnnError::UnknownSymbol { label: "ab#".into(), symbol: '#' };
        assert!(e.to_string().contains("ab#"));
    }
}
