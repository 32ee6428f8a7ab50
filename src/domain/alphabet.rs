// ============================================================
// Layer 3 — Alphabet
// ============================================================
// An ordered set of unique symbols. Symbol i is class i of the
// classifier; class `len()` is the CTC blank, so the model has
// `len() + 1` output classes.
//
// The alphabet is given on the command line either literally
// ("0123...xyz") or as a path to a text file. File lines are
// concatenated without their line breaks and a single '\n' is
// appended at the end. Checkpoints trained on a file-based
// alphabet therefore always carry that trailing newline class.

use std::{collections::HashMap, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::domain::error::{CrnnError, CrnnResult};

/// Character set used when no `--char-set` is given
pub const DEFAULT_CHARSET: &str =
    "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ-'.!?,\"";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Alphabet {
    symbols: Vec<char>,
    index:   HashMap<char, usize>,
}

impl Alphabet {
    /// Build from a literal string. Duplicate symbols are rejected
    /// because they would make the symbol → index mapping ambiguous.
    pub fn new(symbols: &str) -> CrnnResult<Self> {
        let symbols: Vec<char> = symbols.chars().collect();
        if symbols.is_empty() {
            return Err(CrnnError::config("alphabet is empty"));
        }
        let mut index = HashMap::with_capacity(symbols.len());
        for (i, &c) in symbols.iter().enumerate() {
            if index.insert(c, i).is_some() {
                return Err(CrnnError::config(format!(
                    "alphabet contains {c:?} more than once"
                )));
            }
        }
        Ok(Self { symbols, index })
    }

    /// `source` is a path to an existing file or a literal charset.
    pub fn from_source(source: &str) -> CrnnResult<Self> {
        let path = Path::new(source);
        if path.is_file() {
            Self::from_file(path)
        } else {
            Self::new(source)
        }
    }

    pub fn from_file(path: &Path) -> CrnnResult<Self> {
        let content = fs::read_to_string(path)?;
        // only '\n' is a line terminator, '\r' stays part of the alphabet
        let mut charset: String = content.split('\n').collect();
        charset.push('\n');
        tracing::debug!("Alphabet file '{}' gave {} symbols", path.display(), charset.chars().count());
        Self::new(&charset)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Alphabet size plus the blank class
    pub fn num_classes(&self) -> usize {
        self.symbols.len() + 1
    }

    pub fn blank_index(&self) -> usize {
        self.symbols.len()
    }

    pub fn index_of(&self, symbol: char) -> Option<usize> {
        self.index.get(&symbol).copied()
    }

    pub fn symbol(&self, index: usize) -> Option<char> {
        self.symbols.get(index).copied()
    }

    pub fn as_string(&self) -> String {
        self.symbols.iter().collect()
    }
}

impl TryFrom<String> for Alphabet {
    type Error = CrnnError;

    fn try_from(value: String) -> CrnnResult<Self> {
        Self::new(&value)
    }
}

impl From<Alphabet> for String {
    fn from(a: Alphabet) -> Self {
        a.as_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_literal_alphabet() {
        let a = Alphabet::new("ab").unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a.num_classes(), 3);
        assert_eq!(a.blank_index(), 2);
        assert_eq!(a.index_of('b'), Some(1));
        assert_eq!(a.symbol(0), Some('a'));
        assert_eq!(a.symbol(2), None);
    }

    #[test]
    fn test_file_alphabet_keeps_trailing_newline() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "xyz").unwrap();
        let a = Alphabet::from_source(file.path().to_str().unwrap()).unwrap();
        assert_eq!(a.as_string(), "xyz\n");
        assert_eq!(a.len(), 4);
        assert_eq!(a.num_classes(), 5);
        assert_eq!(a.index_of('\n'), Some(3));
    }

    #[test]
    fn test_file_lines_are_concatenated() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "ab\ncd").unwrap();
        let a = Alphabet::from_file(file.path()).unwrap();
        assert_eq!(a.as_string(), "abcd\n");
    }

    #[test]
    fn test_carriage_return_is_a_symbol() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "ab\r\n").unwrap();
        let a = Alphabet::from_file(file.path()).unwrap();
        assert_eq!(a.as_string(), "ab\r\n");
        assert_eq!(a.index_of('\r'), Some(2));
        assert_eq!(a.num_classes(), 5);
    }

    #[test]
    fn test_missing_path_is_treated_as_literal() {
        let a = Alphabet::from_source("qwer").unwrap();
        assert_eq!(a.as_string(), "qwer");
    }

    #[test]
    fn test_duplicates_rejected() {
        assert!(matches!(Alphabet::new("abca"), Err(CrnnError::Configuration(_))));
        assert!(Alphabet::new("").is_err());
    }

    #[test]
    fn test_serde_as_plain_string() {
        let a = Alphabet::new("01").unwrap();
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, "\"01\"");
        let back: Alphabet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }
}
