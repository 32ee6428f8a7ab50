// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The data manager only needs "something that yields samples in
// a stable order". Loading from a directory of image files is
// one implementation; tests feed in-memory samples directly.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use crate::domain::{error::CrnnResult, sample::Sample};

// ─── SampleSource ─────────────────────────────────────────────────────────────
/// Any component that can produce the full, ordered example set.
///
/// Implementations:
///   - ExampleDirectory → one image file per sample, label in the file name
pub trait SampleSource {
    /// Load every valid sample. Unreadable images are skipped;
    /// alphabet mismatches abort the whole load.
    fn load_all(&self) -> CrnnResult<Vec<Sample>>;
}

impl SampleSource for Vec<Sample> {
    fn load_all(&self) -> CrnnResult<Vec<Sample>> {
        Ok(self.clone())
    }
}
