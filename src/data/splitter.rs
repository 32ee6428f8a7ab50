// ============================================================
// Layer 4 — Train/Test Splitter
// ============================================================
// Splits the ordered example set at a fixed fraction:
//
//   [0, test_offset)           → training partition
//   [test_offset, total_count) → test partition
//
// test_offset = floor(train_test_ratio * total_count)
//
// There is no shuffling: sample order is the load order, so two
// runs over the same directory see exactly the same partitions.

use std::ops::Range;

use crate::domain::error::{CrnnError, CrnnResult};

pub fn validate_ratio(train_test_ratio: f64) -> CrnnResult<()> {
    if !(0.0..=1.0).contains(&train_test_ratio) {
        return Err(CrnnError::config(format!(
            "incoherent train/test ratio {train_test_ratio}, expected a value in [0, 1]"
        )));
    }
    Ok(())
}

/// Index of the first test sample
pub fn test_offset(total: usize, train_test_ratio: f64) -> CrnnResult<usize> {
    validate_ratio(train_test_ratio)?;
    let offset = (train_test_ratio * total as f64).floor() as usize;
    Ok(offset.min(total))
}

/// (train range, test range)
pub fn partitions(total: usize, train_test_ratio: f64) -> CrnnResult<(Range<usize>, Range<usize>)> {
    let offset = test_offset(total, train_test_ratio)?;

    tracing::debug!(
        "Dataset split: {} training, {} test",
        offset,
        total - offset,
    );

    Ok((0..offset, offset..total))
}
