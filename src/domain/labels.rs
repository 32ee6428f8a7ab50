// ============================================================
// Layer 3 — Sparse Label Set
// ============================================================
// The labels of one batch, stored the way the CTC loss wants
// them: a list of (row, column) → symbol-index entries plus the
// dense shape [batch, longest label].
//
// Example for labels "ab", "" and "c" (a=0, b=1, c=2):
//   indices = [(0,0), (0,1), (2,0)]
//   values  = [0, 1, 2]
//   shape   = [3, 2]
//
// Reference: Graves et al. (2006) Connectionist Temporal Classification

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedLabelSet {
    indices: Vec<(usize, usize)>,
    values:  Vec<usize>,
    shape:   [usize; 2],
}

impl EncodedLabelSet {
    pub fn from_sequences<S: AsRef<[usize]>>(sequences: &[S]) -> Self {
        let mut indices = Vec::new();
        let mut values  = Vec::new();
        let mut max_len = 0usize;

        for (row, seq) in sequences.iter().enumerate() {
            let seq = seq.as_ref();
            max_len = max_len.max(seq.len());
            for (col, &v) in seq.iter().enumerate() {
                indices.push((row, col));
                values.push(v);
            }
        }

        Self { indices, values, shape: [sequences.len(), max_len] }
    }

    pub fn batch_size(&self) -> usize {
        self.shape[0]
    }

    pub fn max_len(&self) -> usize {
        self.shape[1]
    }

    /// The label sequence of one row, in column order
    pub fn sequence(&self, row: usize) -> Vec<usize> {
        // Entries are pushed row by row, so one row is a contiguous run.
        let start = self.indices.partition_point(|&(r, _)| r < row);
        let end   = self.indices.partition_point(|&(r, _)| r <= row);
        self.values[start..end].to_vec()
    }

    pub fn sequences(&self) -> Vec<Vec<usize>> {
        (0..self.batch_size()).map(|row| self.sequence(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_layout() {
        let set = EncodedLabelSet::from_sequences(&[vec![0, 1], vec![], vec![2]]);
        assert_eq!(set.indices, vec![(0, 0), (0, 1), (2, 0)]);
        assert_eq!(set.values, vec![0, 1, 2]);
        assert_eq!((set.batch_size(), set.max_len()), (3, 2));
    }

    #[test]
    fn test_random_access_rows() {
        let set = EncodedLabelSet::from_sequences(&[vec![4, 4, 1], vec![], vec![2]]);
        assert_eq!(set.sequence(0), vec![4, 4, 1]);
        assert!(set.sequence(1).is_empty());
        assert_eq!(set.sequence(2), vec![2]);
    }

    #[test]
    fn test_all_empty_labels() {
        let set = EncodedLabelSet::from_sequences(&[Vec::<usize>::new(), Vec::new()]);
        assert_eq!((set.batch_size(), set.max_len()), (2, 0));
        assert_eq!(set.sequences(), vec![Vec::<usize>::new(), Vec::new()]);
    }
}
