// ============================================================
// Layer 5 — Edit Distance
// ============================================================
// Levenshtein distance between a decoded sequence and its ground
// truth, normalised by the length of the truth. The batch error
// rate is the mean over every sample of the batch.
//
// Empty truth: 0 when the hypothesis is empty too, +∞ otherwise.

/// Insertions + deletions + substitutions turning `a` into `b`
pub fn levenshtein<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, x) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, y) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(x != y);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

pub fn normalized_edit_distance<T: PartialEq>(hypothesis: &[T], truth: &[T]) -> f64 {
    let distance = levenshtein(hypothesis, truth);
    if truth.is_empty() {
        return if distance == 0 { 0.0 } else { f64::INFINITY };
    }
    distance as f64 / truth.len() as f64
}

/// Mean normalised distance over a batch; 0 for an empty batch
pub fn mean_edit_distance<T: PartialEq>(hypotheses: &[Vec<T>], truths: &[Vec<T>]) -> f64 {
    debug_assert_eq!(hypotheses.len(), truths.len());
    if truths.is_empty() {
        return 0.0;
    }
    let total: f64 = hypotheses
        .iter()
        .zip(truths)
        .map(|(h, t)| normalized_edit_distance(h, t))
        .sum();
    total / truths.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein(b"kitten", b"sitting"), 3);
        assert_eq!(levenshtein(b"", b"abc"), 3);
        assert_eq!(levenshtein(b"abc", b"abc"), 0);
        assert_eq!(levenshtein(b"flaw", b"lawn"), levenshtein(b"lawn", b"flaw"));
    }

    #[test]
    fn test_normalized_by_truth_length() {
        assert_eq!(normalized_edit_distance(&[1, 2], &[1, 2, 3, 4]), 0.5);
        assert_eq!(normalized_edit_distance(&[9, 9, 9, 9], &[1, 2]), 2.0);
    }

    #[test]
    fn test_empty_truth() {
        let empty: [usize; 0] = [];
        assert_eq!(normalized_edit_distance(&empty, &empty), 0.0);
        assert!(normalized_edit_distance(&[1], &empty).is_infinite());
    }

    #[test]
    fn test_batch_mean() {
        let hyps   = vec![vec![1, 2], vec![3]];
        let truths = vec![vec![1, 2], vec![4]];
        assert_eq!(mean_edit_distance(&hyps, &truths), 0.5);
        assert_eq!(mean_edit_distance::<usize>(&[], &[]), 0.0);
    }
}
