//! Batch planning over a list of sentence embeddings.

use std::ops::Range;

/// Split `0..num` into consecutive ranges of `batch_size`.
///
/// The generator runs on fixed-size batches, so a short final batch is
/// realigned to end exactly at `num` (`start = num - batch_size`). The
/// overlap with the previous range is the caller's to skip; see
/// [`fresh_indices`].
pub fn plan_batches(num: usize, batch_size: usize) -> Vec<Range<usize>> {
    if num == 0 || batch_size == 0 {
        return Vec::new();
    }
    let batch_size = batch_size.min(num);
    let mut batches = Vec::new();
    let mut start = 0;
    while start < num {
        let end = start + batch_size;
        if end > num {
            batches.push(num - batch_size..num);
            break;
        }
        batches.push(start..end);
        start = end;
    }
    batches
}

/// Indices of `batch` not already covered by `written_upto`.
pub fn fresh_indices(batch: &Range<usize>, written_upto: usize) -> Range<usize> {
    batch.start.max(written_upto)..batch.end
}

/// True when a sentence has at least one ASCII letter worth drawing.
pub fn has_alphabetic(sentence: &str) -> bool {
    sentence.chars().any(|c| c.is_ascii_alphabetic())
}
