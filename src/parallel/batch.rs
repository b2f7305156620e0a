//! Batch boundaries for chunked fit processing.
//!
//! The compare stage resolves fits batch by batch so cancellation and progress
//! are observed between batches, never inside a fit.

/// Split `total` items into up to `num_batches` ranges `[start, end)`.
/// Batches are as equal in size as possible; earlier batches take the remainder.
///
/// # Example
/// ```
/// # use dogma_parity::parallel::batch_ranges;
/// let ranges = batch_ranges(10, 3);
/// assert_eq!(ranges, vec![(0, 4), (4, 7), (7, 10)]);
/// ```
pub fn batch_ranges(total: usize, num_batches: usize) -> Vec<(usize, usize)> {
    if total == 0 || num_batches == 0 {
        return Vec::new();
    }
    let num_batches = num_batches.min(total);
    let base = total / num_batches;
    let remainder = total % num_batches;
    let mut ranges = Vec::with_capacity(num_batches);
    let mut start = 0;
    for i in 0..num_batches {
        let end = start + base + usize::from(i < remainder);
        ranges.push((start, end));
        start = end;
    }
    ranges
}

/// Number of batches for `total` fits of at most `batch_size` each.
pub fn batch_count(total: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return usize::from(total > 0);
    }
    total.div_ceil(batch_size)
}
