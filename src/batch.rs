//! Batching iterator for grouping page descriptors into fixed-size chunks.
//!
//! The scheduler dispatches page requests in groups: each worker pulls one
//! group at a time and fans out one request per descriptor in it. This module
//! provides the [`batched`] adapter that produces those groups lazily, so a
//! page-descriptor iterator of arbitrary length never has to be materialized
//! up front.

/// Iterator adapter yielding fixed-size groups from an inner iterator.
///
/// Created by [`batched`]. Each group has length `n` except possibly the
/// last, which holds the remainder. The inner iterator is consumed lazily,
/// just enough to fill one group per `next()` call.
#[derive(Debug)]
pub struct Batched<I> {
    iter: I,
    n: usize,
}

impl<I: Iterator> Iterator for Batched<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch: Vec<_> = self.iter.by_ref().take(self.n).collect();
        if batch.is_empty() { None } else { Some(batch) }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lower, upper) = self.iter.size_hint();
        (lower.div_ceil(self.n), upper.map(|u| u.div_ceil(self.n)))
    }
}

/// Batches an iterable into groups of length `n`; the last group may be shorter.
///
/// ```
/// use pagefetch::batch::batched;
///
/// let groups: Vec<Vec<char>> = batched("ABCDEFG".chars(), 3).collect();
/// assert_eq!(groups, vec![vec!['A', 'B', 'C'], vec!['D', 'E', 'F'], vec!['G']]);
/// ```
///
/// # Panics
///
/// Panics if `n` is zero. The engine validates `batch_size >= 1` at
/// construction, so this is unreachable through [`Engine`](crate::Engine).
pub fn batched<I: IntoIterator>(iter: I, n: usize) -> Batched<I::IntoIter> {
    assert!(n >= 1, "batch size must be at least one");
    Batched {
        iter: iter.into_iter(),
        n,
    }
}
