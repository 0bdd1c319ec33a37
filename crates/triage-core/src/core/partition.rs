use std::ops::Range;

/// Splits `0..len` into `parts` contiguous ranges whose sizes differ by at most one.
///
/// The first `len % parts` ranges receive the extra element, so the layout is fully
/// determined by `(len, parts)` and every index lands in exactly one range. When there are
/// more parts than elements the trailing ranges are empty. Zero parts yields no ranges.
pub fn even_ranges(len: usize, parts: usize) -> Vec<Range<usize>> {
    if parts == 0 {
        return Vec::new();
    }

    let base = len / parts;
    let remainder = len % parts;

    let mut ranges = Vec::with_capacity(parts);
    let mut start = 0;
    for rank in 0..parts {
        let size = base + usize::from(rank < remainder);
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}

/// Borrows `items` as `parts` contiguous shards laid out by [`even_ranges`].
pub fn split<T>(items: &[T], parts: usize) -> Vec<&[T]> {
    even_ranges(items.len(), parts)
        .into_iter()
        .map(|range| &items[range])
        .collect()
}
