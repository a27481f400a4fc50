//! Splitting a task list into dispatch chunks.

/// Default number of tasks handed to one agent at a time.
pub const DEFAULT_CHUNK_SIZE: usize = 20;

/// Split `items` into contiguous chunks of `chunk_size`, preserving order.
///
/// The last chunk holds the remainder. A `chunk_size` of zero is treated as 1.
pub fn chunk_tasks<T: Clone>(items: &[T], chunk_size: usize) -> Vec<Vec<T>> {
    items
        .chunks(chunk_size.max(1))
        .map(<[T]>::to_vec)
        .collect()
}
