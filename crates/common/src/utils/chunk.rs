/// Largest number of ids the batch endpoints accept per request.
pub const MAX_BATCH_SIZE: usize = 1000;

/// Split `items` into consecutive groups of at most `size` elements.
///
/// A `size` of zero, or one covering the whole slice, yields a single group
/// holding every item. Empty input therefore yields one empty group.
pub fn chunk<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    if size == 0 || size >= items.len() {
        return vec![items.to_vec()];
    }
    items.chunks(size).map(<[T]>::to_vec).collect()
}
