//! Arena buffers addressed by typed ranges.
//!
//! Scene assembly reserves ranges up front (vertex and face offsets are known
//! once every shape header has been read), then fills them in parallel. Each
//! range is a plain `(offset, len)` pair into one contiguous `Vec<T>`, so the
//! final buffer uploads with a single copy.

use bytemuck::Pod;

/// Element range inside an [`Arena`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ArenaRange {
    pub offset: usize,
    pub len: usize,
}

impl ArenaRange {
    pub const fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    /// One past the last element.
    pub const fn end(&self) -> usize {
        self.offset + self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Growable, zero-initialized array of POD elements.
#[derive(Debug, Clone)]
pub struct Arena<T: Pod> {
    data: Vec<T>,
}

impl<T: Pod> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Pod> Arena<T> {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Appends `count` zeroed elements and returns their range.
    pub fn reserve(&mut self, count: usize) -> ArenaRange {
        let offset = self.data.len();
        self.data.resize(offset + count, T::zeroed());
        ArenaRange::new(offset, count)
    }

    /// Appends `items` and returns their range.
    pub fn extend_from_slice(&mut self, items: &[T]) -> ArenaRange {
        let offset = self.data.len();
        self.data.extend_from_slice(items);
        ArenaRange::new(offset, items.len())
    }

    /// Writes one element at `index` relative to `range`.
    #[inline]
    pub fn write(&mut self, range: ArenaRange, index: usize, value: T) {
        debug_assert!(
            index < range.len,
            "arena write {index} outside range of {}",
            range.len
        );
        self.data[range.offset + index] = value;
    }

    #[inline]
    pub fn read(&self, range: ArenaRange, index: usize) -> T {
        debug_assert!(index < range.len);
        self.data[range.offset + index]
    }

    pub fn slice(&self, range: ArenaRange) -> &[T] {
        &self.data[range.offset..range.end()]
    }

    pub fn slice_mut(&mut self, range: ArenaRange) -> &mut [T] {
        &mut self.data[range.offset..range.end()]
    }

    /// Splits the arena into one mutable slice per range.
    ///
    /// Ranges must be sorted by offset and must not overlap; ranges handed
    /// out by [`Arena::reserve`] satisfy both. The slices can then be filled
    /// from independent threads.
    pub fn split_mut(&mut self, ranges: &[ArenaRange]) -> Vec<&mut [T]> {
        let mut out = Vec::with_capacity(ranges.len());
        let mut rest: &mut [T] = &mut self.data;
        let mut consumed = 0usize;
        for range in ranges {
            debug_assert!(range.offset >= consumed, "arena ranges overlap or are unsorted");
            let current = std::mem::take(&mut rest);
            let (_, tail) = current.split_at_mut(range.offset - consumed);
            let (head, tail) = tail.split_at_mut(range.len);
            out.push(head);
            rest = tail;
            consumed = range.end();
        }
        out
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

impl<T: Pod> From<Vec<T>> for Arena<T> {
    fn from(data: Vec<T>) -> Self {
        Self { data }
    }
}

/// Rounds `value` up to a multiple of `alignment` (a power of two).
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_is_contiguous() {
        let mut arena = Arena::<u32>::new();
        let a = arena.reserve(3);
        let b = arena.reserve(2);
        assert_eq!(a, ArenaRange::new(0, 3));
        assert_eq!(b, ArenaRange::new(3, 2));
        assert_eq!(arena.len(), 5);
        assert!(arena.as_slice().iter().all(|v| *v == 0));
    }

    #[test]
    fn test_write_and_read() {
        let mut arena = Arena::<u32>::new();
        let _ = arena.reserve(4);
        let range = arena.reserve(2);
        arena.write(range, 1, 7);
        assert_eq!(arena.read(range, 1), 7);
        assert_eq!(arena.as_slice()[5], 7);
    }

    #[test]
    fn test_split_mut_disjoint() {
        let mut arena = Arena::<u32>::new();
        let ranges = [arena.reserve(2), arena.reserve(0), arena.reserve(3)];
        let slices = arena.split_mut(&ranges);
        assert_eq!(slices.len(), 3);
        assert_eq!(slices[0].len(), 2);
        assert!(slices[1].is_empty());
        assert_eq!(slices[2].len(), 3);
        for (i, slice) in slices.into_iter().enumerate() {
            for v in slice.iter_mut() {
                *v = i as u32 + 1;
            }
        }
        assert_eq!(arena.as_slice(), &[1, 1, 3, 3, 3]);
    }

    #[test]
    fn test_split_mut_skips_gaps() {
        let mut arena = Arena::<u8>::from(vec![0; 6]);
        let slices = arena.split_mut(&[ArenaRange::new(1, 1), ArenaRange::new(4, 2)]);
        for slice in slices {
            slice.fill(9);
        }
        assert_eq!(arena.as_slice(), &[0, 9, 0, 0, 9, 9]);
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(300, 256), 512);
    }
}
