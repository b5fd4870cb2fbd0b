//! `Vector` is the buffer type behind every pool

use crate::{config, memory::HeapSpace};
use std::{
    mem::size_of,
    ops::{Deref, DerefMut, Index, IndexMut, Range},
    ptr, slice,
};

/// A contiguous buffer that stands in for a block of accelerator memory.
///
/// Unlike `std::vec::Vec` it never reallocates on its own: pool buffers are
/// allocated once at their final size and replaced as a whole when a pool
/// grows. Single-element access is bounds-checked only if
/// [`ENABLE_BOUNDS_CHECKING`](../config/constant.ENABLE_BOUNDS_CHECKING.html)
/// is set; ranges are always checked.
#[derive(Debug, Clone, Default, Eq)]
pub struct Vector<T>(Vec<T>);

impl<T> Vector<T> {
    pub fn from_vec(vec: Vec<T>) -> Vector<T> {
        Vector(vec)
    }
    /// An empty buffer with room for `capacity` elements.
    pub fn with_capacity(capacity: usize) -> Vector<T> {
        Vector(Vec::with_capacity(capacity))
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn capacity(&self) -> usize {
        self.0.capacity()
    }
    pub fn iter(&self) -> slice::Iter<T> {
        self.0.iter()
    }
    /// Append `value`; there must be room for it.
    pub fn push_no_grow(&mut self, value: T) {
        requires!(self.len() < self.capacity(), "buffer is full");
        unsafe {
            ptr::write(self.0.as_mut_ptr().add(self.len()), value);
            self.0.set_len(self.len() + 1)
        }
    }
}

impl<T: Clone + Default> Vector<T> {
    /// A buffer of `size` default values, allocated exactly once.
    pub fn zeroed(size: usize) -> Vector<T> {
        Vector(vec![T::default(); size])
    }
}

impl<T> Deref for Vector<T> {
    type Target = [T];
    fn deref(&self) -> &[T] {
        &self.0
    }
}

impl<T> DerefMut for Vector<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.0
    }
}

/// Check if an offset is contained in a half-open range.
/// # Panics
/// Panic if bounds checking is enabled and the index is out of the given bounds.
pub fn assert_in_bounds(bounds: Range<usize>, offset: usize) {
    if config::ENABLE_BOUNDS_CHECKING {
        assert!(
            bounds.contains(&offset),
            "array index out of bounds: {} (range is {:?})",
            offset,
            bounds,
        );
    }
}

fn check_range(len: usize, index: &Range<usize>) {
    if config::ENABLE_BOUNDS_CHECKING {
        assert!(
            index.start <= index.end && index.end <= len,
            "range {:?} out of bounds (length is {})",
            index,
            len
        );
    }
}

impl<T> Index<usize> for Vector<T> {
    type Output = T;
    fn index(&self, index: usize) -> &T {
        assert_in_bounds(0..self.len(), index);
        unsafe { self.0.get_unchecked(index) }
    }
}

impl<T> IndexMut<usize> for Vector<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        assert_in_bounds(0..self.len(), index);
        unsafe { self.0.get_unchecked_mut(index) }
    }
}

impl<T> Index<Range<usize>> for Vector<T> {
    type Output = [T];
    fn index(&self, index: Range<usize>) -> &[T] {
        check_range(self.len(), &index);
        &self.0[index]
    }
}

impl<T> IndexMut<Range<usize>> for Vector<T> {
    fn index_mut(&mut self, index: Range<usize>) -> &mut [T] {
        check_range(self.len(), &index);
        &mut self.0[index]
    }
}

impl<T: PartialEq> PartialEq for Vector<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<'a, T> IntoIterator for &'a Vector<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: HeapSpace> HeapSpace for Vector<T> {
    fn heap_space(&self) -> usize {
        self.capacity() * size_of::<T>() + self.iter().map(HeapSpace::heap_space).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_has_exact_length() {
        let vector: Vector<u32> = Vector::zeroed(7);
        assert_eq!(vector.len(), 7);
        assert!(vector.iter().all(|&word| word == 0));
        assert_eq!(vector.heap_space(), 7 * 4);
    }

    #[test]
    fn push_within_capacity() {
        let mut vector = Vector::with_capacity(2);
        vector.push_no_grow(3u32);
        vector.push_no_grow(5);
        assert_eq!(&*vector, &[3, 5]);
    }

    #[test]
    fn range_index() {
        let mut vector = Vector::from_vec(vec![1u32, 2, 3, 4]);
        assert_eq!(&vector[1..3], &[2, 3]);
        assert_eq!(&vector[4..4], &[] as &[u32]);
        vector[0..2].copy_from_slice(&[7, 8]);
        assert_eq!(vector, Vector::from_vec(vec![7, 8, 3, 4]));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "out of bounds")]
    fn reversed_range_is_rejected() {
        let vector = Vector::from_vec(vec![1u32, 2, 3]);
        #[allow(clippy::reversed_empty_ranges)]
        let _ = &vector[2..1];
    }

    #[test]
    #[should_panic]
    fn range_past_the_end_is_rejected() {
        let vector = Vector::from_vec(vec![1u32, 2, 3]);
        let _ = &vector[2..5];
    }
}
