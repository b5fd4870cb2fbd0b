//! `BoundedVector` is a buffer that is filled once, up to a size known in
//! advance.

use crate::memory::{HeapSpace, Vector};
use gsimp_macros::HeapSpace;
use std::ops::Deref;

/// A host-side copy of device data, e.g. the unit cache of a round.
///
/// The capacity is fixed at construction; pushing beyond it is a bug.
#[derive(Debug, Clone, HeapSpace, PartialEq, Default)]
pub struct BoundedVector<T>
where
    T: HeapSpace,
{
    vector: Vector<T>,
}

impl<T: HeapSpace> BoundedVector<T> {
    pub fn with_capacity(capacity: usize) -> BoundedVector<T> {
        BoundedVector {
            vector: Vector::with_capacity(capacity),
        }
    }
    /// # Panics
    /// Panics if there is no space for the new element.
    pub fn push(&mut self, value: T) {
        self.vector.push_no_grow(value)
    }
    pub fn capacity(&self) -> usize {
        self.vector.capacity()
    }
}

impl<T: HeapSpace> Deref for BoundedVector<T> {
    type Target = [T];
    fn deref(&self) -> &[T] {
        &self.vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_up_to_capacity() {
        let mut bounded = BoundedVector::with_capacity(2);
        bounded.push(1u32);
        bounded.push(2u32);
        assert_eq!(&*bounded, &[1, 2]);
        assert!(bounded.capacity() >= 2);
    }

    #[test]
    #[should_panic(expected = "buffer is full")]
    fn push_beyond_capacity_panics() {
        let mut bounded = BoundedVector::with_capacity(1);
        bounded.push(1u32);
        bounded.push(2u32);
    }
}
