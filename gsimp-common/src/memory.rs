//! General purpose data structures
//!
//! Thin `std::vec::Vec` wrappers that model pool buffers.
//!
//! - The first template argument in `Array<I, T>` requires to specify a type
//!   that will be used for indexing. This prevents us from accidentally using
//!   an index of the wrong type, e.g. a variable where a literal is expected.
//!
//! - Buffers that stand in for accelerator memory are sized once and never
//!   grow behind the pool manager's back. `BoundedVector<T>` and `Array<I, T>`
//!   never allocate after being constructed.
//!
//! - Bounds checking can be disabled for all these vectors.

mod array;
mod boundedvector;
mod vector;

use std::{
    convert::TryFrom,
    mem::{align_of, size_of},
    slice,
    sync::atomic::AtomicU32,
};

use static_assertions::const_assert;

pub use crate::memory::{
    array::Array,
    boundedvector::BoundedVector,
    vector::{assert_in_bounds, Vector},
};

/// Trait for types that can be used as an array index.
pub trait Offset {
    fn as_offset(&self) -> usize;
}

impl Offset for usize {
    fn as_offset(&self) -> usize {
        *self
    }
}

impl Offset for u32 {
    fn as_offset(&self) -> usize {
        *self as usize
    }
}

/// A trait for objects that can report their memory usage on the heap
pub trait HeapSpace {
    /// The number of bytes allocated on the heap that this owns.
    fn heap_space(&self) -> usize;
}

impl<T: Copy> HeapSpace for T {
    fn heap_space(&self) -> usize {
        0
    }
}

/// Convert bytes to megabytes for readability.
pub fn format_memory_usage(bytes: usize) -> String {
    format!("{:12}", bytes >> 20) // MB
}

const_assert!(size_of::<AtomicU32>() == size_of::<u32>());
const_assert!(align_of::<AtomicU32>() == align_of::<u32>());

/// View a word buffer as atomics for a concurrent population pass.
///
/// Taking `&mut` guarantees that nobody else reads the plain words while
/// the atomic view is alive.
pub fn as_atomic(words: &mut [u32]) -> &[AtomicU32] {
    // Same size and alignment (asserted above), and the exclusive borrow
    // rules out mixed atomic/non-atomic access.
    unsafe { slice::from_raw_parts(words.as_mut_ptr() as *const AtomicU32, words.len()) }
}
