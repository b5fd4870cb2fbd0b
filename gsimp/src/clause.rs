//! Clause records as stored in the clause arena
//!
//! A record is a run of 32-bit words ("buckets"):
//!
//! ```text
//! word 0   state: status (bits 0-1), molten (bit 2), added (bit 3), LBD (bits 8-31)
//! word 1   signature of the variables
//! word 2   number of literals
//! word 3.. literals
//! ```
//!
//! Records are never addressed by pointer. A [`ClauseRef`] is the bucket
//! offset of a record inside the data region of its arena.

use gsimp_common::{
    literal::{as_literals, Literal},
    memory::Offset,
};
use static_assertions::const_assert;
use std::{
    fmt,
    mem::size_of,
    sync::atomic::{AtomicU32, Ordering},
};

/// Size of one bucket in bytes.
pub const BUCKET: usize = size_of::<u32>();
/// Number of metadata words that precede the literals.
pub const HEADER_WORDS: usize = 3;

const STATE: usize = 0;
const SIGNATURE: usize = 1;
const SIZE: usize = 2;

const STATUS_MASK: u32 = 0b11;
const MOLTEN_BIT: u32 = 1 << 2;
const ADDED_BIT: u32 = 1 << 3;
const LBD_SHIFT: u32 = 8;

const_assert!(BUCKET == 4);
const_assert!(size_of::<Literal>() == BUCKET);

/// Lifecycle tag of a clause.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[repr(u32)]
pub enum ClauseStatus {
    Original = 1,
    Learnt = 2,
    Deleted = 3,
}

impl ClauseStatus {
    fn from_bits(bits: u32) -> ClauseStatus {
        match bits & STATUS_MASK {
            1 => ClauseStatus::Original,
            2 => ClauseStatus::Learnt,
            3 => ClauseStatus::Deleted,
            bits => panic!("corrupted clause state word (status {})", bits),
        }
    }
    /// Original and learnt clauses survive compaction.
    pub fn is_live(self) -> bool {
        self != ClauseStatus::Deleted
    }
}

/// Bucket offset of a clause record within its arena.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Default)]
pub struct ClauseRef(pub u32);

impl Offset for ClauseRef {
    fn as_offset(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ClauseRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encoded size in bytes of a clause with `literals` literals.
///
/// The fixed part counts the header and the first literal, as a record
/// cannot be shorter than that.
pub fn calc_size(literals: usize) -> usize {
    requires!(literals > 0);
    (HEADER_WORDS + 1) * BUCKET + (literals - 1) * BUCKET
}

/// Encoded size in buckets of a clause with `literals` literals.
pub fn calc_words(literals: usize) -> usize {
    calc_size(literals) / BUCKET
}

/// A 32-bit bloom filter over the variables of a clause.
pub fn signature(literals: &[Literal]) -> u32 {
    literals
        .iter()
        .fold(0, |sig, literal| sig | 1 << (literal.var().0 & 31))
}

/// Write a fresh record into `words`, which must be exactly
/// `calc_words(literals.len())` long.
pub(crate) fn encode(words: &mut [u32], literals: &[Literal], status: ClauseStatus) {
    requires!(words.len() == calc_words(literals.len()));
    words[STATE] = status as u32;
    words[SIGNATURE] = signature(literals);
    words[SIZE] = literals.len() as u32;
    for (word, literal) in words[HEADER_WORDS..].iter_mut().zip(literals) {
        *word = literal.encoding;
    }
}

/// Like [`encode`], for a record that other workers may be writing next to.
pub(crate) fn encode_atomic(words: &[AtomicU32], literals: &[Literal], status: ClauseStatus) {
    requires!(words.len() == calc_words(literals.len()));
    words[STATE].store(status as u32, Ordering::Relaxed);
    words[SIGNATURE].store(signature(literals), Ordering::Relaxed);
    words[SIZE].store(literals.len() as u32, Ordering::Relaxed);
    for (word, literal) in words[HEADER_WORDS..].iter().zip(literals) {
        word.store(literal.encoding, Ordering::Relaxed);
    }
}

/// Number of buckets of the record starting at `words[0]`.
pub(crate) fn block_size_at(words: &[u32]) -> usize {
    HEADER_WORDS + words[SIZE] as usize
}

/// Read-only view of a clause record.
#[derive(Clone, Copy)]
pub struct SClause<'a> {
    words: &'a [u32],
}

impl<'a> SClause<'a> {
    /// View the record at the start of `words`.
    pub(crate) fn at(words: &'a [u32]) -> SClause<'a> {
        let length = block_size_at(words);
        SClause {
            words: &words[..length],
        }
    }
    pub fn status(&self) -> ClauseStatus {
        ClauseStatus::from_bits(self.words[STATE])
    }
    pub fn is_live(&self) -> bool {
        self.status().is_live()
    }
    pub fn molten(&self) -> bool {
        self.words[STATE] & MOLTEN_BIT != 0
    }
    pub fn added(&self) -> bool {
        self.words[STATE] & ADDED_BIT != 0
    }
    pub fn lbd(&self) -> u32 {
        self.words[STATE] >> LBD_SHIFT
    }
    pub fn signature(&self) -> u32 {
        self.words[SIGNATURE]
    }
    /// Number of literals.
    pub fn size(&self) -> usize {
        self.words[SIZE] as usize
    }
    pub fn literals(&self) -> &'a [Literal] {
        as_literals(&self.words[HEADER_WORDS..])
    }
    /// Encoded size in buckets.
    pub fn block_size(&self) -> usize {
        self.words.len()
    }
    /// Encoded size in bytes.
    pub fn capacity(&self) -> usize {
        self.words.len() * BUCKET
    }
    /// The raw encoded record.
    pub fn words(&self) -> &'a [u32] {
        self.words
    }
}

impl<'a> fmt::Debug for SClause<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}(", self.status())?;
        for literal in self.literals() {
            write!(f, " {}", literal)?;
        }
        write!(f, " )")
    }
}

/// Mutable view of a clause record.
///
/// Only the metadata can change; the literal count is fixed at insertion.
pub struct SClauseMut<'a> {
    words: &'a mut [u32],
}

impl<'a> SClauseMut<'a> {
    pub(crate) fn at(words: &'a mut [u32]) -> SClauseMut<'a> {
        let length = block_size_at(words);
        SClauseMut {
            words: &mut words[..length],
        }
    }
    /// Reborrow as a read-only view.
    pub fn view(&self) -> SClause<'_> {
        SClause { words: self.words }
    }
    pub fn status(&self) -> ClauseStatus {
        self.view().status()
    }
    pub fn set_status(&mut self, status: ClauseStatus) {
        self.words[STATE] = (self.words[STATE] & !STATUS_MASK) | status as u32;
    }
    /// Mark the clause as deleted; it will be dropped by the next compaction.
    pub fn mark_deleted(&mut self) {
        self.set_status(ClauseStatus::Deleted)
    }
    pub fn set_molten(&mut self, value: bool) {
        self.set_bit(MOLTEN_BIT, value)
    }
    pub fn set_added(&mut self, value: bool) {
        self.set_bit(ADDED_BIT, value)
    }
    pub fn set_lbd(&mut self, lbd: u32) {
        let lbd = lbd.min(u32::MAX >> LBD_SHIFT);
        self.words[STATE] = (self.words[STATE] & ((1 << LBD_SHIFT) - 1)) | lbd << LBD_SHIFT;
    }
    fn set_bit(&mut self, bit: u32, value: bool) {
        if value {
            self.words[STATE] |= bit;
        } else {
            self.words[STATE] &= !bit;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lits(values: &[i32]) -> Vec<Literal> {
        values.iter().map(|&value| Literal::new(value)).collect()
    }

    #[test]
    fn encoded_sizes() {
        assert_eq!(calc_size(1), 16);
        assert_eq!(calc_size(2), 20);
        assert_eq!(calc_size(3), 24);
        assert_eq!(calc_words(3), 6);
    }

    #[test]
    fn metadata_roundtrip() {
        let literals = lits(&[1, -2, 33]);
        let mut words = vec![0; calc_words(literals.len())];
        encode(&mut words, &literals, ClauseStatus::Learnt);
        {
            let mut clause = SClauseMut::at(&mut words);
            clause.set_lbd(5);
            clause.set_molten(true);
            assert_eq!(clause.status(), ClauseStatus::Learnt);
            clause.mark_deleted();
        }
        let clause = SClause::at(&words);
        assert_eq!(clause.status(), ClauseStatus::Deleted);
        assert!(!clause.is_live());
        assert!(clause.molten());
        assert!(!clause.added());
        assert_eq!(clause.lbd(), 5);
        assert_eq!(clause.literals(), &literals[..]);
        assert_eq!(clause.capacity(), calc_size(3));
        // variables 1, 2 and 33 (wraps to bit 1)
        assert_eq!(clause.signature(), 0b110);
    }
}
