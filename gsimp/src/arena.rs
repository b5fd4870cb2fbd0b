//! Container for simplifier clauses
//!
//! The arena lives in a single word buffer, laid out like this:
//!
//! ```text
//! [ header: data_cap clause_cap size count | data: data_cap buckets | refs: clause_cap ]
//! ```
//!
//! Records are appended at the high-water mark `size` and the reference
//! table maps clause ids to their bucket offset. Nothing is ever freed
//! individually: deleted records stay in place until [`ClauseArena::shrink`]
//! compacts the whole arena.
//!
//! The arena object itself only remembers where the regions start. After the
//! buffer has been copied somewhere else (grown, or mirrored to the host)
//! [`ClauseArena::fix_pointer`] recomputes those bases from the header, so
//! every [`ClauseRef`] handed out before the move stays valid.

use crate::clause::{
    block_size_at, calc_words, encode, encode_atomic, ClauseRef, ClauseStatus, SClause,
    SClauseMut, BUCKET,
};
use gsimp_common::{
    config,
    literal::Literal,
    memory::{as_atomic, HeapSpace, Vector},
};
use gsimp_macros::HeapSpace;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Number of header words at the start of the arena buffer.
pub const ARENA_HEADER_WORDS: usize = 4;

const DATA_CAP: usize = 0;
const CLAUSE_CAP: usize = 1;
const SIZE: usize = 2;
const COUNT: usize = 3;

/// Stores variable-length clause records in one flat buffer.
#[derive(Debug, PartialEq, HeapSpace)]
pub struct ClauseArena {
    /// Header, data region and reference table.
    mem: Vector<u32>,
    /// Start of the data region in `mem`, valid after `fix_pointer()`.
    data_base: usize,
    /// Start of the reference table in `mem`, valid after `fix_pointer()`.
    refs_base: usize,
}

impl ClauseArena {
    /// Create an empty arena with room for `data_cap_bytes` bytes of records
    /// and `clause_cap` clauses.
    pub fn new(data_cap_bytes: usize, clause_cap: usize) -> ClauseArena {
        requires!(data_cap_bytes > 0, "clause arena without data capacity");
        requires!(clause_cap > 0, "clause arena without clause capacity");
        let data_cap = buckets_for(data_cap_bytes);
        let mut mem = Vector::zeroed(buffer_words(data_cap, clause_cap));
        mem[DATA_CAP] = data_cap as u32;
        mem[CLAUSE_CAP] = clause_cap as u32;
        let mut arena = ClauseArena::from_raw(mem);
        arena.fix_pointer();
        arena
    }
    /// Total size in bytes of the buffer backing an arena of this capacity.
    pub fn footprint(data_cap_bytes: usize, clause_cap: usize) -> usize {
        buffer_words(buckets_for(data_cap_bytes), clause_cap) * BUCKET
    }
    /// Wrap a raw arena buffer, e.g. one that was copied from another arena.
    ///
    /// The result must not be used before [`fix_pointer()`](#method.fix_pointer)
    /// has been called.
    pub fn from_raw(mem: Vector<u32>) -> ClauseArena {
        ClauseArena {
            mem,
            data_base: 0,
            refs_base: 0,
        }
    }
    /// The raw buffer, header included.
    pub fn as_raw(&self) -> &[u32] {
        &self.mem
    }
    pub fn into_raw(self) -> Vector<u32> {
        self.mem
    }
    /// Recompute the region bases after the buffer has moved.
    ///
    /// Offsets are relative to the data region, which is located through
    /// the header stored in the buffer itself.
    pub fn fix_pointer(&mut self) {
        requires!(self.mem.len() >= ARENA_HEADER_WORDS, "arena buffer without header");
        let data_cap = self.mem[DATA_CAP] as usize;
        let clause_cap = self.mem[CLAUSE_CAP] as usize;
        requires!(data_cap > 0);
        self.data_base = ARENA_HEADER_WORDS;
        self.refs_base = ARENA_HEADER_WORDS + data_cap;
        requires!(
            self.mem.len() >= self.refs_base + clause_cap,
            "arena buffer of {} words is too small for its header",
            self.mem.len()
        );
        invariant!(self.data_size() <= data_cap);
        invariant!(self.len() <= clause_cap);
    }
    /// Number of clauses, including deleted ones that were not compacted yet.
    pub fn len(&self) -> usize {
        self.mem[COUNT] as usize
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// High-water mark in buckets.
    pub fn data_size(&self) -> usize {
        self.mem[SIZE] as usize
    }
    /// High-water mark in bytes.
    pub fn data_size_bytes(&self) -> usize {
        self.data_size() * BUCKET
    }
    /// Data capacity in buckets.
    pub fn data_capacity(&self) -> usize {
        self.mem[DATA_CAP] as usize
    }
    pub fn data_capacity_bytes(&self) -> usize {
        self.data_capacity() * BUCKET
    }
    /// Maximum number of clauses.
    pub fn clause_capacity(&self) -> usize {
        self.mem[CLAUSE_CAP] as usize
    }
    /// The reference of the clause with id `index`.
    pub fn cref(&self, index: usize) -> ClauseRef {
        requires!(index < self.len(), "clause id {} out of range ({} clauses)", index, self.len());
        self.check_fixed();
        ClauseRef(self.mem[self.refs_base + index])
    }
    /// The clause with id `index`.
    pub fn clause(&self, index: usize) -> SClause<'_> {
        self.get(self.cref(index))
    }
    pub fn clause_mut(&mut self, index: usize) -> SClauseMut<'_> {
        let cref = self.cref(index);
        self.get_mut(cref)
    }
    /// The clause stored at `cref`.
    pub fn get(&self, cref: ClauseRef) -> SClause<'_> {
        let offset = cref.0 as usize;
        requires!(offset < self.data_size(), "clause reference {} past the arena end", offset);
        self.check_fixed();
        SClause::at(&self.mem[self.data_base + offset..self.data_base + self.data_size()])
    }
    pub fn get_mut(&mut self, cref: ClauseRef) -> SClauseMut<'_> {
        let offset = cref.0 as usize;
        requires!(offset < self.data_size(), "clause reference {} past the arena end", offset);
        self.check_fixed();
        let end = self.data_base + self.data_size();
        SClauseMut::at(&mut self.mem[self.data_base + offset..end])
    }
    /// All clauses in id order.
    pub fn iter(&self) -> impl Iterator<Item = SClause<'_>> + '_ {
        (0..self.len()).map(move |index| self.clause(index))
    }
    /// Append a new clause.
    ///
    /// # Panics
    /// Panics if the byte or clause capacity is exhausted. Capacities are
    /// estimated before a population pass, running out is a bug.
    pub fn new_clause(&mut self, literals: &[Literal], status: ClauseStatus) -> ClauseRef {
        requires!(literals.len() > 1, "unit clauses are not stored in the arena");
        let words = calc_words(literals.len());
        let (offset, slot) = self.reserve(words);
        let start = self.data_base + offset;
        encode(&mut self.mem[start..start + words], literals, status);
        self.mem[self.refs_base + slot] = offset as u32;
        ClauseRef(offset as u32)
    }
    /// Append a verbatim copy of `source`, which may live in another arena.
    pub fn new_clause_from(&mut self, source: SClause) -> ClauseRef {
        let words = source.block_size();
        let (offset, slot) = self.reserve(words);
        let start = self.data_base + offset;
        self.mem[start..start + words].copy_from_slice(source.words());
        self.mem[self.refs_base + slot] = offset as u32;
        ClauseRef(offset as u32)
    }
    fn reserve(&mut self, words: usize) -> (usize, usize) {
        self.check_fixed();
        let offset = self.data_size();
        let slot = self.len();
        requires!(
            offset + words <= self.data_capacity(),
            "clause arena out of memory: {} + {} buckets exceed capacity {}",
            offset,
            words,
            self.data_capacity()
        );
        requires!(
            slot < self.clause_capacity(),
            "clause arena out of references: capacity {}",
            self.clause_capacity()
        );
        self.mem[SIZE] = (offset + words) as u32;
        self.mem[COUNT] = (slot + 1) as u32;
        (offset, slot)
    }
    /// Rebuild this (empty) arena from the live clauses of `source`.
    pub fn copy_from(&mut self, source: &ClauseArena) {
        requires!(self.is_empty() && self.data_size() == 0);
        for clause in source.iter() {
            if clause.is_live() {
                self.new_clause_from(clause);
            }
        }
    }
    /// Compact in place, dropping deleted clauses.
    ///
    /// Survivors keep their relative order; their references change.
    /// Must not run concurrently with a population pass.
    pub fn shrink(&mut self) {
        self.check_fixed();
        let before = self.len();
        let mut kept = 0;
        let mut new_size = 0;
        for index in 0..before {
            let offset = self.mem[self.refs_base + index] as usize;
            let start = self.data_base + offset;
            let clause = SClause::at(&self.mem[start..self.data_base + self.data_size()]);
            let (live, words) = (clause.is_live(), clause.block_size());
            if !live {
                continue;
            }
            // References are sorted, so the target never overlaps a record
            // that still has to be moved.
            invariant!(new_size <= offset);
            self.mem
                .copy_within(start..start + words, self.data_base + new_size);
            self.mem[self.refs_base + kept] = new_size as u32;
            kept += 1;
            new_size += words;
        }
        self.mem[SIZE] = new_size as u32;
        self.mem[COUNT] = kept as u32;
        if config::CHECK_ARENA_INVARIANTS {
            self.check_refs_sorted();
        }
    }
    /// Copy the arena into a fresh buffer of (at least) the given capacity.
    ///
    /// Wrap the result with [`from_raw()`](#method.from_raw) and call
    /// [`fix_pointer()`](#method.fix_pointer) to use it.
    pub fn relocate(&self, data_cap_bytes: usize, clause_cap: usize) -> Vector<u32> {
        self.check_fixed();
        let data_cap = buckets_for(data_cap_bytes);
        requires!(data_cap >= self.data_size());
        requires!(clause_cap >= self.len());
        let mut mem = Vector::zeroed(buffer_words(data_cap, clause_cap));
        mem[DATA_CAP] = data_cap as u32;
        mem[CLAUSE_CAP] = clause_cap as u32;
        mem[SIZE] = self.mem[SIZE];
        mem[COUNT] = self.mem[COUNT];
        let size = self.data_size();
        mem[ARENA_HEADER_WORDS..ARENA_HEADER_WORDS + size]
            .copy_from_slice(&self.mem[self.data_base..self.data_base + size]);
        let refs_base = ARENA_HEADER_WORDS + data_cap;
        mem[refs_base..refs_base + self.len()]
            .copy_from_slice(&self.mem[self.refs_base..self.refs_base + self.len()]);
        mem
    }
    /// Start a concurrent population pass.
    ///
    /// The returned handle can be shared between worker threads; the
    /// counters are written back when it is dropped.
    pub fn population(&mut self) -> ArenaPopulation<'_> {
        self.check_fixed();
        let data_cap = self.data_capacity();
        let clause_cap = self.clause_capacity();
        let reserved = (self.data_size() as u64) << 32 | self.len() as u64;
        let (header, rest) = self.mem.split_at_mut(ARENA_HEADER_WORDS);
        let (data, rest) = rest.split_at_mut(data_cap);
        ArenaPopulation {
            header,
            data: as_atomic(data),
            refs: as_atomic(&mut rest[..clause_cap]),
            reserved: AtomicU64::new(reserved),
        }
    }
    /// Number of live clauses and their total number of literals.
    pub fn count_live(&self) -> (usize, usize) {
        (0..self.len())
            .into_par_iter()
            .map(|index| {
                let clause = self.clause(index);
                if clause.is_live() {
                    (1, clause.size())
                } else {
                    (0, 0)
                }
            })
            .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1))
    }
    /// Print all clauses.
    pub fn print(&self, with_refs: bool) {
        for index in 0..self.len() {
            let clause = self.clause(index);
            if with_refs {
                comment!(" | C({}, r: {})->{:?}", index, self.cref(index), clause);
            } else {
                comment!(" | C({})->{:?}", index, clause);
            }
        }
    }
    fn check_fixed(&self) {
        requires!(
            self.data_base == ARENA_HEADER_WORDS,
            "clause arena used before fix_pointer()"
        );
    }
    fn check_refs_sorted(&self) {
        let refs = &self.mem[self.refs_base..self.refs_base + self.len()];
        invariant!(refs.windows(2).all(|pair| pair[0] < pair[1]));
        invariant!(refs.last().map_or(true, |&r| {
            let start = self.data_base + r as usize;
            let end = self.data_base + self.data_size();
            r as usize + block_size_at(&self.mem[start..end]) <= self.data_size()
        }));
    }
}

/// Buckets needed to hold `bytes` bytes.
fn buckets_for(bytes: usize) -> usize {
    (bytes + BUCKET - 1) / BUCKET
}

fn buffer_words(data_cap: usize, clause_cap: usize) -> usize {
    requires!(data_cap <= u32::MAX as usize && clause_cap <= u32::MAX as usize);
    ARENA_HEADER_WORDS + data_cap + clause_cap
}

/// Append handle for a concurrent population pass.
///
/// Each append reserves its clause slot and its buckets with a single
/// atomic operation, so references stay sorted by offset even when
/// many workers append at once.
pub struct ArenaPopulation<'a> {
    header: &'a mut [u32],
    data: &'a [AtomicU32],
    refs: &'a [AtomicU32],
    /// `size << 32 | count`
    reserved: AtomicU64,
}

impl<'a> ArenaPopulation<'a> {
    /// Append a new clause.
    ///
    /// # Panics
    /// Panics if the capacities were underestimated.
    pub fn new_clause(&self, literals: &[Literal], status: ClauseStatus) -> ClauseRef {
        requires!(literals.len() > 1, "unit clauses are not stored in the arena");
        let words = calc_words(literals.len());
        let (offset, slot) = self.reserve(words);
        encode_atomic(&self.data[offset..offset + words], literals, status);
        self.refs[slot].store(offset as u32, Ordering::Relaxed);
        ClauseRef(offset as u32)
    }
    /// Append a verbatim copy of `source`.
    pub fn new_clause_from(&self, source: SClause) -> ClauseRef {
        let words = source.block_size();
        let (offset, slot) = self.reserve(words);
        for (target, &word) in self.data[offset..offset + words].iter().zip(source.words()) {
            target.store(word, Ordering::Relaxed);
        }
        self.refs[slot].store(offset as u32, Ordering::Relaxed);
        ClauseRef(offset as u32)
    }
    fn reserve(&self, words: usize) -> (usize, usize) {
        let previous = self
            .reserved
            .fetch_add((words as u64) << 32 | 1, Ordering::Relaxed);
        let offset = (previous >> 32) as usize;
        let slot = (previous & u64::from(u32::MAX)) as usize;
        invariant!(
            offset + words <= self.data.len() && slot < self.refs.len(),
            "clause arena capacity underestimated (buckets {}/{}, slots {}/{})",
            offset + words,
            self.data.len(),
            slot + 1,
            self.refs.len()
        );
        (offset, slot)
    }
}

impl<'a> Drop for ArenaPopulation<'a> {
    fn drop(&mut self) {
        let reserved = *self.reserved.get_mut();
        let size = (reserved >> 32) as usize;
        let count = (reserved & u64::from(u32::MAX)) as usize;
        // An overflowing pass has already panicked; keep the old counters.
        if size <= self.data.len() && count <= self.refs.len() {
            self.header[SIZE] = size as u32;
            self.header[COUNT] = count as u32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::calc_size;
    use proptest::prelude::*;

    fn lits(values: &[i32]) -> Vec<Literal> {
        values.iter().map(|&value| Literal::new(value)).collect()
    }

    fn sample_arena() -> ClauseArena {
        let mut arena = ClauseArena::new(1000, 10);
        arena.new_clause(&lits(&[1, 2]), ClauseStatus::Original);
        arena.new_clause(&lits(&[-1, 3, 4]), ClauseStatus::Learnt);
        arena.new_clause(&lits(&[2, -4]), ClauseStatus::Original);
        arena
    }

    fn survivors(arena: &ClauseArena) -> Vec<(ClauseStatus, Vec<Literal>)> {
        arena
            .iter()
            .filter(|clause| clause.is_live())
            .map(|clause| (clause.status(), clause.literals().to_vec()))
            .collect()
    }

    #[test]
    fn insertion_roundtrip() {
        let arena = sample_arena();
        assert_eq!(arena.len(), 3);
        assert_eq!(
            arena.data_size_bytes(),
            calc_size(2) + calc_size(3) + calc_size(2)
        );
        assert_eq!(arena.clause(1).literals(), &lits(&[-1, 3, 4])[..]);
        assert_eq!(arena.clause(1).status(), ClauseStatus::Learnt);
        assert_eq!(arena.cref(0), ClauseRef(0));
        assert_eq!(arena.cref(1), ClauseRef(5));
        assert_eq!(arena.get(ClauseRef(5)).size(), 3);
    }

    #[test]
    #[should_panic(expected = "out of memory")]
    fn byte_capacity_is_fatal() {
        let mut arena = sample_arena();
        let long: Vec<i32> = (1..=250).collect();
        arena.new_clause(&lits(&long), ClauseStatus::Original);
    }

    #[test]
    #[should_panic(expected = "out of references")]
    fn slot_capacity_is_fatal() {
        let mut arena = ClauseArena::new(1000, 2);
        arena.new_clause(&lits(&[1, 2]), ClauseStatus::Original);
        arena.new_clause(&lits(&[1, 3]), ClauseStatus::Original);
        arena.new_clause(&lits(&[1, 4]), ClauseStatus::Original);
    }

    #[test]
    fn shrink_drops_deleted_clauses() {
        let mut arena = sample_arena();
        arena.clause_mut(0).mark_deleted();
        arena.shrink();
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.cref(0), ClauseRef(0));
        assert_eq!(arena.clause(0).literals(), &lits(&[-1, 3, 4])[..]);
        assert_eq!(arena.clause(1).literals(), &lits(&[2, -4])[..]);
        assert_eq!(arena.data_size_bytes(), calc_size(3) + calc_size(2));
        let once = arena.as_raw().to_vec();
        arena.shrink();
        assert_eq!(arena.as_raw(), &once[..]);
    }

    #[test]
    fn copy_from_keeps_live_clauses() {
        let mut source = sample_arena();
        source.clause_mut(1).mark_deleted();
        let mut target = ClauseArena::new(1000, 10);
        target.copy_from(&source);
        assert_eq!(target.len(), 2);
        assert_eq!(survivors(&target), survivors(&source));
    }

    #[test]
    fn fix_pointer_after_raw_copy() {
        let mut arena = sample_arena();
        arena.clause_mut(2).set_lbd(3);
        let mut moved = ClauseArena::from_raw(Vector::from_vec(arena.as_raw().to_vec()));
        moved.fix_pointer();
        assert_eq!(moved.len(), arena.len());
        for index in 0..arena.len() {
            assert_eq!(moved.clause(index).literals(), arena.clause(index).literals());
            assert_eq!(moved.clause(index).status(), arena.clause(index).status());
            assert_eq!(moved.clause(index).lbd(), arena.clause(index).lbd());
        }
    }

    #[test]
    #[should_panic(expected = "before fix_pointer")]
    fn raw_copy_needs_fix_pointer() {
        let arena = sample_arena();
        let moved = ClauseArena::from_raw(Vector::from_vec(arena.as_raw().to_vec()));
        moved.clause(0);
    }

    #[test]
    fn relocate_grows_both_regions() {
        let arena = sample_arena();
        let mut grown = ClauseArena::from_raw(arena.relocate(4000, 40));
        grown.fix_pointer();
        assert_eq!(grown.data_capacity_bytes(), 4000);
        assert_eq!(grown.clause_capacity(), 40);
        assert_eq!(survivors(&grown), survivors(&arena));
        grown.new_clause(&lits(&[5, 6]), ClauseStatus::Learnt);
        assert_eq!(grown.len(), 4);
    }

    #[test]
    fn byte_capacity_rounds_up_to_buckets() {
        let arena = ClauseArena::new(1001, 10);
        assert_eq!(arena.data_capacity(), 251);
        assert!(arena.data_capacity_bytes() >= 1001);
        assert_eq!(ClauseArena::footprint(1001, 10), (4 + 251 + 10) * BUCKET);
        let mut grown = ClauseArena::from_raw(arena.relocate(4001, 10));
        grown.fix_pointer();
        assert_eq!(grown.data_capacity_bytes(), 4004);
    }

    #[test]
    #[should_panic(expected = "past the arena end")]
    fn reference_past_high_water_mark_panics() {
        let arena = sample_arena();
        arena.get(ClauseRef(1_000_000));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn clause_id_past_count_panics() {
        let arena = sample_arena();
        arena.cref(3);
    }

    #[test]
    fn parallel_population() {
        let clauses = 1000;
        let mut arena = ClauseArena::new(clauses * calc_size(3), clauses);
        {
            let pass = arena.population();
            (1..=clauses as i32).into_par_iter().for_each(|i| {
                pass.new_clause(&lits(&[i, -(i + 1), i + 2]), ClauseStatus::Original);
            });
        }
        assert_eq!(arena.len(), clauses);
        assert_eq!(arena.data_size_bytes(), clauses * calc_size(3));
        assert_eq!(arena.count_live(), (clauses, 3 * clauses));
        let mut firsts: Vec<i32> = arena
            .iter()
            .map(|clause| clause.literals()[0].decode())
            .collect();
        firsts.sort_unstable();
        assert_eq!(firsts, (1..=clauses as i32).collect::<Vec<_>>());
        arena.check_refs_sorted();
    }

    fn arbitrary_clauses() -> impl Strategy<Value = Vec<(Vec<i32>, u8)>> {
        let literal = (1..50i32, any::<bool>()).prop_map(|(v, neg)| if neg { -v } else { v });
        prop::collection::vec((prop::collection::vec(literal, 2..6), 0..3u8), 0..40)
    }

    fn status_of(tag: u8) -> ClauseStatus {
        match tag {
            0 => ClauseStatus::Original,
            1 => ClauseStatus::Learnt,
            _ => ClauseStatus::Deleted,
        }
    }

    proptest! {
        #[test]
        fn shrink_is_idempotent(clauses in arbitrary_clauses()) {
            let mut arena = ClauseArena::new(40 * calc_size(5), 40);
            for (literals, tag) in &clauses {
                arena.new_clause(&lits(literals), status_of(*tag));
            }
            let expected: Vec<_> = clauses
                .iter()
                .filter(|(_, tag)| status_of(*tag).is_live())
                .map(|(literals, tag)| (status_of(*tag), lits(literals)))
                .collect();
            arena.shrink();
            prop_assert_eq!(survivors(&arena), expected.clone());
            prop_assert_eq!(arena.len(), expected.len());
            let once = arena.as_raw().to_vec();
            arena.shrink();
            prop_assert_eq!(arena.as_raw(), &once[..]);
        }

        #[test]
        fn copy_then_shrink_equals_shrink_then_copy(clauses in arbitrary_clauses()) {
            let mut source = ClauseArena::new(40 * calc_size(5), 40);
            for (literals, tag) in &clauses {
                source.new_clause(&lits(literals), status_of(*tag));
            }
            let mut copied = ClauseArena::new(40 * calc_size(5), 40);
            copied.copy_from(&source);
            copied.shrink();
            source.shrink();
            let mut recopied = ClauseArena::new(40 * calc_size(5), 40);
            recopied.copy_from(&source);
            prop_assert_eq!(survivors(&copied), survivors(&recopied));
            prop_assert_eq!(copied.data_size(), recopied.data_size());
        }
    }
}
