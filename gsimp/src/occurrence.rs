//! Occurrence lists: for every literal, the clauses that contain it
//!
//! All lists share one entry buffer. Each list gets an exact capacity,
//! computed from a histogram before population starts, because workers that
//! append concurrently cannot grow anything. A list that receives more
//! entries than provisioned keeps counting but stops writing; the capacity
//! check after the pass reports it.

use crate::{
    arena::ClauseArena,
    clause::ClauseRef,
    error::CapacityViolation,
};
use gsimp_common::{
    literal::{literal_array_len, Literal, Variable},
    memory::{as_atomic, assert_in_bounds, Array, HeapSpace, Offset, Vector},
};
use gsimp_macros::HeapSpace;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};

/// Per-literal lists of clause references.
#[derive(Debug, HeapSpace)]
pub struct OccurrenceTable {
    /// Start of each list in `occurs`.
    starts: Array<Literal, u32>,
    /// Provisioned capacity of each list.
    caps: Array<Literal, u32>,
    /// Number of entries pushed to each list; may exceed the capacity.
    sizes: Array<Literal, u32>,
    /// Entries of all lists.
    occurs: Vector<u32>,
    /// Sum of all provisioned capacities.
    max_entries: u32,
}

impl OccurrenceTable {
    /// Create a table with `num_lists` empty lists and no entry storage.
    pub fn new(num_lists: usize) -> OccurrenceTable {
        OccurrenceTable::with_entries(num_lists, 0)
    }
    /// Create a table with room for `entries` entries in total.
    pub fn with_entries(num_lists: usize, entries: usize) -> OccurrenceTable {
        requires!(num_lists > 0, "occurrence table without lists");
        requires!(entries <= u32::MAX as usize);
        OccurrenceTable {
            starts: Array::new(0, num_lists),
            caps: Array::new(0, num_lists),
            sizes: Array::new(0, num_lists),
            occurs: Vector::zeroed(entries),
            max_entries: 0,
        }
    }
    /// Bytes needed for a table of this shape.
    pub fn footprint(num_lists: usize, entries: usize) -> usize {
        (3 * num_lists + entries) * std::mem::size_of::<u32>()
    }
    pub fn num_lists(&self) -> usize {
        self.starts.size()
    }
    /// Sum of the provisioned list capacities.
    pub fn capacity(&self) -> usize {
        self.max_entries as usize
    }
    /// Size of the shared entry buffer.
    pub fn entries_capacity(&self) -> usize {
        self.occurs.len()
    }
    /// The list of `literal`.
    pub fn list(&self, literal: Literal) -> OccurList<'_> {
        requires!(
            literal.as_offset() < self.num_lists(),
            "literal {} has no occurrence list ({} lists)",
            literal,
            self.num_lists()
        );
        let start = self.starts[literal] as usize;
        let size = self.sizes[literal];
        let cap = self.caps[literal];
        let stored = size.min(cap) as usize;
        OccurList {
            refs: &self.occurs[start..start + stored],
            size,
            cap,
        }
    }
    /// The list of `literal`, for host-side edits.
    pub fn list_mut(&mut self, literal: Literal) -> OccurListMut<'_> {
        requires!(
            literal.as_offset() < self.num_lists(),
            "literal {} has no occurrence list ({} lists)",
            literal,
            self.num_lists()
        );
        let start = self.starts[literal] as usize;
        let cap = self.caps[literal] as usize;
        OccurListMut {
            refs: &mut self.occurs[start..start + cap],
            size: &mut self.sizes[literal],
        }
    }
    /// Forget all capacities and entries ahead of re-provisioning.
    ///
    /// The list layout stays until the next [`provision()`](#method.provision).
    pub fn reset_cap(&mut self) {
        self.max_entries = 0;
        for size in self.sizes.iter_mut() {
            *size = 0;
        }
    }
    /// Lay out the lists so that list `i` can hold exactly `histogram[i]` entries.
    pub fn provision(&mut self, histogram: &[u32]) {
        requires!(histogram.len() == self.num_lists());
        let total: u64 = histogram.iter().map(|&count| u64::from(count)).sum();
        requires!(
            total <= self.entries_capacity() as u64,
            "occurrence table has room for {} entries, {} requested",
            self.entries_capacity(),
            total
        );
        let mut start = 0;
        for (index, &count) in histogram.iter().enumerate() {
            let literal = Literal::from_raw(index as u32);
            self.starts[literal] = start;
            self.caps[literal] = count;
            self.sizes[literal] = 0;
            start += count;
        }
        self.max_entries = total as u32;
    }
    /// Check that no list holds more entries than it was provisioned for.
    ///
    /// Reports the first offending literal of variables `1..=max_var`.
    pub fn check_capacity_invariant(&self, max_var: Variable) -> Result<(), CapacityViolation> {
        requires!(literal_array_len(max_var) <= self.num_lists());
        for variable in Variable::range(max_var) {
            for &literal in &[variable.literal(), -variable.literal()] {
                let (size, capacity) = (self.sizes[literal], self.caps[literal]);
                if size > capacity {
                    let violation = CapacityViolation {
                        literal,
                        size,
                        capacity,
                    };
                    error!("{}", violation);
                    return Err(violation);
                }
            }
        }
        Ok(())
    }
    /// Start a concurrent population pass.
    pub fn population(&mut self) -> TablePopulation<'_> {
        let OccurrenceTable {
            starts,
            caps,
            sizes,
            occurs,
            ..
        } = self;
        TablePopulation {
            starts,
            caps,
            sizes: as_atomic(&mut sizes.data),
            occurs: as_atomic(occurs),
        }
    }
    /// Add every live clause of `arena` to the lists of its literals.
    pub fn populate(&mut self, arena: &ClauseArena) {
        let pass = self.population();
        (0..arena.len()).into_par_iter().for_each(|index| {
            let clause = arena.clause(index);
            if clause.is_live() {
                let cref = arena.cref(index);
                for &literal in clause.literals() {
                    pass.push(literal, cref);
                }
            }
        });
    }
    /// Print every list with its capacity.
    pub fn print(&self) {
        for index in 2..self.num_lists() {
            let literal = Literal::from_raw(index as u32);
            let list = self.list(literal);
            comment!(
                " | list[{}][cap = {}] {:?}",
                literal,
                list.capacity(),
                list.refs
            );
        }
    }
}

/// Count the occurrences of every literal in the live clauses of `arena`.
pub fn histogram(arena: &ClauseArena, num_lists: usize) -> Vector<u32> {
    let mut counts = Vector::zeroed(num_lists);
    {
        let counts = as_atomic(&mut counts);
        (0..arena.len()).into_par_iter().for_each(|index| {
            let clause = arena.clause(index);
            if clause.is_live() {
                for literal in clause.literals() {
                    counts[literal.as_offset()].fetch_add(1, Ordering::Relaxed);
                }
            }
        });
    }
    counts
}

/// Read-only view of one occurrence list.
#[derive(Debug, Clone, Copy)]
pub struct OccurList<'a> {
    refs: &'a [u32],
    size: u32,
    cap: u32,
}

impl<'a> OccurList<'a> {
    /// Number of entries pushed, which may exceed the capacity.
    pub fn len(&self) -> usize {
        self.size as usize
    }
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
    pub fn capacity(&self) -> usize {
        self.cap as usize
    }
    pub fn overflowed(&self) -> bool {
        self.size > self.cap
    }
    /// The stored references.
    pub fn iter(&self) -> impl Iterator<Item = ClauseRef> + 'a {
        self.refs.iter().map(|&r| ClauseRef(r))
    }
}

/// Mutable view of one occurrence list.
pub struct OccurListMut<'a> {
    refs: &'a mut [u32],
    size: &'a mut u32,
}

impl<'a> OccurListMut<'a> {
    /// # Panics
    /// Panics if the list is full.
    pub fn push(&mut self, cref: ClauseRef) {
        let size = *self.size as usize;
        requires!(
            size < self.refs.len(),
            "occurrence list overflow (cap: {})",
            self.refs.len()
        );
        self.refs[size] = cref.0;
        *self.size += 1;
    }
    /// Remove `cref` if present; the order of the remaining entries changes.
    pub fn remove(&mut self, cref: ClauseRef) -> bool {
        let size = *self.size as usize;
        match self.refs[..size].iter().position(|&r| r == cref.0) {
            Some(position) => {
                self.refs.swap(position, size - 1);
                *self.size -= 1;
                true
            }
            None => false,
        }
    }
    pub fn clear(&mut self) {
        *self.size = 0;
    }
}

/// Append handle for a concurrent population pass.
pub struct TablePopulation<'a> {
    starts: &'a Array<Literal, u32>,
    caps: &'a Array<Literal, u32>,
    sizes: &'a [AtomicU32],
    occurs: &'a [AtomicU32],
}

impl<'a> TablePopulation<'a> {
    /// Append `cref` to the list of `literal`.
    ///
    /// Entries beyond the provisioned capacity are counted but dropped.
    pub fn push(&self, literal: Literal, cref: ClauseRef) {
        assert_in_bounds(0..self.sizes.len(), literal.as_offset());
        let position = self.sizes[literal.as_offset()].fetch_add(1, Ordering::Relaxed);
        if position < self.caps[literal] {
            let start = self.starts[literal] as usize;
            self.occurs[start + position as usize].store(cref.0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::ClauseStatus;

    fn lits(values: &[i32]) -> Vec<Literal> {
        values.iter().map(|&value| Literal::new(value)).collect()
    }

    fn sample_arena() -> ClauseArena {
        let mut arena = ClauseArena::new(1000, 10);
        arena.new_clause(&lits(&[1, 2]), ClauseStatus::Original);
        arena.new_clause(&lits(&[-1, 2, 3]), ClauseStatus::Learnt);
        arena.new_clause(&lits(&[1, -3]), ClauseStatus::Deleted);
        arena.new_clause(&lits(&[2, -3]), ClauseStatus::Original);
        arena
    }

    #[test]
    fn histogram_counts_live_clauses() {
        let arena = sample_arena();
        let counts = histogram(&arena, literal_array_len(Variable(3)));
        assert_eq!(counts[Literal::new(1).as_offset()], 1);
        assert_eq!(counts[Literal::new(-1).as_offset()], 1);
        assert_eq!(counts[Literal::new(2).as_offset()], 3);
        assert_eq!(counts[Literal::new(-3).as_offset()], 1);
    }

    #[test]
    fn provision_and_populate() {
        let arena = sample_arena();
        let num_lists = literal_array_len(Variable(3));
        let counts = histogram(&arena, num_lists);
        let mut table = OccurrenceTable::with_entries(num_lists, 16);
        table.provision(&counts);
        assert_eq!(table.capacity(), 7);
        table.populate(&arena);
        assert_eq!(table.check_capacity_invariant(Variable(3)), Ok(()));
        let mut positive_two: Vec<ClauseRef> = table.list(Literal::new(2)).iter().collect();
        positive_two.sort();
        assert_eq!(positive_two, vec![arena.cref(0), arena.cref(1), arena.cref(3)]);
        assert_eq!(
            table.list(Literal::new(-3)).iter().collect::<Vec<_>>(),
            vec![arena.cref(3)]
        );
        assert!(table.list(Literal::new(-2)).is_empty());
    }

    #[test]
    fn overflow_is_reported_with_literal() {
        let num_lists = literal_array_len(Variable(2));
        let mut counts: Vector<u32> = Vector::zeroed(num_lists);
        counts[Literal::new(-2).as_offset()] = 2;
        counts[Literal::new(1).as_offset()] = 1;
        let mut table = OccurrenceTable::with_entries(num_lists, 3);
        table.provision(&counts);
        {
            let pass = table.population();
            pass.push(Literal::new(1), ClauseRef(0));
            for r in 0..3 {
                pass.push(Literal::new(-2), ClauseRef(r * 5));
            }
        }
        let list = table.list(Literal::new(-2));
        assert!(list.overflowed());
        assert_eq!(list.iter().count(), 2);
        // the neighbouring list was not overwritten
        assert_eq!(table.list(Literal::new(1)).iter().collect::<Vec<_>>(), vec![ClauseRef(0)]);
        assert_eq!(
            table.check_capacity_invariant(Variable(2)),
            Err(CapacityViolation {
                literal: Literal::new(-2),
                size: 3,
                capacity: 2,
            })
        );
    }

    #[test]
    fn exact_capacity_is_fine() {
        let num_lists = literal_array_len(Variable(1));
        let mut counts: Vector<u32> = Vector::zeroed(num_lists);
        counts[Literal::new(1).as_offset()] = 2;
        let mut table = OccurrenceTable::with_entries(num_lists, 2);
        table.provision(&counts);
        let mut list = table.list_mut(Literal::new(1));
        list.push(ClauseRef(0));
        list.push(ClauseRef(4));
        assert!(table.check_capacity_invariant(Variable(1)).is_ok());
    }

    #[test]
    fn host_side_edits_and_reset() {
        let num_lists = literal_array_len(Variable(1));
        let mut counts: Vector<u32> = Vector::zeroed(num_lists);
        counts[Literal::new(-1).as_offset()] = 3;
        let mut table = OccurrenceTable::with_entries(num_lists, 3);
        table.provision(&counts);
        {
            let mut list = table.list_mut(Literal::new(-1));
            list.push(ClauseRef(0));
            list.push(ClauseRef(4));
            list.push(ClauseRef(9));
            assert!(list.remove(ClauseRef(0)));
            assert!(!list.remove(ClauseRef(1)));
        }
        let mut remaining: Vec<_> = table.list(Literal::new(-1)).iter().collect();
        remaining.sort();
        assert_eq!(remaining, vec![ClauseRef(4), ClauseRef(9)]);
        table.reset_cap();
        assert_eq!(table.capacity(), 0);
        assert!(table.list(Literal::new(-1)).is_empty());
    }

    #[test]
    #[should_panic(expected = "occurrence list overflow")]
    fn host_side_overflow_is_fatal() {
        let mut table = OccurrenceTable::with_entries(4, 0);
        table.list_mut(Literal::new(1)).push(ClauseRef(0));
    }

    #[test]
    #[should_panic(expected = "has no occurrence list")]
    fn unknown_literal_is_rejected() {
        let table = OccurrenceTable::with_entries(4, 0);
        table.list(Literal::from_raw(1_000_000));
    }

    #[test]
    #[should_panic(expected = "has no occurrence list")]
    fn unknown_literal_is_rejected_for_edits() {
        let mut table = OccurrenceTable::with_entries(4, 0);
        table.list_mut(Literal::from_raw(4));
    }
}
