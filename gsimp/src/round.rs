//! Per-round variable state
//!
//! A [`RoundState`] does not own the round-state buffer, it only knows where
//! its parts live inside the buffer of the pool manager. All accessors take
//! the manager to get at the data. The only thing it owns is the host cache
//! of unit clauses.

use crate::{
    device::Device,
    error::{PoolError, PoolResult},
    pool::{MemoryPools, PoolKind},
};
use gsimp_common::{
    literal::{as_literals, Literal, Variable},
    memory::{BoundedVector, Offset},
};
use serde_derive::Serialize;
use std::ops::Range;

/// Words reserved for [`GlobalStats`] at the start of the buffer.
const STATS_WORDS: usize = 4;
const NUM_DEL_VARS: usize = 0;
const NUM_CLAUSES: usize = 1;
const NUM_LITS: usize = 2;

/// Counters the driver reads to decide whether to run another round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GlobalStats {
    pub num_del_vars: u32,
    pub num_clauses: u32,
    pub num_lits: u32,
}

/// State of a variable during simplification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum VarState {
    Active = 0,
    /// Eliminated
    Melted = 1,
    /// Excluded from elimination
    Frozen = 2,
}

/// Views into the round-state buffer.
#[derive(Debug)]
pub struct RoundState {
    num_vars: usize,
    pvars: Range<usize>,
    units: Range<usize>,
    scores: Range<usize>,
    eligible: Range<usize>,
    vstate: Range<usize>,
    cached_units: Option<BoundedVector<Literal>>,
    num_pvs: usize,
    num_eligible: usize,
    n_units: usize,
    mu_inc: u32,
}

impl RoundState {
    /// Size of the buffer for `num_vars` variables.
    pub fn words_for(num_vars: usize) -> usize {
        STATS_WORDS + 3 * num_vars + 2 * (num_vars + 1)
    }
    pub(crate) fn new(num_vars: usize) -> RoundState {
        let mut start = STATS_WORDS;
        let mut region = |len: usize| {
            let range = start..start + len;
            start += len;
            range
        };
        let pvars = region(num_vars);
        let units = region(num_vars);
        let scores = region(num_vars + 1);
        let eligible = region(num_vars);
        let vstate = region(num_vars + 1);
        invariant!(vstate.end == RoundState::words_for(num_vars));
        RoundState {
            num_vars,
            pvars,
            units,
            scores,
            eligible,
            vstate,
            cached_units: None,
            num_pvs: 0,
            num_eligible: 0,
            n_units: 0,
            mu_inc: 0,
        }
    }

    fn buffer<'a, D: Device>(&self, pools: &'a MemoryPools<D>) -> PoolResult<&'a [u32]> {
        let buffer = pools
            .contents()
            .round_buffer()
            .ok_or(PoolError::NotAllocated(PoolKind::Vars))?;
        requires!(buffer.len() >= self.vstate.end, "round-state outlived its buffer");
        Ok(buffer)
    }
    fn buffer_mut<'a, D: Device>(&self, pools: &'a mut MemoryPools<D>) -> PoolResult<&'a mut [u32]> {
        let buffer = pools
            .contents_mut()
            .round_buffer_mut()
            .ok_or(PoolError::NotAllocated(PoolKind::Vars))?;
        requires!(buffer.len() >= self.vstate.end, "round-state outlived its buffer");
        Ok(buffer)
    }

    pub fn num_vars(&self) -> usize {
        self.num_vars
    }
    /// Number of elimination candidates.
    pub fn num_pvs(&self) -> usize {
        self.num_pvs
    }
    pub fn num_units(&self) -> usize {
        self.n_units
    }
    pub fn mu_inc(&self) -> u32 {
        self.mu_inc
    }
    pub fn set_mu_inc(&mut self, mu_inc: u32) {
        self.mu_inc = mu_inc;
    }

    pub fn stats<D: Device>(&self, pools: &MemoryPools<D>) -> PoolResult<GlobalStats> {
        let buffer = self.buffer(pools)?;
        Ok(GlobalStats {
            num_del_vars: buffer[NUM_DEL_VARS],
            num_clauses: buffer[NUM_CLAUSES],
            num_lits: buffer[NUM_LITS],
        })
    }
    /// Zero the counters, once per round.
    pub fn reset_stats<D: Device>(&self, pools: &mut MemoryPools<D>) -> PoolResult<()> {
        let buffer = self.buffer_mut(pools)?;
        for word in &mut buffer[..STATS_WORDS] {
            *word = 0;
        }
        Ok(())
    }
    /// Recount live clauses and literals in the clause arena, and melted
    /// variables.
    pub fn collect_stats<D: Device>(&self, pools: &mut MemoryPools<D>) -> PoolResult<GlobalStats> {
        let (num_clauses, num_lits) = pools
            .arena()
            .ok_or(PoolError::NotAllocated(PoolKind::Cnf))?
            .count_live();
        let buffer = self.buffer_mut(pools)?;
        let num_del_vars = buffer[self.vstate.clone()]
            .iter()
            .skip(1)
            .filter(|&&state| state == VarState::Melted as u32)
            .count();
        let stats = GlobalStats {
            num_del_vars: num_del_vars as u32,
            num_clauses: num_clauses as u32,
            num_lits: num_lits as u32,
        };
        buffer[NUM_DEL_VARS] = stats.num_del_vars;
        buffer[NUM_CLAUSES] = stats.num_clauses;
        buffer[NUM_LITS] = stats.num_lits;
        Ok(stats)
    }

    /// The elimination candidates.
    pub fn pvars<'a, D: Device>(&self, pools: &'a MemoryPools<D>) -> PoolResult<&'a [u32]> {
        let start = self.pvars.start;
        Ok(&self.buffer(pools)?[start..start + self.num_pvs])
    }
    pub fn set_pvars<D: Device>(
        &mut self,
        pools: &mut MemoryPools<D>,
        variables: &[Variable],
    ) -> PoolResult<()> {
        requires!(variables.len() <= self.num_vars);
        let start = self.pvars.start;
        let buffer = self.buffer_mut(pools)?;
        for (slot, variable) in buffer[start..start + variables.len()]
            .iter_mut()
            .zip(variables)
        {
            requires!(variable.as_offset() <= self.num_vars);
            *slot = variable.0;
        }
        self.num_pvs = variables.len();
        Ok(())
    }
    /// Candidates that passed the elimination heuristics.
    pub fn eligible<'a, D: Device>(&self, pools: &'a MemoryPools<D>) -> PoolResult<&'a [u32]> {
        let start = self.eligible.start;
        Ok(&self.buffer(pools)?[start..start + self.num_eligible])
    }
    pub fn set_eligible<D: Device>(
        &mut self,
        pools: &mut MemoryPools<D>,
        variables: &[u32],
    ) -> PoolResult<()> {
        requires!(variables.len() <= self.num_vars);
        let start = self.eligible.start;
        self.buffer_mut(pools)?[start..start + variables.len()].copy_from_slice(variables);
        self.num_eligible = variables.len();
        Ok(())
    }
    /// Scores indexed by variable.
    pub fn scores<'a, D: Device>(&self, pools: &'a MemoryPools<D>) -> PoolResult<&'a [u32]> {
        Ok(&self.buffer(pools)?[self.scores.clone()])
    }
    pub fn scores_mut<'a, D: Device>(
        &self,
        pools: &'a mut MemoryPools<D>,
    ) -> PoolResult<&'a mut [u32]> {
        let range = self.scores.clone();
        Ok(&mut self.buffer_mut(pools)?[range])
    }
    /// States indexed by variable, see [`VarState`].
    pub fn vstate<'a, D: Device>(&self, pools: &'a MemoryPools<D>) -> PoolResult<&'a [u32]> {
        Ok(&self.buffer(pools)?[self.vstate.clone()])
    }
    pub fn set_vstate<D: Device>(
        &self,
        pools: &mut MemoryPools<D>,
        variable: Variable,
        state: VarState,
    ) -> PoolResult<()> {
        requires!(variable.0 >= 1 && variable.as_offset() <= self.num_vars);
        let index = self.vstate.start + variable.as_offset();
        self.buffer_mut(pools)?[index] = state as u32;
        Ok(())
    }

    /// Units discovered in this round.
    pub fn units<'a, D: Device>(&self, pools: &'a MemoryPools<D>) -> PoolResult<&'a [Literal]> {
        let start = self.units.start;
        Ok(as_literals(&self.buffer(pools)?[start..start + self.n_units]))
    }
    pub fn push_unit<D: Device>(&mut self, pools: &mut MemoryPools<D>, unit: Literal) -> PoolResult<()> {
        requires!(self.n_units < self.num_vars, "more units than variables");
        let index = self.units.start + self.n_units;
        self.buffer_mut(pools)?[index] = unit.encoding;
        self.n_units += 1;
        Ok(())
    }
    pub fn clear_units(&mut self) {
        self.n_units = 0;
    }
    /// Copy the units to the host cache, replacing what was cached before.
    pub fn cache_units<D: Device>(&mut self, pools: &MemoryPools<D>) -> PoolResult<()> {
        let units = self.units(pools)?;
        let mut cache = BoundedVector::with_capacity(units.len());
        for &unit in units {
            cache.push(unit);
        }
        self.cached_units = Some(cache);
        Ok(())
    }
    pub fn cached_units(&self) -> Option<&[Literal]> {
        self.cached_units.as_deref()
    }
    pub fn release_cache(&mut self) {
        self.cached_units = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clause::ClauseStatus, device::FixedBudget, options::PoolOptions};

    fn pools() -> MemoryPools<FixedBudget> {
        MemoryPools::new(FixedBudget::new(1 << 20, 1 << 20), PoolOptions::default()).unwrap()
    }

    #[test]
    fn regions_are_disjoint() {
        let state = RoundState::new(5);
        let regions = [
            state.pvars.clone(),
            state.units.clone(),
            state.scores.clone(),
            state.eligible.clone(),
            state.vstate.clone(),
        ];
        assert_eq!(regions[0].start, STATS_WORDS);
        for pair in regions.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(state.vstate.len(), 6);
        assert_eq!(RoundState::words_for(5), state.vstate.end);
    }

    #[test]
    fn views_share_the_pool_buffer() {
        let mut pools = pools();
        let mut state = pools.allocate_round_state(4).unwrap();
        state
            .set_pvars(&mut pools, &[Variable(2), Variable(4)])
            .unwrap();
        state.scores_mut(&mut pools).unwrap()[2] = 17;
        state.set_eligible(&mut pools, &[4]).unwrap();
        state
            .set_vstate(&mut pools, Variable(3), VarState::Frozen)
            .unwrap();
        assert_eq!(state.pvars(&pools).unwrap(), &[2, 4]);
        assert_eq!(state.scores(&pools).unwrap()[2], 17);
        assert_eq!(state.eligible(&pools).unwrap(), &[4]);
        assert_eq!(state.vstate(&pools).unwrap()[3], VarState::Frozen as u32);
        assert_eq!(state.num_pvs(), 2);

        // a new round starts from a zeroed buffer
        let state = pools.allocate_round_state(4).unwrap();
        assert!(state.scores(&pools).unwrap().iter().all(|&score| score == 0));
    }

    #[test]
    fn unit_cache_is_owned() {
        let mut pools = pools();
        let mut state = pools.allocate_round_state(3).unwrap();
        state.push_unit(&mut pools, Literal::new(-2)).unwrap();
        state.push_unit(&mut pools, Literal::new(3)).unwrap();
        assert!(state.cached_units().is_none());
        state.cache_units(&pools).unwrap();
        state.clear_units();
        assert!(state.units(&pools).unwrap().is_empty());
        assert_eq!(
            state.cached_units().unwrap(),
            &[Literal::new(-2), Literal::new(3)]
        );
        // releasing the cache leaves the pool alone
        state.release_cache();
        assert!(state.cached_units().is_none());
        assert!(pools.contents().round_buffer().is_some());
    }

    #[test]
    #[should_panic(expected = "more units than variables")]
    fn unit_overflow_is_fatal() {
        let mut pools = pools();
        let mut state = pools.allocate_round_state(1).unwrap();
        state.push_unit(&mut pools, Literal::new(1)).unwrap();
        state.push_unit(&mut pools, Literal::new(-1)).unwrap();
    }

    #[test]
    fn collect_and_reset_stats() {
        let mut pools = pools();
        pools.grow_clause_arena(1000, 10).unwrap();
        {
            let arena = pools.arena_mut().unwrap();
            let lits = |values: &[i32]| -> Vec<Literal> {
                values.iter().map(|&value| Literal::new(value)).collect()
            };
            arena.new_clause(&lits(&[1, 2]), ClauseStatus::Original);
            arena.new_clause(&lits(&[-1, 2, 3]), ClauseStatus::Deleted);
            arena.new_clause(&lits(&[2, -3, 4]), ClauseStatus::Learnt);
        }
        let state = pools.allocate_round_state(4).unwrap();
        state
            .set_vstate(&mut pools, Variable(1), VarState::Melted)
            .unwrap();
        let expected = GlobalStats {
            num_del_vars: 1,
            num_clauses: 2,
            num_lits: 5,
        };
        assert_eq!(state.collect_stats(&mut pools).unwrap(), expected);
        assert_eq!(state.stats(&pools).unwrap(), expected);
        state.reset_stats(&mut pools).unwrap();
        assert_eq!(state.stats(&pools).unwrap(), GlobalStats::default());
    }

    #[test]
    fn views_fail_after_destroy() {
        let mut pools = pools();
        let state = pools.allocate_round_state(2).unwrap();
        pools.destroy();
        assert!(matches!(
            state.stats(&pools),
            Err(PoolError::NotAllocated(PoolKind::Vars))
        ));
    }
}
