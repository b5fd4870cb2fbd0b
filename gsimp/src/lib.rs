//! Storage for parallel CNF simplification
//!
//! - [`ClauseArena`](arena/struct.ClauseArena.html) keeps clause records in
//!   one flat buffer and hands out offsets that survive relocation.
//! - [`OccurrenceTable`](occurrence/struct.OccurrenceTable.html) maps each
//!   literal to the clauses containing it, with capacities fixed before
//!   concurrent population.
//! - [`MemoryPools`](pool/struct.MemoryPools.html) owns the buffers behind
//!   both, plus the per-round variable state, under an explicit memory budget.

#[macro_use(log, warn, error, requires, invariant, comment)]
extern crate gsimp_common;

pub mod arena;
pub mod clause;
pub mod device;
pub mod error;
pub mod occurrence;
pub mod options;
pub mod pool;
pub mod round;
pub mod stream;

pub use crate::{
    arena::ClauseArena,
    clause::{ClauseRef, ClauseStatus},
    device::{Device, FixedBudget, HostDevice},
    error::{CapacityViolation, PoolError, PoolResult},
    occurrence::OccurrenceTable,
    options::{GrowthPolicy, PoolOptions},
    pool::{MemoryPools, PoolKind, PoolState},
    round::{GlobalStats, RoundState},
    stream::Stream,
};
