//! Failures reported to the simplification driver
//!
//! Everything in here is recoverable at phase granularity: the driver skips
//! (or aborts) the current simplification phase and keeps solving. Broken
//! capacity estimates inside a pass are bugs and panic instead.

use crate::pool::PoolKind;
use gsimp_common::literal::Literal;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for pool operations
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors returned by the memory pool manager
#[derive(Debug, Error)]
pub enum PoolError {
    /// The admission gate refused an allocation
    #[error("not enough device memory for {label}: {projected} of {total} bytes would be in use")]
    OutOfMemory {
        label: &'static str,
        projected: usize,
        total: usize,
    },

    /// The device could not report its memory budget
    #[error("cannot query device memory: {0}")]
    DeviceQuery(String),

    /// The operation needs a pool that has not been allocated yet
    #[error("{0} pool is not allocated")]
    NotAllocated(PoolKind),

    /// The pools were released, nothing can be allocated any more
    #[error("memory pools have been destroyed")]
    Destroyed,

    /// Relocation needs every submitted task to have finished
    #[error("{pending} submitted tasks still reference the pools")]
    PendingTasks { pending: usize },

    /// The round-state pool is fixed in size for the whole phase
    #[error("round-state pool holds {allocated} bytes, {requested} requested")]
    FixedPool { allocated: usize, requested: usize },

    /// The options file could not be read
    #[error("cannot read {}: {source}", path.display())]
    OptionsFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The options file could not be parsed
    #[error("invalid pool options: {0}")]
    Options(#[from] toml::de::Error),

    /// A report could not be rendered
    #[error("cannot render pool report: {0}")]
    Report(#[from] toml::ser::Error),
}

impl PoolError {
    /// True if the driver should skip the phase rather than report a bug.
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, PoolError::OutOfMemory { .. })
    }
}

/// An occurrence list that received more entries than it was provisioned for
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
#[error("list({literal}) size exceeded allocated capacity (cap: {capacity}, sz: {size})")]
pub struct CapacityViolation {
    pub literal: Literal,
    pub size: u32,
    pub capacity: u32,
}
