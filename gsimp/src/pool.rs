//! Memory pool manager
//!
//! Owns every buffer the simplifier works on: the clause arena, its host
//! mirror, the occurrence table and the round-state buffer. Allocations go
//! through an admission gate that compares the projected usage against the
//! memory the device reports, so that a simplification phase can be skipped
//! instead of running out of memory halfway through.
//!
//! Work that runs "on the device" is submitted to a [`Stream`] and executed
//! in submission order when the stream is synchronized. Relocating a pool
//! requires that no submitted task is outstanding.

use crate::{
    arena::ClauseArena,
    device::{Capability, Device},
    error::{PoolError, PoolResult},
    occurrence::OccurrenceTable,
    options::{GrowthPolicy, PoolOptions},
    round::RoundState,
    stream::Stream,
};
use gsimp_common::{
    memory::{format_memory_usage, HeapSpace, Vector},
    output::Timer,
};
use serde_derive::Serialize;
use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

/// The buffers managed by [`MemoryPools`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PoolKind {
    /// The device-resident clause arena
    Cnf,
    /// The host mirror of the clause arena
    HostCnf,
    /// The occurrence table
    Table,
    /// The round-state buffer
    Vars,
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            PoolKind::Cnf => "clause arena",
            PoolKind::HostCnf => "host clause arena",
            PoolKind::Table => "occurrence table",
            PoolKind::Vars => "round-state",
        };
        write!(f, "{}", name)
    }
}

/// Lifecycle of a pool. `Grown` may repeat; `Freed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolState {
    Unallocated,
    Allocated,
    Grown,
    Freed,
}

/// Capacity and state of one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolDescriptor {
    /// Bytes owned by this pool
    pub cap: usize,
    pub state: PoolState,
}

impl PoolDescriptor {
    const UNALLOCATED: PoolDescriptor = PoolDescriptor {
        cap: 0,
        state: PoolState::Unallocated,
    };
    fn allocated(cap: usize) -> PoolDescriptor {
        PoolDescriptor {
            cap,
            state: PoolState::Allocated,
        }
    }
    fn grown(cap: usize) -> PoolDescriptor {
        PoolDescriptor {
            cap,
            state: PoolState::Grown,
        }
    }
    pub fn is_allocated(&self) -> bool {
        matches!(self.state, PoolState::Allocated | PoolState::Grown)
    }
}

/// Where the clause arena is preferably kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Residency {
    Host,
    Device,
}

/// The data behind the pools; this is what submitted tasks operate on.
#[derive(Debug)]
pub struct PoolContents {
    cnf: Option<ClauseArena>,
    hcnf: Option<ClauseArena>,
    table: Option<OccurrenceTable>,
    vars: Option<Vector<u32>>,
    cnf_residency: Residency,
}

impl PoolContents {
    fn empty() -> PoolContents {
        PoolContents {
            cnf: None,
            hcnf: None,
            table: None,
            vars: None,
            cnf_residency: Residency::Host,
        }
    }
    pub fn arena(&self) -> Option<&ClauseArena> {
        self.cnf.as_ref()
    }
    pub fn arena_mut(&mut self) -> Option<&mut ClauseArena> {
        self.cnf.as_mut()
    }
    pub fn mirror(&self) -> Option<&ClauseArena> {
        self.hcnf.as_ref()
    }
    pub fn table(&self) -> Option<&OccurrenceTable> {
        self.table.as_ref()
    }
    pub fn table_mut(&mut self) -> Option<&mut OccurrenceTable> {
        self.table.as_mut()
    }
    /// The arena together with the table, for populating the table.
    pub fn arena_and_table_mut(&mut self) -> (Option<&ClauseArena>, Option<&mut OccurrenceTable>) {
        (self.cnf.as_ref(), self.table.as_mut())
    }
    pub fn round_buffer(&self) -> Option<&[u32]> {
        self.vars.as_deref()
    }
    pub fn round_buffer_mut(&mut self) -> Option<&mut [u32]> {
        self.vars.as_deref_mut()
    }
    pub fn residency(&self) -> Residency {
        self.cnf_residency
    }
}

impl HeapSpace for PoolContents {
    fn heap_space(&self) -> usize {
        self.cnf.as_ref().map_or(0, |arena| arena.heap_space())
            + self.hcnf.as_ref().map_or(0, |arena| arena.heap_space())
            + self.table.as_ref().map_or(0, |table| table.heap_space())
            + self.vars.as_ref().map_or(0, |vars| vars.heap_space())
    }
}

/// Explicit owner of all simplifier memory.
pub struct MemoryPools<D: Device> {
    device: D,
    pub options: PoolOptions,
    cnf_pool: PoolDescriptor,
    hcnf_pool: PoolDescriptor,
    ot_pool: PoolDescriptor,
    vars_pool: PoolDescriptor,
    /// Free device memory at the last query
    free: usize,
    /// Total device memory at the last query
    total: usize,
    /// Projected usage at the last admission check
    used: usize,
    /// Bytes committed to the device pools
    cap: usize,
    /// Tasks submitted but not yet executed, shared with all streams
    pending: Arc<AtomicUsize>,
    contents: PoolContents,
    destroyed: bool,
}

impl<D: Device> MemoryPools<D> {
    /// Create a manager without any pools.
    pub fn new(device: D, options: PoolOptions) -> PoolResult<MemoryPools<D>> {
        let info = device.memory_info()?;
        let pools = MemoryPools {
            device,
            options,
            cnf_pool: PoolDescriptor::UNALLOCATED,
            hcnf_pool: PoolDescriptor::UNALLOCATED,
            ot_pool: PoolDescriptor::UNALLOCATED,
            vars_pool: PoolDescriptor::UNALLOCATED,
            free: info.free,
            total: info.total,
            used: info.total.saturating_sub(info.free),
            cap: 0,
            pending: Arc::new(AtomicUsize::new(0)),
            contents: PoolContents::empty(),
            destroyed: false,
        };
        log!(
            pools,
            1,
            "Memory pools on {} device ({} MB free of {} MB)",
            pools.device.name(),
            pools.free >> 20,
            pools.total >> 20
        );
        Ok(pools)
    }
    /// Admission gate: can `requested` more bytes be committed?
    ///
    /// Refuses if the memory in use on the device, plus what the pools have
    /// already committed, plus the request would reach the device total.
    pub fn has_free_memory(&mut self, label: &str, requested: usize) -> PoolResult<bool> {
        let fits = self.fits(label, requested)?;
        if !fits {
            warn!(
                "not enough memory for {} (current = {} MB) -> skip simp.",
                label,
                self.used.saturating_add(requested) >> 20
            );
        }
        Ok(fits)
    }
    /// The admission gate without the warning, for optional allocations.
    fn fits(&mut self, label: &str, requested: usize) -> PoolResult<bool> {
        let info = self.device.memory_info()?;
        self.free = info.free;
        self.total = info.total;
        let used_before = self.used;
        self.used = info.total.saturating_sub(info.free).saturating_add(self.cap);
        let projected = self.used.saturating_add(requested);
        log!(
            self,
            2,
            "Allocating memory for {} (used/free = {:.2}/{} MB)",
            label,
            (projected as f64 - used_before as f64) / (1 << 20) as f64,
            self.free >> 20
        );
        Ok(projected < self.total)
    }
    /// Run the admission gate and commit `requested` bytes on success.
    fn admit(&mut self, label: &'static str, requested: usize) -> PoolResult<()> {
        if !self.has_free_memory(label, requested)? {
            return Err(PoolError::OutOfMemory {
                label,
                projected: self.used.saturating_add(requested),
                total: self.total,
            });
        }
        self.cap += requested;
        Ok(())
    }
    /// Give back `bytes` previously committed.
    fn release(&mut self, bytes: usize) {
        invariant!(bytes <= self.cap);
        self.cap -= bytes;
    }
    fn check_alive(&self) -> PoolResult<()> {
        if self.destroyed {
            return Err(PoolError::Destroyed);
        }
        Ok(())
    }
    fn check_idle(&self) -> PoolResult<()> {
        match self.pending_tasks() {
            0 => Ok(()),
            pending => Err(PoolError::PendingTasks { pending }),
        }
    }
    /// Bytes to allocate when `current` must hold at least `required`.
    fn grown_capacity(&self, current: usize, required: usize) -> usize {
        match self.options.growth {
            GrowthPolicy::Exact => required.max(current),
            GrowthPolicy::Geometric => {
                let mut capacity = current.max(1);
                while capacity < required {
                    capacity = capacity.saturating_mul(2);
                }
                capacity
            }
        }
    }

    /// A new submission queue.
    pub fn create_stream(&self) -> Stream {
        Stream::new(Arc::clone(&self.pending))
    }
    /// Queue `task` on `stream`.
    pub fn submit(
        &mut self,
        stream: &mut Stream,
        task: impl FnOnce(&mut PoolContents) + Send + 'static,
    ) -> PoolResult<()> {
        self.check_alive()?;
        requires!(stream.belongs_to(&self.pending), "foreign stream");
        stream.push(Box::new(task));
        log!(self, 3, "Submitted task ({} pending)", self.pending_tasks());
        Ok(())
    }
    /// Wait for all tasks of `stream`, running them in order.
    pub fn synchronize(&mut self, stream: &mut Stream) {
        requires!(stream.belongs_to(&self.pending), "foreign stream");
        let executed = stream.drain(&mut self.contents);
        if executed > 0 {
            log!(self, 3, "Synchronized {} tasks", executed);
        }
    }
    /// Number of submitted tasks that did not run yet, over all streams.
    pub fn pending_tasks(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Provide the round-state buffer for `num_vars` variables.
    ///
    /// The buffer is allocated once per phase; later rounds reuse it as long
    /// as it is big enough.
    pub fn allocate_round_state(&mut self, num_vars: usize) -> PoolResult<RoundState> {
        self.check_alive()?;
        let words = RoundState::words_for(num_vars);
        let bytes = words * std::mem::size_of::<u32>();
        match self.contents.vars.as_mut() {
            None => {
                self.admit("round-state", bytes)?;
                self.contents.vars = Some(Vector::zeroed(words));
                self.vars_pool = PoolDescriptor::allocated(bytes);
                log!(self, 2, "Allocated round-state for {} variables", num_vars);
            }
            Some(buffer) if buffer.len() >= words => {
                for word in buffer.iter_mut() {
                    *word = 0;
                }
            }
            Some(_) => {
                return Err(PoolError::FixedPool {
                    allocated: self.vars_pool.cap,
                    requested: bytes,
                })
            }
        }
        Ok(RoundState::new(num_vars))
    }

    /// Make sure the clause arena can hold `required_bytes` bytes of records
    /// in `required_slots` clauses.
    ///
    /// Allocates the arena on first use; afterwards it only ever grows.
    /// References into the arena stay valid across growth.
    pub fn grow_clause_arena(&mut self, required_bytes: usize, required_slots: usize) -> PoolResult<()> {
        self.check_alive()?;
        requires!(required_bytes > 0 && required_slots > 0);
        let (data_cap, clause_cap) = match self.contents.cnf.as_ref() {
            None => {
                let footprint = ClauseArena::footprint(required_bytes, required_slots);
                self.admit("clause arena", footprint)?;
                self.contents.cnf = Some(ClauseArena::new(required_bytes, required_slots));
                self.contents.cnf_residency = Residency::Host;
                self.cnf_pool = PoolDescriptor::allocated(footprint);
                log!(
                    self,
                    2,
                    "Allocated clause arena of {} MB for {} clauses",
                    footprint >> 20,
                    required_slots
                );
                return Ok(());
            }
            Some(arena) => (arena.data_capacity_bytes(), arena.clause_capacity()),
        };
        if required_bytes <= data_cap && required_slots <= clause_cap {
            return Ok(());
        }
        self.check_idle()?;
        let _timer = Timer::at_level("growing clause arena", self.options.verbosity, 3);
        let exact = (required_bytes.max(data_cap), required_slots.max(clause_cap));
        let mut target = (
            self.grown_capacity(data_cap, required_bytes),
            self.grown_capacity(clause_cap, required_slots),
        );
        let mut footprint = ClauseArena::footprint(target.0, target.1);
        if target != exact && !self.fits("clause arena", footprint)? {
            log!(self, 1, "Falling back to exact growth of the clause arena");
            target = exact;
            footprint = ClauseArena::footprint(target.0, target.1);
        }
        self.admit("clause arena", footprint)?;
        let arena = match self.contents.cnf.take() {
            Some(arena) => arena,
            None => return Err(PoolError::NotAllocated(PoolKind::Cnf)),
        };
        let mut grown = ClauseArena::from_raw(arena.relocate(target.0, target.1));
        grown.fix_pointer();
        drop(arena);
        self.contents.cnf = Some(grown);
        self.release(self.cnf_pool.cap);
        self.cnf_pool = PoolDescriptor::grown(footprint);
        log!(
            self,
            2,
            "Grew clause arena to {} bytes for {} clauses",
            target.0,
            target.1
        );
        Ok(())
    }

    /// Lay out the occurrence table for the given per-list occupancy.
    ///
    /// Storage is (re)allocated right away if the table is missing, has a
    /// different number of lists, or is too small; the capacities are
    /// provisioned by a task on `stream`.
    pub fn grow_occurrence_table_async(
        &mut self,
        histogram: Vector<u32>,
        num_lists: usize,
        stream: &mut Stream,
    ) -> PoolResult<()> {
        self.check_alive()?;
        requires!(histogram.len() == num_lists);
        let entries: usize = histogram.iter().map(|&count| count as usize).sum();
        let current = self
            .contents
            .table
            .as_ref()
            .map(|table| (table.num_lists(), table.entries_capacity()));
        let reusable = matches!(current, Some((lists, capacity)) if lists == num_lists && capacity >= entries);
        if !reusable {
            self.check_idle()?;
            let preferred = match current {
                Some((lists, capacity)) if lists == num_lists => {
                    self.grown_capacity(capacity, entries)
                }
                _ => entries,
            };
            let capacity = if preferred != entries
                && !self.fits(
                    "occurrence table",
                    OccurrenceTable::footprint(num_lists, preferred),
                )? {
                entries
            } else {
                preferred
            };
            let footprint = OccurrenceTable::footprint(num_lists, capacity);
            self.admit("occurrence table", footprint)?;
            self.contents.table = Some(OccurrenceTable::with_entries(num_lists, capacity));
            self.release(self.ot_pool.cap);
            self.ot_pool = if current.is_some() {
                PoolDescriptor::grown(footprint)
            } else {
                PoolDescriptor::allocated(footprint)
            };
            log!(
                self,
                2,
                "Allocated occurrence table with {} lists and {} entries",
                num_lists,
                capacity
            );
        }
        self.submit(stream, move |contents| {
            if let Some(table) = contents.table.as_mut() {
                table.provision(&histogram);
            }
        })
    }

    /// Queue clearing of the occurrence capacities on `stream`.
    pub fn reset_occurrence_capacities_async(&mut self, stream: &mut Stream) -> PoolResult<()> {
        self.check_alive()?;
        if self.contents.table.is_none() {
            return Err(PoolError::NotAllocated(PoolKind::Table));
        }
        self.submit(stream, |contents| {
            if let Some(table) = contents.table.as_mut() {
                table.reset_cap();
            }
        })
    }

    /// Copy the clause arena into the host mirror, after the work on
    /// `stream` has finished.
    pub fn mirror_clause_arena(&mut self, stream: &mut Stream) -> PoolResult<()> {
        self.check_alive()?;
        self.synchronize(stream);
        let _timer = Timer::at_level("mirroring clause arena", self.options.verbosity, 3);
        let source = match self.contents.cnf.as_ref() {
            Some(arena) => arena.as_raw(),
            None => return Err(PoolError::NotAllocated(PoolKind::Cnf)),
        };
        let reused = self.contents.hcnf.take().map(ClauseArena::into_raw);
        let (words, state) = match reused {
            Some(mut words) if words.len() == source.len() => {
                words.copy_from_slice(source);
                (words, PoolState::Grown)
            }
            _ => (Vector::from_vec(source.to_vec()), PoolState::Allocated),
        };
        let bytes = words.len() * std::mem::size_of::<u32>();
        let mut mirror = ClauseArena::from_raw(words);
        mirror.fix_pointer();
        self.contents.hcnf = Some(mirror);
        self.hcnf_pool = PoolDescriptor { cap: bytes, state };
        log!(self, 2, "Mirrored clause arena to host ({} bytes)", bytes);
        Ok(())
    }

    /// Ask for the clause arena to be migrated to the device ahead of use.
    ///
    /// Does nothing on devices without support for placement hints.
    pub fn prefetch_clause_arena(&mut self, stream: &mut Stream) -> PoolResult<()> {
        self.check_alive()?;
        if self.contents.cnf.is_none() {
            return Err(PoolError::NotAllocated(PoolKind::Cnf));
        }
        if !self.options.prefetch || !self.device.capability().supports_prefetch() {
            return Ok(());
        }
        log!(self, 2, "Advising device to favor global over system memory");
        self.submit(stream, |contents| contents.cnf_residency = Residency::Device)
    }

    /// Release every pool. The manager cannot allocate afterwards.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.contents = PoolContents::empty();
        for pool in &mut [
            &mut self.cnf_pool,
            &mut self.hcnf_pool,
            &mut self.ot_pool,
            &mut self.vars_pool,
        ] {
            pool.cap = 0;
            pool.state = PoolState::Freed;
        }
        self.cap = 0;
        self.destroyed = true;
        log!(self, 2, "Released all memory pools");
    }
    /// Hand the host mirror over to the caller without touching the
    /// device pools.
    pub fn detach_mirror(&mut self) -> Option<ClauseArena> {
        let mirror = self.contents.hcnf.take();
        if mirror.is_some() {
            self.hcnf_pool = PoolDescriptor::UNALLOCATED;
        }
        mirror
    }

    pub fn device(&self) -> &D {
        &self.device
    }
    pub fn capability(&self) -> Capability {
        self.device.capability()
    }
    pub fn contents(&self) -> &PoolContents {
        &self.contents
    }
    pub fn contents_mut(&mut self) -> &mut PoolContents {
        &mut self.contents
    }
    pub fn arena(&self) -> Option<&ClauseArena> {
        self.contents.arena()
    }
    pub fn arena_mut(&mut self) -> Option<&mut ClauseArena> {
        self.contents.arena_mut()
    }
    pub fn mirror(&self) -> Option<&ClauseArena> {
        self.contents.mirror()
    }
    pub fn table(&self) -> Option<&OccurrenceTable> {
        self.contents.table()
    }
    pub fn table_mut(&mut self) -> Option<&mut OccurrenceTable> {
        self.contents.table_mut()
    }
    pub fn descriptor(&self, kind: PoolKind) -> PoolDescriptor {
        match kind {
            PoolKind::Cnf => self.cnf_pool,
            PoolKind::HostCnf => self.hcnf_pool,
            PoolKind::Table => self.ot_pool,
            PoolKind::Vars => self.vars_pool,
        }
    }
    /// Bytes committed to device pools.
    pub fn committed(&self) -> usize {
        self.cap
    }
    pub fn is_empty(&self) -> bool {
        self.cap == 0
    }
    pub fn free(&self) -> usize {
        self.free
    }
    pub fn total(&self) -> usize {
        self.total
    }
    pub fn used(&self) -> usize {
        self.used
    }
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Snapshot of pool states and memory totals.
    pub fn report(&self) -> PoolReport {
        PoolReport {
            device: self.device.name().to_string(),
            free: self.free,
            total: self.total,
            used: self.used,
            committed: self.cap,
            heap_space: self.contents.heap_space(),
            pools: [PoolKind::Cnf, PoolKind::HostCnf, PoolKind::Table, PoolKind::Vars]
                .iter()
                .map(|&kind| PoolEntry {
                    kind,
                    cap: self.descriptor(kind).cap,
                    state: self.descriptor(kind).state,
                })
                .collect(),
        }
    }
}

impl<D: Device> Drop for MemoryPools<D> {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// State of a single pool in a [`PoolReport`].
#[derive(Debug, Clone, Serialize)]
pub struct PoolEntry {
    pub kind: PoolKind,
    pub cap: usize,
    pub state: PoolState,
}

/// Serializable overview of the pool manager.
#[derive(Debug, Clone, Serialize)]
pub struct PoolReport {
    pub device: String,
    pub free: usize,
    pub total: usize,
    pub used: usize,
    pub committed: usize,
    /// Bytes held by the pool contents on the host heap
    pub heap_space: usize,
    pub pools: Vec<PoolEntry>,
}

impl PoolReport {
    pub fn to_toml(&self) -> PoolResult<String> {
        Ok(toml::to_string(self)?)
    }
    /// Print the report as comment lines.
    pub fn print(&self) {
        comment!("{:<25} {:>12}", "pool", "MB");
        for pool in &self.pools {
            comment!(
                "{:<25} {} ({:?})",
                pool.kind.to_string(),
                format_memory_usage(pool.cap),
                pool.state
            );
        }
        comment!("{:<25} {}", "committed", format_memory_usage(self.committed));
        comment!("{:<25} {}", "host heap", format_memory_usage(self.heap_space));
    }
}
