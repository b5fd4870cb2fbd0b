//! Compile-time constants

/// Print log messages at all (verbosity is still checked at runtime).
pub const ENABLE_LOGGING: bool = true;
/// Whether to do bounds checking when accessing array elements.
pub const ENABLE_BOUNDS_CHECKING: bool = cfg!(debug_assertions);
/// Check the `requires!()` assertions at runtime (cheap).
pub const CHECK_PRECONDITIONS: bool = true;
/// Check the `invariant!()` assertions at runtime (cheap).
pub const CHECK_INVARIANTS: bool = true;
/// Verify that arena references are sorted after every compaction (linear).
pub const CHECK_ARENA_INVARIANTS: bool = cfg!(debug_assertions);
