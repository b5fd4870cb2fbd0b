//! Internal modules for gsimp

pub mod config;
#[macro_use]
pub mod macros;
pub mod output;
pub mod memory;
pub mod literal;

pub use ansi_term;
