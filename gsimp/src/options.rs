//! Runtime options of the pool manager

use crate::error::{PoolError, PoolResult};
use serde_derive::{Deserialize, Serialize};
use std::{fs, path::Path};

/// How a pool grows once its capacity is exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrowthPolicy {
    /// Allocate exactly what is required.
    Exact,
    /// Double the capacity until it fits; fall back to exact if that does
    /// not pass admission.
    Geometric,
}

/// Options of [`MemoryPools`](../pool/struct.MemoryPools.html).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolOptions {
    /// 0 is silent, 1 reports allocations, 2 and up reports every task.
    pub verbosity: u8,
    pub growth: GrowthPolicy,
    /// Migrate the clause arena to the device ahead of use when supported.
    pub prefetch: bool,
}

impl Default for PoolOptions {
    fn default() -> PoolOptions {
        PoolOptions {
            verbosity: 0,
            growth: GrowthPolicy::Geometric,
            prefetch: true,
        }
    }
}

impl PoolOptions {
    pub fn from_toml_str(text: &str) -> PoolResult<PoolOptions> {
        Ok(toml::from_str(text)?)
    }
    /// Read options from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> PoolResult<PoolOptions> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| PoolError::OptionsFile {
            path: path.to_path_buf(),
            source,
        })?;
        PoolOptions::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(PoolOptions::from_toml_str("").unwrap(), PoolOptions::default());
    }

    #[test]
    fn partial_options() {
        let options = PoolOptions::from_toml_str("verbosity = 2\ngrowth = \"exact\"\n").unwrap();
        assert_eq!(options.verbosity, 2);
        assert_eq!(options.growth, GrowthPolicy::Exact);
        assert!(options.prefetch);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(PoolOptions::from_toml_str("verbose = 1").is_err());
    }
}
