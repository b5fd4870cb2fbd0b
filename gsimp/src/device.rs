//! The memory budget the pools are allocated from

use crate::error::{PoolError, PoolResult};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Free and total memory of a device, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryInfo {
    pub free: usize,
    pub total: usize,
}

/// Static properties of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    /// Major compute capability; prefetching needs more than 5.
    pub major: u32,
    pub minor: u32,
    /// Number of workers that run a population pass.
    pub max_threads: usize,
}

impl Capability {
    pub fn supports_prefetch(&self) -> bool {
        self.major > 5
    }
}

/// Source of the memory budget and capabilities used for admission.
pub trait Device {
    fn name(&self) -> &str;
    fn memory_info(&self) -> PoolResult<MemoryInfo>;
    fn capability(&self) -> Capability;
}

/// Host memory, as reported by the operating system.
#[derive(Debug, Default)]
pub struct HostDevice;

fn sysconf(name: libc::c_int) -> PoolResult<usize> {
    let value = unsafe { libc::sysconf(name) };
    if value < 0 {
        return Err(PoolError::DeviceQuery(format!(
            "sysconf({}) failed: {}",
            name,
            std::io::Error::last_os_error()
        )));
    }
    Ok(value as usize)
}

impl Device for HostDevice {
    fn name(&self) -> &str {
        "host"
    }
    fn memory_info(&self) -> PoolResult<MemoryInfo> {
        let page_size = sysconf(libc::_SC_PAGESIZE)?;
        Ok(MemoryInfo {
            free: sysconf(libc::_SC_AVPHYS_PAGES)?.saturating_mul(page_size),
            total: sysconf(libc::_SC_PHYS_PAGES)?.saturating_mul(page_size),
        })
    }
    fn capability(&self) -> Capability {
        Capability {
            major: 0,
            minor: 0,
            max_threads: rayon::current_num_threads(),
        }
    }
}

/// A device with a fixed budget, for tests and for capping the pools below
/// what the machine offers.
#[derive(Debug)]
pub struct FixedBudget {
    free: AtomicUsize,
    total: usize,
    capability: Capability,
}

impl FixedBudget {
    pub fn new(free: usize, total: usize) -> FixedBudget {
        FixedBudget {
            free: AtomicUsize::new(free),
            total,
            capability: Capability {
                major: 7,
                minor: 0,
                max_threads: rayon::current_num_threads(),
            },
        }
    }
    pub fn with_capability(mut self, major: u32, minor: u32) -> FixedBudget {
        self.capability.major = major;
        self.capability.minor = minor;
        self
    }
    /// Change the free memory reported from now on.
    pub fn set_free(&self, free: usize) {
        self.free.store(free, Ordering::Relaxed);
    }
}

impl Device for FixedBudget {
    fn name(&self) -> &str {
        "fixed"
    }
    fn memory_info(&self) -> PoolResult<MemoryInfo> {
        Ok(MemoryInfo {
            free: self.free.load(Ordering::Relaxed),
            total: self.total,
        })
    }
    fn capability(&self) -> Capability {
        self.capability
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_reports_plausible_memory() {
        let info = HostDevice.memory_info().unwrap();
        assert!(info.total > 0);
        assert!(info.free <= info.total);
        assert!(!HostDevice.capability().supports_prefetch());
    }

    #[test]
    fn fixed_budget_is_adjustable() {
        let device = FixedBudget::new(100, 200).with_capability(5, 2);
        assert_eq!(device.memory_info().unwrap(), MemoryInfo { free: 100, total: 200 });
        device.set_free(40);
        assert_eq!(device.memory_info().unwrap().free, 40);
        assert!(!device.capability().supports_prefetch());
    }
}
