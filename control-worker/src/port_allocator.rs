use std::collections::HashSet;
use std::sync::Mutex;

use control_shared::{ControlError, ControlResult};

/// Default port pool used by the `process` and `container` drivers.
pub const DEFAULT_POOL_START: u16 = 8080;
pub const DEFAULT_POOL_END: u16 = 9000;

/// A process-wide pool of ports. Has no persistence: a worker restart loses
/// the allocated set, and duplicate allocations are possible if the
/// underlying binding outlives the worker process. Not addressed in this
/// implementation; see the design notes.
#[derive(Debug)]
pub struct PortAllocator {
    start: u16,
    end: u16,
    allocated: Mutex<HashSet<u16>>,
}

impl PortAllocator {
    pub fn new(start: u16, end: u16) -> Self {
        Self {
            start,
            end,
            allocated: Mutex::new(HashSet::new()),
        }
    }

    /// Finds and reserves the lowest free port in the pool. Fails cleanly
    /// once the pool is exhausted rather than looping forever.
    pub fn allocate(&self) -> ControlResult<u16> {
        let mut allocated = self.allocated.lock().expect("port allocator lock poisoned");
        for port in self.start..=self.end {
            if !allocated.contains(&port) {
                allocated.insert(port);
                return Ok(port);
            }
        }
        Err(ControlError::PlatformFailure(format!(
            "port pool {}-{} exhausted",
            self.start, self.end
        )))
    }

    pub fn release(&self, port: u16) {
        self.allocated.lock().expect("port allocator lock poisoned").remove(&port);
    }

    pub fn is_allocated(&self, port: u16) -> bool {
        self.allocated.lock().expect("port allocator lock poisoned").contains(&port)
    }
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_START, DEFAULT_POOL_END)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_lowest_free_port_first() {
        let pool = PortAllocator::new(8080, 8082);
        assert_eq!(pool.allocate().unwrap(), 8080);
        assert_eq!(pool.allocate().unwrap(), 8081);
        assert_eq!(pool.allocate().unwrap(), 8082);
    }

    #[test]
    fn exhausts_cleanly_without_looping() {
        let pool = PortAllocator::new(8080, 8080);
        assert_eq!(pool.allocate().unwrap(), 8080);
        assert!(pool.allocate().is_err());
    }

    #[test]
    fn release_frees_port_for_reuse() {
        let pool = PortAllocator::new(8080, 8080);
        let port = pool.allocate().unwrap();
        assert!(pool.is_allocated(port));
        pool.release(port);
        assert!(!pool.is_allocated(port));
        assert_eq!(pool.allocate().unwrap(), 8080);
    }
}
