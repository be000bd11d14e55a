//! In-process IPC backend.
//!
//! [`InProcessIpc`] is a cloneable namespace of heap regions and
//! condvar semaphores. Two parties holding clones of the same namespace
//! rendezvous purely by name, exactly like two processes using
//! [`PosixIpc`](crate::PosixIpc), which lets a mock engine run on a
//! thread in tests.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use indexmap::IndexMap;

use crate::backend::{IpcBackend, Semaphore};
use crate::error::{ShmError, SignalError};
use crate::mapping::{HeapRegion, Mapping};
use crate::naming::validate_os_name;

#[derive(Default)]
struct Namespace {
    regions: Mutex<IndexMap<String, Arc<HeapRegion>>>,
    semaphores: Mutex<IndexMap<String, Arc<CondvarSemaphore>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // The maps are updated with single inserts/removes, so a panic while
    // holding the lock cannot leave them half-written.
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn check_name(name: &str) -> Result<(), ShmError> {
    if validate_os_name(name) {
        Ok(())
    } else {
        Err(ShmError::InvalidName(name.to_string()))
    }
}

/// A shared, in-memory object namespace.
#[derive(Clone, Default)]
pub struct InProcessIpc {
    ns: Arc<Namespace>,
}

impl InProcessIpc {
    /// A fresh, empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a region with this name currently exists.
    pub fn has_region(&self, name: &str) -> bool {
        lock(&self.ns.regions).contains_key(name)
    }

    /// Number of live region names.
    pub fn region_count(&self) -> usize {
        lock(&self.ns.regions).len()
    }

    /// Number of live semaphore names.
    pub fn semaphore_count(&self) -> usize {
        lock(&self.ns.semaphores).len()
    }
}

impl std::fmt::Debug for InProcessIpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InProcessIpc")
            .field("regions", &self.region_count())
            .field("semaphores", &self.semaphore_count())
            .finish()
    }
}

impl IpcBackend for InProcessIpc {
    fn create_region(&self, name: &str, len: usize) -> Result<Mapping, ShmError> {
        check_name(name)?;
        let region = HeapRegion::zeroed(len).ok_or_else(|| ShmError::Os {
            op: "alloc_zeroed",
            name: name.to_string(),
            source: std::io::Error::from(std::io::ErrorKind::OutOfMemory),
        })?;
        let region = Arc::new(region);
        lock(&self.ns.regions).insert(name.to_string(), Arc::clone(&region));
        Ok(Mapping::from_heap(region, len))
    }

    fn open_region(&self, name: &str) -> Result<Mapping, ShmError> {
        check_name(name)?;
        let region = lock(&self.ns.regions)
            .get(name)
            .cloned()
            .ok_or_else(|| ShmError::NotFound(name.to_string()))?;
        let len = region.len();
        Ok(Mapping::from_heap(region, len))
    }

    fn unlink_region(&self, name: &str) -> Result<(), ShmError> {
        check_name(name)?;
        lock(&self.ns.regions).shift_remove(name);
        Ok(())
    }

    fn create_semaphore(&self, name: &str, initial: u32) -> Result<Box<dyn Semaphore>, ShmError> {
        check_name(name)?;
        let sem = Arc::new(CondvarSemaphore::new(initial));
        lock(&self.ns.semaphores).insert(name.to_string(), Arc::clone(&sem));
        Ok(Box::new(SharedSemaphore(sem)))
    }

    fn open_semaphore(&self, name: &str) -> Result<Box<dyn Semaphore>, ShmError> {
        check_name(name)?;
        let sem = lock(&self.ns.semaphores)
            .get(name)
            .cloned()
            .ok_or_else(|| ShmError::NotFound(name.to_string()))?;
        Ok(Box::new(SharedSemaphore(sem)))
    }

    fn unlink_semaphore(&self, name: &str) -> Result<(), ShmError> {
        check_name(name)?;
        lock(&self.ns.semaphores).shift_remove(name);
        Ok(())
    }
}

struct CondvarSemaphore {
    count: Mutex<u32>,
    available: Condvar,
}

impl CondvarSemaphore {
    fn new(initial: u32) -> Self {
        Self {
            count: Mutex::new(initial),
            available: Condvar::new(),
        }
    }
}

struct SharedSemaphore(Arc<CondvarSemaphore>);

impl Semaphore for SharedSemaphore {
    fn post(&self) -> Result<(), SignalError> {
        let mut count = self.0.count.lock().map_err(|_| SignalError::Poisoned)?;
        *count = count.saturating_add(1);
        self.0.available.notify_one();
        Ok(())
    }

    fn wait(&self, timeout: Option<Duration>) -> Result<bool, SignalError> {
        let sem = &self.0;
        let mut count = sem.count.lock().map_err(|_| SignalError::Poisoned)?;
        match timeout {
            None => {
                while *count == 0 {
                    count = sem
                        .available
                        .wait(count)
                        .map_err(|_| SignalError::Poisoned)?;
                }
            }
            Some(t) => {
                let deadline = Instant::now() + t;
                while *count == 0 {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(false);
                    }
                    count = sem
                        .available
                        .wait_timeout(count, deadline - now)
                        .map_err(|_| SignalError::Poisoned)?
                        .0;
                }
            }
        }
        *count -= 1;
        Ok(true)
    }
}
