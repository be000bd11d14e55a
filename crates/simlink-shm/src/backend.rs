//! The [`IpcBackend`] and [`Semaphore`] traits.
//!
//! Everything above this crate talks to shared memory through these two
//! traits, so the same session code drives a real engine process
//! ([`PosixIpc`](crate::PosixIpc)) or an in-process mock
//! ([`InProcessIpc`](crate::InProcessIpc)).

use std::time::Duration;

use crate::error::{ShmError, SignalError};
use crate::mapping::Mapping;

/// A counting semaphore shared by name between client and engine.
pub trait Semaphore: Send + Sync {
    /// Increment the count, waking one waiter.
    fn post(&self) -> Result<(), SignalError>;

    /// Decrement the count, blocking while it is zero.
    ///
    /// With `timeout = None` this blocks indefinitely. Returns `Ok(false)`
    /// if the timeout expired before the semaphore could be acquired.
    fn wait(&self, timeout: Option<Duration>) -> Result<bool, SignalError>;
}

/// Named shared-memory regions and semaphores.
///
/// Names are full OS object names as produced by
/// [`ShmNaming`](crate::ShmNaming): a leading `/` and no other `/`.
pub trait IpcBackend: Send + Sync {
    /// Create a zero-initialised region of `len` bytes.
    ///
    /// A stale object left behind by a crashed session under the same
    /// name is replaced.
    fn create_region(&self, name: &str, len: usize) -> Result<Mapping, ShmError>;

    /// Map an existing region at its full size.
    fn open_region(&self, name: &str) -> Result<Mapping, ShmError>;

    /// Remove a region's name. Existing mappings stay valid until dropped.
    /// Removing a name that does not exist is not an error.
    fn unlink_region(&self, name: &str) -> Result<(), ShmError>;

    /// Create a semaphore with the given initial count.
    fn create_semaphore(&self, name: &str, initial: u32) -> Result<Box<dyn Semaphore>, ShmError>;

    /// Open an existing semaphore.
    fn open_semaphore(&self, name: &str) -> Result<Box<dyn Semaphore>, ShmError>;

    /// Remove a semaphore's name. Removing a missing name is not an error.
    fn unlink_semaphore(&self, name: &str) -> Result<(), ShmError>;
}
