//! Shared-memory and allocator error types.

use std::error::Error;
use std::fmt;
use std::io;

use simlink_core::{ElementType, ErrorClass};

/// Failure of an IPC backend primitive (region or semaphore).
#[derive(Debug)]
pub enum ShmError {
    /// The OS object name violates POSIX naming rules.
    InvalidName(String),
    /// No object with this name exists.
    NotFound(String),
    /// An object with this name already exists in the backend namespace.
    AlreadyExists(String),
    /// An OS call failed.
    Os {
        /// The failing operation (`shm_open`, `mmap`, `sem_open`, ...).
        op: &'static str,
        /// The OS object name.
        name: String,
        /// The OS error.
        source: io::Error,
    },
}

impl ShmError {
    /// Always [`ErrorClass::Resource`].
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Resource
    }
}

impl fmt::Display for ShmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName(name) => write!(f, "invalid shared object name: {name}"),
            Self::NotFound(name) => write!(f, "shared object not found: {name}"),
            Self::AlreadyExists(name) => write!(f, "shared object already exists: {name}"),
            Self::Os { op, name, source } => write!(f, "{op}({name}) failed: {source}"),
        }
    }
}

impl Error for ShmError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Os { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Failure while posting or waiting on a semaphore.
#[derive(Debug)]
pub enum SignalError {
    /// An OS call failed.
    Os {
        /// The failing operation.
        op: &'static str,
        /// The OS error.
        source: io::Error,
    },
    /// The semaphore's internal lock was poisoned by a panicking thread.
    Poisoned,
}

impl SignalError {
    /// Always [`ErrorClass::Protocol`].
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Protocol
    }
}

impl fmt::Display for SignalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Os { op, source } => write!(f, "{op} failed: {source}"),
            Self::Poisoned => write!(f, "semaphore lock poisoned"),
        }
    }
}

impl Error for SignalError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Os { source, .. } => Some(source),
            Self::Poisoned => None,
        }
    }
}

/// Errors from [`BufferArena`](crate::BufferArena) operations.
#[derive(Debug)]
pub enum ArenaError {
    /// A buffer with this name is already allocated in the session.
    DuplicateName {
        /// The buffer name.
        name: String,
    },
    /// The buffer name cannot be turned into an OS object name.
    InvalidName {
        /// The buffer name.
        name: String,
    },
    /// The backing shared-memory region could not be created.
    Allocation {
        /// The buffer name.
        name: String,
        /// The backend failure.
        source: ShmError,
    },
    /// The handle refers to a buffer that has since been freed.
    StaleHandle {
        /// Slot the handle points at.
        slot: u32,
        /// Generation encoded in the handle.
        handle_generation: u32,
    },
    /// Typed access with the wrong element type.
    TypeMismatch {
        /// The buffer name.
        name: String,
        /// Element type the buffer was allocated with.
        expected: ElementType,
        /// Element type requested by the caller.
        actual: ElementType,
    },
    /// A write whose element count differs from the declared shape.
    ShapeMismatch {
        /// The buffer name.
        name: String,
        /// Declared element count.
        expected: usize,
        /// Supplied element count.
        actual: usize,
    },
    /// A raw write past the end of the buffer.
    OutOfBounds {
        /// The buffer name.
        name: String,
        /// Write offset in bytes.
        offset: usize,
        /// Write length in bytes.
        len: usize,
        /// Buffer size in bytes.
        capacity: usize,
    },
}

impl ArenaError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::DuplicateName { .. } | Self::InvalidName { .. } => ErrorClass::Configuration,
            Self::Allocation { .. } => ErrorClass::Resource,
            Self::StaleHandle { .. }
            | Self::TypeMismatch { .. }
            | Self::ShapeMismatch { .. }
            | Self::OutOfBounds { .. } => ErrorClass::Protocol,
        }
    }
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateName { name } => write!(f, "buffer '{name}' is already allocated"),
            Self::InvalidName { name } => write!(f, "invalid buffer name '{name}'"),
            Self::Allocation { name, source } => {
                write!(f, "failed to allocate buffer '{name}': {source}")
            }
            Self::StaleHandle {
                slot,
                handle_generation,
            } => write!(
                f,
                "stale buffer handle: slot {slot}, generation {handle_generation}"
            ),
            Self::TypeMismatch {
                name,
                expected,
                actual,
            } => write!(
                f,
                "buffer '{name}' holds {expected} elements, accessed as {actual}"
            ),
            Self::ShapeMismatch {
                name,
                expected,
                actual,
            } => write!(
                f,
                "buffer '{name}' holds {expected} elements, got {actual}"
            ),
            Self::OutOfBounds {
                name,
                offset,
                len,
                capacity,
            } => write!(
                f,
                "write of {len} bytes at offset {offset} exceeds buffer '{name}' ({capacity} bytes)"
            ),
        }
    }
}

impl Error for ArenaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Allocation { source, .. } => Some(source),
            _ => None,
        }
    }
}
