//! Named shared-memory buffers for the simlink engine client.
//!
//! The client and the engine exchange commands and sensor readings
//! through named shared-memory regions and synchronise through a pair of
//! named semaphores. This crate is the only one in the workspace that
//! contains `unsafe` code, confined to the `mapping` and `posix` modules.
//!
//! # Architecture
//!
//! ```text
//! BufferArena (allocator, one per session)
//! ├── ShmNaming (session id → deterministic OS names)
//! ├── Arc<dyn IpcBackend>
//! │   ├── PosixIpc      shm_open/mmap + sem_open (real engine)
//! │   └── InProcessIpc  heap blocks + condvars (mock engine, tests)
//! └── Slot[] → SharedBuffer { spec, Mapping }, addressed by BufferHandle
//! ```
//!
//! Every allocation is registered in the arena and released (unmapped and
//! unlinked) on [`BufferArena::release_all`] or drop.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod arena;
pub mod backend;
pub mod error;
pub mod handle;
pub mod inprocess;
pub mod mapping;
pub mod naming;
#[cfg(target_os = "linux")]
pub mod posix;

pub use arena::BufferArena;
pub use backend::{IpcBackend, Semaphore};
pub use error::{ArenaError, ShmError, SignalError};
pub use handle::BufferHandle;
pub use inprocess::InProcessIpc;
pub use mapping::Mapping;
pub use naming::{
    sensor_data_name, sensor_flag_name, ShmNaming, COMMAND_BUFFER, COMMAND_FLAG_BUFFER,
    RESET_BUFFER,
};
#[cfg(target_os = "linux")]
pub use posix::PosixIpc;
