//! Core types for the simlink engine client.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by every other simlink crate: identifiers,
//! element types and buffer shapes, agent kinds, the command model and
//! its positional wire encoding, and the error classification used to
//! separate caller mistakes from engine failures.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod agent;
pub mod command;
pub mod element;
pub mod error;
pub mod id;
pub mod wire;

pub use agent::{AgentKind, ControlScheme};
pub use command::{Command, DebugShape, Vec3, Weather, WorldCommand};
pub use element::{BufferSpec, Element, ElementType};
pub use error::{CommandError, ErrorClass, ShapeError};
pub use id::{SessionId, Shape, TickId};
pub use wire::{encode_batch, Param, WireCommand};
