//! Sensors for the simlink engine client.
//!
//! A sensor is a typed, shaped data channel the engine fills once per
//! tick. This crate maps sensor type tags to descriptors
//! ([`SensorRegistry`]), resolves each instance's buffer shape from its
//! configuration block, and binds the instance to two shared buffers: the
//! reading itself and a one-byte enable flag.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod definition;
pub mod error;
pub mod kind;
pub mod reading;
pub mod registry;
pub mod sensor;

pub use config::{ConfigValue, SensorConfig};
pub use definition::SensorDefinition;
pub use error::SensorError;
pub use kind::{SensorKind, ShapeRule};
pub use reading::{SensorData, SensorReading};
pub use registry::{SensorDescriptor, SensorRegistry};
pub use sensor::Sensor;
