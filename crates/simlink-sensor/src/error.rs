//! Sensor construction and access errors.

use std::error::Error;
use std::fmt;

use simlink_core::{ErrorClass, ShapeError};
use simlink_shm::ArenaError;

/// Errors from the sensor registry and runtime sensors.
#[derive(Debug)]
pub enum SensorError {
    /// The type tag does not resolve to a registered descriptor.
    UnknownSensorType {
        /// The unrecognised type tag.
        type_name: String,
    },
    /// A descriptor for this type tag is already registered.
    DuplicateSensorType {
        /// The duplicated type tag.
        type_name: String,
    },
    /// The agent already has a sensor with this name.
    DuplicateSensorName {
        /// Owning agent.
        agent: String,
        /// Sensor name.
        sensor: String,
    },
    /// A configuration value needed to resolve the shape is unusable.
    InvalidConfig {
        /// Sensor name.
        sensor: String,
        /// Offending key.
        key: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
    /// The resolved shape is not allocatable.
    Shape(ShapeError),
    /// The backing buffers could not be allocated or accessed.
    Buffer(ArenaError),
}

impl SensorError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::UnknownSensorType { .. }
            | Self::DuplicateSensorType { .. }
            | Self::DuplicateSensorName { .. }
            | Self::InvalidConfig { .. } => ErrorClass::Configuration,
            Self::Shape(e) => e.class(),
            Self::Buffer(e) => e.class(),
        }
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSensorType { type_name } => {
                write!(f, "unknown sensor type '{type_name}'")
            }
            Self::DuplicateSensorType { type_name } => {
                write!(f, "sensor type '{type_name}' is already registered")
            }
            Self::DuplicateSensorName { agent, sensor } => {
                write!(f, "agent '{agent}' already has a sensor named '{sensor}'")
            }
            Self::InvalidConfig {
                sensor,
                key,
                reason,
            } => write!(f, "sensor '{sensor}': invalid {key}: {reason}"),
            Self::Shape(e) => write!(f, "invalid sensor shape: {e}"),
            Self::Buffer(e) => write!(f, "sensor buffer: {e}"),
        }
    }
}

impl Error for SensorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Shape(e) => Some(e),
            Self::Buffer(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShapeError> for SensorError {
    fn from(e: ShapeError) -> Self {
        Self::Shape(e)
    }
}

impl From<ArenaError> for SensorError {
    fn from(e: ArenaError) -> Self {
        Self::Buffer(e)
    }
}
