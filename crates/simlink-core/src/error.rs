//! Cross-cutting error types and the [`ErrorClass`] taxonomy.
//!
//! Every error surfaced by a simlink crate reports one of four classes,
//! so callers can separate "my input was wrong" from "the engine died"
//! without matching on every variant.

use std::error::Error;
use std::fmt;

/// Coarse classification of a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Unknown types, duplicate names, malformed shapes. Detected at
    /// construction; never retryable with the same input.
    Configuration,
    /// OS resources (shared memory, semaphores, processes) could not be
    /// created. Fatal to session establishment.
    Resource,
    /// Transmission failure, unresponsive engine, torn reads. Fatal to
    /// the session; tear down and restart the engine.
    Protocol,
    /// Bad per-call input (action vector shape). Rejected before anything
    /// is enqueued; the caller may retry with corrected input.
    Validation,
}

impl ErrorClass {
    /// Whether the session is still usable after an error of this class.
    pub fn is_recoverable(self) -> bool {
        matches!(self, Self::Configuration | Self::Validation)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Resource => write!(f, "resource"),
            Self::Protocol => write!(f, "protocol"),
            Self::Validation => write!(f, "validation"),
        }
    }
}

/// A buffer shape that cannot be allocated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShapeError {
    /// The shape has no dimensions.
    Empty,
    /// A dimension is zero.
    ZeroDimension {
        /// Index of the zero dimension.
        axis: usize,
    },
    /// The total byte size does not fit in `usize`.
    Overflow {
        /// The offending shape.
        shape: Vec<usize>,
    },
}

impl ShapeError {
    /// Always [`ErrorClass::Configuration`].
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Configuration
    }
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "shape has no dimensions"),
            Self::ZeroDimension { axis } => write!(f, "dimension {axis} is zero"),
            Self::Overflow { shape } => write!(f, "shape {shape:?} overflows usize"),
        }
    }
}

impl Error for ShapeError {}

/// A command could not be constructed from the given parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum CommandError {
    /// A numeric parameter is outside its accepted range.
    OutOfRange {
        /// Parameter name.
        parameter: &'static str,
        /// The rejected value.
        value: f64,
        /// Human-readable accepted range.
        expected: &'static str,
    },
    /// A string parameter is not one of the accepted values.
    UnknownValue {
        /// Parameter name.
        parameter: &'static str,
        /// The rejected value.
        value: String,
    },
    /// A numeric parameter is NaN or infinite.
    NonFinite {
        /// Parameter name.
        parameter: &'static str,
    },
    /// A required parameter was not supplied.
    Missing {
        /// Parameter name.
        parameter: &'static str,
    },
}

impl CommandError {
    /// Always [`ErrorClass::Validation`].
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Validation
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange {
                parameter,
                value,
                expected,
            } => write!(f, "{parameter} = {value} is out of range (expected {expected})"),
            Self::UnknownValue { parameter, value } => {
                write!(f, "{parameter} = '{value}' is not an accepted value")
            }
            Self::NonFinite { parameter } => write!(f, "{parameter} is not finite"),
            Self::Missing { parameter } => write!(f, "{parameter} is required"),
        }
    }
}

impl Error for CommandError {}
