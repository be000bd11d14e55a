//! The top-level session error.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use simlink_core::{AgentKind, CommandError, ErrorClass, ShapeError};
use simlink_sensor::SensorError;
use simlink_shm::{ArenaError, ShmError, SignalError};

use crate::config::ConfigError;
use crate::launch::LaunchError;
use crate::scenario::ScenarioError;
use crate::tick::TickPhase;

/// Everything that can go wrong while driving a session.
///
/// Use [`class()`](SessionError::class) to tell "my input was wrong"
/// ([`ErrorClass::Validation`], [`ErrorClass::Configuration`]) from "the
/// engine died" ([`ErrorClass::Protocol`], [`ErrorClass::Resource`]).
#[derive(Debug)]
pub enum SessionError {
    /// The session configuration is invalid.
    Config(ConfigError),
    /// The scenario could not be loaded.
    Scenario(ScenarioError),
    /// The engine process could not be started.
    Launch(LaunchError),
    /// A sensor could not be built or read.
    Sensor(SensorError),
    /// A shared buffer could not be allocated or accessed.
    Buffer(ArenaError),
    /// A shared object could not be opened.
    Shm(ShmError),
    /// Signalling the engine failed.
    Signal(SignalError),
    /// A command was rejected at construction.
    Command(CommandError),
    /// A session buffer shape is not allocatable.
    Shape(ShapeError),
    /// An agent with this name is already registered.
    DuplicateAgent {
        /// The agent name.
        name: String,
    },
    /// No agent with this name is registered.
    UnknownAgent {
        /// The agent name.
        name: String,
    },
    /// The agent has no sensor with this name.
    UnknownSensor {
        /// Owning agent.
        agent: String,
        /// The sensor name.
        sensor: String,
    },
    /// The control scheme index does not exist for the agent's kind.
    UnknownControlScheme {
        /// The agent name.
        agent: String,
        /// The agent's kind.
        kind: AgentKind,
        /// The rejected index.
        scheme: usize,
    },
    /// An action vector does not match the agent's action space.
    ActionShape {
        /// The agent name.
        agent: String,
        /// Length required by the active control scheme.
        expected: usize,
        /// Length supplied.
        actual: usize,
    },
    /// [`step`](crate::Session::step) was called with no main agent.
    NoMainAgent,
    /// The queued batch does not fit in the shared command buffer.
    CommandOverflow {
        /// Encoded payload size in bytes.
        needed: usize,
        /// Command buffer size in bytes.
        capacity: usize,
    },
    /// The engine did not finish a tick within the configured timeout.
    EngineUnresponsive {
        /// How long the client waited.
        waited: Duration,
    },
    /// An operation was attempted in the wrong tick phase.
    WrongPhase {
        /// The operation.
        operation: &'static str,
        /// The phase the protocol was in.
        phase: TickPhase,
    },
    /// An earlier protocol or resource error poisoned the session.
    Failed,
    /// The session has been torn down.
    Closed,
}

impl SessionError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Config(_) | Self::Scenario(_) => ErrorClass::Configuration,
            Self::Launch(e) => e.class(),
            Self::Sensor(e) => e.class(),
            Self::Buffer(e) => e.class(),
            Self::Shm(e) => e.class(),
            Self::Signal(e) => e.class(),
            Self::Command(e) => e.class(),
            Self::Shape(e) => e.class(),
            Self::DuplicateAgent { .. } => ErrorClass::Configuration,
            Self::UnknownAgent { .. }
            | Self::UnknownSensor { .. }
            | Self::UnknownControlScheme { .. }
            | Self::ActionShape { .. }
            | Self::NoMainAgent => ErrorClass::Validation,
            Self::CommandOverflow { .. }
            | Self::EngineUnresponsive { .. }
            | Self::WrongPhase { .. }
            | Self::Failed
            | Self::Closed => ErrorClass::Protocol,
        }
    }

    /// Whether this error poisons the session.
    pub(crate) fn is_fatal(&self) -> bool {
        matches!(self.class(), ErrorClass::Protocol | ErrorClass::Resource)
            && !matches!(self, Self::WrongPhase { .. } | Self::Failed | Self::Closed)
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Scenario(e) => write!(f, "scenario: {e}"),
            Self::Launch(e) => write!(f, "launch: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Buffer(e) => write!(f, "buffer: {e}"),
            Self::Shm(e) => write!(f, "shm: {e}"),
            Self::Signal(e) => write!(f, "signal: {e}"),
            Self::Command(e) => write!(f, "command: {e}"),
            Self::Shape(e) => write!(f, "shape: {e}"),
            Self::DuplicateAgent { name } => write!(f, "agent '{name}' already exists"),
            Self::UnknownAgent { name } => write!(f, "no agent named '{name}'"),
            Self::UnknownSensor { agent, sensor } => {
                write!(f, "agent '{agent}' has no sensor named '{sensor}'")
            }
            Self::UnknownControlScheme {
                agent,
                kind,
                scheme,
            } => write!(
                f,
                "agent '{agent}' ({kind}) has no control scheme {scheme}"
            ),
            Self::ActionShape {
                agent,
                expected,
                actual,
            } => write!(
                f,
                "agent '{agent}' expects {expected} action values, got {actual}"
            ),
            Self::NoMainAgent => write!(f, "step requires a main agent"),
            Self::CommandOverflow { needed, capacity } => write!(
                f,
                "command batch of {needed} bytes exceeds buffer of {capacity} bytes"
            ),
            Self::EngineUnresponsive { waited } => {
                write!(f, "engine did not complete the tick within {waited:?}")
            }
            Self::WrongPhase { operation, phase } => {
                write!(f, "cannot {operation} while {phase}")
            }
            Self::Failed => write!(f, "session failed earlier and must be re-established"),
            Self::Closed => write!(f, "session is torn down"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Scenario(e) => Some(e),
            Self::Launch(e) => Some(e),
            Self::Sensor(e) => Some(e),
            Self::Buffer(e) => Some(e),
            Self::Shm(e) => Some(e),
            Self::Signal(e) => Some(e),
            Self::Command(e) => Some(e),
            Self::Shape(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for SessionError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<ScenarioError> for SessionError {
    fn from(e: ScenarioError) -> Self {
        Self::Scenario(e)
    }
}

impl From<LaunchError> for SessionError {
    fn from(e: LaunchError) -> Self {
        Self::Launch(e)
    }
}

impl From<SensorError> for SessionError {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

impl From<ArenaError> for SessionError {
    fn from(e: ArenaError) -> Self {
        Self::Buffer(e)
    }
}

impl From<ShmError> for SessionError {
    fn from(e: ShmError) -> Self {
        Self::Shm(e)
    }
}

impl From<SignalError> for SessionError {
    fn from(e: SignalError) -> Self {
        Self::Signal(e)
    }
}

impl From<CommandError> for SessionError {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

impl From<ShapeError> for SessionError {
    fn from(e: ShapeError) -> Self {
        Self::Shape(e)
    }
}
