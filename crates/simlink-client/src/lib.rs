//! Session layer of the simlink engine client.
//!
//! Drives one external simulation engine through shared memory: a
//! [`Session`] allocates the session buffers, registers agents and their
//! sensors, batches commands into the engine's wire format and runs the
//! two-semaphore tick handshake. An [`EngineLauncher`] can start the
//! engine binary first; a [`Scenario`] describes the agents to spawn on
//! every reset.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod agent;
pub mod command_center;
pub mod config;
pub mod error;
pub mod launch;
pub mod metrics;
pub mod scenario;
pub mod session;
pub mod state;
pub mod tick;

pub use agent::{Agent, AgentDefinition, AgentRegistry};
pub use command_center::{
    CommandCenter, CommandSender, CommandSink, DispatchState, FlushReport, ShmCommandSink,
};
pub use config::{min_command_buffer_bytes, ConfigError, SessionConfig};
pub use error::SessionError;
pub use launch::{EngineLauncher, EngineProcess, LaunchError};
pub use metrics::TickMetrics;
pub use scenario::{Scenario, ScenarioAgent, ScenarioError, ScenarioSensor};
pub use session::{Session, StepOutcome};
pub use state::{AgentState, StateSnapshot};
pub use tick::{TickPhase, TickProtocol};
