//! Simlink: a shared-memory client for driving an external simulation engine.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! simlink sub-crates. For most users, adding `simlink` as a single dependency
//! is sufficient.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use simlink::prelude::*;
//!
//! let mut config = SessionConfig::default();
//! config.agents.push(
//!     AgentDefinition::new("uav0", AgentKind::Uav)
//!         .location([0.0, 0.0, 5.0])
//!         .sensor(SensorDefinition::new("uav0", "LocationSensor"))
//!         .main(true),
//! );
//!
//! let launcher = EngineLauncher::new("/opt/engine/Holodeck", "ExampleLevel");
//! let mut session = Session::launch(config, Arc::new(PosixIpc::new()), &launcher).unwrap();
//!
//! let outcome = session.step(vec![0.0, 0.0, 0.0, 9.8]).unwrap();
//! let location = outcome.state.sensor("uav0", "LocationSensor").unwrap();
//! println!("{:?}", location.as_f32());
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `simlink-core` | IDs, buffer specs, agent kinds, commands, wire encoding |
//! | [`shm`] | `simlink-shm` | Shared regions, semaphores, buffer arena |
//! | [`sensor`] | `simlink-sensor` | Sensor types, registry, readings |
//! | [`client`] | `simlink-client` | Session, command center, agents, tick protocol |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types and the command wire format (`simlink-core`).
pub use simlink_core as types;

/// Shared-memory regions, semaphores and the buffer arena (`simlink-shm`).
///
/// [`shm::PosixIpc`] talks to a real engine; [`shm::InProcessIpc`] keeps
/// everything inside the process for tests.
pub use simlink_shm as shm;

/// Sensor kinds, the sensor registry and readings (`simlink-sensor`).
pub use simlink_sensor as sensor;

/// Engine session, agents, commands and the tick protocol (`simlink-client`).
///
/// Most programs only need [`client::Session`].
pub use simlink_client as client;

/// Common imports for typical simlink usage.
///
/// ```rust
/// use simlink::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use simlink_core::{AgentKind, Command, ElementType, SessionId, TickId, WorldCommand};

    // Errors
    pub use simlink_core::{CommandError, ErrorClass};

    // Shared memory
    pub use simlink_shm::{InProcessIpc, IpcBackend, PosixIpc};

    // Sensors
    pub use simlink_sensor::{SensorConfig, SensorDefinition, SensorReading, SensorRegistry};

    // Client
    pub use simlink_client::{
        AgentDefinition, EngineLauncher, Scenario, Session, SessionConfig, SessionError,
        StateSnapshot, StepOutcome, TickPhase,
    };
}
