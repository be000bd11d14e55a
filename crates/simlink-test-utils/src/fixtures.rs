//! Reusable agent and session fixtures.
//!
//! - [`uav_definition`]: a UAV with a location sensor and a distance task.
//! - [`sphere_definition`]: a sphere robot with a small camera.
//! - [`test_config`]: session settings with short timeouts.
//! - [`connect`]: a [`Session`] wired to a running [`MockEngine`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use simlink_client::{AgentDefinition, Session, SessionConfig, SessionError};
use simlink_core::{AgentKind, SessionId};
use simlink_sensor::{SensorConfig, SensorDefinition};
use simlink_shm::{InProcessIpc, ShmNaming};

use crate::mock::{FillMode, MockEngine};

static NEXT_SESSION: AtomicU64 = AtomicU64::new(0);

/// A UAV carrying `LocationSensor` and `DistanceTask`.
pub fn uav_definition(name: &str) -> AgentDefinition {
    AgentDefinition::new(name, AgentKind::Uav)
        .location([0.0, 0.0, 5.0])
        .sensor(SensorDefinition::new(name, "LocationSensor"))
        .sensor(SensorDefinition::new(name, "DistanceTask"))
}

/// A sphere robot with a 4x8 `RGBCamera`.
pub fn sphere_definition(name: &str) -> AgentDefinition {
    AgentDefinition::new(name, AgentKind::SphereRobot).sensor(
        SensorDefinition::new(name, "RGBCamera").config(
            SensorConfig::new()
                .with("CaptureWidth", 8)
                .with("CaptureHeight", 4),
        ),
    )
}

/// Settings for a fresh session id containing `tag`, with timeouts short
/// enough for tests and no pre-start ticks.
pub fn test_config(tag: &str) -> SessionConfig {
    let n = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
    let mut config = SessionConfig::for_session(SessionId::new(format!(
        "{tag}-{}-{n}",
        std::process::id()
    )));
    config.tick_timeout = Some(Duration::from_millis(500));
    config.load_timeout = Duration::from_millis(500);
    config.pre_start_steps = 0;
    config.reset_settle_ticks = 1;
    config
}

/// A connected session plus the engine serving it.
///
/// Fields drop in declaration order: the session is torn down before
/// the engine stops.
pub struct Harness {
    pub session: Session,
    pub engine: MockEngine,
    pub ipc: InProcessIpc,
}

/// Start a mock engine for `config` and connect a session to it.
pub fn connect(config: SessionConfig, fill: FillMode) -> Result<Harness, SessionError> {
    let ipc = InProcessIpc::new();
    let naming = ShmNaming::with_prefix(config.prefix.clone(), config.session_id.clone());
    let engine = MockEngine::start(Arc::new(ipc.clone()), naming, fill)?;
    let session = Session::connect(config, Arc::new(ipc.clone()))?;
    Ok(Harness {
        session,
        engine,
        ipc,
    })
}
