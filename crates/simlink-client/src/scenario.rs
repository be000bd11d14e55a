//! Scenario files: a world name plus the agents and sensors to spawn.
//!
//! Scenarios are JSON documents:
//!
//! ```json
//! {
//!   "name": "HoveringUAV",
//!   "world": "SimpleWorld",
//!   "main_agent": "uav0",
//!   "agents": [{
//!     "agent_name": "uav0",
//!     "agent_type": "UavAgent",
//!     "control_scheme": 0,
//!     "location": [0, 0, 5],
//!     "sensors": [
//!       { "sensor_type": "LocationSensor" },
//!       { "sensor_type": "RGBCamera", "socket": "CameraSocket",
//!         "configuration": { "CaptureWidth": 640, "CaptureHeight": 480 } }
//!     ]
//!   }]
//! }
//! ```
//!
//! Omitted fields take the defaults a scenario loader has always used:
//! origin placement, root socket, empty configuration, sensor name equal
//! to its type, agent name equal to its type.

use std::error::Error;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use simlink_core::{AgentKind, Vec3};
use simlink_sensor::{SensorConfig, SensorDefinition};

use crate::agent::AgentDefinition;

// ── ScenarioError ──────────────────────────────────────────────────

/// Errors loading or interpreting a scenario.
#[derive(Debug)]
pub enum ScenarioError {
    /// The file could not be read.
    Io {
        /// The scenario path.
        path: PathBuf,
        /// The read failure.
        source: std::io::Error,
    },
    /// The document is not a valid scenario.
    Parse(serde_json::Error),
    /// An agent's type is not a known agent kind.
    UnknownAgentType {
        /// The agent name.
        agent: String,
        /// The unrecognised type.
        agent_type: String,
    },
    /// `main_agent` names an agent the scenario does not define.
    UnknownMainAgent {
        /// The named agent.
        agent: String,
    },
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read scenario {}: {source}", path.display())
            }
            Self::Parse(e) => write!(f, "invalid scenario: {e}"),
            Self::UnknownAgentType { agent, agent_type } => {
                write!(f, "agent '{agent}' has unknown type '{agent_type}'")
            }
            Self::UnknownMainAgent { agent } => {
                write!(f, "main agent '{agent}' is not defined in the scenario")
            }
        }
    }
}

impl Error for ScenarioError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ScenarioError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}

// ── Scenario model ─────────────────────────────────────────────────

/// One sensor entry of a scenario agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSensor {
    /// Sensor type tag.
    pub sensor_type: String,
    /// Sensor name; defaults to the type tag.
    #[serde(default)]
    pub sensor_name: Option<String>,
    /// Attachment socket.
    #[serde(default)]
    pub socket: String,
    /// Location relative to the socket.
    #[serde(default)]
    pub location: Vec3,
    /// Rotation relative to the socket.
    #[serde(default)]
    pub rotation: Vec3,
    /// Configuration block.
    #[serde(default)]
    pub configuration: SensorConfig,
    /// Whether the sensor is already on the agent in the world.
    #[serde(default)]
    pub existing: bool,
}

/// One agent entry of a scenario.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioAgent {
    /// Agent name; defaults to the type.
    #[serde(default)]
    pub agent_name: Option<String>,
    /// Agent type, e.g. `UavAgent` or `UAV`.
    pub agent_type: String,
    /// Sensors in declaration order.
    #[serde(default)]
    pub sensors: Vec<ScenarioSensor>,
    /// Initial control scheme.
    #[serde(default)]
    pub control_scheme: usize,
    /// Spawn location.
    #[serde(default)]
    pub location: Vec3,
    /// Spawn rotation.
    #[serde(default)]
    pub rotation: Vec3,
    /// Whether the agent is already in the world.
    #[serde(default)]
    pub existing: bool,
}

impl ScenarioAgent {
    /// The agent's effective name.
    pub fn name(&self) -> &str {
        self.agent_name.as_deref().unwrap_or(&self.agent_type)
    }
}

/// A world plus the agents to populate it with.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    #[serde(default)]
    pub name: String,
    /// World (map) the engine should load.
    #[serde(default)]
    pub world: String,
    /// Package the world ships in.
    #[serde(default)]
    pub package_name: Option<String>,
    /// Agent the viewport follows and [`step`](crate::Session::step) drives.
    #[serde(default)]
    pub main_agent: Option<String>,
    /// Window width override.
    #[serde(default)]
    pub window_width: Option<u32>,
    /// Window height override.
    #[serde(default)]
    pub window_height: Option<u32>,
    /// Agents in spawn order.
    #[serde(default)]
    pub agents: Vec<ScenarioAgent>,
}

impl Scenario {
    /// Parse a scenario from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a scenario file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Serialize back to pretty JSON.
    pub fn to_json(&self) -> Result<String, ScenarioError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Agent definitions in spawn order, with the main agent marked.
    pub fn agent_definitions(&self) -> Result<Vec<AgentDefinition>, ScenarioError> {
        if let Some(main) = &self.main_agent {
            if !self.agents.iter().any(|a| a.name() == main) {
                return Err(ScenarioError::UnknownMainAgent {
                    agent: main.clone(),
                });
            }
        }
        self.agents
            .iter()
            .map(|agent| {
                let name = agent.name().to_string();
                let kind = AgentKind::from_name(&agent.agent_type).ok_or_else(|| {
                    ScenarioError::UnknownAgentType {
                        agent: name.clone(),
                        agent_type: agent.agent_type.clone(),
                    }
                })?;
                let is_main = self.main_agent.as_deref() == Some(name.as_str());
                let mut def = AgentDefinition::new(name, kind)
                    .location(agent.location)
                    .rotation(agent.rotation)
                    .existing(agent.existing)
                    .control_scheme(agent.control_scheme)
                    .main(is_main);
                for s in &agent.sensors {
                    let mut sensor = SensorDefinition::new("", s.sensor_type.as_str())
                        .socket(s.socket.as_str())
                        .location(s.location)
                        .rotation(s.rotation)
                        .config(s.configuration.clone())
                        .existing(s.existing);
                    if let Some(n) = &s.sensor_name {
                        sensor = sensor.named(n.as_str());
                    }
                    def = def.sensor(sensor);
                }
                Ok(def)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simlink_sensor::ConfigValue;

    const HOVER: &str = r#"{
        "name": "HoveringUAV",
        "world": "SimpleWorld",
        "main_agent": "uav0",
        "agents": [{
            "agent_name": "uav0",
            "agent_type": "UavAgent",
            "location": [0, 0, 5],
            "sensors": [
                { "sensor_type": "LocationSensor" },
                { "sensor_type": "RGBCamera", "sensor_name": "Cam", "socket": "CameraSocket",
                  "configuration": { "CaptureWidth": 640, "CaptureHeight": 480 } }
            ]
        }, {
            "agent_type": "SphereAgent",
            "control_scheme": 1
        }]
    }"#;

    #[test]
    fn parses_with_defaults() {
        let s = Scenario::from_json(HOVER).unwrap();
        assert_eq!(s.world, "SimpleWorld");
        assert_eq!(s.agents.len(), 2);
        assert_eq!(s.agents[1].name(), "SphereAgent");
        assert_eq!(s.agents[0].sensors[0].socket, "");
        assert_eq!(s.agents[0].sensors[0].location, [0.0; 3]);
        assert!(s.agents[0].sensors[0].configuration.is_empty());
        assert_eq!(
            s.agents[0].sensors[1].configuration.get("CaptureWidth"),
            Some(&ConfigValue::Int(640))
        );
    }

    #[test]
    fn converts_to_definitions() {
        let defs = Scenario::from_json(HOVER)
            .unwrap()
            .agent_definitions()
            .unwrap();
        assert_eq!(defs.len(), 2);

        let uav = &defs[0];
        assert_eq!(uav.kind, AgentKind::Uav);
        assert!(uav.is_main);
        assert_eq!(uav.location, [0.0, 0.0, 5.0]);
        assert_eq!(uav.sensors[0].name, "LocationSensor");
        assert_eq!(uav.sensors[1].name, "Cam");
        assert_eq!(uav.sensors[1].agent, "uav0");
        assert_eq!(uav.sensors[1].socket, "CameraSocket");

        let sphere = &defs[1];
        assert_eq!(sphere.kind, AgentKind::SphereRobot);
        assert_eq!(sphere.control_scheme, 1);
        assert!(!sphere.is_main);
    }

    #[test]
    fn missing_sensor_type_is_a_parse_error() {
        let err = Scenario::from_json(
            r#"{"agents": [{"agent_type": "UAV", "sensors": [{"socket": "x"}]}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ScenarioError::Parse(_)));
        assert!(err.to_string().contains("sensor_type"));
    }

    #[test]
    fn unknown_agent_type_rejected() {
        let err = Scenario::from_json(r#"{"agents": [{"agent_type": "Submarine"}]}"#)
            .unwrap()
            .agent_definitions()
            .unwrap_err();
        assert!(matches!(err, ScenarioError::UnknownAgentType { .. }));
    }

    #[test]
    fn unknown_main_agent_rejected() {
        let err = Scenario::from_json(r#"{"main_agent": "x", "agents": []}"#)
            .unwrap()
            .agent_definitions()
            .unwrap_err();
        assert!(matches!(err, ScenarioError::UnknownMainAgent { .. }));
    }

    #[test]
    fn json_round_trip_preserves_content() {
        let s = Scenario::from_json(HOVER).unwrap();
        let back = Scenario::from_json(&s.to_json().unwrap()).unwrap();
        assert_eq!(s, back);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Scenario::from_path("/nonexistent/scenario.json").unwrap_err();
        assert!(matches!(err, ScenarioError::Io { .. }));
    }
}
