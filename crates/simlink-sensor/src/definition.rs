//! Sensor definitions: what to build, before any buffer exists.

use simlink_core::{Command, Vec3};

use crate::config::SensorConfig;

/// Describes one sensor to attach to an agent.
///
/// # Examples
///
/// ```
/// use simlink_sensor::{SensorConfig, SensorDefinition};
///
/// let def = SensorDefinition::new("uav0", "RGBCamera")
///     .socket("CameraSocket")
///     .config(SensorConfig::new().with("CaptureWidth", 640));
/// assert_eq!(def.name, "RGBCamera");
/// assert_eq!(def.socket, "CameraSocket");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct SensorDefinition {
    /// Owning agent.
    pub agent: String,
    /// Sensor name, unique per agent. Defaults to the type tag.
    pub name: String,
    /// Sensor type tag, resolved by the registry.
    pub sensor_type: String,
    /// Attachment socket; empty for the agent root.
    pub socket: String,
    /// Location relative to the socket.
    pub location: Vec3,
    /// Rotation relative to the socket.
    pub rotation: Vec3,
    /// Configuration block.
    pub config: SensorConfig,
    /// Whether the sensor already exists on the agent in the world, in
    /// which case no `AddSensor` command is sent.
    pub existing: bool,
}

impl SensorDefinition {
    /// A definition with default name, socket, placement and config.
    pub fn new(agent: impl Into<String>, sensor_type: impl Into<String>) -> Self {
        let sensor_type = sensor_type.into();
        Self {
            agent: agent.into(),
            name: sensor_type.clone(),
            sensor_type,
            socket: String::new(),
            location: [0.0; 3],
            rotation: [0.0; 3],
            config: SensorConfig::new(),
            existing: false,
        }
    }

    /// Set the sensor name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the attachment socket.
    pub fn socket(mut self, socket: impl Into<String>) -> Self {
        self.socket = socket.into();
        self
    }

    /// Set the relative location.
    pub fn location(mut self, location: Vec3) -> Self {
        self.location = location;
        self
    }

    /// Set the relative rotation.
    pub fn rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = rotation;
        self
    }

    /// Replace the configuration block.
    pub fn config(mut self, config: SensorConfig) -> Self {
        self.config = config;
        self
    }

    /// Mark the sensor as already present in the world.
    pub fn existing(mut self, existing: bool) -> Self {
        self.existing = existing;
        self
    }

    /// The `AddSensor` command announcing this sensor to the engine.
    pub fn add_sensor_command(&self) -> Command {
        Command::AddSensor {
            agent: self.agent.clone(),
            sensor: self.name.clone(),
            sensor_type: self.sensor_type.clone(),
            socket: self.socket.clone(),
            config: self.config.to_transport_string(),
            location: self.location,
            rotation: self.rotation,
        }
    }
}
