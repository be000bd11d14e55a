//! Runtime sensors bound to shared buffers.

use simlink_core::{BufferSpec, Command, CommandError, ElementType, Vec3};
use simlink_shm::{BufferArena, BufferHandle};

use crate::definition::SensorDefinition;
use crate::error::SensorError;
use crate::kind::SensorKind;
use crate::reading::{SensorData, SensorReading};

/// A sensor instance: its definition plus the two buffers backing it.
///
/// The engine writes the data buffer during its step; the client reads
/// it between steps. Handles are only meaningful against the arena that
/// built the sensor.
#[derive(Clone, Debug)]
pub struct Sensor {
    definition: SensorDefinition,
    kind: Option<SensorKind>,
    spec: BufferSpec,
    data: BufferHandle,
    flag: BufferHandle,
    enabled: bool,
}

impl Sensor {
    pub(crate) fn new(
        definition: SensorDefinition,
        kind: Option<SensorKind>,
        spec: BufferSpec,
        data: BufferHandle,
        flag: BufferHandle,
    ) -> Self {
        Self {
            definition,
            kind,
            spec,
            data,
            flag,
            enabled: true,
        }
    }

    /// The definition this sensor was built from.
    pub fn definition(&self) -> &SensorDefinition {
        &self.definition
    }

    /// Sensor name.
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Owning agent.
    pub fn agent(&self) -> &str {
        &self.definition.agent
    }

    /// Type tag.
    pub fn sensor_type(&self) -> &str {
        &self.definition.sensor_type
    }

    /// Built-in kind, if any.
    pub fn kind(&self) -> Option<SensorKind> {
        self.kind
    }

    /// Shape and element type of the data buffer.
    pub fn spec(&self) -> &BufferSpec {
        &self.spec
    }

    /// Handle of the data buffer.
    pub fn data_handle(&self) -> BufferHandle {
        self.data
    }

    /// Handle of the enable-flag buffer.
    pub fn flag_handle(&self) -> BufferHandle {
        self.flag
    }

    /// Whether the sensor was last set enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Zero-copy view of the latest reading.
    pub fn bytes<'a>(&self, arena: &'a BufferArena) -> Result<&'a [u8], SensorError> {
        Ok(arena.bytes(self.data)?)
    }

    /// Copy out the latest reading with its declared shape and type.
    ///
    /// Whatever bytes the engine wrote, the result always has exactly the
    /// declared element type and element count.
    pub fn read(&self, arena: &BufferArena) -> Result<SensorReading, SensorError> {
        let data = match self.spec.element() {
            ElementType::Bool => SensorData::Bool(arena.read(self.data)?),
            ElementType::U8 => SensorData::U8(arena.read(self.data)?),
            ElementType::I8 => SensorData::I8(arena.read(self.data)?),
            ElementType::F32 => SensorData::F32(arena.read(self.data)?),
        };
        Ok(SensorReading {
            shape: self.spec.shape().clone(),
            data,
        })
    }

    /// Latch the enable flag and return the command announcing it.
    ///
    /// The caller enqueues the returned command; the engine applies it on
    /// the next tick.
    pub fn set_enabled(
        &mut self,
        arena: &mut BufferArena,
        enabled: bool,
    ) -> Result<Command, SensorError> {
        arena.write(self.flag, &[enabled])?;
        self.enabled = enabled;
        Ok(Command::SetSensorEnabled {
            agent: self.definition.agent.clone(),
            sensor: self.definition.name.clone(),
            enabled,
        })
    }

    /// Command rotating this sensor relative to its socket.
    pub fn rotate_command(&self, rotation: Vec3) -> Result<Command, CommandError> {
        Command::rotate_sensor(
            self.definition.agent.as_str(),
            self.definition.name.as_str(),
            rotation,
        )
    }

    /// Release both buffers.
    pub fn free(self, arena: &mut BufferArena) -> Result<(), SensorError> {
        let data = arena.free(self.data);
        arena.free(self.flag)?;
        Ok(data?)
    }
}
