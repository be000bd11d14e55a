//! The sensor descriptor registry and factory.
//!
//! A [`SensorRegistry`] is an explicit object built once per session and
//! passed to whoever constructs sensors. There is no process-wide table.

use indexmap::IndexMap;
use log::debug;
use simlink_core::{BufferSpec, ElementType};
use simlink_shm::{sensor_data_name, sensor_flag_name, ArenaError, BufferArena};
use smallvec::smallvec;

use crate::definition::SensorDefinition;
use crate::error::SensorError;
use crate::kind::{SensorKind, ShapeRule};
use crate::sensor::Sensor;

/// Shape and element type of one sensor type.
#[derive(Clone, Debug)]
pub struct SensorDescriptor {
    /// Type tag.
    pub type_name: String,
    /// Built-in kind, if this is one of the engine's sensor types.
    pub kind: Option<SensorKind>,
    /// Shape rule.
    pub rule: ShapeRule,
    /// Element type.
    pub element: ElementType,
}

/// Maps sensor type tags to descriptors and builds sensors.
///
/// # Examples
///
/// ```
/// use simlink_sensor::{SensorDefinition, SensorRegistry};
///
/// let registry = SensorRegistry::with_builtin_types();
/// let spec = registry
///     .resolve_spec(&SensorDefinition::new("uav0", "LocationSensor"))
///     .unwrap();
/// assert_eq!(spec.shape().as_slice(), &[3]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct SensorRegistry {
    types: IndexMap<String, SensorDescriptor>,
}

impl SensorRegistry {
    /// A registry with no types.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every [`SensorKind`].
    pub fn with_builtin_types() -> Self {
        let mut types = IndexMap::with_capacity(SensorKind::ALL.len());
        for kind in SensorKind::ALL {
            types.insert(
                kind.type_name().to_string(),
                SensorDescriptor {
                    type_name: kind.type_name().to_string(),
                    kind: Some(kind),
                    rule: kind.shape_rule(),
                    element: kind.element(),
                },
            );
        }
        Self { types }
    }

    /// Register an additional sensor type.
    ///
    /// # Errors
    ///
    /// [`SensorError::DuplicateSensorType`] if the tag is taken.
    pub fn register_type(
        &mut self,
        type_name: impl Into<String>,
        rule: ShapeRule,
        element: ElementType,
    ) -> Result<(), SensorError> {
        let type_name = type_name.into();
        if self.types.contains_key(&type_name) {
            return Err(SensorError::DuplicateSensorType { type_name });
        }
        self.types.insert(
            type_name.clone(),
            SensorDescriptor {
                kind: SensorKind::from_type_name(&type_name),
                type_name,
                rule,
                element,
            },
        );
        Ok(())
    }

    /// Look up a type tag.
    pub fn descriptor(&self, type_name: &str) -> Result<&SensorDescriptor, SensorError> {
        self.types
            .get(type_name)
            .ok_or_else(|| SensorError::UnknownSensorType {
                type_name: type_name.to_string(),
            })
    }

    /// Registered type tags in registration order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Resolve a definition's buffer spec.
    ///
    /// Configuration-dependent shapes (camera resolution) are resolved
    /// here, before anything is allocated.
    pub fn resolve_spec(&self, def: &SensorDefinition) -> Result<BufferSpec, SensorError> {
        let desc = self.descriptor(&def.sensor_type)?;
        let shape = desc.rule.resolve(&def.name, &def.config)?;
        Ok(BufferSpec::new(shape, desc.element)?)
    }

    /// Build a sensor: resolve its spec, then allocate its data buffer and
    /// enable-flag buffer. Either both buffers exist afterwards or neither.
    ///
    /// The flag starts raised (enabled).
    pub fn build(
        &self,
        arena: &mut BufferArena,
        def: SensorDefinition,
    ) -> Result<Sensor, SensorError> {
        let spec = self.resolve_spec(&def)?;
        let kind = self.descriptor(&def.sensor_type)?.kind;
        let flag_spec = BufferSpec::new(smallvec![1], ElementType::Bool)?;

        let dup = |e: ArenaError| match e {
            ArenaError::DuplicateName { .. } => SensorError::DuplicateSensorName {
                agent: def.agent.clone(),
                sensor: def.name.clone(),
            },
            other => SensorError::Buffer(other),
        };

        let data = arena
            .allocate(&sensor_data_name(&def.agent, &def.name), spec.clone())
            .map_err(dup)?;
        let flag = match arena.allocate(&sensor_flag_name(&def.agent, &def.name), flag_spec) {
            Ok(flag) => flag,
            Err(e) => {
                let err = dup(e);
                arena.free(data)?;
                return Err(err);
            }
        };
        arena.write(flag, &[true])?;

        debug!(
            "built sensor {}/{} ({}) {spec}",
            def.agent, def.name, def.sensor_type
        );
        Ok(Sensor::new(def, kind, spec, data, flag))
    }
}
