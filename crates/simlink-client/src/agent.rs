//! Agent definitions and the session's agent registry.
//!
//! The registry validates agent-level commands against each agent's
//! action space before they reach the dispatch queue. It can only see
//! names registered locally: a clash with an agent already present in
//! the engine's world surfaces engine-side on the next tick.

use indexmap::IndexMap;
use log::debug;
use simlink_core::{AgentKind, Command, Vec3};
use simlink_sensor::{Sensor, SensorDefinition, SensorRegistry};
use simlink_shm::BufferArena;

use crate::command_center::CommandCenter;
use crate::error::SessionError;

// ── AgentDefinition ─────────────────────────────────────────────

/// Describes one agent to register, and spawn if it is not already in
/// the world.
///
/// # Examples
///
/// ```
/// use simlink_client::AgentDefinition;
/// use simlink_core::AgentKind;
/// use simlink_sensor::SensorDefinition;
///
/// let def = AgentDefinition::new("uav0", AgentKind::Uav)
///     .location([0.0, 0.0, 5.0])
///     .sensor(SensorDefinition::new("", "LocationSensor"))
///     .main(true);
/// assert_eq!(def.sensors[0].agent, "uav0");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct AgentDefinition {
    /// Agent name, unique within the session.
    pub name: String,
    /// Agent class.
    pub kind: AgentKind,
    /// Spawn location.
    pub location: Vec3,
    /// Spawn rotation.
    pub rotation: Vec3,
    /// Sensors, in declaration order.
    pub sensors: Vec<SensorDefinition>,
    /// Whether the agent already exists in the world, in which case no
    /// `SpawnAgent` command is sent.
    pub existing: bool,
    /// Initial control scheme index.
    pub control_scheme: usize,
    /// Whether this is the session's main agent.
    pub is_main: bool,
}

impl AgentDefinition {
    /// A definition at the origin with no sensors.
    pub fn new(name: impl Into<String>, kind: AgentKind) -> Self {
        Self {
            name: name.into(),
            kind,
            location: [0.0; 3],
            rotation: [0.0; 3],
            sensors: Vec::new(),
            existing: false,
            control_scheme: 0,
            is_main: false,
        }
    }

    /// Set the spawn location.
    pub fn location(mut self, location: Vec3) -> Self {
        self.location = location;
        self
    }

    /// Set the spawn rotation.
    pub fn rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = rotation;
        self
    }

    /// Attach a sensor. Its `agent` field is overwritten with this
    /// agent's name.
    pub fn sensor(mut self, mut sensor: SensorDefinition) -> Self {
        sensor.agent.clone_from(&self.name);
        self.sensors.push(sensor);
        self
    }

    /// Mark the agent as already present in the world.
    pub fn existing(mut self, existing: bool) -> Self {
        self.existing = existing;
        self
    }

    /// Set the initial control scheme.
    pub fn control_scheme(mut self, scheme: usize) -> Self {
        self.control_scheme = scheme;
        self
    }

    /// Mark as the main agent.
    pub fn main(mut self, is_main: bool) -> Self {
        self.is_main = is_main;
        self
    }
}

// ── Agent ───────────────────────────────────────────────────────

/// A registered agent and its live sensors.
#[derive(Debug)]
pub struct Agent {
    definition: AgentDefinition,
    sensors: IndexMap<String, Sensor>,
    control_scheme: usize,
    last_action: Option<Vec<f32>>,
}

impl Agent {
    /// Agent name.
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Agent class.
    pub fn kind(&self) -> AgentKind {
        self.definition.kind
    }

    /// The definition the agent was registered from.
    pub fn definition(&self) -> &AgentDefinition {
        &self.definition
    }

    /// Active control scheme index.
    pub fn control_scheme(&self) -> usize {
        self.control_scheme
    }

    /// Action length required by the active control scheme.
    pub fn action_len(&self) -> usize {
        // The scheme index is validated whenever it changes.
        self.definition
            .kind
            .action_len(self.control_scheme)
            .unwrap_or(0)
    }

    /// The last action accepted by [`AgentRegistry::act`]. The engine
    /// keeps applying it every tick until a new one arrives.
    pub fn last_action(&self) -> Option<&[f32]> {
        self.last_action.as_deref()
    }

    /// Sensors in declaration order.
    pub fn sensors(&self) -> impl Iterator<Item = &Sensor> {
        self.sensors.values()
    }

    /// Number of sensors.
    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    /// Look up a sensor by name.
    pub fn sensor(&self, name: &str) -> Option<&Sensor> {
        self.sensors.get(name)
    }

    /// Mutable sensor lookup.
    pub fn sensor_mut(&mut self, name: &str) -> Option<&mut Sensor> {
        self.sensors.get_mut(name)
    }

    /// The first task sensor, whose reading is `[reward, terminal]`.
    pub fn task_sensor(&self) -> Option<&Sensor> {
        self.sensors
            .values()
            .find(|s| s.kind().is_some_and(|k| k.is_task()))
    }

    fn free(self, arena: &mut BufferArena) -> Result<(), SessionError> {
        let mut first_err = None;
        for (_, sensor) in self.sensors {
            if let Err(e) = sensor.free(arena) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

// ── AgentRegistry ───────────────────────────────────────────────

/// Agents registered in the session, in registration order.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: IndexMap<String, Agent>,
    main: Option<String>,
}

impl AgentRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent, build its sensors, and queue the commands that
    /// create it in the engine.
    ///
    /// Every sensor is built before anything is registered or queued; if
    /// one fails, the buffers of the ones already built are released and
    /// the registry is unchanged. On success the queue receives, in
    /// order: `SpawnAgent` (unless the agent already exists), one
    /// `AddSensor` per sensor that does not already exist, and
    /// `SetControlScheme` if the scheme is not the default.
    pub fn spawn(
        &mut self,
        arena: &mut BufferArena,
        registry: &SensorRegistry,
        commands: &mut CommandCenter,
        mut definition: AgentDefinition,
    ) -> Result<&Agent, SessionError> {
        if self.agents.contains_key(&definition.name) {
            return Err(SessionError::DuplicateAgent {
                name: definition.name,
            });
        }
        if definition.kind.action_len(definition.control_scheme).is_none() {
            return Err(SessionError::UnknownControlScheme {
                agent: definition.name,
                kind: definition.kind,
                scheme: definition.control_scheme,
            });
        }
        for sensor in &mut definition.sensors {
            sensor.agent.clone_from(&definition.name);
        }

        let mut sensors: IndexMap<String, Sensor> =
            IndexMap::with_capacity(definition.sensors.len());
        for sensor_def in &definition.sensors {
            match registry.build(arena, sensor_def.clone()) {
                Ok(sensor) => {
                    sensors.insert(sensor.name().to_string(), sensor);
                }
                Err(e) => {
                    for (_, built) in sensors {
                        // The build error is the one worth reporting.
                        let _ = built.free(arena);
                    }
                    return Err(e.into());
                }
            }
        }

        if !definition.existing {
            commands.enqueue(Command::SpawnAgent {
                agent: definition.name.clone(),
                kind: definition.kind,
                location: definition.location,
                rotation: definition.rotation,
                is_main: definition.is_main,
            });
        }
        for sensor_def in definition.sensors.iter().filter(|s| !s.existing) {
            commands.enqueue(sensor_def.add_sensor_command());
        }
        if definition.control_scheme != 0 {
            commands.enqueue(Command::SetControlScheme {
                agent: definition.name.clone(),
                scheme: definition.control_scheme,
            });
        }

        debug!(
            "registered agent {} ({}) with {} sensors",
            definition.name,
            definition.kind,
            sensors.len()
        );
        let name = definition.name.clone();
        if definition.is_main {
            self.main = Some(name.clone());
        }
        let agent = Agent {
            control_scheme: definition.control_scheme,
            definition,
            sensors,
            last_action: None,
        };
        Ok(self.agents.entry(name).or_insert(agent))
    }

    /// Look up an agent.
    pub fn get(&self, name: &str) -> Result<&Agent, SessionError> {
        self.agents
            .get(name)
            .ok_or_else(|| SessionError::UnknownAgent {
                name: name.to_string(),
            })
    }

    /// Mutable agent lookup.
    pub fn get_mut(&mut self, name: &str) -> Result<&mut Agent, SessionError> {
        self.agents
            .get_mut(name)
            .ok_or_else(|| SessionError::UnknownAgent {
                name: name.to_string(),
            })
    }

    /// Queue an action after checking it against the agent's action space.
    ///
    /// Nothing is queued if the length is wrong or a value is not finite.
    pub fn act(
        &mut self,
        commands: &mut CommandCenter,
        name: &str,
        action: Vec<f32>,
    ) -> Result<(), SessionError> {
        let agent = self.get_mut(name)?;
        let expected = agent.action_len();
        if action.len() != expected {
            return Err(SessionError::ActionShape {
                agent: name.to_string(),
                expected,
                actual: action.len(),
            });
        }
        let command = Command::agent_action(name, action.clone())?;
        agent.last_action = Some(action);
        commands.enqueue(command);
        Ok(())
    }

    /// Queue a teleport. At least one of `location` and `rotation` is
    /// required.
    pub fn teleport(
        &self,
        commands: &mut CommandCenter,
        name: &str,
        location: Option<Vec3>,
        rotation: Option<Vec3>,
    ) -> Result<(), SessionError> {
        self.get(name)?;
        commands.enqueue(Command::teleport(name, location, rotation)?);
        Ok(())
    }

    /// Queue a full kinematic state overwrite.
    pub fn set_state(
        &self,
        commands: &mut CommandCenter,
        name: &str,
        location: Vec3,
        rotation: Vec3,
        velocity: Vec3,
        angular_velocity: Vec3,
    ) -> Result<(), SessionError> {
        self.get(name)?;
        commands.enqueue(Command::agent_state(
            name,
            location,
            rotation,
            velocity,
            angular_velocity,
        )?);
        Ok(())
    }

    /// Switch an agent's control scheme and queue the change.
    pub fn set_control_scheme(
        &mut self,
        commands: &mut CommandCenter,
        name: &str,
        scheme: usize,
    ) -> Result<(), SessionError> {
        let agent = self.get_mut(name)?;
        if agent.kind().action_len(scheme).is_none() {
            return Err(SessionError::UnknownControlScheme {
                agent: name.to_string(),
                kind: agent.kind(),
                scheme,
            });
        }
        agent.control_scheme = scheme;
        agent.last_action = None;
        commands.enqueue(Command::SetControlScheme {
            agent: name.to_string(),
            scheme,
        });
        Ok(())
    }

    /// Unregister an agent and free its sensor buffers.
    pub fn remove(
        &mut self,
        arena: &mut BufferArena,
        name: &str,
    ) -> Result<AgentDefinition, SessionError> {
        let agent = self
            .agents
            .shift_remove(name)
            .ok_or_else(|| SessionError::UnknownAgent {
                name: name.to_string(),
            })?;
        if self.main.as_deref() == Some(name) {
            self.main = None;
        }
        let definition = agent.definition.clone();
        agent.free(arena)?;
        debug!("removed agent {name}");
        Ok(definition)
    }

    /// Unregister every agent, freeing all sensor buffers.
    ///
    /// Every agent is released even if one fails; the first error is
    /// returned.
    pub fn clear(&mut self, arena: &mut BufferArena) -> Result<(), SessionError> {
        self.main = None;
        let mut first_err = None;
        for (_, agent) in self.agents.drain(..) {
            if let Err(e) = agent.free(arena) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// The main agent, if one was designated.
    pub fn main_agent(&self) -> Option<&Agent> {
        self.main.as_deref().and_then(|name| self.agents.get(name))
    }

    /// Designate the main agent.
    pub fn set_main_agent(&mut self, name: &str) -> Result<(), SessionError> {
        self.get(name)?;
        self.main = Some(name.to_string());
        Ok(())
    }

    /// Agents in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    /// Registered agent names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.agents.keys().map(String::as_str)
    }

    /// Number of registered agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether no agent is registered.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simlink_core::SessionId;
    use simlink_sensor::SensorError;
    use simlink_shm::{InProcessIpc, ShmNaming};
    use std::sync::Arc;

    struct Fixture {
        ipc: InProcessIpc,
        arena: BufferArena,
        sensors: SensorRegistry,
        commands: CommandCenter,
        agents: AgentRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            let ipc = InProcessIpc::new();
            let arena =
                BufferArena::new(Arc::new(ipc.clone()), ShmNaming::new(SessionId::new("ag")));
            Self {
                ipc,
                arena,
                sensors: SensorRegistry::with_builtin_types(),
                commands: CommandCenter::new(),
                agents: AgentRegistry::new(),
            }
        }

        fn spawn(&mut self, def: AgentDefinition) -> Result<(), SessionError> {
            self.agents
                .spawn(&mut self.arena, &self.sensors, &mut self.commands, def)
                .map(|_| ())
        }

        fn opcodes(&self) -> Vec<&'static str> {
            self.commands.pending().map(Command::opcode).collect()
        }
    }

    fn uav(name: &str) -> AgentDefinition {
        AgentDefinition::new(name, AgentKind::Uav)
            .sensor(SensorDefinition::new("", "LocationSensor"))
            .sensor(SensorDefinition::new("", "VelocitySensor"))
    }

    #[test]
    fn spawn_queues_spawn_then_sensors() {
        let mut fx = Fixture::new();
        fx.spawn(uav("uav0")).unwrap();
        assert_eq!(fx.opcodes(), vec!["SpawnAgent", "AddSensor", "AddSensor"]);
        assert_eq!(fx.ipc.region_count(), 4);
        let agent = fx.agents.get("uav0").unwrap();
        let names: Vec<_> = agent.sensors().map(Sensor::name).collect();
        assert_eq!(names, vec!["LocationSensor", "VelocitySensor"]);
        assert_eq!(agent.sensor("LocationSensor").unwrap().agent(), "uav0");
    }

    #[test]
    fn existing_agent_and_sensor_queue_nothing() {
        let mut fx = Fixture::new();
        let def = AgentDefinition::new("a", AgentKind::Uav)
            .existing(true)
            .sensor(SensorDefinition::new("", "LocationSensor").existing(true));
        fx.spawn(def).unwrap();
        assert!(fx.commands.is_empty());
        assert_eq!(fx.ipc.region_count(), 2);
    }

    #[test]
    fn non_default_scheme_queues_set_control_scheme() {
        let mut fx = Fixture::new();
        fx.spawn(AgentDefinition::new("s", AgentKind::SphereRobot).control_scheme(1))
            .unwrap();
        assert_eq!(fx.opcodes(), vec!["SpawnAgent", "SetControlScheme"]);
        assert_eq!(fx.agents.get("s").unwrap().action_len(), 2);
    }

    #[test]
    fn invalid_scheme_rejected_before_allocation() {
        let mut fx = Fixture::new();
        let err = fx.spawn(uav("u").control_scheme(3)).unwrap_err();
        assert!(matches!(err, SessionError::UnknownControlScheme { scheme: 3, .. }));
        assert_eq!(fx.ipc.region_count(), 0);
        assert!(fx.commands.is_empty());
    }

    #[test]
    fn duplicate_agent_rejected() {
        let mut fx = Fixture::new();
        fx.spawn(uav("uav0")).unwrap();
        let err = fx.spawn(uav("uav0")).unwrap_err();
        assert!(matches!(err, SessionError::DuplicateAgent { .. }));
        assert_eq!(fx.agents.len(), 1);
    }

    #[test]
    fn failed_sensor_releases_earlier_ones() {
        let mut fx = Fixture::new();
        let def = AgentDefinition::new("a", AgentKind::Uav)
            .sensor(SensorDefinition::new("", "LocationSensor"))
            .sensor(SensorDefinition::new("", "Sonar"));
        let err = fx.spawn(def).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Sensor(SensorError::UnknownSensorType { .. })
        ));
        assert_eq!(fx.ipc.region_count(), 0);
        assert!(fx.agents.is_empty());
        assert!(fx.commands.is_empty());
    }

    #[test]
    fn wrong_action_length_never_reaches_queue() {
        let mut fx = Fixture::new();
        fx.spawn(uav("uav0")).unwrap();
        fx.commands.clear();
        let err = fx
            .agents
            .act(&mut fx.commands, "uav0", vec![0.0; 3])
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::ActionShape {
                expected: 4,
                actual: 3,
                ..
            }
        ));
        assert!(fx.commands.is_empty());
        assert!(fx.agents.get("uav0").unwrap().last_action().is_none());
    }

    #[test]
    fn nan_action_rejected() {
        let mut fx = Fixture::new();
        fx.spawn(uav("uav0")).unwrap();
        fx.commands.clear();
        let err = fx
            .agents
            .act(&mut fx.commands, "uav0", vec![0.0, f32::NAN, 0.0, 0.0])
            .unwrap_err();
        assert!(matches!(err, SessionError::Command(_)));
        assert!(fx.commands.is_empty());
    }

    #[test]
    fn act_queues_and_remembers() {
        let mut fx = Fixture::new();
        fx.spawn(uav("uav0")).unwrap();
        fx.commands.clear();
        fx.agents
            .act(&mut fx.commands, "uav0", vec![0.0, 0.0, 0.0, 10.0])
            .unwrap();
        assert_eq!(fx.opcodes(), vec!["AgentAction"]);
        assert_eq!(
            fx.agents.get("uav0").unwrap().last_action(),
            Some(&[0.0, 0.0, 0.0, 10.0][..])
        );
    }

    #[test]
    fn unknown_agent_errors() {
        let mut fx = Fixture::new();
        assert!(matches!(
            fx.agents.act(&mut fx.commands, "ghost", vec![]),
            Err(SessionError::UnknownAgent { .. })
        ));
        assert!(matches!(
            fx.agents.teleport(&mut fx.commands, "ghost", Some([0.0; 3]), None),
            Err(SessionError::UnknownAgent { .. })
        ));
    }

    #[test]
    fn teleport_requires_a_target() {
        let mut fx = Fixture::new();
        fx.spawn(uav("uav0")).unwrap();
        let err = fx
            .agents
            .teleport(&mut fx.commands, "uav0", None, None)
            .unwrap_err();
        assert!(matches!(err, SessionError::Command(_)));
    }

    #[test]
    fn non_finite_kinematics_never_reach_queue() {
        let mut fx = Fixture::new();
        fx.spawn(uav("uav0")).unwrap();
        fx.commands.clear();
        let err = fx
            .agents
            .set_state(
                &mut fx.commands,
                "uav0",
                [f32::INFINITY; 3],
                [0.0; 3],
                [0.0; 3],
                [0.0; 3],
            )
            .unwrap_err();
        assert!(matches!(err, SessionError::Command(_)));
        assert!(fx
            .agents
            .teleport(&mut fx.commands, "uav0", Some([f32::NAN, 0.0, 0.0]), None)
            .is_err());
        assert!(fx.commands.is_empty());

        fx.agents
            .set_state(&mut fx.commands, "uav0", [1.0; 3], [0.0; 3], [0.0; 3], [0.0; 3])
            .unwrap();
        assert_eq!(fx.opcodes(), vec!["SetAgentState"]);
    }

    #[test]
    fn set_control_scheme_changes_action_len() {
        let mut fx = Fixture::new();
        fx.spawn(AgentDefinition::new("h", AgentKind::HandAgent))
            .unwrap();
        assert_eq!(fx.agents.get("h").unwrap().action_len(), 23);
        fx.agents
            .set_control_scheme(&mut fx.commands, "h", 1)
            .unwrap();
        assert_eq!(fx.agents.get("h").unwrap().action_len(), 26);
        assert!(fx
            .agents
            .set_control_scheme(&mut fx.commands, "h", 2)
            .is_err());
    }

    #[test]
    fn remove_frees_buffers_and_main() {
        let mut fx = Fixture::new();
        fx.spawn(uav("uav0").main(true)).unwrap();
        assert_eq!(fx.agents.main_agent().unwrap().name(), "uav0");
        let def = fx.agents.remove(&mut fx.arena, "uav0").unwrap();
        assert_eq!(def.name, "uav0");
        assert_eq!(fx.ipc.region_count(), 0);
        assert!(fx.agents.main_agent().is_none());
        // The name is free again.
        fx.spawn(uav("uav0")).unwrap();
    }

    #[test]
    fn clear_releases_everything() {
        let mut fx = Fixture::new();
        fx.spawn(uav("a")).unwrap();
        fx.spawn(uav("b")).unwrap();
        fx.agents.clear(&mut fx.arena).unwrap();
        assert!(fx.agents.is_empty());
        assert_eq!(fx.ipc.region_count(), 0);
    }

    #[test]
    fn task_sensor_found() {
        let mut fx = Fixture::new();
        fx.spawn(uav("a").sensor(SensorDefinition::new("", "DistanceTask")))
            .unwrap();
        let agent = fx.agents.get("a").unwrap();
        assert_eq!(agent.task_sensor().unwrap().name(), "DistanceTask");
    }
}
