//! The user-facing session.
//!
//! [`Session`] owns everything one connection to an engine needs: the
//! buffer arena, the sensor factory, the agent registry, the command
//! queue and the tick handshake. Each [`tick()`](Session::tick) flushes
//! queued commands, runs one engine step and returns a
//! [`StateSnapshot`].
//!
//! # Ownership model
//!
//! `Session` is [`Send`] (can be moved to another thread) but every
//! operation takes `&mut self`, so one thread drives the handshake at a
//! time. Other threads feed commands through a
//! [`CommandSender`](crate::CommandSender).
//!
//! # Failure
//!
//! Protocol and resource errors (engine timeout, command overflow, a
//! vanished shared object) poison the session: every later operation
//! returns [`SessionError::Failed`] and the session must be re-established.
//! Validation errors leave it untouched.
//!
//! # Shutdown
//!
//! Dropping a `Session` runs [`teardown()`](Session::teardown): every
//! shared buffer is unmapped and unlinked and a launched engine is killed.

use std::fmt::{self, Write as _};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, info, warn};
use simlink_core::{BufferSpec, Command, ElementType, TickId, Vec3, WorldCommand};
use simlink_core::{DebugShape, SessionId};
use simlink_sensor::{SensorReading, SensorRegistry};
use simlink_shm::{
    BufferArena, BufferHandle, IpcBackend, ShmNaming, COMMAND_BUFFER, COMMAND_FLAG_BUFFER,
    RESET_BUFFER,
};

use crate::agent::{AgentDefinition, AgentRegistry};
use crate::command_center::{CommandCenter, CommandSender, ShmCommandSink};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::launch::{EngineLauncher, EngineProcess};
use crate::metrics::TickMetrics;
use crate::state::{AgentState, StateSnapshot};
use crate::tick::{TickPhase, TickProtocol};

// Compile-time assertion: Session is Send.
// Fails to compile if any field is !Send.
const _: () = {
    #[allow(dead_code)]
    fn assert_send<T: Send>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send::<Session>();
    }
};

// ── StepOutcome ────────────────────────────────────────────────────

/// Result of a [`Session::step()`] call.
#[derive(Clone, Debug)]
pub struct StepOutcome {
    /// State after the tick.
    pub state: StateSnapshot,
    /// First value of the main agent's task sensor, if it has one.
    pub reward: Option<f32>,
    /// Whether the task sensor reported the episode finished.
    pub terminal: Option<bool>,
}

// ── Session ────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Status {
    Live,
    Failed,
    Closed,
}

/// One connection to a running engine.
///
/// Created with [`connect()`](Session::connect) against an engine that is
/// already starting, or with [`launch()`](Session::launch), which starts
/// the engine binary first. Both run an initial
/// [`reset()`](Session::reset), so the session is ready to tick.
///
/// # Example
///
/// ```ignore
/// let mut session = Session::launch(config, Arc::new(PosixIpc::new()), &launcher)?;
/// for _ in 0..100 {
///     let outcome = session.step(vec![0.0, 0.0, 0.0, 10.0])?;
///     if outcome.terminal == Some(true) {
///         session.reset()?;
///     }
/// }
/// ```
pub struct Session {
    config: SessionConfig,
    spawn_list: Vec<AgentDefinition>,
    arena: BufferArena,
    sensors: SensorRegistry,
    agents: AgentRegistry,
    commands: CommandCenter,
    tick: TickProtocol,
    reset_flag: BufferHandle,
    command_flag: BufferHandle,
    command_buffer: BufferHandle,
    engine: Option<EngineProcess>,
    metrics: TickMetrics,
    status: Status,
}

impl Session {
    /// Connect to an engine with the built-in sensor types.
    ///
    /// The engine must already have created the session's tick
    /// semaphores. Allocates the session buffers, waits for the engine's
    /// readiness signal and runs the initial reset.
    pub fn connect(
        config: SessionConfig,
        backend: Arc<dyn IpcBackend>,
    ) -> Result<Self, SessionError> {
        Self::connect_with_registry(config, backend, SensorRegistry::with_builtin_types())
    }

    /// Connect using a caller-supplied sensor registry.
    pub fn connect_with_registry(
        config: SessionConfig,
        backend: Arc<dyn IpcBackend>,
        sensors: SensorRegistry,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let mut spawn_list = config.agents.clone();
        if let Some(scenario) = &config.scenario {
            spawn_list.extend(scenario.agent_definitions()?);
        }

        let naming = ShmNaming::with_prefix(config.prefix.clone(), config.session_id.clone());
        let server = backend.open_semaphore(&naming.server_semaphore())?;
        let client = backend.open_semaphore(&naming.client_semaphore())?;

        let mut arena = BufferArena::new(backend, naming);
        let reset_flag = arena.allocate(
            RESET_BUFFER,
            BufferSpec::new(vec![1], ElementType::Bool)?,
        )?;
        let command_flag = arena.allocate(
            COMMAND_FLAG_BUFFER,
            BufferSpec::new(vec![1], ElementType::Bool)?,
        )?;
        let command_buffer = arena.allocate(
            COMMAND_BUFFER,
            BufferSpec::new(vec![config.command_buffer_bytes], ElementType::I8)?,
        )?;

        let tick = TickProtocol::new(server, client, config.tick_timeout);
        let mut session = Self {
            config,
            spawn_list,
            arena,
            sensors,
            agents: AgentRegistry::new(),
            commands: CommandCenter::new(),
            tick,
            reset_flag,
            command_flag,
            command_buffer,
            engine: None,
            metrics: TickMetrics::default(),
            status: Status::Live,
        };

        let waited = session.tick.await_engine()?;
        info!(
            "session {} connected after {waited:?}",
            session.config.session_id
        );
        session.reset()?;
        Ok(session)
    }

    /// Start the engine binary, then connect to it.
    ///
    /// The session owns the engine process: tearing the session down
    /// kills it, and so does any failure while connecting.
    pub fn launch(
        config: SessionConfig,
        backend: Arc<dyn IpcBackend>,
        launcher: &EngineLauncher,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let naming = ShmNaming::with_prefix(config.prefix.clone(), config.session_id.clone());
        let process = launcher.launch(&*backend, &naming, config.load_timeout)?;
        let mut session = Self::connect(config, backend)?;
        session.engine = Some(process);
        Ok(session)
    }

    // ── Ticking ────────────────────────────────────────────────────

    /// Run one full tick and return the resulting state.
    pub fn tick(&mut self) -> Result<StateSnapshot, SessionError> {
        self.begin_tick()?;
        self.finish_tick()
    }

    /// Flush queued commands and signal the engine to step, without
    /// waiting. Pair with [`finish_tick()`](Self::finish_tick).
    pub fn begin_tick(&mut self) -> Result<(), SessionError> {
        self.check_live()?;
        let result = self.begin_tick_inner();
        result.map_err(|e| self.poison(e))
    }

    /// Wait for the step started by [`begin_tick()`](Self::begin_tick)
    /// and capture the state.
    ///
    /// With [`SessionConfig::copy_state`] off the returned snapshot is
    /// empty; read buffers through [`sensor_bytes()`](Self::sensor_bytes).
    pub fn finish_tick(&mut self) -> Result<StateSnapshot, SessionError> {
        self.check_live()?;
        let result = self.finish_tick_inner();
        result.map_err(|e| self.poison(e))
    }

    /// Act with the main agent, tick, and report its task sensor.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoMainAgent`] if no agent is marked main, and
    /// [`SessionError::ActionShape`] if `action` does not fit its current
    /// control scheme. Neither queues anything.
    pub fn step(&mut self, action: Vec<f32>) -> Result<StepOutcome, SessionError> {
        self.check_live()?;
        let main = self
            .agents
            .main_agent()
            .ok_or(SessionError::NoMainAgent)?
            .name()
            .to_string();
        self.agents.act(&mut self.commands, &main, action)?;
        let state = self.tick()?;
        let (reward, terminal) = self.task_signal(&main)?;
        Ok(StepOutcome {
            state,
            reward,
            terminal,
        })
    }

    /// Reset the world and rebuild the configured agents.
    ///
    /// Drops queued commands aimed at agents, raises the reset flag and
    /// ticks until the engine has reloaded. Queued world commands go out
    /// with the first of those ticks. Then frees every agent's buffers,
    /// respawns the configured and scenario agents, and runs the
    /// pre-start ticks. Returns the state after the last of them.
    /// Agents added with [`add_agent()`](Self::add_agent) are not
    /// respawned.
    pub fn reset(&mut self) -> Result<StateSnapshot, SessionError> {
        self.check_live()?;
        let result = self.reset_inner();
        result.map_err(|e| self.poison(e))
    }

    fn begin_tick_inner(&mut self) -> Result<(), SessionError> {
        let phase = self.tick.phase();
        if phase == TickPhase::WaitingForEngine {
            return Err(SessionError::WrongPhase {
                operation: "begin a tick",
                phase,
            });
        }
        self.metrics.begin_tick();

        let start = Instant::now();
        let mut sink = ShmCommandSink::new(&mut self.arena, self.command_buffer, self.command_flag);
        let report = self.commands.flush(&mut sink)?;
        self.metrics.flush_us = start.elapsed().as_micros() as u64;
        if report.commands > 0 {
            self.metrics.commands_flushed = report.commands;
            self.metrics.bytes_flushed = report.bytes;
            self.metrics.total_flushes += 1;
            self.metrics.total_commands += report.commands as u64;
        }

        self.tick.begin()
    }

    fn finish_tick_inner(&mut self) -> Result<StateSnapshot, SessionError> {
        self.await_step()?;
        if !self.config.copy_state {
            return Ok(StateSnapshot::new(self.tick.current_tick()));
        }
        let start = Instant::now();
        let snapshot = self.capture()?;
        self.metrics.snapshot_us = start.elapsed().as_micros() as u64;
        self.tick.mark_read();
        Ok(snapshot)
    }

    fn await_step(&mut self) -> Result<(), SessionError> {
        match self.tick.complete() {
            Ok(waited) => {
                self.metrics.wait_us = waited.as_micros() as u64;
                self.metrics.total_ticks += 1;
                Ok(())
            }
            Err(e) => {
                if matches!(e, SessionError::EngineUnresponsive { .. }) {
                    self.metrics.timeouts += 1;
                }
                Err(e)
            }
        }
    }

    /// One tick whose state nobody reads.
    fn advance(&mut self) -> Result<(), SessionError> {
        self.begin_tick_inner()?;
        self.await_step()?;
        self.tick.mark_read();
        Ok(())
    }

    fn reset_inner(&mut self) -> Result<StateSnapshot, SessionError> {
        info!("resetting session {}", self.config.session_id);
        if self.tick.phase() == TickPhase::WaitingForEngine {
            self.await_step()?;
        }

        // Agents are rebuilt below, so commands aimed at them are stale.
        // World commands ride out on the first settle tick.
        let discarded = self.commands.discard_agent_commands();
        if discarded > 0 {
            warn!("reset discarded {discarded} agent commands");
            self.metrics.discarded_commands += discarded as u64;
        }

        self.arena.write(self.reset_flag, &[true])?;
        for _ in 0..self.config.reset_settle_ticks.max(1) {
            self.advance()?;
        }

        self.agents.clear(&mut self.arena)?;
        for definition in self.spawn_list.clone() {
            self.agents
                .spawn(&mut self.arena, &self.sensors, &mut self.commands, definition)?;
        }

        for _ in 0..self.config.pre_start_steps {
            self.advance()?;
        }
        self.begin_tick_inner()?;
        let state = self.finish_tick_inner()?;
        debug!(
            "reset complete at tick {} with {} agents",
            self.tick.current_tick().0,
            self.agents.len()
        );
        Ok(state)
    }

    fn capture(&self) -> Result<StateSnapshot, SessionError> {
        self.tick.ensure_readable()?;
        let mut snapshot = StateSnapshot::new(self.tick.current_tick());
        for agent in self.agents.iter() {
            let mut state = AgentState::default();
            for sensor in agent.sensors() {
                state.insert(sensor.name().to_string(), sensor.read(&self.arena)?);
            }
            snapshot.insert(agent.name().to_string(), state);
        }
        Ok(snapshot)
    }

    fn task_signal(&self, agent: &str) -> Result<(Option<f32>, Option<bool>), SessionError> {
        let Some(task) = self.agents.get(agent)?.task_sensor() else {
            return Ok((None, None));
        };
        let reading = task.read(&self.arena)?;
        let values = reading.as_f32().unwrap_or(&[]);
        Ok((
            values.first().copied(),
            values.get(1).map(|t| *t == 1.0),
        ))
    }

    // ── State ──────────────────────────────────────────────────────

    /// Copy every sensor buffer into a fresh snapshot.
    pub fn snapshot(&self) -> Result<StateSnapshot, SessionError> {
        self.check_live()?;
        self.capture()
    }

    /// Read one sensor.
    pub fn read_sensor(&self, agent: &str, sensor: &str) -> Result<SensorReading, SessionError> {
        self.check_live()?;
        self.tick.ensure_readable()?;
        Ok(self.find_sensor(agent, sensor)?.read(&self.arena)?)
    }

    /// Borrow one sensor's raw buffer without copying.
    ///
    /// The slice aliases memory the engine rewrites on the next tick; the
    /// borrow on `self` keeps it from outliving that.
    pub fn sensor_bytes(&self, agent: &str, sensor: &str) -> Result<&[u8], SessionError> {
        self.check_live()?;
        self.tick.ensure_readable()?;
        Ok(self.find_sensor(agent, sensor)?.bytes(&self.arena)?)
    }

    fn find_sensor(
        &self,
        agent: &str,
        sensor: &str,
    ) -> Result<&simlink_sensor::Sensor, SessionError> {
        self.agents
            .get(agent)?
            .sensor(sensor)
            .ok_or_else(|| SessionError::UnknownSensor {
                agent: agent.to_string(),
                sensor: sensor.to_string(),
            })
    }

    // ── Agents and sensors ─────────────────────────────────────────

    /// Register an agent and queue its creation for the next tick.
    pub fn add_agent(&mut self, definition: AgentDefinition) -> Result<(), SessionError> {
        self.check_live()?;
        let result = self
            .agents
            .spawn(&mut self.arena, &self.sensors, &mut self.commands, definition)
            .map(|_| ());
        result.map_err(|e| self.poison(e))
    }

    /// Forget an agent and free its buffers. The engine is not told; the
    /// agent stays in the world until the next reset.
    pub fn remove_agent(&mut self, name: &str) -> Result<AgentDefinition, SessionError> {
        self.check_live()?;
        let result = self.agents.remove(&mut self.arena, name);
        result.map_err(|e| self.poison(e))
    }

    /// Queue an action for an agent.
    pub fn act(&mut self, agent: &str, action: Vec<f32>) -> Result<(), SessionError> {
        self.check_live()?;
        self.agents.act(&mut self.commands, agent, action)
    }

    /// Queue a teleport. At least one of `location` and `rotation` is
    /// required.
    pub fn teleport(
        &mut self,
        agent: &str,
        location: Option<Vec3>,
        rotation: Option<Vec3>,
    ) -> Result<(), SessionError> {
        self.check_live()?;
        self.agents
            .teleport(&mut self.commands, agent, location, rotation)
    }

    /// Queue a full kinematic state overwrite.
    pub fn set_state(
        &mut self,
        agent: &str,
        location: Vec3,
        rotation: Vec3,
        velocity: Vec3,
        angular_velocity: Vec3,
    ) -> Result<(), SessionError> {
        self.check_live()?;
        self.agents.set_state(
            &mut self.commands,
            agent,
            location,
            rotation,
            velocity,
            angular_velocity,
        )
    }

    /// Switch an agent's control scheme.
    pub fn set_control_scheme(&mut self, agent: &str, scheme: usize) -> Result<(), SessionError> {
        self.check_live()?;
        self.agents
            .set_control_scheme(&mut self.commands, agent, scheme)
    }

    /// Make `agent` the one [`step()`](Self::step) drives.
    pub fn set_main_agent(&mut self, agent: &str) -> Result<(), SessionError> {
        self.check_live()?;
        self.agents.set_main_agent(agent)
    }

    /// Enable or disable a sensor.
    ///
    /// Latches the sensor's flag buffer immediately and queues the
    /// matching command. Not allowed while the engine is stepping.
    pub fn set_sensor_enabled(
        &mut self,
        agent: &str,
        sensor: &str,
        enabled: bool,
    ) -> Result<(), SessionError> {
        self.check_live()?;
        self.tick.ensure_readable()?;
        let owner = self.agents.get_mut(agent)?;
        let target = owner
            .sensor_mut(sensor)
            .ok_or_else(|| SessionError::UnknownSensor {
                agent: agent.to_string(),
                sensor: sensor.to_string(),
            })?;
        let result = target.set_enabled(&mut self.arena, enabled);
        match result {
            Ok(command) => {
                self.commands.enqueue(command);
                Ok(())
            }
            Err(e) => Err(self.poison(e.into())),
        }
    }

    /// Rotate a sensor relative to its socket.
    pub fn rotate_sensor(
        &mut self,
        agent: &str,
        sensor: &str,
        rotation: Vec3,
    ) -> Result<(), SessionError> {
        self.check_live()?;
        let command = self.find_sensor(agent, sensor)?.rotate_command(rotation)?;
        self.commands.enqueue(command);
        Ok(())
    }

    /// Capture an agent's cameras only every `ticks` ticks.
    pub fn set_ticks_per_capture(&mut self, agent: &str, ticks: u32) -> Result<(), SessionError> {
        self.check_live()?;
        self.agents.get(agent)?;
        self.commands
            .enqueue(Command::ticks_per_capture(agent, ticks)?);
        Ok(())
    }

    // ── World commands ─────────────────────────────────────────────

    fn world(&mut self, command: WorldCommand) -> Result<(), SessionError> {
        self.check_live()?;
        self.commands.enqueue(command.into());
        Ok(())
    }

    /// Set fog density in [0, 1].
    pub fn set_fog_density(&mut self, density: f32) -> Result<(), SessionError> {
        self.world(WorldCommand::fog_density(density)?)
    }

    /// Set the hour of day; values past 23 wrap.
    pub fn set_day_time(&mut self, hour: u32) -> Result<(), SessionError> {
        self.world(WorldCommand::day_time(hour))
    }

    /// Start cycling through the day, `day_length` minutes per cycle.
    pub fn start_day_cycle(&mut self, day_length: u32) -> Result<(), SessionError> {
        self.world(WorldCommand::day_cycle(day_length)?)
    }

    /// Freeze the day cycle.
    pub fn stop_day_cycle(&mut self) -> Result<(), SessionError> {
        self.world(WorldCommand::StopDayCycle)
    }

    /// Switch the weather preset, `cloudy` or `rain`.
    pub fn set_weather(&mut self, weather: &str) -> Result<(), SessionError> {
        self.world(WorldCommand::weather(weather)?)
    }

    /// Change waves in ocean worlds.
    pub fn set_ocean_state(
        &mut self,
        intensity: u8,
        size: u8,
        direction: f32,
    ) -> Result<(), SessionError> {
        self.world(WorldCommand::ocean_state(intensity, size, direction)?)
    }

    /// Move the spectator camera.
    pub fn teleport_camera(&mut self, location: Vec3, rotation: Vec3) -> Result<(), SessionError> {
        self.world(WorldCommand::teleport_camera(location, rotation)?)
    }

    /// Turn viewport rendering on or off.
    pub fn should_render_viewport(&mut self, enabled: bool) -> Result<(), SessionError> {
        self.world(WorldCommand::RenderViewport { enabled })
    }

    /// Set render quality, 0 (lowest) to 3.
    pub fn set_render_quality(&mut self, quality: u8) -> Result<(), SessionError> {
        self.world(WorldCommand::render_quality(quality)?)
    }

    fn draw(
        &mut self,
        shape: DebugShape,
        start: Vec3,
        end: Vec3,
        color: [u8; 3],
        thickness: f32,
    ) -> Result<(), SessionError> {
        self.world(WorldCommand::debug_draw(shape, start, end, color, thickness)?)
    }

    /// Draw a debug line for one frame.
    pub fn draw_line(
        &mut self,
        start: Vec3,
        end: Vec3,
        color: [u8; 3],
        thickness: f32,
    ) -> Result<(), SessionError> {
        self.draw(DebugShape::Line, start, end, color, thickness)
    }

    /// Draw a debug arrow for one frame.
    pub fn draw_arrow(
        &mut self,
        start: Vec3,
        end: Vec3,
        color: [u8; 3],
        thickness: f32,
    ) -> Result<(), SessionError> {
        self.draw(DebugShape::Arrow, start, end, color, thickness)
    }

    /// Draw a debug box around `center` with half-size `extent`.
    pub fn draw_box(
        &mut self,
        center: Vec3,
        extent: Vec3,
        color: [u8; 3],
        thickness: f32,
    ) -> Result<(), SessionError> {
        self.draw(DebugShape::Box, center, extent, color, thickness)
    }

    /// Draw a debug point for one frame.
    pub fn draw_point(
        &mut self,
        location: Vec3,
        color: [u8; 3],
        thickness: f32,
    ) -> Result<(), SessionError> {
        self.draw(DebugShape::Point, location, [0.0; 3], color, thickness)
    }

    /// Queue a world-specific command by name.
    pub fn send_world_command(
        &mut self,
        name: impl Into<String>,
        numbers: Vec<f64>,
        strings: Vec<String>,
    ) -> Result<(), SessionError> {
        self.enqueue(Command::Custom {
            name: name.into(),
            numbers,
            strings,
        })
    }

    /// Queue any command. Non-finite numbers are rejected.
    pub fn enqueue(&mut self, command: Command) -> Result<(), SessionError> {
        self.check_live()?;
        command.validate()?;
        self.commands.enqueue(command);
        Ok(())
    }

    // ── Accessors ──────────────────────────────────────────────────

    /// A cloneable handle other threads use to queue commands.
    pub fn sender(&self) -> CommandSender {
        self.commands.sender()
    }

    /// Commands waiting for the next tick.
    pub fn queued_commands(&self) -> usize {
        self.commands.len()
    }

    /// Registered agents.
    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    /// The sensor factory.
    pub fn sensor_registry(&self) -> &SensorRegistry {
        &self.sensors
    }

    /// Metrics from the most recent tick plus session totals.
    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }

    /// Number of completed ticks.
    pub fn current_tick(&self) -> TickId {
        self.tick.current_tick()
    }

    /// Current handshake phase.
    pub fn phase(&self) -> TickPhase {
        self.tick.phase()
    }

    /// This session's id.
    pub fn session_id(&self) -> &SessionId {
        &self.config.session_id
    }

    /// OS object naming for this session.
    pub fn naming(&self) -> &ShmNaming {
        self.arena.naming()
    }

    /// The configuration the session was created with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether an earlier error poisoned the session.
    pub fn is_failed(&self) -> bool {
        self.status == Status::Failed
    }

    /// Whether [`teardown()`](Self::teardown) has run.
    pub fn is_closed(&self) -> bool {
        self.status == Status::Closed
    }

    /// The launched engine's process id, if this session owns one.
    pub fn engine_pid(&self) -> Option<u32> {
        self.engine.as_ref().and_then(EngineProcess::id)
    }

    /// Human-readable listing of agents and their sensors.
    pub fn info(&self) -> String {
        let mut out = String::from("Agents:\n");
        for agent in self.agents.iter() {
            let _ = writeln!(out, "\tName: {}", agent.name());
            let _ = writeln!(out, "\tType: {}", agent.kind());
            out.push_str("\tSensors:\n");
            for sensor in agent.sensors() {
                let _ = writeln!(out, "\t\t{}", sensor.name());
            }
        }
        out
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Release every shared object and stop a launched engine.
    ///
    /// Idempotent. Afterwards every operation returns
    /// [`SessionError::Closed`]. The tick semaphores belong to the engine
    /// and are only unlinked when this session launched it.
    pub fn teardown(&mut self) {
        if self.status == Status::Closed {
            return;
        }
        self.status = Status::Closed;
        self.tick.fail();
        if let Err(e) = self.agents.clear(&mut self.arena) {
            warn!("failed to free agent buffers: {e}");
        }
        self.arena.release_all();

        if let Some(mut engine) = self.engine.take() {
            let naming = self.arena.naming().clone();
            let backend = Arc::clone(self.arena.backend());
            for name in [naming.server_semaphore(), naming.client_semaphore()] {
                if let Err(e) = backend.unlink_semaphore(&name) {
                    warn!("failed to unlink semaphore {name}: {e}");
                }
            }
            if let Err(e) = engine.kill() {
                warn!("failed to stop engine process: {e}");
            }
        }
        info!("session {} torn down", self.config.session_id);
    }

    fn check_live(&self) -> Result<(), SessionError> {
        match self.status {
            Status::Live => Ok(()),
            Status::Failed => Err(SessionError::Failed),
            Status::Closed => Err(SessionError::Closed),
        }
    }

    fn poison(&mut self, e: SessionError) -> SessionError {
        if e.is_fatal() {
            error!("session {} failed: {e}", self.config.session_id);
            self.status = Status::Failed;
            self.tick.fail();
        }
        e
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.config.session_id)
            .field("status", &self.status)
            .field("tick", &self.tick)
            .field("agents", &self.agents.len())
            .field("queued_commands", &self.commands.len())
            .field("engine_pid", &self.engine_pid())
            .finish()
    }
}
