//! A thread-hosted stand-in for the engine binary.
//!
//! [`MockEngine`] creates the session's tick semaphores, signals that it
//! has loaded, and then answers every tick the way the engine does:
//!
//! 1. map the session buffers once the client has allocated them,
//! 2. honour a raised reset flag by forgetting every sensor,
//! 3. decode and apply a pending command batch, then lower the flag,
//!    including the `CustomCommand` world settings (hour, day cycle, fog
//!    and weather),
//! 4. fill every enabled sensor buffer according to its [`FillMode`],
//! 5. post the client semaphore.
//!
//! Every decoded batch is recorded for assertions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use indexmap::IndexMap;
use log::{debug, warn};
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use simlink_core::{ElementType, Vec3};
use simlink_sensor::SensorKind;
use simlink_shm::{
    sensor_data_name, sensor_flag_name, IpcBackend, Mapping, Semaphore, ShmError, ShmNaming,
    COMMAND_BUFFER, COMMAND_FLAG_BUFFER, RESET_BUFFER,
};

const POLL: Duration = Duration::from_millis(10);

/// How the mock fills sensor buffers each tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FillMode {
    /// Every byte zero.
    Zero,
    /// Every element set to this value, converted to the element type.
    Constant(f32),
    /// Seeded random bytes.
    Garbage(u64),
}

/// One decoded command as the engine saw it.
#[derive(Clone, Debug, PartialEq)]
pub struct MockCommand {
    pub opcode: String,
    pub params: Vec<serde_json::Value>,
}

impl MockCommand {
    /// String parameter at `index`.
    pub fn text(&self, index: usize) -> Option<&str> {
        self.params.get(index).and_then(serde_json::Value::as_str)
    }

    /// The engine-side name: the first parameter of a `CustomCommand`,
    /// the opcode otherwise.
    pub fn name(&self) -> &str {
        if self.opcode == "CustomCommand" {
            self.text(0).unwrap_or_default()
        } else {
            &self.opcode
        }
    }

    /// Numeric parameter at `index`.
    pub fn number(&self, index: usize) -> Option<f64> {
        self.params.get(index).and_then(serde_json::Value::as_f64)
    }

    fn vec3(&self, start: usize) -> Option<Vec3> {
        Some([
            self.number(start)? as f32,
            self.number(start + 1)? as f32,
            self.number(start + 2)? as f32,
        ])
    }
}

/// World settings the mock has applied since its last reset.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorldSettings {
    pub hour: Option<u32>,
    /// Day length while a cycle runs; `None` once stopped or never started.
    pub day_cycle: Option<u32>,
    pub fog_density: Option<f32>,
    pub weather: Option<String>,
}

impl WorldSettings {
    fn apply(&mut self, command: &MockCommand) {
        match command.name() {
            "SetHour" => self.hour = command.number(1).map(|h| h as u32),
            "SetDayCycle" => {
                self.day_cycle = match (command.number(1), command.number(2)) {
                    (Some(on), Some(length)) if on != 0.0 && length >= 0.0 => Some(length as u32),
                    _ => None,
                }
            }
            "SetFogDensity" => self.fog_density = command.number(1).map(|d| d as f32),
            "SetWeather" => self.weather = command.text(1).map(str::to_string),
            _ => {}
        }
    }
}

#[derive(Deserialize)]
struct RawBatch {
    commands: Vec<RawCommand>,
}

#[derive(Deserialize)]
struct RawCommand {
    #[serde(rename = "type")]
    opcode: String,
    params: Vec<RawParam>,
}

#[derive(Deserialize)]
struct RawParam {
    value: serde_json::Value,
}

fn parse_batch(text: &str) -> Result<Vec<MockCommand>, serde_json::Error> {
    let batch: RawBatch = serde_json::from_str(text)?;
    Ok(batch
        .commands
        .into_iter()
        .map(|c| MockCommand {
            opcode: c.opcode,
            params: c.params.into_iter().map(|p| p.value).collect(),
        })
        .collect())
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ── Shared state ───────────────────────────────────────────────────

#[derive(Default)]
struct Shared {
    shutdown: AtomicBool,
    responsive: AtomicBool,
    ticks: AtomicU64,
    resets: AtomicU64,
    batches: Mutex<Vec<String>>,
    commands: Mutex<Vec<MockCommand>>,
    task_signal: Mutex<Option<(f32, bool)>>,
    settings: Mutex<WorldSettings>,
}

// ── Engine-side state ──────────────────────────────────────────────

struct MockSensor {
    agent: String,
    kind: Option<SensorKind>,
    data: Mapping,
    flag: Mapping,
}

struct World {
    backend: Arc<dyn IpcBackend>,
    naming: ShmNaming,
    fill: FillMode,
    rng: ChaCha8Rng,
    reset: Option<Mapping>,
    command_flag: Option<Mapping>,
    command_buffer: Option<Mapping>,
    sensors: IndexMap<(String, String), MockSensor>,
    locations: HashMap<String, Vec3>,
    settings: WorldSettings,
}

impl World {
    fn open(&self, buffer: &str) -> Result<Mapping, ShmError> {
        self.backend.open_region(&self.naming.region(buffer))
    }

    fn map_session_buffers(&mut self) {
        if self.reset.is_none() {
            self.reset = self.open(RESET_BUFFER).ok();
        }
        if self.command_flag.is_none() {
            self.command_flag = self.open(COMMAND_FLAG_BUFFER).ok();
        }
        if self.command_buffer.is_none() {
            self.command_buffer = self.open(COMMAND_BUFFER).ok();
        }
    }

    fn step(&mut self, shared: &Shared) {
        self.map_session_buffers();

        if let Some(reset) = &mut self.reset {
            if reset.as_slice().first().is_some_and(|b| *b != 0) {
                reset.as_mut_slice()[0] = 0;
                self.sensors.clear();
                self.locations.clear();
                self.settings = WorldSettings::default();
                shared.resets.fetch_add(1, Ordering::AcqRel);
                debug!("mock engine reset");
            }
        }

        if let Some(text) = self.take_batch() {
            match parse_batch(&text) {
                Ok(commands) => {
                    for command in &commands {
                        self.apply(command);
                    }
                    lock(&shared.commands).extend(commands);
                }
                Err(e) => warn!("mock engine received malformed batch: {e}"),
            }
            lock(&shared.batches).push(text);
        }

        lock(&shared.settings).clone_from(&self.settings);
        let task = *lock(&shared.task_signal);
        self.fill_sensors(task);
    }

    fn take_batch(&mut self) -> Option<String> {
        let flag = self.command_flag.as_mut()?;
        if flag.as_slice().first().is_none_or(|b| *b == 0) {
            return None;
        }
        flag.as_mut_slice()[0] = 0;
        let buffer = self.command_buffer.as_ref()?.as_slice();
        let end = buffer.iter().position(|b| *b == 0).unwrap_or(buffer.len());
        Some(String::from_utf8_lossy(&buffer[..end]).into_owned())
    }

    fn apply(&mut self, command: &MockCommand) {
        match command.opcode.as_str() {
            "SpawnAgent" => {
                if let (Some(agent), Some(location)) = (command.text(6), command.vec3(0)) {
                    self.locations.insert(agent.to_string(), location);
                }
            }
            "AddSensor" => {
                let (Some(agent), Some(sensor), Some(sensor_type)) =
                    (command.text(0), command.text(1), command.text(2))
                else {
                    return;
                };
                let data = self.open(&sensor_data_name(agent, sensor));
                let flag = self.open(&sensor_flag_name(agent, sensor));
                match (data, flag) {
                    (Ok(data), Ok(flag)) => {
                        self.sensors.insert(
                            (agent.to_string(), sensor.to_string()),
                            MockSensor {
                                agent: agent.to_string(),
                                kind: SensorKind::from_type_name(sensor_type),
                                data,
                                flag,
                            },
                        );
                    }
                    (Err(e), _) | (_, Err(e)) => {
                        warn!("mock engine cannot map sensor {agent}/{sensor}: {e}")
                    }
                }
            }
            "Teleport" => {
                let mask = command.number(1).unwrap_or(0.0) as u8;
                if let (Some(agent), Some(location)) = (command.text(0), command.vec3(2)) {
                    if mask & 1 != 0 {
                        self.locations.insert(agent.to_string(), location);
                    }
                }
            }
            "SetAgentState" => {
                if let (Some(agent), Some(location)) = (command.text(0), command.vec3(1)) {
                    self.locations.insert(agent.to_string(), location);
                }
            }
            "CustomCommand" => self.settings.apply(command),
            _ => {}
        }
    }

    fn fill_sensors(&mut self, task: Option<(f32, bool)>) {
        for sensor in self.sensors.values_mut() {
            if sensor.flag.as_slice().first().is_some_and(|b| *b == 0) {
                continue;
            }
            let element = sensor.kind.map_or(ElementType::F32, SensorKind::element);
            let bytes = sensor.data.as_mut_slice();
            match self.fill {
                FillMode::Zero => bytes.fill(0),
                FillMode::Constant(v) => fill_constant(bytes, element, v),
                FillMode::Garbage(_) => self.rng.fill_bytes(bytes),
            }
            match sensor.kind {
                Some(SensorKind::LocationSensor) => {
                    if let Some(location) = self.locations.get(&sensor.agent) {
                        write_f32s(bytes, location);
                    }
                }
                Some(kind) if kind.is_task() => {
                    if let Some((reward, terminal)) = task {
                        write_f32s(bytes, &[reward, if terminal { 1.0 } else { 0.0 }]);
                    }
                }
                _ => {}
            }
        }
    }
}

fn fill_constant(bytes: &mut [u8], element: ElementType, value: f32) {
    match element {
        ElementType::F32 => {
            for chunk in bytes.chunks_exact_mut(4) {
                chunk.copy_from_slice(&value.to_le_bytes());
            }
        }
        ElementType::Bool => bytes.fill(u8::from(value != 0.0)),
        ElementType::U8 => bytes.fill(value as u8),
        ElementType::I8 => bytes.fill(value as i8 as u8),
    }
}

fn write_f32s(bytes: &mut [u8], values: &[f32]) {
    for (chunk, v) in bytes.chunks_exact_mut(4).zip(values) {
        chunk.copy_from_slice(&v.to_le_bytes());
    }
}

fn run(mut world: World, server: Box<dyn Semaphore>, client: Box<dyn Semaphore>, shared: &Shared) {
    while !shared.responsive.load(Ordering::Acquire) {
        if shared.shutdown.load(Ordering::Acquire) {
            return;
        }
        std::thread::sleep(POLL);
    }
    if client.post().is_err() {
        return;
    }
    while !shared.shutdown.load(Ordering::Acquire) {
        match server.wait(Some(POLL)) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                warn!("mock engine lost its server semaphore: {e}");
                return;
            }
        }
        if !shared.responsive.load(Ordering::Acquire) {
            continue;
        }
        world.step(shared);
        shared.ticks.fetch_add(1, Ordering::AcqRel);
        if client.post().is_err() {
            return;
        }
    }
}

// ── MockEngine ─────────────────────────────────────────────────────

/// Engine stand-in running on its own thread.
///
/// Dropping it stops the thread and unlinks the semaphores it created.
pub struct MockEngine {
    shared: Arc<Shared>,
    backend: Arc<dyn IpcBackend>,
    naming: ShmNaming,
    thread: Option<JoinHandle<()>>,
}

impl MockEngine {
    /// Create the tick semaphores and start answering ticks.
    pub fn start(
        backend: Arc<dyn IpcBackend>,
        naming: ShmNaming,
        fill: FillMode,
    ) -> Result<Self, ShmError> {
        Self::spawn(backend, naming, fill, true)
    }

    /// Create the tick semaphores but never signal, until
    /// [`set_responsive(true)`](Self::set_responsive).
    pub fn start_silent(backend: Arc<dyn IpcBackend>, naming: ShmNaming) -> Result<Self, ShmError> {
        Self::spawn(backend, naming, FillMode::Zero, false)
    }

    fn spawn(
        backend: Arc<dyn IpcBackend>,
        naming: ShmNaming,
        fill: FillMode,
        responsive: bool,
    ) -> Result<Self, ShmError> {
        let server = backend.create_semaphore(&naming.server_semaphore(), 0)?;
        let client = backend.create_semaphore(&naming.client_semaphore(), 0)?;
        let shared = Arc::new(Shared::default());
        shared.responsive.store(responsive, Ordering::Release);

        let seed = match fill {
            FillMode::Garbage(seed) => seed,
            _ => 0,
        };
        let world = World {
            backend: Arc::clone(&backend),
            naming: naming.clone(),
            fill,
            rng: ChaCha8Rng::seed_from_u64(seed),
            reset: None,
            command_flag: None,
            command_buffer: None,
            sensors: IndexMap::new(),
            locations: HashMap::new(),
            settings: WorldSettings::default(),
        };
        let thread_shared = Arc::clone(&shared);
        let thread = std::thread::Builder::new()
            .name("mock-engine".into())
            .spawn(move || run(world, server, client, &thread_shared))
            .map_err(|e| ShmError::Os {
                op: "spawn",
                name: naming.server_semaphore(),
                source: e,
            })?;

        Ok(Self {
            shared,
            backend,
            naming,
            thread: Some(thread),
        })
    }

    /// Stop or resume answering ticks. A stopped engine swallows the
    /// server signal, so the client's wait times out.
    pub fn set_responsive(&self, responsive: bool) {
        self.shared.responsive.store(responsive, Ordering::Release);
    }

    /// Report `[reward, terminal]` through every task sensor from the
    /// next tick on.
    pub fn set_task_signal(&self, reward: f32, terminal: bool) {
        *lock(&self.shared.task_signal) = Some((reward, terminal));
    }

    /// Ticks answered so far.
    pub fn ticks(&self) -> u64 {
        self.shared.ticks.load(Ordering::Acquire)
    }

    /// Reset flags observed so far.
    pub fn resets(&self) -> u64 {
        self.shared.resets.load(Ordering::Acquire)
    }

    /// Raw payloads of every batch received, in order.
    pub fn batches(&self) -> Vec<String> {
        lock(&self.shared.batches).clone()
    }

    /// Every decoded command, in arrival order.
    pub fn commands(&self) -> Vec<MockCommand> {
        lock(&self.shared.commands).clone()
    }

    /// Decoded commands with the given opcode.
    pub fn commands_named(&self, opcode: &str) -> Vec<MockCommand> {
        lock(&self.shared.commands)
            .iter()
            .filter(|c| c.opcode == opcode)
            .cloned()
            .collect()
    }

    /// Decoded commands with the given engine-side [`name`](MockCommand::name).
    pub fn custom_commands(&self, name: &str) -> Vec<MockCommand> {
        lock(&self.shared.commands)
            .iter()
            .filter(|c| c.opcode == "CustomCommand" && c.name() == name)
            .cloned()
            .collect()
    }

    /// World settings in force after the last tick.
    pub fn world_settings(&self) -> WorldSettings {
        lock(&self.shared.settings).clone()
    }

    /// Stop the engine thread. Idempotent.
    pub fn shutdown(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("mock engine thread panicked");
            }
            for name in [self.naming.server_semaphore(), self.naming.client_semaphore()] {
                if let Err(e) = self.backend.unlink_semaphore(&name) {
                    warn!("mock engine failed to unlink {name}: {e}");
                }
            }
        }
    }
}

impl Drop for MockEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for MockEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockEngine")
            .field("session", self.naming.session())
            .field("ticks", &self.ticks())
            .field("resets", &self.resets())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_batches() {
        let commands = parse_batch(
            "{\"commands\": [{ \"type\": \"Teleport\", \"params\": [{ \"value\": \"uav0\" }, { \"value\": 1 }]}]}",
        )
        .unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].opcode, "Teleport");
        assert_eq!(commands[0].text(0), Some("uav0"));
        assert_eq!(commands[0].number(1), Some(1.0));
        assert_eq!(commands[0].text(1), None);
    }

    #[test]
    fn custom_commands_update_world_settings() {
        let commands = parse_batch(
            "{\"commands\": [\
             { \"type\": \"CustomCommand\", \"params\": [{ \"value\": \"SetHour\" }, { \"value\": 6 }]},\
             { \"type\": \"CustomCommand\", \"params\": [{ \"value\": \"SetDayCycle\" }, { \"value\": 1 }, { \"value\": 10 }]},\
             { \"type\": \"CustomCommand\", \"params\": [{ \"value\": \"SetWeather\" }, { \"value\": \"rain\" }]},\
             { \"type\": \"CustomCommand\", \"params\": [{ \"value\": \"SetFogDensity\" }, { \"value\": 0.5 }]}]}",
        )
        .unwrap();
        assert_eq!(commands[1].name(), "SetDayCycle");
        let mut settings = WorldSettings::default();
        for command in &commands {
            settings.apply(command);
        }
        assert_eq!(
            settings,
            WorldSettings {
                hour: Some(6),
                day_cycle: Some(10),
                fog_density: Some(0.5),
                weather: Some("rain".into()),
            }
        );

        let stop = parse_batch(
            "{\"commands\": [{ \"type\": \"CustomCommand\", \"params\": [{ \"value\": \"SetDayCycle\" }, { \"value\": 0 }, { \"value\": -1 }]}]}",
        )
        .unwrap();
        settings.apply(&stop[0]);
        assert_eq!(settings.day_cycle, None);
    }

    #[test]
    fn name_falls_back_to_opcode() {
        let command = MockCommand {
            opcode: "Teleport".into(),
            params: vec![],
        };
        assert_eq!(command.name(), "Teleport");
    }

    #[test]
    fn constant_fill_respects_element_type() {
        let mut f = [0u8; 8];
        fill_constant(&mut f, ElementType::F32, 2.5);
        assert_eq!(f32::from_le_bytes([f[4], f[5], f[6], f[7]]), 2.5);

        let mut b = [7u8; 3];
        fill_constant(&mut b, ElementType::Bool, 0.0);
        assert_eq!(b, [0, 0, 0]);
    }
}
