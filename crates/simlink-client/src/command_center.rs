//! The per-tick command dispatch queue.
//!
//! [`CommandCenter`] buffers commands between submission and the next
//! tick. At the start of every tick the whole queue is encoded into one
//! payload and handed to a [`CommandSink`] in a single call.
//!
//! # Ordering
//!
//! Commands are transmitted in insertion order. Commands sent through a
//! [`CommandSender`] from other threads join the queue, in arrival order,
//! at the moment a flush starts; anything sent after that point waits for
//! the next flush.
//!
//! # Atomicity
//!
//! A flush either transmits every queued command or none of them. The
//! payload is encoded and size-checked before the sink sees a byte, and
//! the queue is only cleared after the sink reports success.

use std::collections::VecDeque;

use crossbeam_channel::{Receiver, Sender};
use log::debug;
use simlink_core::{encode_batch, Command, WireCommand};
use simlink_shm::{BufferArena, BufferHandle};

use crate::error::SessionError;

// ── DispatchState ───────────────────────────────────────────────

/// Where the queue is in its per-tick cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchState {
    /// Nothing queued.
    Idle,
    /// At least one command is waiting for the next flush.
    Accumulating,
    /// A flush is in progress.
    Flushing,
}

// ── CommandSink ─────────────────────────────────────────────────

/// Destination of a flushed batch.
pub trait CommandSink {
    /// Largest payload, in bytes, the sink accepts.
    fn capacity(&self) -> usize;

    /// Deliver one complete payload. Called at most once per flush.
    fn transmit(&mut self, payload: &[u8]) -> Result<(), SessionError>;
}

/// Writes batches into the session's shared command buffer and raises
/// the command flag so the engine picks them up on its next step.
pub struct ShmCommandSink<'a> {
    arena: &'a mut BufferArena,
    buffer: BufferHandle,
    flag: BufferHandle,
}

impl<'a> ShmCommandSink<'a> {
    /// Bind the sink to the command buffer and its flag.
    pub fn new(arena: &'a mut BufferArena, buffer: BufferHandle, flag: BufferHandle) -> Self {
        Self {
            arena,
            buffer,
            flag,
        }
    }
}

impl CommandSink for ShmCommandSink<'_> {
    fn capacity(&self) -> usize {
        self.arena
            .spec(self.buffer)
            .map(|spec| spec.byte_len())
            .unwrap_or(0)
    }

    fn transmit(&mut self, payload: &[u8]) -> Result<(), SessionError> {
        self.arena.write_bytes_at(self.buffer, 0, payload)?;
        self.arena.write(self.flag, &[true])?;
        Ok(())
    }
}

// ── FlushReport ─────────────────────────────────────────────────

/// What a successful flush transmitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Number of commands transmitted.
    pub commands: usize,
    /// Payload size in bytes, including the terminator.
    pub bytes: usize,
}

// ── CommandSender ───────────────────────────────────────────────

/// A cloneable handle for enqueueing commands from other threads.
#[derive(Clone, Debug)]
pub struct CommandSender {
    tx: Sender<Command>,
}

impl CommandSender {
    /// Queue a command for the next flush.
    ///
    /// Returns the command back if the owning [`CommandCenter`] is gone.
    pub fn send(&self, command: Command) -> Result<(), Command> {
        self.tx.send(command).map_err(|e| e.into_inner())
    }
}

// ── CommandCenter ───────────────────────────────────────────────

/// Ordered, single-consumer queue of pending commands.
///
/// # Examples
///
/// ```
/// use simlink_client::{CommandCenter, CommandSink, SessionError};
/// use simlink_core::Command;
///
/// struct Capture(Vec<u8>);
/// impl CommandSink for Capture {
///     fn capacity(&self) -> usize { 4096 }
///     fn transmit(&mut self, payload: &[u8]) -> Result<(), SessionError> {
///         self.0 = payload.to_vec();
///         Ok(())
///     }
/// }
///
/// let mut center = CommandCenter::new();
/// center.enqueue(Command::agent_action("uav0", vec![0.0; 4]).unwrap());
/// let mut sink = Capture(Vec::new());
/// let report = center.flush(&mut sink).unwrap();
/// assert_eq!(report.commands, 1);
/// assert!(center.is_empty());
/// assert_eq!(sink.0.last(), Some(&0));
/// ```
pub struct CommandCenter {
    queue: VecDeque<Command>,
    state: DispatchState,
    tx: Sender<Command>,
    rx: Receiver<Command>,
}

impl CommandCenter {
    /// An empty queue.
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            queue: VecDeque::new(),
            state: DispatchState::Idle,
            tx,
            rx,
        }
    }

    /// Append a command. Never fails; commands are validated when built.
    pub fn enqueue(&mut self, command: Command) {
        self.queue.push_back(command);
        self.state = DispatchState::Accumulating;
    }

    /// A handle other threads can enqueue through.
    pub fn sender(&self) -> CommandSender {
        CommandSender {
            tx: self.tx.clone(),
        }
    }

    /// Current dispatch state.
    pub fn state(&self) -> DispatchState {
        match self.state {
            DispatchState::Flushing => DispatchState::Flushing,
            _ if self.len() > 0 => DispatchState::Accumulating,
            _ => DispatchState::Idle,
        }
    }

    /// Number of pending commands, including ones sent from other threads.
    pub fn len(&self) -> usize {
        self.queue.len() + self.rx.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pending commands in transmission order. Commands still in flight
    /// from a [`CommandSender`] are not included.
    pub fn pending(&self) -> impl Iterator<Item = &Command> {
        self.queue.iter()
    }

    /// Move commands that arrived through senders into the queue.
    ///
    /// Bounded by the channel length at entry, so a producer that keeps
    /// sending cannot extend an in-progress snapshot.
    fn absorb_senders(&mut self) {
        let arrived = self.rx.len();
        for _ in 0..arrived {
            match self.rx.try_recv() {
                Ok(cmd) => self.queue.push_back(cmd),
                Err(_) => break,
            }
        }
    }

    /// Transmit every pending command as one payload, then clear the queue.
    ///
    /// An empty queue transmits nothing. On error the queue is left exactly
    /// as it was and nothing has been written to the sink.
    ///
    /// # Errors
    ///
    /// [`SessionError::CommandOverflow`] if the payload exceeds the sink's
    /// capacity, or whatever the sink reports.
    pub fn flush(&mut self, sink: &mut dyn CommandSink) -> Result<FlushReport, SessionError> {
        self.absorb_senders();
        if self.queue.is_empty() {
            self.state = DispatchState::Idle;
            return Ok(FlushReport::default());
        }
        self.state = DispatchState::Flushing;

        let wire: Vec<WireCommand> = self.queue.iter().map(Command::to_wire).collect();
        let payload = encode_batch(&wire);
        let capacity = sink.capacity();
        if payload.len() > capacity {
            self.state = DispatchState::Accumulating;
            return Err(SessionError::CommandOverflow {
                needed: payload.len(),
                capacity,
            });
        }
        if let Err(e) = sink.transmit(&payload) {
            self.state = DispatchState::Accumulating;
            return Err(e);
        }

        let report = FlushReport {
            commands: self.queue.len(),
            bytes: payload.len(),
        };
        self.queue.clear();
        self.state = DispatchState::Idle;
        debug!(
            "flushed {} commands ({} bytes)",
            report.commands, report.bytes
        );
        Ok(report)
    }

    /// Discard every pending command, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        self.absorb_senders();
        let n = self.queue.len();
        self.queue.clear();
        self.state = DispatchState::Idle;
        n
    }

    /// Discard pending commands aimed at an agent, keeping world-scoped
    /// ones queued in order. Returns how many were dropped.
    pub fn discard_agent_commands(&mut self) -> usize {
        self.absorb_senders();
        let before = self.queue.len();
        self.queue.retain(|command| command.target().is_none());
        self.state = if self.queue.is_empty() {
            DispatchState::Idle
        } else {
            DispatchState::Accumulating
        };
        before - self.queue.len()
    }
}

impl Default for CommandCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CommandCenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandCenter")
            .field("queued", &self.queue.len())
            .field("in_flight", &self.rx.len())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simlink_core::{SessionId, WorldCommand};
    use simlink_shm::{InProcessIpc, ShmNaming};
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingSink {
        capacity: usize,
        payloads: Vec<Vec<u8>>,
        fail: bool,
    }

    impl RecordingSink {
        fn with_capacity(capacity: usize) -> Self {
            Self {
                capacity,
                ..Self::default()
            }
        }

        fn last_json(&self) -> serde_json::Value {
            let payload = self.payloads.last().unwrap();
            let nul = payload.iter().position(|&b| b == 0).unwrap();
            serde_json::from_slice(&payload[..nul]).unwrap()
        }
    }

    impl CommandSink for RecordingSink {
        fn capacity(&self) -> usize {
            self.capacity
        }

        fn transmit(&mut self, payload: &[u8]) -> Result<(), SessionError> {
            if self.fail {
                return Err(SessionError::Failed);
            }
            self.payloads.push(payload.to_vec());
            Ok(())
        }
    }

    fn action(agent: &str) -> Command {
        Command::agent_action(agent, vec![1.0, 2.0]).unwrap()
    }

    fn opcodes(json: &serde_json::Value) -> Vec<String> {
        json["commands"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["type"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn new_queue_is_idle() {
        let center = CommandCenter::new();
        assert!(center.is_empty());
        assert_eq!(center.state(), DispatchState::Idle);
    }

    #[test]
    fn enqueue_accumulates() {
        let mut center = CommandCenter::new();
        center.enqueue(action("a"));
        assert_eq!(center.len(), 1);
        assert_eq!(center.state(), DispatchState::Accumulating);
    }

    #[test]
    fn flush_preserves_insertion_order() {
        let mut center = CommandCenter::new();
        center.enqueue(action("a"));
        center.enqueue(WorldCommand::fog_density(0.5).unwrap().into());
        center.enqueue(Command::teleport("b", Some([1.0, 2.0, 3.0]), None).unwrap());

        let mut sink = RecordingSink::with_capacity(4096);
        let report = center.flush(&mut sink).unwrap();
        assert_eq!(report.commands, 3);
        assert_eq!(report.bytes, sink.payloads[0].len());
        assert_eq!(
            opcodes(&sink.last_json()),
            vec!["AgentAction", "CustomCommand", "Teleport"]
        );
        assert!(center.is_empty());
        assert_eq!(center.state(), DispatchState::Idle);
    }

    #[test]
    fn empty_flush_transmits_nothing() {
        let mut center = CommandCenter::new();
        let mut sink = RecordingSink::with_capacity(4096);
        assert_eq!(center.flush(&mut sink).unwrap(), FlushReport::default());
        assert!(sink.payloads.is_empty());
    }

    #[test]
    fn no_leakage_across_flushes() {
        let mut center = CommandCenter::new();
        let mut sink = RecordingSink::with_capacity(4096);
        center.enqueue(action("first"));
        center.flush(&mut sink).unwrap();
        center.enqueue(action("second"));
        center.flush(&mut sink).unwrap();

        let json = sink.last_json();
        let cmds = json["commands"].as_array().unwrap();
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0]["params"][0]["value"], "second");
    }

    #[test]
    fn overflow_leaves_queue_intact() {
        let mut center = CommandCenter::new();
        center.enqueue(action("a"));
        center.enqueue(action("b"));
        let mut sink = RecordingSink::with_capacity(20);
        let err = center.flush(&mut sink).unwrap_err();
        assert!(matches!(err, SessionError::CommandOverflow { capacity: 20, .. }));
        assert!(sink.payloads.is_empty());
        assert_eq!(center.len(), 2);
        assert_eq!(center.state(), DispatchState::Accumulating);
    }

    #[test]
    fn transmit_failure_leaves_queue_intact() {
        let mut center = CommandCenter::new();
        center.enqueue(action("a"));
        let mut sink = RecordingSink {
            capacity: 4096,
            fail: true,
            ..RecordingSink::default()
        };
        assert!(center.flush(&mut sink).is_err());
        assert_eq!(center.len(), 1);
    }

    #[test]
    fn clear_reports_discarded() {
        let mut center = CommandCenter::new();
        center.enqueue(action("a"));
        center.sender().send(action("b")).unwrap();
        assert_eq!(center.clear(), 2);
        assert!(center.is_empty());
        assert_eq!(center.state(), DispatchState::Idle);
    }

    #[test]
    fn discard_agent_commands_keeps_world_commands() {
        let mut center = CommandCenter::new();
        center.enqueue(action("a"));
        center.enqueue(WorldCommand::fog_density(0.5).unwrap().into());
        center.sender().send(action("b")).unwrap();
        center.sender().send(WorldCommand::day_time(9).into()).unwrap();
        assert_eq!(center.discard_agent_commands(), 2);
        assert_eq!(center.len(), 2);
        assert_eq!(center.state(), DispatchState::Accumulating);

        let mut sink = RecordingSink::with_capacity(4096);
        center.flush(&mut sink).unwrap();
        let json = sink.last_json();
        assert_eq!(opcodes(&json), vec!["CustomCommand", "CustomCommand"]);
        assert_eq!(json["commands"][0]["params"][0]["value"], "SetFogDensity");
        assert_eq!(json["commands"][1]["params"][0]["value"], "SetHour");
    }

    #[test]
    fn discard_agent_commands_on_agent_only_queue_goes_idle() {
        let mut center = CommandCenter::new();
        center.enqueue(action("a"));
        assert_eq!(center.discard_agent_commands(), 1);
        assert_eq!(center.state(), DispatchState::Idle);
    }

    #[test]
    fn sender_commands_join_at_flush() {
        let mut center = CommandCenter::new();
        let sender = center.sender();
        center.enqueue(action("local"));
        let handle = std::thread::spawn(move || {
            sender.send(action("remote")).unwrap();
        });
        handle.join().unwrap();
        assert_eq!(center.len(), 2);

        let mut sink = RecordingSink::with_capacity(4096);
        assert_eq!(center.flush(&mut sink).unwrap().commands, 2);
        let json = sink.last_json();
        assert_eq!(json["commands"][0]["params"][0]["value"], "local");
        assert_eq!(json["commands"][1]["params"][0]["value"], "remote");
    }

    #[test]
    fn sender_fails_after_center_dropped() {
        let center = CommandCenter::new();
        let sender = center.sender();
        drop(center);
        let cmd = action("a");
        assert_eq!(sender.send(cmd.clone()), Err(cmd));
    }

    #[test]
    fn shm_sink_writes_buffer_and_raises_flag() {
        let ipc = InProcessIpc::new();
        let mut arena =
            BufferArena::new(Arc::new(ipc.clone()), ShmNaming::new(SessionId::new("cc")));
        let buffer = arena
            .allocate(
                "command_buffer",
                simlink_core::BufferSpec::new(vec![256], simlink_core::ElementType::I8).unwrap(),
            )
            .unwrap();
        let flag = arena
            .allocate(
                "command_bool",
                simlink_core::BufferSpec::new(vec![1], simlink_core::ElementType::Bool).unwrap(),
            )
            .unwrap();

        let mut center = CommandCenter::new();
        center.enqueue(action("a"));
        let mut sink = ShmCommandSink::new(&mut arena, buffer, flag);
        assert_eq!(sink.capacity(), 256);
        let report = center.flush(&mut sink).unwrap();

        let bytes = arena.bytes(buffer).unwrap();
        assert_eq!(bytes[report.bytes - 1], 0);
        assert!(bytes.starts_with(b"{\"commands\": [{ \"type\": \"AgentAction\""));
        assert_eq!(arena.read::<bool>(flag).unwrap(), vec![true]);
    }
}
