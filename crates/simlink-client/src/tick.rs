//! The tick handshake with the engine.
//!
//! Two named semaphores implement a strict alternation: the client posts
//! the *server* semaphore to start a step, the engine posts the *client*
//! semaphore when every sensor buffer has been written.
//!
//! ```text
//!            begin()                     complete()
//!   Ready ───────────► WaitingForEngine ───────────► DataAvailable
//!     ▲                                                   │
//!     └──────────────────── mark_read() ──────────────────┘
//! ```
//!
//! Sensor buffers may only be read in `DataAvailable` or `Ready`; while
//! the engine is stepping they are being rewritten. A timeout or signal
//! failure moves the protocol to the terminal `Failed` phase.

use std::fmt;
use std::time::{Duration, Instant};

use log::{debug, error};
use simlink_core::TickId;
use simlink_shm::Semaphore;

use crate::error::SessionError;

/// Phase of the tick handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickPhase {
    /// Between ticks with no unread data; the client may queue commands.
    Ready,
    /// The engine is stepping. Sensor buffers must not be read.
    WaitingForEngine,
    /// The engine finished a step; fresh data has not been read yet.
    DataAvailable,
    /// The engine stopped responding or signalling failed.
    Failed,
}

impl fmt::Display for TickPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::WaitingForEngine => write!(f, "waiting for engine"),
            Self::DataAvailable => write!(f, "data available"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Client side of the tick handshake.
pub struct TickProtocol {
    server: Box<dyn Semaphore>,
    client: Box<dyn Semaphore>,
    timeout: Option<Duration>,
    phase: TickPhase,
    current_tick: TickId,
    started: Option<Instant>,
}

impl TickProtocol {
    /// Wrap the two semaphores. The protocol starts in
    /// [`TickPhase::WaitingForEngine`]: the engine signals once when it
    /// has finished loading, see [`await_engine`](Self::await_engine).
    pub fn new(
        server: Box<dyn Semaphore>,
        client: Box<dyn Semaphore>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            server,
            client,
            timeout,
            phase: TickPhase::WaitingForEngine,
            current_tick: TickId(0),
            started: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> TickPhase {
        self.phase
    }

    /// Number of completed ticks.
    pub fn current_tick(&self) -> TickId {
        self.current_tick
    }

    /// Wait for the engine's initial readiness signal.
    pub fn await_engine(&mut self) -> Result<Duration, SessionError> {
        self.expect(TickPhase::WaitingForEngine, "await the engine")?;
        let waited = self.wait_client()?;
        self.phase = TickPhase::Ready;
        Ok(waited)
    }

    /// Signal the engine to run one step.
    ///
    /// Allowed from `Ready` and from `DataAvailable` (skipping the read).
    pub fn begin(&mut self) -> Result<(), SessionError> {
        match self.phase {
            TickPhase::Ready | TickPhase::DataAvailable => {}
            TickPhase::Failed => return Err(SessionError::Failed),
            phase => {
                return Err(SessionError::WrongPhase {
                    operation: "begin a tick",
                    phase,
                })
            }
        }
        if let Err(e) = self.server.post() {
            self.phase = TickPhase::Failed;
            error!("failed to signal engine: {e}");
            return Err(e.into());
        }
        self.started = Some(Instant::now());
        self.phase = TickPhase::WaitingForEngine;
        Ok(())
    }

    /// Block until the engine finishes the step started by
    /// [`begin`](Self::begin). Returns how long the wait took.
    ///
    /// # Errors
    ///
    /// [`SessionError::EngineUnresponsive`] if the configured timeout
    /// expires; the protocol is then [`TickPhase::Failed`].
    pub fn complete(&mut self) -> Result<Duration, SessionError> {
        self.expect(TickPhase::WaitingForEngine, "complete a tick")?;
        if self.started.is_none() {
            return Err(SessionError::WrongPhase {
                operation: "complete a tick before the engine is ready",
                phase: self.phase,
            });
        }
        let waited = self.wait_client()?;
        self.started = None;
        self.current_tick = self.current_tick.next();
        self.phase = TickPhase::DataAvailable;
        debug!("tick {} complete after {waited:?}", self.current_tick.0);
        Ok(waited)
    }

    /// Record that the fresh data has been read.
    pub fn mark_read(&mut self) {
        if self.phase == TickPhase::DataAvailable {
            self.phase = TickPhase::Ready;
        }
    }

    /// Fail unless sensor buffers are safe to read.
    pub fn ensure_readable(&self) -> Result<(), SessionError> {
        match self.phase {
            TickPhase::Ready | TickPhase::DataAvailable => Ok(()),
            TickPhase::Failed => Err(SessionError::Failed),
            TickPhase::WaitingForEngine => Err(SessionError::WrongPhase {
                operation: "read sensors",
                phase: TickPhase::WaitingForEngine,
            }),
        }
    }

    /// Move to [`TickPhase::Failed`].
    pub fn fail(&mut self) {
        self.phase = TickPhase::Failed;
    }

    fn expect(&self, want: TickPhase, operation: &'static str) -> Result<(), SessionError> {
        match self.phase {
            p if p == want => Ok(()),
            TickPhase::Failed => Err(SessionError::Failed),
            phase => Err(SessionError::WrongPhase { operation, phase }),
        }
    }

    fn wait_client(&mut self) -> Result<Duration, SessionError> {
        let start = Instant::now();
        match self.client.wait(self.timeout) {
            Ok(true) => Ok(start.elapsed()),
            Ok(false) => {
                self.phase = TickPhase::Failed;
                let waited = start.elapsed();
                error!("engine unresponsive after {waited:?}");
                Err(SessionError::EngineUnresponsive { waited })
            }
            Err(e) => {
                self.phase = TickPhase::Failed;
                error!("failed waiting for engine: {e}");
                Err(e.into())
            }
        }
    }
}

impl fmt::Debug for TickProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickProtocol")
            .field("phase", &self.phase)
            .field("current_tick", &self.current_tick)
            .field("timeout", &self.timeout)
            .finish()
    }
}
