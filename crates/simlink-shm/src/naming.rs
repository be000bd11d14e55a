//! Deterministic OS names for session objects.
//!
//! Client and engine never exchange object names. Both derive them from
//! the same (prefix, session id, buffer name) triple, so this module is
//! the join point of the IPC contract and its formats must not change.

use simlink_core::SessionId;

/// Default object-name prefix understood by the engine binary.
pub const DEFAULT_PREFIX: &str = "HOLODECK";

/// Session buffer raised by the client to request a world reset.
pub const RESET_BUFFER: &str = "RESET";

/// Session buffer raised by the client when `command_buffer` holds a batch.
pub const COMMAND_FLAG_BUFFER: &str = "command_bool";

/// Session buffer holding the encoded command batch.
pub const COMMAND_BUFFER: &str = "command_buffer";

/// Name of the buffer holding a sensor's latest reading.
pub fn sensor_data_name(agent: &str, sensor: &str) -> String {
    format!("{agent}_{sensor}_sensor_data")
}

/// Name of the one-byte enable flag buffer paired with a sensor.
pub fn sensor_flag_name(agent: &str, sensor: &str) -> String {
    format!("{agent}_{sensor}_teleport_flag")
}

/// Derives OS object names for one session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShmNaming {
    prefix: String,
    session: SessionId,
}

impl ShmNaming {
    /// Naming with the default prefix.
    pub fn new(session: SessionId) -> Self {
        Self::with_prefix(DEFAULT_PREFIX, session)
    }

    /// Naming with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>, session: SessionId) -> Self {
        Self {
            prefix: prefix.into(),
            session,
        }
    }

    /// The session id embedded in every name.
    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Shared-memory region backing buffer `buffer`.
    pub fn region(&self, buffer: &str) -> String {
        format!("/{}_MEM{}_{}", self.prefix, self.session, buffer)
    }

    /// Semaphore the client posts to let the engine run one tick.
    pub fn server_semaphore(&self) -> String {
        format!("/{}_SEMAPHORE_SERVER{}", self.prefix, self.session)
    }

    /// Semaphore the engine posts when a tick's data is ready.
    pub fn client_semaphore(&self) -> String {
        format!("/{}_SEMAPHORE_CLIENT{}", self.prefix, self.session)
    }

    /// Semaphore the engine posts once its world has loaded.
    pub fn loading_semaphore(&self) -> String {
        format!("/{}_LOADING_SEM{}", self.prefix, self.session)
    }
}

/// Validate an OS object name against POSIX rules: a leading `/`, no
/// other `/`, no NUL, at most 255 bytes.
pub fn validate_os_name(name: &str) -> bool {
    name.starts_with('/')
        && name.len() > 1
        && name.len() <= 255
        && !name[1..].contains('/')
        && !name.contains('\0')
}
