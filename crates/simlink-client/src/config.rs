//! Session configuration, validation, and error types.
//!
//! [`SessionConfig`] is the builder-input for [`Session::connect`]
//! (crate::Session::connect). [`validate()`](SessionConfig::validate)
//! checks structural invariants before any shared object is touched.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use simlink_core::{encode_batch, SessionId, WireCommand};
use simlink_shm::naming::DEFAULT_PREFIX;

use crate::agent::AgentDefinition;
use crate::scenario::Scenario;

/// Default size of the shared command buffer, in bytes.
pub const DEFAULT_COMMAND_BUFFER_BYTES: usize = 1 << 20;

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`SessionConfig::validate()`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The command buffer cannot hold even an empty batch.
    CommandBufferTooSmall {
        /// The configured size.
        configured: usize,
        /// The smallest usable size.
        minimum: usize,
    },
    /// `tick_timeout` is `Some(0)`.
    ZeroTickTimeout,
    /// `load_timeout` is zero.
    ZeroLoadTimeout,
    /// The naming prefix is empty or contains characters that are not
    /// valid in an OS object name.
    InvalidPrefix {
        /// The rejected prefix.
        prefix: String,
    },
    /// The session id contains characters that are not valid in an OS
    /// object name.
    InvalidSessionId {
        /// The rejected id.
        session: String,
    },
    /// Two initial agents share a name.
    DuplicateInitialAgent {
        /// The duplicated name.
        name: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CommandBufferTooSmall {
                configured,
                minimum,
            } => write!(
                f,
                "command_buffer_bytes {configured} is below minimum of {minimum}"
            ),
            Self::ZeroTickTimeout => write!(f, "tick_timeout must be non-zero (or None)"),
            Self::ZeroLoadTimeout => write!(f, "load_timeout must be non-zero"),
            Self::InvalidPrefix { prefix } => write!(f, "invalid naming prefix '{prefix}'"),
            Self::InvalidSessionId { session } => write!(f, "invalid session id '{session}'"),
            Self::DuplicateInitialAgent { name } => {
                write!(f, "initial agent '{name}' is defined twice")
            }
        }
    }
}

impl Error for ConfigError {}

// ── SessionConfig ──────────────────────────────────────────────────

/// Everything needed to connect a [`Session`](crate::Session) to an engine.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Identifies this session's shared objects. Two sessions on one host
    /// must use different ids. Default: a random v4 UUID.
    pub session_id: SessionId,
    /// Leading component of every OS object name. Default: `HOLODECK`.
    pub prefix: String,
    /// Size of the shared command buffer. Default: 1 MiB.
    pub command_buffer_bytes: usize,
    /// How long a tick may take before the engine is declared
    /// unresponsive. `None` blocks forever. Default: 60 s.
    pub tick_timeout: Option<Duration>,
    /// How long a launched engine may take to load. Default: 10 s.
    pub load_timeout: Duration,
    /// Ticks run after each reset so the level can settle. Default: 2.
    pub pre_start_steps: u32,
    /// Ticks run between raising the reset flag and rebuilding agents.
    /// At least one always runs. Default: 3.
    pub reset_settle_ticks: u32,
    /// Whether [`tick`](crate::Session::tick) copies every sensor into
    /// the returned snapshot. When `false` the snapshot is empty and
    /// readings are taken zero-copy through
    /// [`sensor_bytes`](crate::Session::sensor_bytes). Default: true.
    pub copy_state: bool,
    /// Agents spawned on every reset, before the scenario's agents.
    pub agents: Vec<AgentDefinition>,
    /// Scenario whose agents are spawned on every reset.
    pub scenario: Option<Scenario>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: SessionId::random(),
            prefix: DEFAULT_PREFIX.to_string(),
            command_buffer_bytes: DEFAULT_COMMAND_BUFFER_BYTES,
            tick_timeout: Some(Duration::from_secs(60)),
            load_timeout: Duration::from_secs(10),
            pre_start_steps: 2,
            reset_settle_ticks: 3,
            copy_state: true,
            agents: Vec::new(),
            scenario: None,
        }
    }
}

impl SessionConfig {
    /// A default configuration for the given session id.
    pub fn for_session(session_id: SessionId) -> Self {
        Self {
            session_id,
            ..Self::default()
        }
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let minimum = min_command_buffer_bytes();
        if self.command_buffer_bytes < minimum {
            return Err(ConfigError::CommandBufferTooSmall {
                configured: self.command_buffer_bytes,
                minimum,
            });
        }
        if self.tick_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroTickTimeout);
        }
        if self.load_timeout.is_zero() {
            return Err(ConfigError::ZeroLoadTimeout);
        }
        if self.prefix.is_empty() || !self.prefix.chars().all(is_name_char) {
            return Err(ConfigError::InvalidPrefix {
                prefix: self.prefix.clone(),
            });
        }
        if !self.session_id.as_str().chars().all(is_name_char) {
            return Err(ConfigError::InvalidSessionId {
                session: self.session_id.as_str().to_string(),
            });
        }
        for (i, agent) in self.agents.iter().enumerate() {
            if self.agents[..i].iter().any(|a| a.name == agent.name) {
                return Err(ConfigError::DuplicateInitialAgent {
                    name: agent.name.clone(),
                });
            }
        }
        Ok(())
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Size of an encoded empty batch: the floor for `command_buffer_bytes`.
pub fn min_command_buffer_bytes() -> usize {
    encode_batch(std::iter::empty::<&WireCommand>()).len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use simlink_core::AgentKind;

    #[test]
    fn default_config_is_valid() {
        let cfg = SessionConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.command_buffer_bytes, 1_048_576);
        assert_eq!(cfg.tick_timeout, Some(Duration::from_secs(60)));
        assert_eq!(cfg.pre_start_steps, 2);
        assert_eq!(cfg.reset_settle_ticks, 3);
        assert!(cfg.copy_state);
    }

    #[test]
    fn tiny_command_buffer_rejected() {
        let cfg = SessionConfig {
            command_buffer_bytes: 4,
            ..SessionConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::CommandBufferTooSmall { configured: 4, .. })
        ));
    }

    #[test]
    fn zero_timeouts_rejected() {
        let cfg = SessionConfig {
            tick_timeout: Some(Duration::ZERO),
            ..SessionConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroTickTimeout));

        let cfg = SessionConfig {
            load_timeout: Duration::ZERO,
            ..SessionConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroLoadTimeout));
    }

    #[test]
    fn no_timeout_is_allowed() {
        let cfg = SessionConfig {
            tick_timeout: None,
            ..SessionConfig::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn bad_names_rejected() {
        let cfg = SessionConfig {
            prefix: "A/B".into(),
            ..SessionConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidPrefix { .. })));

        let cfg = SessionConfig::for_session(SessionId::new("has space"));
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidSessionId { .. })
        ));
    }

    #[test]
    fn duplicate_initial_agents_rejected() {
        let cfg = SessionConfig {
            agents: vec![
                AgentDefinition::new("uav0", AgentKind::Uav),
                AgentDefinition::new("uav0", AgentKind::Uav),
            ],
            ..SessionConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::DuplicateInitialAgent {
                name: "uav0".into()
            })
        );
    }

    #[test]
    fn empty_batch_fits_minimum() {
        assert_eq!(min_command_buffer_bytes(), br#"{"commands": []}"#.len() + 1);
    }
}
