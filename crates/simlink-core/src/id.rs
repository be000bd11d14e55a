//! Strongly-typed identifiers and the [`Shape`] type alias.

use smallvec::SmallVec;
use std::fmt;

/// Monotonically increasing tick counter.
///
/// Incremented each time the external engine completes one step and
/// hands fresh sensor data back to the client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickId(pub u64);

impl TickId {
    /// The tick that follows this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for TickId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TickId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Identifies one client/engine session.
///
/// Every OS-level name (shared-memory regions, semaphores) embeds the
/// session id, so two sessions on the same host never collide and both
/// processes derive identical names without a rendezvous handshake.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a caller-chosen session id.
    ///
    /// The empty string is a valid id: it is what a single engine
    /// instance launched without an explicit id listens on.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random (v4 UUID) session id.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(v: &str) -> Self {
        Self(v.to_string())
    }
}

/// Dimensions of a shared buffer, outermost first.
///
/// Uses `SmallVec<[usize; 4]>` to avoid heap allocation for the ranks
/// every built-in sensor uses (1D vectors, 2D matrices, HxWxC images).
pub type Shape = SmallVec<[usize; 4]>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_next_increments() {
        assert_eq!(TickId(4).next(), TickId(5));
    }

    #[test]
    fn random_session_ids_differ() {
        assert_ne!(SessionId::random(), SessionId::random());
    }

    #[test]
    fn session_id_displays_raw() {
        let id = SessionId::new("abc-123");
        assert_eq!(id.to_string(), "abc-123");
        assert_eq!(id.as_str(), "abc-123");
    }
}
