//! Session identity and the rendering surface
//!
//! This module defines the identifier that ties scheduled alarms to the quiz
//! session that requested them, and the trait through which the engine pushes
//! state to whatever is rendering it.

use std::{fmt::Display, str::FromStr};

use serde_with::{DeserializeFromStr, SerializeDisplay};
use uuid::Uuid;

use crate::engine::{SyncMessage, UpdateMessage};

/// A unique identifier for a quiz session
///
/// Every fresh session gets a new id. Alarms carry the id of the session that
/// scheduled them, so an alarm outliving a restart is recognized as stale.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    /// Parses a session ID from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Trait for pushing quiz state to a rendering surface
///
/// The engine never renders anything itself. Implementations might write to
/// a terminal, post to a UI thread, or serialize onto a socket.
pub trait Tunnel {
    /// Sends an incremental update
    ///
    /// Update messages describe a single change, such as an answer being
    /// recorded or the cursor moving to another question.
    fn send_message(&self, message: &UpdateMessage);

    /// Sends a full snapshot of the session
    ///
    /// Snapshots let a surface redraw from scratch, typically when it first
    /// attaches or after a restart.
    fn send_state(&self, state: &SyncMessage);
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_round_trip_through_string() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::default());
    }

    #[test]
    fn test_session_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<SessionId>().is_err());
    }
}
