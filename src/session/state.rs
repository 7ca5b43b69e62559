//! Session state machine
//!
//! Tracks a session from the control stream opening to its closure.
//! Transitions are plain functions from one state to the next; the drivers
//! publish each new state on a `watch` channel.
//!
//! ```text
//! Connecting ──announce──▶ Announcing ──ANNOUNCE_OK──▶ Active
//!     │                        │                         │
//!     └────────────────────────┴──────── closed ─────────┴──▶ Closed
//! ```
//!
//! A subscriber goes straight from `Connecting` to `Active` when it accepts
//! the announcement. `Closed` is terminal.

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Control stream open, nothing announced yet
    Connecting,
    /// Namespace announced, waiting for the peer's answer
    Announcing,
    /// Namespace accepted; subscriptions may flow
    Active,
    /// Control stream gone
    Closed,
}

/// Complete session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Current phase
    pub phase: SessionPhase,

    /// The namespace of this session's announcement
    pub namespace: Option<String>,

    /// Why the session closed
    pub close_reason: Option<String>,
}

impl SessionState {
    /// Create a new session state
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Connecting,
            namespace: None,
            close_reason: None,
        }
    }

    /// Publisher sent ANNOUNCE
    pub fn announcing(&self, namespace: &str) -> Self {
        match self.phase {
            SessionPhase::Connecting => Self {
                phase: SessionPhase::Announcing,
                namespace: Some(namespace.to_string()),
                close_reason: None,
            },
            _ => self.clone(),
        }
    }

    /// Announcement accepted (publisher got ANNOUNCE_OK, or subscriber
    /// accepted an ANNOUNCE)
    pub fn active(&self, namespace: &str) -> Self {
        match self.phase {
            SessionPhase::Connecting | SessionPhase::Announcing => Self {
                phase: SessionPhase::Active,
                namespace: Some(namespace.to_string()),
                close_reason: None,
            },
            _ => self.clone(),
        }
    }

    /// Session ended
    pub fn closed(&self, reason: impl Into<String>) -> Self {
        match self.phase {
            SessionPhase::Closed => self.clone(),
            _ => Self {
                phase: SessionPhase::Closed,
                namespace: self.namespace.clone(),
                close_reason: Some(reason.into()),
            },
        }
    }

    /// Check if the session accepts subscriptions
    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    /// Check if the session is over
    pub fn is_closed(&self) -> bool {
        self.phase == SessionPhase::Closed
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
