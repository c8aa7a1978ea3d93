//! Conversation phases and legal transition guards.
//!
//! ```text
//! IDLE → RESP → DISC → VOTE → PICK → IDLE
//!          │             ▲
//!          └─────────────┘ (discussion skipped)
//!
//! any → IDLE   (selection finalized, round abandoned, respondents announced)
//! any → WAIT   (sitting the next round out)
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Phase of a conversation from one participant's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConversationState {
    /// No active prompt.
    Idle,
    /// Gathering responses to the prompt.
    Resp,
    /// Discussing the proposed responses.
    Disc,
    /// Voting on the proposed responses.
    Vote,
    /// The proctor is selecting a response.
    Pick,
    /// Not participating until the next respondent announcement.
    Wait,
}

impl ConversationState {
    pub const ALL: [ConversationState; 6] = [
        Self::Idle,
        Self::Resp,
        Self::Disc,
        Self::Vote,
        Self::Pick,
        Self::Wait,
    ];

    /// Whether a prompt round is in progress.
    pub fn in_round(self) -> bool {
        matches!(self, Self::Resp | Self::Disc | Self::Vote | Self::Pick)
    }

    /// Whether moving from `self` to `to` is a legal edge.
    pub fn can_transition(self, to: ConversationState) -> bool {
        use ConversationState::*;

        // Reset and sit-out edges are reachable from everywhere.
        if matches!(to, Idle | Wait) {
            return true;
        }

        matches!(
            (self, to),
            (Idle, Resp) | (Resp, Disc) | (Resp, Vote) | (Disc, Vote) | (Vote, Pick)
        )
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Resp => write!(f, "RESP"),
            Self::Disc => write!(f, "DISC"),
            Self::Vote => write!(f, "VOTE"),
            Self::Pick => write!(f, "PICK"),
            Self::Wait => write!(f, "WAIT"),
        }
    }
}

/// A single recorded phase change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: ConversationState,
    pub to: ConversationState,
    pub at: DateTime<Utc>,
    pub reason: String,
}

/// Returned when an illegal transition is attempted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal phase transition {from} → {to}")]
pub struct IllegalTransition {
    pub from: ConversationState,
    pub to: ConversationState,
}

/// Maximum transitions kept in the audit log.
const TRANSITION_LOG_CAPACITY: usize = 512;

/// Current phase plus a bounded log of how it got there.
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    current: ConversationState,
    transitions: Vec<PhaseTransition>,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            current: ConversationState::Idle,
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> ConversationState {
        self.current
    }

    pub fn is(&self, state: ConversationState) -> bool {
        self.current == state
    }

    /// Move to `to` if the edge is legal, recording the reason.
    pub fn advance(&mut self, to: ConversationState, reason: &str) -> Result<(), IllegalTransition> {
        if !self.current.can_transition(to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }

        if self.transitions.len() == TRANSITION_LOG_CAPACITY {
            self.transitions.remove(0);
        }
        self.transitions.push(PhaseTransition {
            from: self.current,
            to,
            at: Utc::now(),
            reason: reason.to_string(),
        });
        self.current = to;
        Ok(())
    }

    /// Unconditionally return to IDLE.
    pub fn reset(&mut self, reason: &str) {
        // IDLE is reachable from every phase.
        let _ = self.advance(ConversationState::Idle, reason);
    }

    pub fn transitions(&self) -> &[PhaseTransition] {
        &self.transitions
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}
