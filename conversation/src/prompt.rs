//! The prompt under discussion.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque prompt identifier, time-derived and monotonic per participant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PromptId(String);

impl PromptId {
    /// `p-<unix millis>-<sequence>`; the sequence keeps ids unique within
    /// the same millisecond.
    pub fn generate(sequence: u64) -> Self {
        Self(format!("p-{}-{}", Utc::now().timestamp_millis(), sequence))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PromptId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub id: PromptId,
    pub text: String,
    /// User who asked for the prompt.
    pub requester: String,
    pub created_at: DateTime<Utc>,
}

impl Prompt {
    pub fn new(id: PromptId, text: &str, requester: &str) -> Self {
        Self {
            id,
            text: text.to_string(),
            requester: requester.to_string(),
            created_at: Utc::now(),
        }
    }
}
