//! Append-only audit logs kept by each participant, plus the roster of
//! known participants used for vote matching.

use serde::{Deserialize, Serialize};

use crate::protocol::normalize_identity;

/// One accepted prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub requester: String,
    pub prompt: String,
}

/// Comparison of accepted prompts against announced rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FairnessReport {
    pub prompts: usize,
    pub rounds_announced: usize,
}

impl FairnessReport {
    pub fn is_balanced(&self) -> bool {
        self.prompts == self.rounds_announced
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationHistory {
    requests: Vec<RequestRecord>,
    participants: Vec<Vec<String>>,
    selections: Vec<String>,
}

impl ConversationHistory {
    /// The first round is implicitly open to everyone, so participant
    /// history starts with one empty entry.
    pub fn new() -> Self {
        Self {
            requests: Vec::new(),
            participants: vec![Vec::new()],
            selections: Vec::new(),
        }
    }

    pub fn record_request(&mut self, requester: &str, prompt: &str) {
        self.requests.push(RequestRecord {
            requester: requester.to_string(),
            prompt: prompt.to_string(),
        });
    }

    pub fn record_participants(&mut self, participants: Vec<String>) {
        self.participants.push(participants);
    }

    pub fn record_selection(&mut self, user: &str) {
        self.selections.push(normalize_identity(user));
    }

    pub fn requests(&self) -> &[RequestRecord] {
        &self.requests
    }

    pub fn participants(&self) -> &[Vec<String>] {
        &self.participants
    }

    pub fn latest_participants(&self) -> Option<&[String]> {
        self.participants.last().map(Vec::as_slice)
    }

    pub fn selections(&self) -> &[String] {
        &self.selections
    }

    pub fn fairness(&self) -> FairnessReport {
        FairnessReport {
            prompts: self.requests.len(),
            rounds_announced: self.participants.len(),
        }
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// Participants seen in the conversation, in first-seen order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
    members: Vec<String>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `user` if not already known. Returns whether it was new.
    pub fn observe(&mut self, user: &str) -> bool {
        let identity = normalize_identity(user);
        if identity.is_empty() || self.members.contains(&identity) {
            return false;
        }
        self.members.push(identity);
        true
    }

    pub fn contains(&self, user: &str) -> bool {
        self.members.contains(&normalize_identity(user))
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// First roster member named in `text`, scanning in roster order.
    /// Tokens are compared case-insensitively with trailing punctuation
    /// removed.
    pub fn find_mentioned(&self, text: &str) -> Option<&str> {
        let tokens: Vec<String> = text
            .split_whitespace()
            .map(|t| {
                t.trim_matches(|c: char| matches!(c, '.' | ',' | '!' | '?' | '"' | '\''))
                    .to_lowercase()
            })
            .collect();

        self.members
            .iter()
            .find(|member| tokens.iter().any(|t| t == *member))
            .map(String::as_str)
    }
}
