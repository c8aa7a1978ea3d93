//! Response aggregator: proposed responses per prompt.
//!
//! Identities are normalized at write time (case-folded, `#suffix`
//! stripped) so each participant holds at most one entry per prompt.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::prompt::{Prompt, PromptId};
use crate::protocol::normalize_identity;

/// Participant identity → proposed response.
pub type Proposals = BTreeMap<String, String>;

#[derive(Debug, Clone, Default)]
pub struct ProposedResponses {
    by_prompt: HashMap<PromptId, Proposals>,
}

impl ProposedResponses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start collecting for `prompt`, discarding anything already there.
    pub fn open(&mut self, prompt: &PromptId) {
        self.by_prompt.insert(prompt.clone(), Proposals::new());
    }

    /// Record `user`'s response; last write wins.
    ///
    /// Returns `false` without recording when the response is empty or just
    /// echoes the prompt.
    pub fn add(&mut self, prompt: &Prompt, user: &str, response: &str) -> bool {
        if response.trim().is_empty() || response == prompt.text {
            debug!(user, prompt_id = %prompt.id, "No answer proposed");
            return false;
        }

        self.by_prompt
            .entry(prompt.id.clone())
            .or_default()
            .insert(normalize_identity(user), response.to_string());
        true
    }

    pub fn get(&self, prompt: &PromptId) -> Option<&Proposals> {
        self.by_prompt.get(prompt)
    }

    pub fn count(&self, prompt: &PromptId) -> usize {
        self.by_prompt.get(prompt).map_or(0, |p| p.len())
    }

    /// Owned copy of the proposals for `prompt`.
    pub fn snapshot(&self, prompt: &PromptId) -> Proposals {
        self.by_prompt.get(prompt).cloned().unwrap_or_default()
    }

    /// Candidate set for discussion and voting: never contains `self_name`
    /// or a response equal to the prompt text.
    pub fn clean_options(&self, prompt: &Prompt, self_name: &str) -> Proposals {
        let own = normalize_identity(self_name);
        self.by_prompt
            .get(&prompt.id)
            .map(|proposals| {
                proposals
                    .iter()
                    .filter(|(nick, response)| **nick != own && **response != prompt.text)
                    .map(|(nick, response)| (nick.clone(), response.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(text: &str) -> Prompt {
        Prompt::new(PromptId::from("p-1"), text, "alice")
    }

    #[test]
    fn test_add_normalizes_identity() {
        let mut responses = ProposedResponses::new();
        let p = prompt("prompt goes here");
        responses.open(&p.id);

        assert!(responses.add(&p, "Other", "Other Bot Response."));
        let proposals = responses.get(&p.id).unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals["other"], "Other Bot Response.");
    }

    #[test]
    fn test_last_write_wins() {
        let mut responses = ProposedResponses::new();
        let p = prompt("q");
        responses.add(&p, "Bob", "first");
        responses.add(&p, "bob#2", "second");
        assert_eq!(responses.count(&p.id), 1);
        assert_eq!(responses.get(&p.id).unwrap()["bob"], "second");
    }

    #[test]
    fn test_empty_and_echo_are_not_answers() {
        let mut responses = ProposedResponses::new();
        let p = prompt("q");
        responses.open(&p.id);
        assert!(!responses.add(&p, "bob", ""));
        assert!(!responses.add(&p, "bob", "   "));
        assert!(!responses.add(&p, "bob", "q"));
        assert_eq!(responses.count(&p.id), 0);
    }

    #[test]
    fn test_clean_options_excludes_self_and_echo() {
        let mut responses = ProposedResponses::new();
        let p = prompt("Test Prompt");
        responses.add(&p, "testrunner", "This is removed");
        responses.add(&p, "Other User", "Valid Response");

        let opts = responses.clean_options(&p, "TestRunner");
        assert_eq!(opts.len(), 1);
        assert!(!opts.contains_key("testrunner"));
        assert!(opts.values().all(|v| v != "Test Prompt"));
    }

    #[test]
    fn test_open_clears_previous_entry() {
        let mut responses = ProposedResponses::new();
        let p = prompt("q");
        responses.add(&p, "bob", "a");
        responses.open(&p.id);
        assert_eq!(responses.count(&p.id), 0);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut responses = ProposedResponses::new();
        let p = prompt("q");
        responses.add(&p, "bob", "a");
        let snapshot = responses.snapshot(&p.id);
        responses.add(&p, "carol", "b");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(responses.count(&p.id), 2);
    }
}
