//! Builders for the shouts participants emit.
//!
//! The classifier parses exactly what these produce.

use super::tokens::{
    ABSTAIN_SHOUT, DISCUSS, PICK, PROMPT_ANNOUNCEMENT, RESPONDENTS, VOTE,
};

/// `<requester> asks us to consider: "<prompt>" (for <n> seconds).`
pub fn announce_prompt(requester: &str, prompt: &str, timeout_secs: u64) -> String {
    format!(
        "{}{} \"{}\" (for {} seconds).",
        requester, PROMPT_ANNOUNCEMENT, prompt, timeout_secs
    )
}

/// `Please Discuss "<prompt>" for <n> seconds.`
pub fn call_discussion(prompt: &str, timeout_secs: u64) -> String {
    format!("{} \"{}\" for {} seconds.", DISCUSS, prompt, timeout_secs)
}

/// `Voting on the response to "<prompt>" for <n> seconds.`
pub fn call_voting(prompt: &str, timeout_secs: u64) -> String {
    format!("{}\"{}\" for {} seconds.", VOTE, prompt, timeout_secs)
}

/// `Tallying the votes for the responses to "<prompt>"`
pub fn close_voting(prompt: &str) -> String {
    format!("{}\"{}\"", PICK, prompt)
}

/// `a,b,c may respond to the next prompt.`
pub fn pick_respondents<S: AsRef<str>>(names: &[S]) -> String {
    let joined = names
        .iter()
        .map(|n| n.as_ref())
        .collect::<Vec<_>>()
        .join(",");
    format!("{}{}", joined, RESPONDENTS)
}

/// `The selected response is from <user>: "<response>"`
pub fn announce_selection(user: &str, response: &str) -> String {
    format!("The selected response is from {}: \"{}\"", user, response)
}

/// Vote shout for a candidate, or the abstain shout.
pub fn vote_for(candidate: Option<&str>) -> String {
    match candidate {
        Some(name) => format!("I vote for {}", name),
        None => ABSTAIN_SHOUT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_shouts_start_with_tokens() {
        assert!(call_discussion("p", 10).starts_with(DISCUSS));
        assert!(call_voting("p", 10).starts_with(VOTE));
        assert!(close_voting("p").starts_with(PICK));
    }

    #[test]
    fn test_announce_prompt_format() {
        assert_eq!(
            announce_prompt("alice", "why?", 30),
            "alice asks us to consider: \"why?\" (for 30 seconds)."
        );
    }

    #[test]
    fn test_pick_respondents_joins_with_commas() {
        assert_eq!(
            pick_respondents(&["alice", "bob"]),
            "alice,bob may respond to the next prompt."
        );
    }

    #[test]
    fn test_vote_shouts() {
        assert_eq!(vote_for(Some("bob")), "I vote for bob");
        assert_eq!(vote_for(None), "I abstain from voting.");
    }

    #[test]
    fn test_announce_selection() {
        assert_eq!(
            announce_selection("bob", "yes"),
            "The selected response is from bob: \"yes\""
        );
    }
}
