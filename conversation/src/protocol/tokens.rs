//! Fixed protocol tokens and identity helpers.
//!
//! Every string here is matched byte-for-byte by other participants in the
//! room, so none of them may be reworded.

/// Canonical prefix for a new prompt request.
pub const PROMPT_PREFIX: &str = "!PROMPT:";

/// Marker the proctor uses when announcing a prompt to the room.
pub const PROMPT_ANNOUNCEMENT: &str = " asks us to consider:";

/// Start of the discussion phase.
pub const DISCUSS: &str = "Please Discuss";

/// Start of the voting phase.
pub const VOTE: &str = "Voting on the response to ";

/// Voting is closed; the proctor is picking a response.
pub const PICK: &str = "Tallying the votes for the responses to ";

/// Sent by subminds once they are ready for another prompt.
pub const READY_FOR_NEXT: &str = "I'm ready for the next prompt.";

/// Substring that triggers a history request.
pub const HISTORY: &str = "history";

/// Suffix of the respondent announcement.
pub const RESPONDENTS: &str = " may respond to the next prompt.";

/// Explicit no-vote keywords.
pub const ABSTAIN: &str = "abstain";
pub const PRESENT: &str = "present";

/// Shout a participant sends when it will not vote.
pub const ABSTAIN_SHOUT: &str = "I abstain from voting.";

/// Nick of the participant that reports the selection history after each pick.
pub const SCOREKEEPER: &str = "scorekeeper";

/// Whether the nick belongs to a proctor.
pub fn user_is_proctor(nick: &str) -> bool {
    nick.to_lowercase().contains("proctor")
}

/// Whether the nick belongs to a prompter.
pub fn user_is_prompter(nick: &str) -> bool {
    nick.to_lowercase().contains("prompter")
}

/// Strip the `#suffix` some transports append to echoed nicks.
pub fn clean_nick(user: &str) -> &str {
    match user.split_once('#') {
        Some((nick, _)) => nick,
        None => user,
    }
}

/// Canonical key form of a participant identity.
pub fn normalize_identity(user: &str) -> String {
    clean_nick(user).trim().to_lowercase()
}

/// Re-emit a prompt request in canonical case.
pub fn canonical_prompt(prompt: &str) -> String {
    format!("{}{}", PROMPT_PREFIX, prompt.trim())
}

/// Strip the prompt prefix, accepting any letter case.
pub fn strip_prompt_prefix(shout: &str) -> Option<&str> {
    let head = shout.get(..PROMPT_PREFIX.len())?;
    if head.eq_ignore_ascii_case(PROMPT_PREFIX) {
        Some(&shout[PROMPT_PREFIX.len()..])
    } else {
        None
    }
}
