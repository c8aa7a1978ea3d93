//! Shout classifier. Turns a raw shout into a structured signal.
//!
//! Pure function over the shout and a small context (own nick, current
//! phase). Rules are evaluated in priority order and the first match wins:
//!
//! 1. `!PROMPT:` prefix (any case)     → [`ShoutKind::NewPromptRequest`]
//! 2. `@<own nick>` prefix             → [`ShoutKind::Mention`] / [`ShoutKind::Malformed`]
//!    `@<someone else>` prefix         → [`ShoutKind::OtherMention`]
//! 3. respondent suffix (proctor only) → [`ShoutKind::RespondentAnnouncement`]
//! 4. control phrase (proctor only)    → [`ShoutKind::ControlPhase`]
//! 5. `history` substring              → [`ShoutKind::HistoryRequest`]
//! 6. announcement marker (proctor, IDLE) → [`ShoutKind::PromptAnnouncement`]
//! 7. ready sentinel                   → [`ShoutKind::ReadyForNext`]
//! 8. anything else                    → [`ShoutKind::PlainShout`]

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseResult};
use crate::protocol::tokens::{
    self, DISCUSS, HISTORY, PICK, PROMPT_ANNOUNCEMENT, READY_FOR_NEXT, RESPONDENTS, VOTE,
};
use crate::protocol::{clean_nick, user_is_proctor, ConversationState};
use crate::transport::IncomingShout;

/// What the classifier needs to know about the receiving participant.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierContext<'a> {
    pub own_nick: &'a str,
    pub phase: ConversationState,
}

/// Structured meaning of a shout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShoutKind {
    /// A request to queue a new prompt.
    NewPromptRequest { prompt: String },
    /// Addressed to this participant; `body` is the text after the mention.
    Mention { body: String },
    /// Addressed to a different participant.
    OtherMention,
    /// Could not be parsed; ignored by the state machine.
    Malformed { reason: String },
    /// Who may respond to the next prompt (case-folded names).
    RespondentAnnouncement { participants: Vec<String> },
    /// Facilitator moving the conversation to `target`.
    ControlPhase { target: ConversationState },
    /// Somebody asked for the selection history.
    HistoryRequest,
    /// The facilitator announcing the prompt for this round.
    PromptAnnouncement { requester: String, prompt: String },
    /// A participant finished the current prompt.
    ReadyForNext,
    /// Candidate response, vote, selection or discussion.
    PlainShout,
}

/// A shout plus its classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedShout {
    /// Sender nick with any `#suffix` removed.
    pub user: String,
    /// Shout text; prompt requests are rewritten to canonical case.
    pub text: String,
    pub conversation_id: String,
    pub domain: String,
    pub timestamp: String,
    pub kind: ShoutKind,
}

impl ClassifiedShout {
    pub fn is_from_proctor(&self) -> bool {
        user_is_proctor(&self.user)
    }
}

/// Classify a shout. Never fails: unparseable input becomes
/// [`ShoutKind::Malformed`].
pub fn classify(ctx: &ClassifierContext<'_>, shout: &IncomingShout) -> ClassifiedShout {
    let user = clean_nick(&shout.user).to_string();
    let (text, kind) = classify_text(ctx, &user, &shout.shout);

    ClassifiedShout {
        user,
        text,
        conversation_id: shout.conversation_id.clone(),
        domain: shout.domain.clone(),
        timestamp: shout.timestamp.clone(),
        kind,
    }
}

fn classify_text(ctx: &ClassifierContext<'_>, user: &str, raw: &str) -> (String, ShoutKind) {
    let from_proctor = user_is_proctor(user);

    if let Some(rest) = tokens::strip_prompt_prefix(raw) {
        let prompt = rest.trim().to_string();
        return (tokens::canonical_prompt(&prompt), ShoutKind::NewPromptRequest { prompt });
    }

    if let Some(kind) = classify_mention(ctx.own_nick, raw) {
        return (raw.to_string(), kind);
    }

    let text = raw.to_string();

    if from_proctor {
        if let Some(body) = raw.strip_suffix(RESPONDENTS) {
            return (
                text,
                ShoutKind::RespondentAnnouncement {
                    participants: parse_participants(body),
                },
            );
        }
        if let Some(target) = control_target(raw) {
            return (text, ShoutKind::ControlPhase { target });
        }
    }

    if raw.to_lowercase().contains(HISTORY) {
        return (text, ShoutKind::HistoryRequest);
    }

    if from_proctor && ctx.phase == ConversationState::Idle && raw.contains(PROMPT_ANNOUNCEMENT) {
        let kind = match parse_prompt_announcement(raw) {
            Ok((requester, prompt)) => ShoutKind::PromptAnnouncement { requester, prompt },
            Err(e) => ShoutKind::Malformed {
                reason: e.to_string(),
            },
        };
        return (text, kind);
    }

    if raw == READY_FOR_NEXT {
        return (text, ShoutKind::ReadyForNext);
    }

    (text, ShoutKind::PlainShout)
}

fn classify_mention(own_nick: &str, raw: &str) -> Option<ShoutKind> {
    if !raw.starts_with('@') {
        return None;
    }

    let mention = format!("@{}", own_nick.to_lowercase());
    let addressed_to_us = raw
        .get(..mention.len())
        .map(|head| head.to_lowercase() == mention)
        .unwrap_or(false);

    if !addressed_to_us {
        return Some(ShoutKind::OtherMention);
    }

    Some(match parse_mention(raw) {
        Ok(body) => ShoutKind::Mention { body },
        Err(e) => ShoutKind::Malformed {
            reason: e.to_string(),
        },
    })
}

/// Text after the mention token and exactly one delimiter.
pub fn parse_mention(raw: &str) -> ParseResult<String> {
    match raw.split_once(' ') {
        Some((_, body)) if !body.trim().is_empty() => Ok(body.to_string()),
        _ => Err(ParseError::EmptyMention {
            shout: raw.to_string(),
        }),
    }
}

/// Comma-delimited, trimmed, case-folded participant names.
pub fn parse_participants(body: &str) -> Vec<String> {
    body.split(',')
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

fn control_target(raw: &str) -> Option<ConversationState> {
    if raw.starts_with(DISCUSS) {
        Some(ConversationState::Disc)
    } else if raw.starts_with(VOTE) {
        Some(ConversationState::Vote)
    } else if raw.starts_with(PICK) {
        Some(ConversationState::Pick)
    } else {
        None
    }
}

/// Split `<requester> asks us to consider: "<prompt>" (annotation).`
pub fn parse_prompt_announcement(raw: &str) -> ParseResult<(String, String)> {
    let (requester, remainder) =
        raw.split_once(PROMPT_ANNOUNCEMENT)
            .ok_or_else(|| ParseError::MissingDelimiter {
                delimiter: PROMPT_ANNOUNCEMENT.to_string(),
                shout: raw.to_string(),
            })?;

    let requester = requester.trim();
    let prompt = match remainder.rsplit_once('(') {
        Some((before, _)) => before,
        None => remainder,
    }
    .trim()
    .trim_matches('"')
    .trim();

    if requester.is_empty() || prompt.is_empty() {
        return Err(ParseError::EmptyField {
            field: if requester.is_empty() { "requester" } else { "prompt" },
            shout: raw.to_string(),
        });
    }

    Ok((requester.to_string(), prompt.to_string()))
}

/// Split `<label> <user>: "<response>"` into the selected user and response.
pub fn parse_selection(raw: &str) -> ParseResult<(String, String)> {
    let (label, response) = raw
        .split_once(':')
        .ok_or_else(|| ParseError::MissingDelimiter {
            delimiter: ":".to_string(),
            shout: raw.to_string(),
        })?;

    let user = label
        .split_whitespace()
        .last()
        .ok_or_else(|| ParseError::EmptyField {
            field: "selected user",
            shout: raw.to_string(),
        })?;

    Ok((
        user.to_string(),
        response.trim().trim_matches('"').to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(phase: ConversationState) -> ClassifierContext<'static> {
        ClassifierContext {
            own_nick: "testrunner",
            phase,
        }
    }

    fn shout(user: &str, text: &str) -> IncomingShout {
        IncomingShout::new(user, text, "cid-1", "Private", "12:00:00 PM")
    }

    fn kind_of(user: &str, text: &str, phase: ConversationState) -> ShoutKind {
        classify(&ctx(phase), &shout(user, text)).kind
    }

    #[test]
    fn test_prompt_prefix_any_case_is_canonicalized() {
        let classified = classify(&ctx(ConversationState::Idle), &shout("alice", "!prompt: Why?"));
        assert_eq!(
            classified.kind,
            ShoutKind::NewPromptRequest {
                prompt: "Why?".to_string()
            }
        );
        assert_eq!(classified.text, "!PROMPT:Why?");
    }

    #[test]
    fn test_mention_strips_token_and_one_delimiter() {
        assert_eq!(
            kind_of("alice", "@TestRunner what do you think?", ConversationState::Idle),
            ShoutKind::Mention {
                body: "what do you think?".to_string()
            }
        );
    }

    #[test]
    fn test_mention_without_body_is_malformed() {
        assert!(matches!(
            kind_of("alice", "@testrunner", ConversationState::Idle),
            ShoutKind::Malformed { .. }
        ));
    }

    #[test]
    fn test_mention_of_someone_else() {
        assert_eq!(
            kind_of("alice", "@bob hi", ConversationState::Resp),
            ShoutKind::OtherMention
        );
    }

    #[test]
    fn test_respondent_announcement_is_case_folded() {
        assert_eq!(
            kind_of(
                "Proctor",
                "Alice, BOB ,carol may respond to the next prompt.",
                ConversationState::Pick
            ),
            ShoutKind::RespondentAnnouncement {
                participants: vec!["alice".into(), "bob".into(), "carol".into()]
            }
        );
    }

    #[test]
    fn test_respondent_announcement_requires_proctor() {
        assert_eq!(
            kind_of("alice", "bob may respond to the next prompt.", ConversationState::Idle),
            ShoutKind::PlainShout
        );
    }

    #[test]
    fn test_control_phases() {
        let cases = [
            ("Please Discuss \"p\" for 10 seconds.", ConversationState::Disc),
            ("Voting on the response to \"p\" for 5 seconds.", ConversationState::Vote),
            ("Tallying the votes for the responses to \"p\"", ConversationState::Pick),
        ];
        for (text, target) in cases {
            assert_eq!(
                kind_of("Proctor", text, ConversationState::Resp),
                ShoutKind::ControlPhase { target }
            );
        }
    }

    #[test]
    fn test_control_phrase_from_submind_is_plain() {
        assert_eq!(
            kind_of("alice", "Please Discuss this", ConversationState::Resp),
            ShoutKind::PlainShout
        );
    }

    #[test]
    fn test_history_request() {
        assert_eq!(
            kind_of("alice", "Show me the HISTORY please", ConversationState::Idle),
            ShoutKind::HistoryRequest
        );
    }

    #[test]
    fn test_prompt_announcement_parsed() {
        assert_eq!(
            kind_of(
                "Proctor",
                "testrunner asks us to consider: prompt goes here (for 0 seconds).",
                ConversationState::Idle
            ),
            ShoutKind::PromptAnnouncement {
                requester: "testrunner".to_string(),
                prompt: "prompt goes here".to_string()
            }
        );
    }

    #[test]
    fn test_quoted_prompt_announcement() {
        assert_eq!(
            kind_of(
                "Proctor",
                "alice asks us to consider: \"what is (x)?\" (for 30 seconds).",
                ConversationState::Idle
            ),
            ShoutKind::PromptAnnouncement {
                requester: "alice".to_string(),
                prompt: "what is (x)?".to_string()
            }
        );
    }

    #[test]
    fn test_prompt_announcement_only_while_idle() {
        assert_eq!(
            kind_of(
                "Proctor",
                "alice asks us to consider: p (for 1 seconds).",
                ConversationState::Resp
            ),
            ShoutKind::PlainShout
        );
    }

    #[test]
    fn test_prompt_announcement_only_from_proctor() {
        assert_eq!(
            kind_of(
                "alice",
                "alice asks us to consider: p (for 1 seconds).",
                ConversationState::Idle
            ),
            ShoutKind::PlainShout
        );
    }

    #[test]
    fn test_ready_for_next() {
        assert_eq!(
            kind_of("bob", "I'm ready for the next prompt.", ConversationState::Idle),
            ShoutKind::ReadyForNext
        );
    }

    #[test]
    fn test_kind_serializes_with_tag() {
        let json = serde_json::to_value(ShoutKind::ReadyForNext).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "ready_for_next" }));

        let json = serde_json::to_value(ShoutKind::NewPromptRequest { prompt: "Why?".into() }).unwrap();
        assert_eq!(json["kind"], "new_prompt_request");
        assert_eq!(json["prompt"], "Why?");
    }

    #[test]
    fn test_plain_and_nick_cleanup() {
        let classified = classify(&ctx(ConversationState::Resp), &shout("Other#42", "Other Bot Response."));
        assert_eq!(classified.kind, ShoutKind::PlainShout);
        assert_eq!(classified.user, "Other");
    }

    #[test]
    fn test_classification_is_deterministic() {
        let input = shout("Proctor", "a,b may respond to the next prompt.");
        let first = classify(&ctx(ConversationState::Idle), &input);
        let second = classify(&ctx(ConversationState::Idle), &input);
        assert_eq!(first, second);
    }

    #[test]
    fn test_parse_selection() {
        let (user, response) =
            parse_selection("The selected response is from testrunner: \"test response\"").unwrap();
        assert_eq!(user, "testrunner");
        assert_eq!(response, "test response");
    }

    #[test]
    fn test_parse_selection_without_colon_fails() {
        assert!(matches!(
            parse_selection("nobody won"),
            Err(ParseError::MissingDelimiter { .. })
        ));
        assert!(matches!(
            parse_selection(": \"orphan\""),
            Err(ParseError::EmptyField { .. })
        ));
    }

    #[test]
    fn test_parse_announcement_missing_prompt() {
        assert!(parse_prompt_announcement("alice asks us to consider: (for 3 seconds).").is_err());
    }
}
