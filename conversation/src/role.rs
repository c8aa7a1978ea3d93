//! Role policy and the hook contract a host application implements.
//!
//! The role is a plain enum that only routes; all answer generation lives
//! behind [`ConversationHooks`], which the state machine calls at fixed
//! points of the round.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::aggregator::Proposals;
use crate::error::HookResult;
use crate::prompt::{Prompt, PromptId};

/// Behavioral variant of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotRole {
    /// Originates prompts and drives DISC/VOTE/PICK.
    Proctor,
    /// Proposes answers, discusses and votes.
    Submind,
    /// Answers mentions only.
    Observer,
    /// A submind that also feeds prompts to the proctor.
    Prompter,
}

/// What to do with a shout addressed to this participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MentionAction {
    /// Treat the body as a new prompt request.
    QueuePrompt,
    /// Process the body as an ordinary shout.
    Unwrap,
    /// Answer through the `at_chatbot` hook.
    Answer,
}

impl BotRole {
    /// Subminds and prompters take part in rounds.
    pub fn is_submind(self) -> bool {
        matches!(self, Self::Submind | Self::Prompter)
    }

    pub fn votes(self) -> bool {
        self.is_submind()
    }

    /// Whether a respondent announcement that omits us puts us in WAIT.
    pub fn may_sit_out(self) -> bool {
        self.is_submind()
    }

    /// Whether respondent announcements are acknowledged with the ready
    /// sentinel.
    pub fn acknowledges_announcements(self) -> bool {
        self.is_submind()
    }

    pub fn queues_prompts(self) -> bool {
        matches!(self, Self::Proctor)
    }

    pub fn sends_prompts(self) -> bool {
        matches!(self, Self::Prompter)
    }

    /// Whether shouts from non-proctor facilitators are ignored.
    pub fn ignores_facilitators(self) -> bool {
        self.is_submind()
    }

    pub fn mention_action(self) -> MentionAction {
        match self {
            Self::Proctor => MentionAction::QueuePrompt,
            Self::Observer => MentionAction::Unwrap,
            Self::Submind | Self::Prompter => MentionAction::Answer,
        }
    }
}

impl fmt::Display for BotRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proctor => write!(f, "proctor"),
            Self::Submind => write!(f, "submind"),
            Self::Observer => write!(f, "observer"),
            Self::Prompter => write!(f, "prompter"),
        }
    }
}

impl FromStr for BotRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "proctor" => Ok(Self::Proctor),
            "submind" => Ok(Self::Submind),
            "observer" => Ok(Self::Observer),
            "prompter" => Ok(Self::Prompter),
            other => Err(format!("unknown bot role: {other}")),
        }
    }
}

/// Callbacks supplied by the host application.
///
/// Every method has a do-nothing default, so a host overrides only what
/// its role needs. Producers return `Ok(None)` for "nothing to say".
/// Hooks are awaited one at a time on the participant's worker; a slow
/// hook delays the next shout.
#[async_trait]
pub trait ConversationHooks: Send + Sync {
    /// Answer to the round's prompt, or to any shout when unproctored.
    async fn produce_response(
        &self,
        _user: &str,
        _prompt: &str,
        _timestamp: &str,
    ) -> HookResult<Option<String>> {
        Ok(None)
    }

    /// Answer to a shout addressed to this participant.
    async fn at_chatbot(
        &self,
        user: &str,
        shout: &str,
        timestamp: &str,
    ) -> HookResult<Option<String>> {
        self.produce_response(user, shout, timestamp).await
    }

    /// Something to say about the other participants' proposals.
    async fn produce_discussion(&self, _options: &Proposals) -> HookResult<Option<String>> {
        Ok(None)
    }

    /// Name of the participant whose proposal is best, or `"abstain"`.
    async fn produce_vote(&self, _options: &Proposals) -> HookResult<Option<String>> {
        Ok(None)
    }

    /// Next prompt a prompter feeds to the proctor.
    async fn produce_prompt(&self) -> HookResult<Option<String>> {
        Ok(None)
    }

    /// A prompt request reached the proctor.
    async fn on_prompt_request(
        &self,
        _prompt: &str,
        _user: &str,
        _conversation_id: &str,
        _domain: &str,
    ) -> HookResult<()> {
        Ok(())
    }

    /// Somebody asked for the selection history.
    async fn on_history_request(
        &self,
        _user: &str,
        _shout: &str,
        _conversation_id: &str,
        _domain: &str,
    ) -> HookResult<Option<String>> {
        Ok(None)
    }

    /// Another participant said something during discussion.
    async fn on_discussion(&self, _user: &str, _shout: &str) -> HookResult<()> {
        Ok(())
    }

    async fn on_vote(&self, _prompt: &PromptId, _selected: &str, _voter: &str) -> HookResult<()> {
        Ok(())
    }

    /// A proposal was recorded (or rejected) for the active prompt.
    async fn on_proposal_added(&self, _prompt: &Prompt, _proposals: &Proposals) -> HookResult<()> {
        Ok(())
    }

    async fn on_selection(&self, _prompt: &Prompt, _user: &str, _response: &str) -> HookResult<()> {
        Ok(())
    }

    async fn on_ready_for_next(&self, _user: &str) -> HookResult<()> {
        Ok(())
    }
}

/// Hooks that never say anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentHooks;

#[async_trait]
impl ConversationHooks for SilentHooks {}
