//! Conversation state machine: one participant's view of the room.
//!
//! [`Conversation`] owns the phase, the active prompt, the proposal
//! aggregator and the audit histories. It is driven one shout at a time
//! by [`Conversation::handle_shout`]; the
//! [`Dispatcher`](crate::dispatcher::Dispatcher) guarantees that happens on
//! a single task, so none of the state is locked.
//!
//! Routing of a classified shout:
//!
//! ```text
//! Mention            → role policy (queue prompt / unwrap / answer)
//! other cid          → ignored
//! RespondentAnnouncement → WAIT or IDLE (+ ready ack for subminds)
//! WAIT (submind)     → everything else ignored
//! ControlPhase       → DISC / VOTE / PICK
//! HistoryRequest     → on_history_request
//! NewPromptRequest   → on_prompt_request (proctor)
//! PromptAnnouncement → IDLE → RESP, produce_response
//! ReadyForNext       → on_ready_for_next
//! PlainShout         → proposal / discussion / vote / selection by phase
//! ```

mod emit;
mod round;

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

use crate::aggregator::ProposedResponses;
use crate::classifier::{classify, ClassifiedShout, ClassifierContext, ShoutKind};
use crate::config::ConversationConfig;
use crate::error::HookResult;
use crate::filter::FilterPipeline;
use crate::hesitation::Hesitation;
use crate::history::{ConversationHistory, FairnessReport, Roster};
use crate::prompt::Prompt;
use crate::protocol::{
    normalize_identity, user_is_proctor, ConversationState, PhaseTracker, PhaseTransition,
};
use crate::role::{ConversationHooks, MentionAction};
use crate::transport::{IncomingShout, Transport};

pub struct Conversation {
    config: ConversationConfig,
    hooks: Arc<dyn ConversationHooks>,
    transport: Arc<dyn Transport>,
    filter: FilterPipeline,
    hesitation: Hesitation,
    phase: PhaseTracker,
    active_prompt: Option<Prompt>,
    proposals: ProposedResponses,
    history: ConversationHistory,
    roster: Roster,
    prompt_seq: u64,
    /// Unproctored answers are suppressed until this instant.
    paused_until: Option<Instant>,
    span: Span,
}

impl Conversation {
    pub fn new(
        config: ConversationConfig,
        hooks: Arc<dyn ConversationHooks>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let span = info_span!("conversation", nick = %config.nick, role = %config.role);
        let hesitation = Hesitation::new(config.hesitation.clone());
        let mut roster = Roster::new();
        roster.observe(&config.nick);

        Self {
            config,
            hooks,
            transport,
            filter: FilterPipeline::new(),
            hesitation,
            phase: PhaseTracker::new(),
            active_prompt: None,
            proposals: ProposedResponses::new(),
            history: ConversationHistory::new(),
            roster,
            prompt_seq: 0,
            paused_until: None,
            span,
        }
    }

    /// Post-process every produced answer through `filter`.
    pub fn with_filter(mut self, filter: FilterPipeline) -> Self {
        self.filter = filter;
        self
    }

    pub fn nick(&self) -> &str {
        &self.config.nick
    }

    pub fn config(&self) -> &ConversationConfig {
        &self.config
    }

    pub fn phase(&self) -> ConversationState {
        self.phase.current()
    }

    pub fn transitions(&self) -> &[PhaseTransition] {
        self.phase.transitions()
    }

    pub fn active_prompt(&self) -> Option<&Prompt> {
        self.active_prompt.as_ref()
    }

    pub fn proposals(&self) -> &ProposedResponses {
        &self.proposals
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn fairness_report(&self) -> FairnessReport {
        self.history.fairness()
    }

    /// Announce readiness; a prompter sends its first prompt.
    pub async fn start(&mut self) {
        let span = self.span.clone();
        async {
            info!("Participant ready");
            if self.config.role.sends_prompts() {
                match self.config.initial_prompt.clone() {
                    Some(prompt) => self.send_prompt(&prompt).await,
                    None => self.send_next_prompt().await,
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Process one inbound shout to completion.
    pub async fn handle_shout(&mut self, shout: IncomingShout) {
        let span = self.span.clone();
        self.process(shout).instrument(span).await
    }

    async fn process(&mut self, incoming: IncomingShout) {
        if incoming.shout.trim().is_empty() {
            error!(user = %incoming.user, "No shout");
            return;
        }

        let classified = classify(&self.classifier_context(), &incoming);
        self.roster.observe(&classified.user);

        let was_mention = matches!(classified.kind, ShoutKind::Mention { .. });
        let Some(classified) = self.resolve_mention(classified).await else {
            return;
        };

        if !was_mention && !self.is_current_conversation(&classified.conversation_id) {
            warn!(cid = %classified.conversation_id, "Crossposted shout ignored");
            return;
        }

        if self.config.role.ignores_facilitators()
            && !classified.is_from_proctor()
            && self.config.is_facilitator(&classified.user)
        {
            info!(user = %classified.user, "Ignoring facilitator shout");
            return;
        }

        self.route(classified).await;
    }

    async fn route(&mut self, classified: ClassifiedShout) {
        match classified.kind.clone() {
            ShoutKind::RespondentAnnouncement { participants } => {
                self.on_respondents(participants).await;
            }
            _ if self.phase.is(ConversationState::Wait) && self.config.role.may_sit_out() => {
                debug!(shout = %classified.text, "Sitting this round out");
            }
            ShoutKind::ControlPhase { target } => {
                self.on_control_phase(target, &classified).await;
            }
            ShoutKind::HistoryRequest => self.on_history_request(&classified).await,
            ShoutKind::NewPromptRequest { prompt } => {
                self.on_prompt_request(&classified, &prompt).await;
            }
            ShoutKind::PromptAnnouncement { requester, prompt } => {
                self.start_round(&classified, &requester, &prompt).await;
            }
            ShoutKind::ReadyForNext => {
                let result = self.hooks.on_ready_for_next(&classified.user).await;
                absorb("on_ready_for_next", &classified.text, result);
            }
            ShoutKind::PlainShout => self.on_plain_shout(&classified).await,
            ShoutKind::OtherMention => {
                debug!(shout = %classified.text, "Shout addressed elsewhere ignored");
            }
            ShoutKind::Malformed { reason } => {
                warn!(%reason, shout = %classified.text, "Ignoring malformed shout");
            }
            ShoutKind::Mention { .. } => {
                debug!(shout = %classified.text, "Nested mention ignored");
            }
        }
    }

    /// Apply the role's mention policy. Returns the shout to keep routing,
    /// or `None` when it has been fully handled.
    async fn resolve_mention(&mut self, classified: ClassifiedShout) -> Option<ClassifiedShout> {
        let body = match &classified.kind {
            ShoutKind::Mention { body } => body.clone(),
            ShoutKind::Malformed { reason } if classified.text.starts_with('@') => {
                error!(%reason, shout = %classified.text, "Ignoring incoming mention");
                return None;
            }
            _ => return Some(classified),
        };

        match self.config.role.mention_action() {
            MentionAction::QueuePrompt => {
                info!("Mention queued as prompt request");
                let prompt = body.trim().to_string();
                Some(ClassifiedShout {
                    text: crate::protocol::canonical_prompt(&prompt),
                    kind: ShoutKind::NewPromptRequest { prompt },
                    ..classified
                })
            }
            MentionAction::Unwrap => {
                info!("Mention unwrapped");
                let inner = IncomingShout::new(
                    classified.user.clone(),
                    body,
                    classified.conversation_id.clone(),
                    classified.domain.clone(),
                    classified.timestamp.clone(),
                );
                Some(classify(&self.classifier_context(), &inner))
            }
            MentionAction::Answer => {
                self.answer_mention(&classified, &body).await;
                None
            }
        }
    }

    fn classifier_context(&self) -> ClassifierContext<'_> {
        ClassifierContext {
            own_nick: &self.config.nick,
            phase: self.phase.current(),
        }
    }

    fn is_current_conversation(&self, conversation_id: &str) -> bool {
        self.config
            .conversation_id
            .as_deref()
            .map_or(true, |own| own == conversation_id)
    }

    fn is_self(&self, user: &str) -> bool {
        normalize_identity(user) == normalize_identity(&self.config.nick)
    }

    fn is_facilitator(&self, user: &str) -> bool {
        user_is_proctor(user) || self.config.is_facilitator(user)
    }

    /// Drop the round and return to IDLE.
    fn abandon_round(&mut self, reason: &str) {
        warn!(reason, phase = %self.phase.current(), "Abandoning round");
        self.active_prompt = None;
        self.phase.reset(reason);
    }
}

/// Log a failed hook and treat it as having produced nothing.
fn absorb<T: Default>(hook: &'static str, shout: &str, result: HookResult<T>) -> T {
    result.unwrap_or_else(|e| {
        error!(hook, error = %e, shout, "Hook failed");
        T::default()
    })
}
