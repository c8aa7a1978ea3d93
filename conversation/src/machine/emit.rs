//! Everything a participant says: proposals, discussion, votes, replies and
//! the facilitator's control shouts.

use rand::seq::SliceRandom;
use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::{absorb, Conversation};
use crate::classifier::ClassifiedShout;
use crate::filter::OutputFilter;
use crate::protocol::tokens::{ABSTAIN, ABSTAIN_SHOUT};
use crate::protocol::{canonical_prompt, messages, ConversationState, IllegalTransition};
use crate::transport::OutgoingShout;

impl Conversation {
    /// Emit an answer to the active prompt.
    ///
    /// An answer identical to the prompt is replaced by a random fallback.
    /// Returns the text actually sent.
    pub async fn propose_response(&mut self, response: Option<String>) -> Option<String> {
        let prompt_text = self.active_prompt.as_ref().map(|p| p.text.clone());
        let response = match response {
            Some(r) if prompt_text.as_deref() == Some(r.as_str()) => {
                info!("Answer echoed the prompt; using a fallback");
                self.fallback_response()
            }
            Some(r) => Some(self.filter.apply(&r)),
            None => None,
        };

        let Some(text) = response.filter(|t| !t.trim().is_empty()) else {
            warn!("Empty response provided");
            return None;
        };

        if !self.config.proctored {
            self.send(&text).await;
            let pause = self.config.unproctored_pause(self.roster.len());
            self.paused_until = Some(Instant::now() + pause);
            return Some(text);
        }

        match self.phase.current() {
            ConversationState::Resp => {
                self.send(&text).await;
                Some(text)
            }
            ConversationState::Vote => {
                warn!(response = %text, "Late response; voting already open");
                None
            }
            phase => {
                error!(%phase, response = %text, "Response outside of a round");
                None
            }
        }
    }

    /// Emit a discussion shout; only sent while discussion is open.
    pub async fn discuss_response(&self, text: &str) -> Option<String> {
        let text = self.filter.apply(text);
        if text.trim().is_empty() {
            return None;
        }
        if !self.phase.is(ConversationState::Disc) {
            warn!(discussion = %text, phase = %self.phase.current(), "Late discussion");
            return None;
        }
        self.send(&text).await;
        Some(text)
    }

    /// Vote for `name`. Voting for ourselves counts as abstaining.
    ///
    /// Returns the recorded choice (`"abstain"` or the name), or `None` if
    /// voting is closed or no name was given.
    pub async fn vote_response(&self, name: &str) -> Option<String> {
        if !self.phase.is(ConversationState::Vote) {
            warn!(name, phase = %self.phase.current(), "Late vote");
            return None;
        }

        let name = name.trim();
        if name.is_empty() {
            error!("Null vote");
            return None;
        }

        if name.eq_ignore_ascii_case(ABSTAIN) || self.is_self(name) {
            self.send(ABSTAIN_SHOUT).await;
            return Some(ABSTAIN.to_string());
        }

        self.send(&messages::vote_for(Some(name))).await;
        Some(name.to_string())
    }

    pub async fn announce_prompt(&self, requester: &str, prompt: &str, timeout_secs: u64) {
        self.send(&messages::announce_prompt(requester, prompt, timeout_secs))
            .await;
    }

    /// RESP → DISC, announced to the room.
    pub async fn call_discussion(&mut self, timeout_secs: u64) -> Result<(), IllegalTransition> {
        self.phase
            .advance(ConversationState::Disc, "discussion called")?;
        let text = messages::call_discussion(self.active_prompt_text(), timeout_secs);
        self.send(&text).await;
        Ok(())
    }

    /// RESP/DISC → VOTE, announced to the room.
    pub async fn call_voting(&mut self, timeout_secs: u64) -> Result<(), IllegalTransition> {
        self.phase.advance(ConversationState::Vote, "voting called")?;
        let text = messages::call_voting(self.active_prompt_text(), timeout_secs);
        self.send(&text).await;
        Ok(())
    }

    /// VOTE → PICK, announced to the room.
    pub async fn close_voting(&mut self) -> Result<(), IllegalTransition> {
        self.phase.advance(ConversationState::Pick, "voting closed")?;
        let text = messages::close_voting(self.active_prompt_text());
        self.send(&text).await;
        Ok(())
    }

    pub async fn pick_respondents<S: AsRef<str> + Sync>(&self, names: &[S]) {
        self.send(&messages::pick_respondents(names)).await;
    }

    pub async fn announce_selection(&self, user: &str, response: &str) {
        self.send(&messages::announce_selection(user, response)).await;
    }

    pub(super) async fn answer_mention(&mut self, shout: &ClassifiedShout, body: &str) {
        info!(user = %shout.user, "Mention incoming");
        let started = Instant::now();
        let result = self
            .hooks
            .at_chatbot(&shout.user, body, &shout.timestamp)
            .await;
        let Some(answer) = self.filtered(absorb("at_chatbot", &shout.text, result)) else {
            return;
        };
        self.hesitation.hesitate(started).await;
        let reply = format!("@{} {}", shout.user, answer);
        self.send_routed(&reply, &shout.conversation_id, &shout.domain)
            .await;
    }

    pub(super) async fn on_history_request(&mut self, shout: &ClassifiedShout) {
        let result = self
            .hooks
            .on_history_request(
                &shout.user,
                &shout.text,
                &shout.conversation_id,
                &shout.domain,
            )
            .await;
        let Some(answer) = self.filtered(absorb("on_history_request", &shout.text, result)) else {
            return;
        };

        let answer = if self.is_current_conversation(&shout.conversation_id) {
            answer
        } else {
            format!("@{} {}", shout.user, answer)
        };
        self.send_routed(&answer, &shout.conversation_id, &shout.domain)
            .await;
    }

    pub(super) async fn on_prompt_request(&mut self, shout: &ClassifiedShout, prompt: &str) {
        if !self.config.proctored {
            error!(user = %shout.user, "Prompt request in an unproctored conversation");
            return;
        }
        if !self.config.role.queues_prompts() {
            debug!(user = %shout.user, "Prompt request ignored");
            return;
        }

        info!(requester = %shout.user, prompt, "Prompt requested");
        let result = self
            .hooks
            .on_prompt_request(prompt, &shout.user, &shout.conversation_id, &shout.domain)
            .await;
        absorb("on_prompt_request", &shout.text, result);
    }

    /// Probabilistic answer to any shout while no facilitator runs rounds.
    pub(super) async fn unproctored_reply(&mut self, shout: &ClassifiedShout) {
        if !self.config.role.is_submind() || self.is_self(&shout.user) {
            return;
        }
        if let Some(until) = self.paused_until {
            if Instant::now() < until {
                debug!(user = %shout.user, "Responses paused");
                return;
            }
        }

        let roll: u8 = rand::thread_rng().gen_range(0..100);
        if roll >= self.config.response_probability {
            info!(roll, user = %shout.user, "Not responding");
            return;
        }

        let started = Instant::now();
        let result = self
            .hooks
            .produce_response(&shout.user, &shout.text, &shout.timestamp)
            .await;
        let response = absorb("produce_response", &shout.text, result);
        self.hesitation.hesitate(started).await;
        self.propose_response(response).await;
    }

    pub(super) async fn send_prompt(&self, prompt: &str) {
        self.send(&canonical_prompt(prompt.trim())).await;
    }

    pub(super) async fn send_next_prompt(&self) {
        let result = self.hooks.produce_prompt().await;
        match self.filtered(absorb("produce_prompt", "", result)) {
            Some(prompt) => self.send_prompt(&prompt).await,
            None => debug!("No prompt to send"),
        }
    }

    pub(super) async fn send(&self, text: &str) {
        self.deliver(OutgoingShout::new(text)).await;
    }

    pub(super) async fn send_routed(&self, text: &str, conversation_id: &str, domain: &str) {
        self.deliver(OutgoingShout::routed(text, conversation_id, domain))
            .await;
    }

    async fn deliver(&self, shout: OutgoingShout) {
        if let Err(e) = self.transport.send(shout).await {
            warn!(%e, "Failed to send shout");
        }
    }

    fn filtered(&self, text: Option<String>) -> Option<String> {
        text.map(|t| self.filter.apply(&t))
            .filter(|t| !t.trim().is_empty())
    }

    fn fallback_response(&self) -> Option<String> {
        self.config
            .fallback_responses
            .choose(&mut rand::thread_rng())
            .cloned()
    }

    fn active_prompt_text(&self) -> &str {
        self.active_prompt.as_ref().map_or("", |p| p.text.as_str())
    }
}
