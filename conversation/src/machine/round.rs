//! Round lifecycle: announcement, proposals, discussion, voting, selection.

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::{absorb, Conversation};
use crate::classifier::{parse_selection, ClassifiedShout};
use crate::filter::OutputFilter;
use crate::prompt::{Prompt, PromptId};
use crate::protocol::tokens::{ABSTAIN, PRESENT, READY_FOR_NEXT, SCOREKEEPER};
use crate::protocol::{normalize_identity, ConversationState};

impl Conversation {
    /// IDLE → RESP on a facilitator announcement.
    pub(super) async fn start_round(
        &mut self,
        shout: &ClassifiedShout,
        requester: &str,
        prompt_text: &str,
    ) {
        if let Err(e) = self.phase.advance(ConversationState::Resp, "prompt announced") {
            warn!(%e, "Announcement ignored");
            return;
        }

        self.prompt_seq += 1;
        let prompt = Prompt::new(PromptId::generate(self.prompt_seq), prompt_text, requester);
        debug!(prompt_id = %prompt.id, requester, "Got prompt");

        self.history.record_request(requester, prompt_text);
        let report = self.history.fairness();
        if !report.is_balanced() {
            error!(
                prompts = report.prompts,
                rounds_announced = report.rounds_announced,
                "Prompt history and respondent history disagree"
            );
        }

        self.proposals.open(&prompt.id);
        self.active_prompt = Some(prompt);

        if !self.config.role.is_submind() {
            return;
        }

        let started = Instant::now();
        let result = self
            .hooks
            .produce_response(requester, prompt_text, &shout.timestamp)
            .await;
        let response = absorb("produce_response", &shout.text, result);
        self.hesitation.hesitate(started).await;
        self.propose_response(response).await;
    }

    pub(super) async fn on_control_phase(
        &mut self,
        target: ConversationState,
        shout: &ClassifiedShout,
    ) {
        if self.phase.is(target) {
            debug!(phase = %target, "Already in phase");
            return;
        }
        if let Err(e) = self.phase.advance(target, &shout.text) {
            warn!(%e, shout = %shout.text, "Control shout out of order; ignored");
            return;
        }

        match target {
            ConversationState::Disc => self.discuss().await,
            ConversationState::Vote => self.vote().await,
            _ => {}
        }
    }

    async fn discuss(&mut self) {
        let Some(prompt) = self.active_prompt.clone() else {
            error!("Discussion called with no active prompt");
            self.abandon_round("no active prompt");
            return;
        };

        let started = Instant::now();
        let options = self.proposals.clean_options(&prompt, &self.config.nick);
        let result = self.hooks.produce_discussion(&options).await;
        let Some(discussion) = absorb("produce_discussion", &prompt.text, result) else {
            return;
        };
        self.hesitation.hesitate(started).await;
        self.discuss_response(&discussion).await;
    }

    async fn vote(&mut self) {
        if !self.config.role.votes() {
            return;
        }
        let Some(prompt) = self.active_prompt.clone() else {
            error!("Voting called with no active prompt");
            self.abandon_round("no active prompt");
            return;
        };

        let started = Instant::now();
        let options = self.proposals.clean_options(&prompt, &self.config.nick);
        let result = self.hooks.produce_vote(&options).await;
        let selected = absorb("produce_vote", &prompt.text, result)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| ABSTAIN.to_string());
        self.hesitation.hesitate(started).await;
        self.vote_response(&selected).await;
    }

    pub(super) async fn on_plain_shout(&mut self, shout: &ClassifiedShout) {
        if !self.config.proctored {
            self.unproctored_reply(shout).await;
            return;
        }

        let from_facilitator = self.is_facilitator(&shout.user);
        match self.phase.current() {
            ConversationState::Resp if !from_facilitator => self.add_proposal(shout).await,
            ConversationState::Disc if !from_facilitator => {
                if !self.is_self(&shout.user) {
                    let result = self.hooks.on_discussion(&shout.user, &shout.text).await;
                    absorb("on_discussion", &shout.text, result);
                }
            }
            ConversationState::Vote if !from_facilitator => self.record_vote(shout).await,
            ConversationState::Pick if shout.is_from_proctor() => self.finish_round(shout).await,
            phase => debug!(%phase, user = %shout.user, "Shout ignored"),
        }
    }

    async fn add_proposal(&mut self, shout: &ClassifiedShout) {
        let Some(prompt) = self.active_prompt.clone() else {
            error!(user = %shout.user, "Response with no active prompt");
            self.abandon_round("no active prompt");
            return;
        };

        if self.proposals.add(&prompt, &shout.user, &shout.text) {
            debug!(user = %shout.user, prompt_id = %prompt.id, "Proposal recorded");
        }
        let snapshot = self.proposals.snapshot(&prompt.id);
        let result = self.hooks.on_proposal_added(&prompt, &snapshot).await;
        absorb("on_proposal_added", &shout.text, result);
    }

    async fn record_vote(&mut self, shout: &ClassifiedShout) {
        let Some(prompt_id) = self.active_prompt.as_ref().map(|p| p.id.clone()) else {
            error!(user = %shout.user, "Vote with no active prompt");
            self.abandon_round("no active prompt");
            return;
        };

        let voter = normalize_identity(&shout.user);
        let selected = match self.roster.find_mentioned(&shout.text) {
            Some(candidate) => candidate.to_string(),
            None if is_abstention(&shout.text) => ABSTAIN.to_string(),
            None => {
                warn!(user = %shout.user, shout = %shout.text, "No valid vote cast");
                return;
            }
        };

        debug!(%voter, %selected, prompt_id = %prompt_id, "Vote recorded");
        let result = self.hooks.on_vote(&prompt_id, &selected, &voter).await;
        absorb("on_vote", &shout.text, result);
    }

    /// PICK → IDLE on the facilitator's selection shout.
    async fn finish_round(&mut self, shout: &ClassifiedShout) {
        let prompt = self.active_prompt.take();

        match parse_selection(&shout.text) {
            Ok((user, response)) => {
                self.history.record_selection(&user);
                info!(selected = %user, "Round finished");
                match &prompt {
                    Some(prompt) => {
                        let user = normalize_identity(&user);
                        let result = self.hooks.on_selection(prompt, &user, &response).await;
                        absorb("on_selection", &shout.text, result);
                    }
                    None => warn!("Selection with no active prompt"),
                }
            }
            Err(e) => error!(%e, "Selection could not be parsed"),
        }

        self.phase.reset("selection announced");

        if normalize_identity(&self.config.nick) == SCOREKEEPER {
            self.announce_history(shout).await;
        }
        if self.config.role.sends_prompts() {
            self.send_next_prompt().await;
        }
    }

    /// Respondent announcement: sit out (WAIT) or take part (IDLE).
    pub(super) async fn on_respondents(&mut self, participants: Vec<String>) {
        for participant in &participants {
            self.roster.observe(participant);
        }

        if self.phase.current().in_round() {
            self.abandon_round("respondents announced mid-round");
        }

        let own = normalize_identity(&self.config.nick);
        if self.config.role.may_sit_out() && !participants.contains(&own) {
            info!("Not selected for the next round; waiting");
            // Any state may move to WAIT.
            let _ = self.phase.advance(ConversationState::Wait, "not a respondent");
        } else {
            debug!("Participating in the next round");
            self.phase.reset("respondents announced");
        }
        self.history.record_participants(participants);

        if self.config.role.acknowledges_announcements() {
            self.send(READY_FOR_NEXT).await;
        }
    }

    /// Scorekeeper's post-selection report, built by its history hook.
    async fn announce_history(&mut self, shout: &ClassifiedShout) {
        let result = self
            .hooks
            .on_history_request(
                &self.config.nick,
                &shout.text,
                &shout.conversation_id,
                &shout.domain,
            )
            .await;
        if let Some(report) = absorb("on_history_request", &shout.text, result) {
            let report = self.filter.apply(&report);
            if !report.trim().is_empty() {
                self.send_routed(&report, &shout.conversation_id, &shout.domain)
                    .await;
            }
        }
    }
}

fn is_abstention(text: &str) -> bool {
    text.split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .any(|t| t == ABSTAIN || t == PRESENT)
}
