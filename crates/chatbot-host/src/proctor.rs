//! Facilitator side of the loopback session.
//!
//! The proctor's own [`Conversation`](conversation::Conversation) runs on a
//! dispatcher like everyone else's; [`ProctorHooks`] copy what it observes
//! (prompt requests, proposals, votes, ready acks) into [`ProctorState`].
//! The [`Director`] task reads that state and drives the round by sending
//! protocol shouts through the proctor's transport.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use conversation::protocol::messages;
use conversation::protocol::tokens::ABSTAIN;
use conversation::{
    ConversationHooks, HookResult, LoopbackTransport, OutgoingShout, Prompt, PromptId, Proposals,
    Transport,
};
use serde::Serialize;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PhaseTimeouts;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub requester: String,
    pub prompt: String,
}

/// Proposals and votes for the round in progress.
#[derive(Debug, Default)]
pub struct RoundTally {
    prompt_id: Option<PromptId>,
    proposals: Proposals,
    /// `(voter, selected)` in arrival order; one entry per voter.
    votes: Vec<(String, String)>,
}

impl RoundTally {
    /// Switch to `prompt`, discarding anything tallied for an older one.
    fn bind(&mut self, prompt: &PromptId) {
        if self.prompt_id.as_ref() != Some(prompt) {
            *self = Self {
                prompt_id: Some(prompt.clone()),
                ..Self::default()
            };
        }
    }

    /// A voter's latest vote replaces the earlier one.
    pub fn record_vote(&mut self, voter: &str, selected: &str) {
        self.votes.retain(|(v, _)| v != voter);
        self.votes.push((voter.to_string(), selected.to_string()));
    }

    pub fn proposals(&self) -> &Proposals {
        &self.proposals
    }

    pub fn votes(&self) -> BTreeMap<String, String> {
        self.votes.iter().cloned().collect()
    }

    /// Majority among proposals that received votes; ties go to the
    /// candidate whose first vote arrived earliest. Abstentions and votes
    /// for participants without a proposal are ignored. With no usable
    /// votes the first proposal wins.
    pub fn winner(&self) -> Option<(String, String)> {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for (_, selected) in &self.votes {
            if selected == ABSTAIN || !self.proposals.contains_key(selected) {
                continue;
            }
            match counts.iter_mut().find(|(c, _)| *c == selected.as_str()) {
                Some((_, n)) => *n += 1,
                None => counts.push((selected.as_str(), 1)),
            }
        }

        let best = counts
            .iter()
            .fold(None::<(&str, usize)>, |best, &(candidate, n)| match best {
                Some((_, top)) if top >= n => best,
                _ => Some((candidate, n)),
            })
            .map(|(candidate, _)| candidate.to_string());

        let winner = best.or_else(|| self.proposals.keys().next().cloned())?;
        let response = self.proposals.get(&winner)?.clone();
        Some((winner, response))
    }
}

/// What the proctor's hooks have observed, shared with the director.
#[derive(Default)]
pub struct ProctorState {
    requests: Mutex<VecDeque<PromptRequest>>,
    tally: Mutex<RoundTally>,
    ready: Mutex<HashSet<String>>,
    selections: AtomicUsize,
    changed: Notify,
}

impl ProctorState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn touch(&self) {
        self.changed.notify_waiters();
    }

    pub fn pending_requests(&self) -> usize {
        lock(&self.requests).len()
    }

    fn pop_request(&self) -> Option<PromptRequest> {
        lock(&self.requests).pop_front()
    }

    pub fn proposal_count(&self) -> usize {
        lock(&self.tally).proposals.len()
    }

    pub fn vote_count(&self) -> usize {
        lock(&self.tally).votes.len()
    }

    pub fn ready_count(&self) -> usize {
        lock(&self.ready).len()
    }

    /// Selections the proctor's own conversation has applied.
    pub fn selection_count(&self) -> usize {
        self.selections.load(Ordering::SeqCst)
    }

    fn clear_ready(&self) {
        lock(&self.ready).clear();
    }

    fn reset_tally(&self) {
        *lock(&self.tally) = RoundTally::default();
    }
}

pub struct ProctorHooks {
    state: Arc<ProctorState>,
}

impl ProctorHooks {
    pub fn new(state: Arc<ProctorState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl ConversationHooks for ProctorHooks {
    async fn on_prompt_request(
        &self,
        prompt: &str,
        user: &str,
        _conversation_id: &str,
        _domain: &str,
    ) -> HookResult<()> {
        lock(&self.state.requests).push_back(PromptRequest {
            requester: user.to_string(),
            prompt: prompt.to_string(),
        });
        self.state.touch();
        Ok(())
    }

    async fn on_proposal_added(&self, prompt: &Prompt, proposals: &Proposals) -> HookResult<()> {
        {
            let mut tally = lock(&self.state.tally);
            tally.bind(&prompt.id);
            tally.proposals = proposals.clone();
        }
        self.state.touch();
        Ok(())
    }

    async fn on_vote(&self, prompt: &PromptId, selected: &str, voter: &str) -> HookResult<()> {
        {
            let mut tally = lock(&self.state.tally);
            tally.bind(prompt);
            tally.record_vote(voter, selected);
        }
        self.state.touch();
        Ok(())
    }

    async fn on_selection(&self, _prompt: &Prompt, _user: &str, _response: &str) -> HookResult<()> {
        self.state.selections.fetch_add(1, Ordering::SeqCst);
        self.state.touch();
        Ok(())
    }

    async fn on_ready_for_next(&self, user: &str) -> HookResult<()> {
        lock(&self.state.ready).insert(user.to_lowercase());
        self.state.touch();
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoundSummary {
    pub round: usize,
    pub requester: String,
    pub prompt: String,
    pub respondents: Vec<String>,
    pub proposals: Proposals,
    pub votes: BTreeMap<String, String>,
    pub winner: Option<String>,
}

/// Drives rounds by shouting into the room as the proctor.
pub struct Director {
    transport: LoopbackTransport,
    state: Arc<ProctorState>,
    timeouts: PhaseTimeouts,
    subminds: Vec<String>,
    /// Responds every round; it sends the next prompt after each selection.
    prompter: String,
    cancel: CancellationToken,
}

impl Director {
    pub fn new(
        transport: LoopbackTransport,
        state: Arc<ProctorState>,
        timeouts: PhaseTimeouts,
        subminds: Vec<String>,
        prompter: String,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            state,
            timeouts,
            subminds,
            prompter,
            cancel,
        }
    }

    pub async fn run(&self, rounds: usize) -> Vec<RoundSummary> {
        let mut summaries = Vec::with_capacity(rounds);

        for round in 1..=rounds {
            if self.cancel.is_cancelled() {
                warn!(round, "Session cancelled");
                break;
            }

            // The first round is open to everyone without an announcement.
            let respondents = self.respondents_for(round);
            if round > 1 {
                self.state.clear_ready();
                self.shout(messages::pick_respondents(&respondents)).await;
                let everyone = self.subminds.len() + 1;
                if !self
                    .wait_until(self.timeouts.ready(), || self.state.ready_count() >= everyone)
                    .await
                {
                    warn!(acked = self.state.ready_count(), everyone, "Not every submind acknowledged");
                }
            }

            let Some(summary) = self.run_round(round, respondents).await else {
                break;
            };
            summaries.push(summary);
        }

        summaries
    }

    async fn run_round(&self, round: usize, respondents: Vec<String>) -> Option<RoundSummary> {
        if !self
            .wait_until(self.timeouts.prompt(), || self.state.pending_requests() > 0)
            .await
        {
            warn!(round, "No prompt was requested; ending session");
            return None;
        }
        let request = self.state.pop_request()?;
        info!(round, requester = %request.requester, prompt = %request.prompt, "Starting round");

        self.state.reset_tally();
        let expected = respondents.len();
        self.shout(messages::announce_prompt(
            &request.requester,
            &request.prompt,
            self.timeouts.response_secs,
        ))
        .await;
        self.wait_until(self.timeouts.response(), || self.state.proposal_count() >= expected)
            .await;

        if self.timeouts.discussion_secs > 0 {
            self.shout(messages::call_discussion(
                &request.prompt,
                self.timeouts.discussion_secs,
            ))
            .await;
            self.wait_until(self.timeouts.discussion(), || false).await;
        }

        self.shout(messages::call_voting(&request.prompt, self.timeouts.voting_secs))
            .await;
        self.wait_until(self.timeouts.voting(), || self.state.vote_count() >= expected)
            .await;
        self.shout(messages::close_voting(&request.prompt)).await;

        let (proposals, votes, winner) = {
            let tally = lock(&self.state.tally);
            (tally.proposals().clone(), tally.votes(), tally.winner())
        };
        match &winner {
            Some((user, response)) => {
                info!(round, winner = %user, votes = votes.len(), "Round decided");
                let applied = self.state.selection_count() + 1;
                self.shout(messages::announce_selection(user, response)).await;
                if !self
                    .wait_until(self.timeouts.ready(), || self.state.selection_count() >= applied)
                    .await
                {
                    warn!(round, "Selection not applied before timeout");
                }
            }
            None => warn!(round, "No proposals; round abandoned"),
        }

        Some(RoundSummary {
            round,
            requester: request.requester,
            prompt: request.prompt,
            respondents,
            proposals,
            votes,
            winner: winner.map(|(user, _)| user),
        })
    }

    /// Everyone in round one; afterwards one submind sits out in rotation
    /// when there are more than two. The prompter always responds.
    fn respondents_for(&self, round: usize) -> Vec<String> {
        let n = self.subminds.len();
        let mut respondents: Vec<String> = if round == 1 || n <= 2 {
            self.subminds.clone()
        } else {
            let sitting_out = (round - 2) % n;
            self.subminds
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != sitting_out)
                .map(|(_, nick)| nick.clone())
                .collect()
        };
        respondents.push(self.prompter.clone());
        respondents
    }

    async fn shout(&self, text: String) {
        debug!(%text, "Proctor shout");
        if let Err(e) = self.transport.send(OutgoingShout::new(text)).await {
            warn!(%e, "Proctor shout failed");
        }
    }

    /// Wait until `done` holds, the timeout passes or the session is
    /// cancelled. Returns the final value of `done`.
    async fn wait_until(&self, timeout: Duration, done: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let changed = self.state.changed.notified();
            if done() {
                return true;
            }
            tokio::select! {
                _ = changed => {}
                _ = tokio::time::sleep_until(deadline) => return done(),
                _ = self.cancel.cancelled() => return done(),
            }
        }
    }
}
