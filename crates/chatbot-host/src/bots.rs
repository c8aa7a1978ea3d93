//! Deterministic demo participants.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use conversation::{ConversationHooks, HookResult, Prompt, Proposals};
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Long answers; votes for the longest proposal.
    Earnest,
    /// Short answers; votes for the shortest proposal.
    Terse,
    /// Disagrees; votes for the first proposal alphabetically.
    Contrarian,
}

impl Strategy {
    pub fn for_seat(seat: usize) -> Self {
        match seat % 3 {
            0 => Self::Earnest,
            1 => Self::Terse,
            _ => Self::Contrarian,
        }
    }
}

pub struct DemoBot {
    strategy: Strategy,
    /// Prompts fed to the proctor, cycled; empty for plain subminds.
    prompts: Vec<String>,
    next_prompt: AtomicUsize,
}

impl DemoBot {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            prompts: Vec::new(),
            next_prompt: AtomicUsize::new(0),
        }
    }

    /// A bot that feeds `prompts` to the proctor, starting after the first.
    pub fn prompter(prompts: Vec<String>) -> Self {
        Self {
            prompts,
            next_prompt: AtomicUsize::new(1),
            ..Self::new(Strategy::Earnest)
        }
    }

    fn answer(&self, prompt: &str) -> String {
        match self.strategy {
            Strategy::Earnest => format!(
                "After some thought about \"{}\", the honest answer is that it depends on who is asking.",
                prompt
            ),
            Strategy::Terse => "Hard to say.".to_string(),
            Strategy::Contrarian => format!("The question \"{}\" has a false premise.", prompt),
        }
    }

    fn choose(&self, options: &Proposals) -> Option<String> {
        let pick = match self.strategy {
            Strategy::Earnest => options.iter().max_by_key(|(_, r)| r.len()),
            Strategy::Terse => options.iter().min_by_key(|(_, r)| r.len()),
            Strategy::Contrarian => options.iter().next(),
        };
        pick.map(|(nick, _)| nick.clone())
    }
}

#[async_trait]
impl ConversationHooks for DemoBot {
    async fn produce_response(
        &self,
        _user: &str,
        prompt: &str,
        _timestamp: &str,
    ) -> HookResult<Option<String>> {
        Ok(Some(self.answer(prompt)))
    }

    async fn produce_discussion(&self, options: &Proposals) -> HookResult<Option<String>> {
        let Some((nick, _)) = options.iter().next() else {
            return Ok(None);
        };
        Ok(match self.strategy {
            Strategy::Earnest => Some(format!("I like what {} said.", nick)),
            Strategy::Terse => None,
            Strategy::Contrarian => Some(format!("{} missed the point.", nick)),
        })
    }

    async fn produce_vote(&self, options: &Proposals) -> HookResult<Option<String>> {
        Ok(self.choose(options))
    }

    async fn produce_prompt(&self) -> HookResult<Option<String>> {
        if self.prompts.is_empty() {
            return Ok(None);
        }
        let index = self.next_prompt.fetch_add(1, Ordering::SeqCst);
        Ok(Some(self.prompts[index % self.prompts.len()].clone()))
    }
}

/// Observer that counts selections and reports them when asked.
#[derive(Default)]
pub struct Scorekeeper {
    scores: Mutex<BTreeMap<String, usize>>,
    changed: Notify,
}

impl Scorekeeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scores(&self) -> BTreeMap<String, usize> {
        self.scores.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn total(&self) -> usize {
        self.scores().values().sum()
    }

    /// Wait until `rounds` selections have been counted.
    pub async fn wait_for_total(&self, rounds: usize, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            loop {
                let changed = self.changed.notified();
                if self.total() >= rounds {
                    return;
                }
                changed.await;
            }
        })
        .await
        .is_ok()
    }

    fn report(&self) -> String {
        let scores = self.scores();
        if scores.is_empty() {
            return "No rounds played yet.".to_string();
        }
        let mut ranked: Vec<_> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let parts: Vec<String> = ranked
            .iter()
            .map(|(nick, wins)| format!("{nick} {wins}"))
            .collect();
        format!("Scores: {}", parts.join(", "))
    }
}

#[async_trait]
impl ConversationHooks for Scorekeeper {
    async fn on_selection(&self, _prompt: &Prompt, user: &str, _response: &str) -> HookResult<()> {
        if let Ok(mut scores) = self.scores.lock() {
            *scores.entry(user.to_string()).or_default() += 1;
        }
        self.changed.notify_waiters();
        Ok(())
    }

    async fn on_history_request(
        &self,
        _user: &str,
        _shout: &str,
        _conversation_id: &str,
        _domain: &str,
    ) -> HookResult<Option<String>> {
        Ok(Some(self.report()))
    }
}
