#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use conversation::error::HookError;
use conversation::{
    BotRole, Conversation, ConversationConfig, ConversationHooks, HesitationConfig, HookResult,
    IncomingShout, Prompt, PromptId, Proposals, RecordingTransport,
};
use tokio::sync::broadcast;

pub const CID: &str = "cid-1";
pub const DOMAIN: &str = "Private";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookCall {
    ProduceResponse { user: String, prompt: String },
    AtChatbot { user: String, shout: String },
    ProduceDiscussion { options: Proposals },
    ProduceVote { options: Proposals },
    ProducePrompt,
    PromptRequest { prompt: String, user: String },
    HistoryRequest { user: String, shout: String },
    Discussion { user: String, shout: String },
    Vote { prompt: PromptId, selected: String, voter: String },
    ProposalAdded { prompt: String, proposals: Proposals },
    Selection { prompt: String, user: String, response: String },
    ReadyForNext { user: String },
}

/// Hooks answering from fixed scripts and recording every call.
#[derive(Default)]
pub struct ScriptedHooks {
    response: Option<String>,
    discussion: Option<String>,
    vote: Option<String>,
    history: Option<String>,
    prompts: Mutex<VecDeque<String>>,
    failing: AtomicBool,
    calls: Mutex<Vec<HookCall>>,
}

impl ScriptedHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn responding(mut self, response: &str) -> Self {
        self.response = Some(response.to_string());
        self
    }

    pub fn discussing(mut self, discussion: &str) -> Self {
        self.discussion = Some(discussion.to_string());
        self
    }

    pub fn voting(mut self, vote: &str) -> Self {
        self.vote = Some(vote.to_string());
        self
    }

    pub fn with_history(mut self, history: &str) -> Self {
        self.history = Some(history.to_string());
        self
    }

    pub fn with_prompts(self, prompts: &[&str]) -> Self {
        *self.prompts.lock().unwrap() = prompts.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn failing(self) -> Self {
        self.failing.store(true, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> Vec<HookCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn votes(&self) -> Vec<HookCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, HookCall::Vote { .. }))
            .collect()
    }

    fn record(&self, call: HookCall) -> HookResult<()> {
        self.calls.lock().unwrap().push(call);
        if self.failing.load(Ordering::SeqCst) {
            return Err(HookError::failed("scripted", "backend offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl ConversationHooks for ScriptedHooks {
    async fn produce_response(
        &self,
        user: &str,
        prompt: &str,
        _timestamp: &str,
    ) -> HookResult<Option<String>> {
        self.record(HookCall::ProduceResponse {
            user: user.to_string(),
            prompt: prompt.to_string(),
        })?;
        Ok(self.response.clone())
    }

    async fn at_chatbot(
        &self,
        user: &str,
        shout: &str,
        _timestamp: &str,
    ) -> HookResult<Option<String>> {
        self.record(HookCall::AtChatbot {
            user: user.to_string(),
            shout: shout.to_string(),
        })?;
        Ok(self.response.clone())
    }

    async fn produce_discussion(&self, options: &Proposals) -> HookResult<Option<String>> {
        self.record(HookCall::ProduceDiscussion {
            options: options.clone(),
        })?;
        Ok(self.discussion.clone())
    }

    async fn produce_vote(&self, options: &Proposals) -> HookResult<Option<String>> {
        self.record(HookCall::ProduceVote {
            options: options.clone(),
        })?;
        Ok(self.vote.clone())
    }

    async fn produce_prompt(&self) -> HookResult<Option<String>> {
        self.record(HookCall::ProducePrompt)?;
        Ok(self.prompts.lock().unwrap().pop_front())
    }

    async fn on_prompt_request(
        &self,
        prompt: &str,
        user: &str,
        _conversation_id: &str,
        _domain: &str,
    ) -> HookResult<()> {
        self.record(HookCall::PromptRequest {
            prompt: prompt.to_string(),
            user: user.to_string(),
        })
    }

    async fn on_history_request(
        &self,
        user: &str,
        shout: &str,
        _conversation_id: &str,
        _domain: &str,
    ) -> HookResult<Option<String>> {
        self.record(HookCall::HistoryRequest {
            user: user.to_string(),
            shout: shout.to_string(),
        })?;
        Ok(self.history.clone())
    }

    async fn on_discussion(&self, user: &str, shout: &str) -> HookResult<()> {
        self.record(HookCall::Discussion {
            user: user.to_string(),
            shout: shout.to_string(),
        })
    }

    async fn on_vote(&self, prompt: &PromptId, selected: &str, voter: &str) -> HookResult<()> {
        self.record(HookCall::Vote {
            prompt: prompt.clone(),
            selected: selected.to_string(),
            voter: voter.to_string(),
        })
    }

    async fn on_proposal_added(&self, prompt: &Prompt, proposals: &Proposals) -> HookResult<()> {
        self.record(HookCall::ProposalAdded {
            prompt: prompt.text.clone(),
            proposals: proposals.clone(),
        })
    }

    async fn on_selection(&self, prompt: &Prompt, user: &str, response: &str) -> HookResult<()> {
        self.record(HookCall::Selection {
            prompt: prompt.text.clone(),
            user: user.to_string(),
            response: response.to_string(),
        })
    }

    async fn on_ready_for_next(&self, user: &str) -> HookResult<()> {
        self.record(HookCall::ReadyForNext {
            user: user.to_string(),
        })
    }
}

pub fn shout(user: &str, text: &str) -> IncomingShout {
    IncomingShout::new(user, text, CID, DOMAIN, "12:00:00 PM")
}

/// Config without hesitation, bound to [`CID`].
pub fn quiet_config(nick: &str, role: BotRole) -> ConversationConfig {
    let mut config = ConversationConfig::new(nick, role);
    config.hesitation = HesitationConfig::disabled();
    config.conversation_id = Some(CID.to_string());
    config
}

/// Route machine logs to the test harness; `RUST_LOG=conversation=debug` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

pub fn participant(
    config: ConversationConfig,
    hooks: ScriptedHooks,
) -> (Conversation, Arc<ScriptedHooks>, Arc<RecordingTransport>) {
    init_tracing();
    let hooks = Arc::new(hooks);
    let transport = Arc::new(RecordingTransport::new());
    let conversation = Conversation::new(config, hooks.clone(), transport.clone());
    (conversation, hooks, transport)
}

/// Receive room shouts until `count` of them satisfy `pred`.
pub async fn wait_for(
    rx: &mut broadcast::Receiver<IncomingShout>,
    count: usize,
    pred: impl Fn(&IncomingShout) -> bool,
) -> Vec<IncomingShout> {
    let mut matched = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        while matched.len() < count {
            let shout = rx.recv().await.expect("room closed");
            if pred(&shout) {
                matched.push(shout);
            }
        }
    })
    .await
    .expect("timed out waiting for shouts");
    matched
}
