//! Wires a whole proctored conversation into one loopback room.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use conversation::{
    BotRole, Conversation, ConversationConfig, ConversationHooks, Dispatcher, FairnessReport,
    FilterPipeline, HesitationConfig, LoopbackRoom,
};
use futures::future::join_all;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::bots::{DemoBot, Scorekeeper, Strategy};
use crate::config::HostConfig;
use crate::proctor::{Director, ProctorHooks, ProctorState, RoundSummary};

pub const PROMPTER_NICK: &str = "prompter";
pub const SCOREKEEPER_NICK: &str = "scorekeeper";

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantReport {
    pub nick: String,
    pub role: BotRole,
    pub final_phase: String,
    pub selections: Vec<String>,
    pub fairness: FairnessReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub conversation_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub rounds: Vec<RoundSummary>,
    pub scores: BTreeMap<String, usize>,
    pub participants: Vec<ParticipantReport>,
}

struct Room {
    room: Arc<LoopbackRoom>,
    seats: Vec<Dispatcher>,
    forwarders: Vec<JoinHandle<()>>,
    hesitation: bool,
}

impl Room {
    fn config_for(&self, nick: &str, role: BotRole) -> ConversationConfig {
        let mut config = ConversationConfig::new(nick, role);
        config.conversation_id = Some(self.room.conversation_id().to_string());
        if !self.hesitation {
            config.hesitation = HesitationConfig::disabled();
        }
        config
    }

    fn seat(&mut self, config: ConversationConfig, hooks: Arc<dyn ConversationHooks>) {
        let transport = Arc::new(self.room.transport_for(&config.nick));
        let conversation = Conversation::new(config, hooks, transport)
            .with_filter(FilterPipeline::standard());
        let dispatcher = Dispatcher::spawn(conversation);
        self.forwarders.push(self.room.attach(dispatcher.handle()));
        self.seats.push(dispatcher);
    }
}

/// Run `config.rounds` rounds and return what everyone ended up with.
pub async fn run(config: HostConfig, cancel: CancellationToken) -> Result<SessionReport> {
    config.validate()?;
    let started_at = Utc::now();
    let conversation_id = config
        .conversation_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    info!(%conversation_id, subminds = config.subminds, rounds = config.rounds, "Opening room");

    let mut room = Room {
        room: LoopbackRoom::new(&conversation_id, &config.domain).shared(),
        seats: Vec::new(),
        forwarders: Vec::new(),
        hesitation: config.hesitation,
    };

    // The proctor is seated first so it hears the prompter's first request.
    let state = ProctorState::new();
    room.seat(
        room.config_for(&config.proctor_nick, BotRole::Proctor),
        Arc::new(ProctorHooks::new(state.clone())),
    );

    let scorekeeper = Arc::new(Scorekeeper::new());
    room.seat(
        room.config_for(SCOREKEEPER_NICK, BotRole::Observer),
        scorekeeper.clone(),
    );

    let mut subminds = Vec::with_capacity(config.subminds);
    for seat in 0..config.subminds {
        let nick = format!("bot-{}", seat + 1);
        room.seat(
            room.config_for(&nick, BotRole::Submind),
            Arc::new(DemoBot::new(Strategy::for_seat(seat))),
        );
        subminds.push(nick);
    }

    // The prompter's first prompt goes out when its worker starts.
    let prompts: Vec<String> = config
        .prompts
        .iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    let mut prompter = room.config_for(PROMPTER_NICK, BotRole::Prompter);
    prompter.initial_prompt = Some(prompts.first().cloned().context("no prompts configured")?);
    room.seat(prompter, Arc::new(DemoBot::prompter(prompts)));

    let director = Director::new(
        room.room.transport_for(&config.proctor_nick),
        state,
        config.timeouts.clone(),
        subminds,
        PROMPTER_NICK.to_string(),
        cancel,
    );
    let rounds = director.run(config.rounds).await;

    let decided = rounds.iter().filter(|r| r.winner.is_some()).count();
    if !scorekeeper
        .wait_for_total(decided, config.timeouts.ready())
        .await
    {
        warn!(decided, "Scorekeeper missed a selection");
    }

    let finished = join_all(room.seats.into_iter().map(Dispatcher::shutdown)).await;
    for forwarder in room.forwarders {
        forwarder.abort();
    }

    let mut participants = Vec::new();
    for result in finished {
        let conversation = result.context("participant worker failed")?;
        let fairness = conversation.fairness_report();
        if !fairness.is_balanced() {
            error!(nick = conversation.nick(), ?fairness, "Unbalanced prompt history");
        }
        participants.push(ParticipantReport {
            nick: conversation.nick().to_string(),
            role: conversation.config().role,
            final_phase: conversation.phase().to_string(),
            selections: conversation.history().selections().to_vec(),
            fairness,
        });
    }

    Ok(SessionReport {
        conversation_id,
        started_at,
        finished_at: Utc::now(),
        rounds,
        scores: scorekeeper.scores(),
        participants,
    })
}
