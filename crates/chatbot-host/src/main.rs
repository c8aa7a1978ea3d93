mod bots;
mod config;
mod proctor;
mod session;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use config::HostConfig;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML session config; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of demo subminds besides the prompter
    #[arg(long)]
    subminds: Option<usize>,

    /// Rounds to play
    #[arg(long)]
    rounds: Option<usize>,

    /// Prompt for the prompter to cycle through (repeatable; replaces the configured list)
    #[arg(long = "prompt")]
    prompts: Vec<String>,

    /// Hold a discussion phase of this many seconds before voting
    #[arg(long)]
    discussion_secs: Option<u64>,

    /// Respond immediately instead of simulating typing
    #[arg(long, default_value_t = false)]
    no_hesitation: bool,

    /// Log filter, e.g. "debug" or "conversation=trace" (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    /// Print the session report as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

impl Args {
    fn host_config(&self) -> Result<HostConfig> {
        let mut config = match &self.config {
            Some(path) => HostConfig::load(path)?,
            None => HostConfig::default(),
        };

        if let Some(subminds) = self.subminds {
            config.subminds = subminds;
        }
        if let Some(rounds) = self.rounds {
            config.rounds = rounds;
        }
        if !self.prompts.is_empty() {
            config.prompts = self.prompts.clone();
        }
        if let Some(secs) = self.discussion_secs {
            config.timeouts.discussion_secs = secs;
        }
        if self.no_hesitation {
            config.hesitation = false;
        }
        config.validate().context("invalid session settings")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = match &args.log_level {
        Some(level) => tracing_subscriber::EnvFilter::new(level),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "info".into()),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.host_config()?;
    info!(
        subminds = config.subminds,
        rounds = config.rounds,
        hesitation = config.hesitation,
        "Chatbot host starting"
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; finishing the current phase");
                cancel.cancel();
            }
        });
    }

    let report = session::run(config, cancel).await?;

    if args.json {
        let out = serde_json::to_string_pretty(&report).context("failed to encode report")?;
        println!("{out}");
        return Ok(());
    }

    for round in &report.rounds {
        info!(
            round = round.round,
            prompt = %round.prompt,
            requester = %round.requester,
            proposals = round.proposals.len(),
            votes = round.votes.len(),
            winner = round.winner.as_deref().unwrap_or("none"),
            "Round summary"
        );
    }
    info!(scores = ?report.scores, conversation_id = %report.conversation_id, "Session finished");

    Ok(())
}
