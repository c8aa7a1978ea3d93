use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// How long the facilitator holds each phase open. Phases close early once
/// every respondent has answered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseTimeouts {
    pub prompt_secs: u64,
    pub ready_secs: u64,
    pub response_secs: u64,
    /// 0 skips discussion.
    pub discussion_secs: u64,
    pub voting_secs: u64,
}

impl Default for PhaseTimeouts {
    fn default() -> Self {
        Self {
            prompt_secs: 10,
            ready_secs: 5,
            response_secs: 8,
            discussion_secs: 0,
            voting_secs: 8,
        }
    }
}

impl PhaseTimeouts {
    pub fn prompt(&self) -> Duration {
        Duration::from_secs(self.prompt_secs)
    }

    pub fn ready(&self) -> Duration {
        Duration::from_secs(self.ready_secs)
    }

    pub fn response(&self) -> Duration {
        Duration::from_secs(self.response_secs)
    }

    pub fn discussion(&self) -> Duration {
        Duration::from_secs(self.discussion_secs)
    }

    pub fn voting(&self) -> Duration {
        Duration::from_secs(self.voting_secs)
    }
}

/// Loopback session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Demo subminds besides the prompter.
    pub subminds: usize,
    pub rounds: usize,
    /// Prompts the prompter cycles through.
    pub prompts: Vec<String>,
    pub hesitation: bool,
    /// Fresh UUID when unset.
    pub conversation_id: Option<String>,
    pub domain: String,
    pub proctor_nick: String,
    pub timeouts: PhaseTimeouts,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            subminds: 3,
            rounds: 3,
            prompts: vec![
                "Why is the sky blue?".into(),
                "What makes a good friend?".into(),
                "Is a hot dog a sandwich?".into(),
            ],
            hesitation: true,
            conversation_id: None,
            domain: "Private".into(),
            proctor_nick: "Proctor".into(),
            timeouts: PhaseTimeouts::default(),
        }
    }
}

impl HostConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.subminds == 0 {
            bail!("at least one submind is required");
        }
        if self.prompts.iter().all(|p| p.trim().is_empty()) {
            bail!("at least one prompt is required");
        }
        if !conversation::protocol::user_is_proctor(&self.proctor_nick) {
            bail!(
                "proctor nick {:?} must contain \"proctor\" to be recognized",
                self.proctor_nick
            );
        }
        Ok(())
    }
}
