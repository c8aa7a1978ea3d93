//! Per-participant configuration.
//!
//! Loaded from TOML, then overridden from the environment:
//!
//! | variable | field |
//! |---|---|
//! | `CHATBOT_NICK` | `nick` |
//! | `CHATBOT_ROLE` | `role` |
//! | `CHATBOT_RESPONSE_PROBABILITY` | `response_probability` |

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::role::BotRole;

/// Randomized pause before emitting a quickly generated answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HesitationConfig {
    pub enabled: bool,
    /// Hooks that took at least this long skip the pause.
    pub threshold_ms: u64,
    /// Upper bound (exclusive) of the random pause.
    pub max_delay_ms: u64,
}

impl Default for HesitationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_ms: 5_000,
            max_delay_ms: 5_000,
        }
    }
}

impl HesitationConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn threshold(&self) -> Duration {
        Duration::from_millis(self.threshold_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    pub nick: String,
    pub role: BotRole,
    /// Whether a proctor drives the conversation.
    pub proctored: bool,
    /// Percent chance (0-100) of answering a shout when unproctored.
    pub response_probability: u8,
    pub hesitation: HesitationConfig,
    pub queue_capacity: usize,
    /// Nicks treated as facilitators rather than participants.
    pub facilitator_nicks: Vec<String>,
    /// Used when an answer merely echoes the prompt.
    pub fallback_responses: Vec<String>,
    /// Prompt a prompter sends when it starts.
    pub initial_prompt: Option<String>,
    /// Only shouts from this conversation are handled (mentions excepted).
    pub conversation_id: Option<String>,
    /// After answering unproctored, stay quiet this long per known user.
    pub unproctored_pause_per_user_ms: u64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            nick: String::new(),
            role: BotRole::Submind,
            proctored: true,
            response_probability: 75,
            hesitation: HesitationConfig::default(),
            queue_capacity: 256,
            facilitator_nicks: ["proctor", "scorekeeper", "stenographer"]
                .into_iter()
                .map(String::from)
                .collect(),
            fallback_responses: [
                "Huh?",
                "What?",
                "I don't know.",
                "I'm not sure what to say to that.",
                "I can't respond to that.",
                "...",
                "Sorry?",
                "Come again?",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            initial_prompt: None,
            conversation_id: None,
            unproctored_pause_per_user_ms: 5_000,
        }
    }
}

impl ConversationConfig {
    pub fn new(nick: &str, role: BotRole) -> Self {
        Self {
            nick: nick.to_string(),
            role,
            ..Self::default()
        }
    }

    pub fn from_toml_str(raw: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read `path`, apply environment overrides and validate.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&raw)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        if let Ok(nick) = std::env::var("CHATBOT_NICK") {
            self.nick = nick;
        }
        if let Ok(role) = std::env::var("CHATBOT_ROLE") {
            self.role = role.parse().map_err(ConfigError::Invalid)?;
        }
        if let Ok(probability) = std::env::var("CHATBOT_RESPONSE_PROBABILITY") {
            self.response_probability = probability.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "CHATBOT_RESPONSE_PROBABILITY is not a percentage: {probability}"
                ))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.nick.trim().is_empty() {
            return Err(ConfigError::Invalid("nick must not be empty".into()));
        }
        if self.response_probability > 100 {
            return Err(ConfigError::Invalid(format!(
                "response_probability must be 0-100, got {}",
                self.response_probability
            )));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be positive".into()));
        }
        Ok(())
    }

    /// Whether `user` is one of the configured facilitators.
    pub fn is_facilitator(&self, user: &str) -> bool {
        let user = user.to_lowercase();
        self.facilitator_nicks.iter().any(|n| n.to_lowercase() == user)
    }

    pub fn unproctored_pause(&self, known_users: usize) -> Duration {
        Duration::from_millis(self.unproctored_pause_per_user_ms * known_users as u64)
    }
}
