//! Per-identity behavioral settings for a hosted bot.

use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

/// Mean/standard-deviation/minimum triple for a simulated human timing
/// parameter. Samples are drawn from a normal distribution and clamped
/// to `min`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingTriple {
    /// Distribution mean.
    pub mean: f64,
    /// Distribution standard deviation.
    pub std_dev: f64,
    /// Lower clamp applied to every sample.
    pub min: f64,
}

/// Behavioral configuration for one hosted bot.
///
/// Persisted as a flat JSON object through the config store; field names
/// are the wire format and must stay stable. Mutated only through store
/// writes — sessions read it at start and re-read it opportunistically.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct BotSettings {
    /// Probability in [0, 1] that the bot replies to an eligible message.
    #[serde(default = "default_reply_probability")]
    pub reply_probability: f64,
    /// Minimum wait (seconds) before starting a new conversation.
    #[serde(default = "default_new_conversation_min_wait")]
    pub new_conversation_min_wait: u64,
    /// Maximum wait (seconds) before starting a new conversation.
    #[serde(default = "default_new_conversation_max_wait")]
    pub new_conversation_max_wait: u64,
    /// Upper bound on generated sentence length.
    #[serde(default = "default_max_sentence_length")]
    pub max_sentence_length: u32,
    /// Maximum concurrent Markov chain contexts.
    #[serde(default = "default_max_markov_chains")]
    pub max_markov_chains: u32,
    /// Named response selection algorithm.
    #[serde(default = "default_selection_algorithm")]
    pub selection_algorithm: String,
    /// When set, the bot never initiates conversations.
    #[serde(default)]
    pub quiet_mode: bool,
    /// Mean reply delay in seconds.
    #[serde(default = "default_avg_delay")]
    pub avg_delay: f64,
    /// Reply delay standard deviation in seconds.
    #[serde(default = "default_std_dev_delay")]
    pub std_dev_delay: f64,
    /// Minimum reply delay in seconds.
    #[serde(default = "default_min_delay")]
    pub min_delay: f64,
    /// Mean simulated typing speed (characters per second).
    #[serde(default = "default_avg_typing_speed")]
    pub avg_typing_speed: f64,
    /// Typing speed standard deviation.
    #[serde(default = "default_std_dev_typing_speed")]
    pub std_dev_typing_speed: f64,
    /// Minimum typing speed.
    #[serde(default = "default_min_typing_speed")]
    pub min_typing_speed: f64,
}

fn default_reply_probability() -> f64 {
    0.1
}

fn default_new_conversation_min_wait() -> u64 {
    3600
}

fn default_new_conversation_max_wait() -> u64 {
    21600
}

fn default_max_sentence_length() -> u32 {
    150
}

fn default_max_markov_chains() -> u32 {
    3
}

fn default_selection_algorithm() -> String {
    "random".into()
}

fn default_avg_delay() -> f64 {
    2.0
}

fn default_std_dev_delay() -> f64 {
    1.0
}

fn default_min_delay() -> f64 {
    0.5
}

fn default_avg_typing_speed() -> f64 {
    6.0
}

fn default_std_dev_typing_speed() -> f64 {
    1.5
}

fn default_min_typing_speed() -> f64 {
    2.0
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            reply_probability: default_reply_probability(),
            new_conversation_min_wait: default_new_conversation_min_wait(),
            new_conversation_max_wait: default_new_conversation_max_wait(),
            max_sentence_length: default_max_sentence_length(),
            max_markov_chains: default_max_markov_chains(),
            selection_algorithm: default_selection_algorithm(),
            quiet_mode: false,
            avg_delay: default_avg_delay(),
            std_dev_delay: default_std_dev_delay(),
            min_delay: default_min_delay(),
            avg_typing_speed: default_avg_typing_speed(),
            std_dev_typing_speed: default_std_dev_typing_speed(),
            min_typing_speed: default_min_typing_speed(),
        }
    }
}

impl BotSettings {
    /// Reply-delay timing triple.
    #[must_use]
    pub fn reply_delay(&self) -> TimingTriple {
        TimingTriple {
            mean: self.avg_delay,
            std_dev: self.std_dev_delay,
            min: self.min_delay,
        }
    }

    /// Typing-speed timing triple.
    #[must_use]
    pub fn typing_speed(&self) -> TimingTriple {
        TimingTriple {
            mean: self.avg_typing_speed,
            std_dev: self.std_dev_typing_speed,
            min: self.min_typing_speed,
        }
    }

    /// Validate field invariants.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the reply probability is outside
    /// [0, 1], any duration is negative, a timing minimum exceeds its
    /// mean, or the conversation wait bounds are inverted.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.reply_probability) {
            return Err(AppError::Config(format!(
                "reply_probability {} outside [0, 1]",
                self.reply_probability
            )));
        }
        if self.new_conversation_min_wait > self.new_conversation_max_wait {
            return Err(AppError::Config(
                "new_conversation_min_wait exceeds new_conversation_max_wait".into(),
            ));
        }
        for (name, triple) in [
            ("delay", self.reply_delay()),
            ("typing_speed", self.typing_speed()),
        ] {
            if triple.mean < 0.0 || triple.std_dev < 0.0 || triple.min < 0.0 {
                return Err(AppError::Config(format!("negative {name} parameter")));
            }
            if triple.min > triple.mean {
                return Err(AppError::Config(format!("min_{name} exceeds avg_{name}")));
            }
        }
        Ok(())
    }
}
