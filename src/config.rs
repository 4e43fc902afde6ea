//! Configuration for the chat client.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Default backend origin.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
/// Page tag sent with every request.
pub const DEFAULT_PAGE: &str = "tts-chat";

/// Environment variable for the backend origin (e.g. "http://10.0.0.4:8000").
const BASE_URL_ENV: &str = "MINZAI_BACKEND_URL";
const PAGE_ENV: &str = "MINZAI_PAGE";
const CHAT_TIMEOUT_ENV: &str = "MINZAI_CHAT_TIMEOUT_SECS";
const SYNTHESIS_TIMEOUT_ENV: &str = "MINZAI_SYNTHESIS_TIMEOUT_SECS";
const PLAYER_ENV: &str = "MINZAI_PLAYER";
const AUDIO_DIR_ENV: &str = "MINZAI_AUDIO_DIR";

/// Errors produced while building a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Backend URL could not be parsed.
    #[error("invalid backend url {value:?}: {source}")]
    InvalidUrl {
        /// Raw value received.
        value: String,
        /// Parser error.
        source: url::ParseError,
    },
    /// A numeric setting could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidNumber {
        /// Environment variable name.
        key: &'static str,
        /// Raw value received.
        value: String,
    },
    /// Player command line was empty.
    #[error("player command must not be empty")]
    EmptyPlayer,
}

/// Configuration for the chat client.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Origin of the voice backend. Validated by [`ClientConfig::with_base_url`].
    pub base_url: String,
    /// Page tag forwarded to the backend.
    pub page: String,
    /// Timeout for dialogue requests.
    #[serde(with = "duration_serde")]
    pub chat_timeout: Duration,
    /// Timeout for synthesis requests. Synthesis is slow, so this is long.
    #[serde(with = "duration_serde")]
    pub synthesis_timeout: Duration,
    /// Connection timeout.
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,
    /// External audio player.
    pub player: PlayerConfig,
    /// Directory for transient audio files.
    pub audio_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page: DEFAULT_PAGE.to_string(),
            chat_timeout: Duration::from_secs(120),
            synthesis_timeout: Duration::from_secs(500),
            connect_timeout: Duration::from_secs(10),
            player: PlayerConfig::default(),
            audio_dir: std::env::temp_dir().join("minzai-audio"),
        }
    }
}

impl ClientConfig {
    /// Create a new config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config from defaults plus `MINZAI_*` environment overrides.
    ///
    /// # Errors
    /// Returns an error if an override cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config using `lookup` to resolve override keys.
    ///
    /// # Errors
    /// Returns an error if an override cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(BASE_URL_ENV) {
            config = config.with_base_url(&raw)?;
        }
        if let Some(page) = lookup(PAGE_ENV) {
            config = config.with_page(page);
        }
        if let Some(raw) = lookup(CHAT_TIMEOUT_ENV) {
            config = config.with_chat_timeout(parse_secs(CHAT_TIMEOUT_ENV, &raw)?);
        }
        if let Some(raw) = lookup(SYNTHESIS_TIMEOUT_ENV) {
            config = config.with_synthesis_timeout(parse_secs(SYNTHESIS_TIMEOUT_ENV, &raw)?);
        }
        if let Some(raw) = lookup(PLAYER_ENV) {
            config = config.with_player(PlayerConfig::parse(&raw)?);
        }
        if let Some(dir) = lookup(AUDIO_DIR_ENV) {
            config = config.with_audio_dir(dir);
        }

        Ok(config)
    }

    /// Set the backend origin.
    ///
    /// # Errors
    /// Returns an error if `raw` is not a valid URL.
    pub fn with_base_url(mut self, raw: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl {
            value: raw.to_string(),
            source,
        })?;
        self.base_url = url.into();
        Ok(self)
    }

    /// Set the page tag.
    #[must_use]
    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        self.page = page.into();
        self
    }

    /// Set the dialogue timeout.
    #[must_use]
    pub const fn with_chat_timeout(mut self, timeout: Duration) -> Self {
        self.chat_timeout = timeout;
        self
    }

    /// Set the synthesis timeout.
    #[must_use]
    pub const fn with_synthesis_timeout(mut self, timeout: Duration) -> Self {
        self.synthesis_timeout = timeout;
        self
    }

    /// Set the player command.
    #[must_use]
    pub fn with_player(mut self, player: PlayerConfig) -> Self {
        self.player = player;
        self
    }

    /// Set the transient audio directory.
    #[must_use]
    pub fn with_audio_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.audio_dir = dir.into();
        self
    }
}

/// External program used to play synthesized audio.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Executable name or path.
    pub program: String,
    /// Arguments placed before the audio file path.
    pub args: Vec<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            program: "ffplay".to_string(),
            args: vec![
                "-nodisp".to_string(),
                "-autoexit".to_string(),
                "-loglevel".to_string(),
                "quiet".to_string(),
            ],
        }
    }
}

impl PlayerConfig {
    /// Parse a whitespace separated command line, e.g. `"aplay -q"`.
    ///
    /// # Errors
    /// Returns an error if the command line is blank.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut parts = raw.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(ConfigError::EmptyPlayer)?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

fn parse_secs(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| ConfigError::InvalidNumber {
            key,
            value: raw.to_string(),
        })
}

/// Serde module for Duration serialization.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
