//! Runtime configuration: poll presentation from a JSON file, Discord
//! credentials and channel from the environment.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use chrono::NaiveTime;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::discord::models::Snowflake;

/// Default location on disk where the bot looks for the JSON poll configuration.
const DEFAULT_CONFIG_PATH: &str = "config/poll.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SOIREE_POLL_CONFIG_PATH";
/// Default location of the persisted option list.
const DEFAULT_OPTIONS_PATH: &str = "poll_options.json";
const OPTIONS_PATH_ENV: &str = "POLL_OPTIONS_FILE";

/// Thread auto-archive durations accepted by Discord, in minutes.
const THREAD_ARCHIVE_MINUTES: [u16; 4] = [60, 1_440, 4_320, 10_080];
/// Longest poll duration accepted by Discord (32 days).
const MAX_POLL_HOURS: u32 = 768;

const TOKEN_ENV: &str = "BOT_TOKEN";
const CHANNEL_ENV: &str = "POLL_CHANNEL_ID";
const GUILD_ENV: &str = "DISCORD_GUILD_ID";

/// Failures while reading environment configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Environment variable is set but cannot be parsed.
    #[error("environment variable `{var}` has invalid value `{value}`")]
    InvalidEnvVar { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// How polls are worded and scheduled.
pub struct PollSettings {
    pub question: String,
    /// Message body posted alongside the poll.
    pub content: String,
    pub duration_hours: u32,
    pub allow_multiselect: bool,
    /// Local wall-clock time of the daily recreation.
    pub daily_at: NaiveTime,
    /// Pause after a daily recreation before computing the next target.
    pub settle_buffer: Duration,
    pub thread_name: String,
    pub thread_auto_archive_minutes: u16,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            question: "What do you want to play tonight?".into(),
            content: "**Poll of the day:**".into(),
            duration_hours: 10,
            allow_multiselect: true,
            daily_at: NaiveTime::from_hms_opt(10, 0, 0).unwrap_or(NaiveTime::MIN),
            settle_buffer: Duration::from_secs(60),
            thread_name: "Discussion - Other".into(),
            thread_auto_archive_minutes: 60,
        }
    }
}

impl PollSettings {
    /// Load poll settings from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawPollSettings>(&contents) {
                Ok(raw) => {
                    let settings = raw.into_settings();
                    info!(
                        path = %path.display(),
                        daily_at = %settings.daily_at,
                        "loaded poll settings from config"
                    );
                    settings
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file at [`DEFAULT_CONFIG_PATH`].
/// Every field is optional.
struct RawPollSettings {
    question: Option<String>,
    content: Option<String>,
    duration_hours: Option<u32>,
    allow_multiselect: Option<bool>,
    daily_at: Option<String>,
    settle_buffer_secs: Option<u64>,
    thread_name: Option<String>,
    thread_auto_archive_minutes: Option<u16>,
}

impl RawPollSettings {
    fn into_settings(self) -> PollSettings {
        let defaults = PollSettings::default();
        let daily_at = match self.daily_at {
            Some(raw) => match NaiveTime::parse_from_str(raw.trim(), "%H:%M") {
                Ok(time) => time,
                Err(err) => {
                    warn!(value = %raw, error = %err, "invalid `daily_at`; expected HH:MM");
                    defaults.daily_at
                }
            },
            None => defaults.daily_at,
        };

        PollSettings {
            question: self.question.unwrap_or(defaults.question),
            content: self.content.unwrap_or(defaults.content),
            duration_hours: match self.duration_hours {
                Some(hours) if (1..=MAX_POLL_HOURS).contains(&hours) => hours,
                Some(hours) => {
                    warn!(
                        value = hours,
                        max = MAX_POLL_HOURS,
                        "invalid `duration_hours`; using default"
                    );
                    defaults.duration_hours
                }
                None => defaults.duration_hours,
            },
            allow_multiselect: self.allow_multiselect.unwrap_or(defaults.allow_multiselect),
            daily_at,
            settle_buffer: self
                .settle_buffer_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.settle_buffer),
            thread_name: self.thread_name.unwrap_or(defaults.thread_name),
            thread_auto_archive_minutes: match self.thread_auto_archive_minutes {
                Some(minutes) if THREAD_ARCHIVE_MINUTES.contains(&minutes) => minutes,
                Some(minutes) => {
                    warn!(
                        value = minutes,
                        allowed = ?THREAD_ARCHIVE_MINUTES,
                        "invalid `thread_auto_archive_minutes`; using default"
                    );
                    defaults.thread_auto_archive_minutes
                }
                None => defaults.thread_auto_archive_minutes,
            },
        }
    }
}

/// Discord credentials and addressing read from the environment.
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub bot_token: String,
    /// Poll channel; an error here only disables poll posting and the scheduler.
    pub poll_channel: Result<Snowflake, ConfigError>,
    /// Register commands on this guild only (instant propagation) when set.
    pub guild_id: Option<Snowflake>,
}

impl DiscordConfig {
    /// Build the configuration from the expected environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&'static str) -> Option<String>) -> Result<Self, ConfigError> {
        let bot_token = lookup(TOKEN_ENV)
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::MissingEnvVar { var: TOKEN_ENV })?;

        let poll_channel = parse_snowflake(CHANNEL_ENV, lookup(CHANNEL_ENV));
        let guild_id = match parse_snowflake(GUILD_ENV, lookup(GUILD_ENV)) {
            Ok(id) => Some(id),
            Err(ConfigError::MissingEnvVar { .. }) => None,
            Err(err) => {
                warn!(error = %err, "ignoring guild id; commands will be registered globally");
                None
            }
        };

        Ok(Self {
            bot_token,
            poll_channel,
            guild_id,
        })
    }
}

fn parse_snowflake(var: &'static str, value: Option<String>) -> Result<Snowflake, ConfigError> {
    let value = value.ok_or(ConfigError::MissingEnvVar { var })?;
    value
        .trim()
        .parse::<Snowflake>()
        .map_err(|_| ConfigError::InvalidEnvVar { var, value })
}

/// Location of the persisted option list.
pub fn options_path() -> PathBuf {
    env::var_os(OPTIONS_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OPTIONS_PATH))
}

/// Port of the status HTTP server.
pub fn http_port() -> u16 {
    env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080)
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
