// src/config.rs

//! Manages relay configuration: loading, resolving dependent defaults, and validation.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::time::Duration;

/// A bearer credential. Never printed: `Debug` and `Display` show asterisks
/// of the same length.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", "*".repeat(self.0.chars().count()))
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&"*".repeat(self.0.chars().count()))
    }
}

/// Connection timing: backoff, socket bounds and the ping watchdog.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TimingConfig {
    /// Pause between a failed connection cycle and the next attempt.
    #[serde(with = "humantime_serde", default = "default_reconnect_backoff")]
    pub reconnect_backoff: Duration,
    /// Upper bound on a single socket read.
    #[serde(with = "humantime_serde", default = "default_read_timeout")]
    pub read_timeout: Duration,
    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    pub connect_timeout: Duration,
    /// How long to wait for the membership confirmation of one JOIN.
    #[serde(with = "humantime_serde", default = "default_join_timeout")]
    pub join_timeout: Duration,
    #[serde(with = "humantime_serde", default = "default_ping_interval")]
    pub ping_interval: Duration,
    /// How long a PING may go unanswered before the connection is declared dead.
    #[serde(with = "humantime_serde", default = "default_ping_grace")]
    pub ping_grace: Duration,
}

fn default_reconnect_backoff() -> Duration {
    Duration::from_secs(10)
}
fn default_read_timeout() -> Duration {
    Duration::from_secs(1)
}
fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}
fn default_join_timeout() -> Duration {
    Duration::from_secs(10)
}
fn default_ping_interval() -> Duration {
    Duration::from_secs(60)
}
fn default_ping_grace() -> Duration {
    Duration::from_secs(5)
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            reconnect_backoff: default_reconnect_backoff(),
            read_timeout: default_read_timeout(),
            connect_timeout: default_connect_timeout(),
            join_timeout: default_join_timeout(),
            ping_interval: default_ping_interval(),
            ping_grace: default_ping_grace(),
        }
    }
}

/// Durations used by the `!timeout` family of commands.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ModerationConfig {
    /// How long `!disabletimeout` switches timeouts off.
    #[serde(with = "humantime_serde", default = "default_disable_duration")]
    pub disable_duration: Duration,
    /// Timeout applied to the named target.
    #[serde(with = "humantime_serde", default = "default_target_timeout")]
    pub target_timeout: Duration,
    /// Timeout applied to the speaker as a penalty.
    #[serde(with = "humantime_serde", default = "default_speaker_timeout")]
    pub speaker_timeout: Duration,
}

fn default_disable_duration() -> Duration {
    Duration::from_secs(600)
}
fn default_target_timeout() -> Duration {
    Duration::from_secs(5)
}
fn default_speaker_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            disable_duration: default_disable_duration(),
            target_timeout: default_target_timeout(),
            speaker_timeout: default_speaker_timeout(),
        }
    }
}

/// A message posted to a channel on a fixed period.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub channel: String,
    pub text: String,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

/// Where the leaderboard commands get their data.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LeaderboardConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_game_id")]
    pub game_id: String,
    #[serde(default = "default_category_id")]
    pub category_id: String,
    /// Leaderboard variable that selects the tracked sub-category.
    #[serde(default = "default_variable_id")]
    pub variable_id: String,
    #[serde(default = "default_variable_value")]
    pub variable_value: String,
    #[serde(default = "default_category_name")]
    pub category_name: String,
    #[serde(default = "default_category_short")]
    pub category_short: String,
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,
}

fn default_api_base() -> String {
    "https://www.speedrun.com/api/v1".to_string()
}
fn default_game_id() -> String {
    "nd2ervd0".to_string()
}
fn default_category_id() -> String {
    "zd3l7ydn".to_string()
}
fn default_variable_id() -> String {
    "wl3vv981".to_string()
}
fn default_variable_value() -> String {
    "5q8kgmyq".to_string()
}
fn default_category_name() -> String {
    "Super Monkey Ball 2: Story Mode All Levels".to_string()
}
fn default_category_short() -> String {
    "SMB2 SMAL".to_string()
}
fn default_request_timeout() -> Duration {
    Duration::from_secs(2)
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            game_id: default_game_id(),
            category_id: default_category_id(),
            variable_id: default_variable_id(),
            variable_value: default_variable_value(),
            category_name: default_category_name(),
            category_short: default_category_short(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct MetricsConfig {
    /// If true, an HTTP server will be started to expose Prometheus metrics.
    #[serde(default)]
    pub enabled: bool,
    /// The port for the Prometheus metrics server.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_metrics_port() -> u16 {
    9187
}

/// A raw representation of the config file before validation and resolution.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_tls")]
    tls: bool,
    #[serde(default = "default_bot_name")]
    bot_name: String,
    #[serde(default = "default_home_channel")]
    home_channel: String,
    /// Defaults to the bot's own channel plus a few friends.
    #[serde(default)]
    auxiliary_channels: Option<Vec<String>>,
    /// Defaults to the owner of the home channel.
    #[serde(default)]
    privileged_user: Option<String>,
    #[serde(default = "default_token_env")]
    token_env: String,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_max_message_len")]
    max_message_len: usize,
    #[serde(default)]
    timing: TimingConfig,
    #[serde(default)]
    moderation: ModerationConfig,
    #[serde(default)]
    announcements: Vec<Announcement>,
    #[serde(default)]
    leaderboard: LeaderboardConfig,
    #[serde(default)]
    metrics: MetricsConfig,
}

fn default_host() -> String {
    "irc.chat.twitch.tv".to_string()
}
fn default_port() -> u16 {
    6697
}
fn default_tls() -> bool {
    true
}
fn default_bot_name() -> String {
    "complexplanebot".to_string()
}
fn default_home_channel() -> String {
    "complexplane".to_string()
}
fn default_auxiliary_channels(bot_name: &str) -> Vec<String> {
    vec![
        bot_name.to_string(),
        "alist_".to_string(),
        "stevencw_".to_string(),
        "petresinc".to_string(),
    ]
}
fn default_token_env() -> String {
    "CHATRELAY_OAUTH_TOKEN".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_message_len() -> usize {
    500
}

/// Represents the final, validated, and resolved relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub bot_name: String,
    pub home_channel: String,
    pub auxiliary_channels: Vec<String>,
    pub privileged_user: String,
    /// Name of the environment variable holding the OAuth token.
    pub token_env: String,
    pub log_level: String,
    /// Longest chat message we send, in characters.
    pub max_message_len: usize,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub moderation: ModerationConfig,
    #[serde(default)]
    pub announcements: Vec<Announcement>,
    #[serde(default)]
    pub leaderboard: LeaderboardConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        let bot_name = default_bot_name();
        let home_channel = default_home_channel();
        Self {
            host: default_host(),
            port: default_port(),
            tls: default_tls(),
            auxiliary_channels: default_auxiliary_channels(&bot_name),
            privileged_user: home_channel.clone(),
            bot_name,
            home_channel,
            token_env: default_token_env(),
            log_level: default_log_level(),
            max_message_len: default_max_message_len(),
            timing: TimingConfig::default(),
            moderation: ModerationConfig::default(),
            announcements: Vec::new(),
            leaderboard: LeaderboardConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    /// Loads, resolves, and validates configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid configuration in '{path}'"))
    }

    /// Parses, resolves, and validates configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(contents).context("Failed to parse TOML")?;

        let auxiliary_channels = raw
            .auxiliary_channels
            .unwrap_or_else(|| default_auxiliary_channels(&raw.bot_name));
        let privileged_user = raw
            .privileged_user
            .unwrap_or_else(|| raw.home_channel.clone());

        let config = Config {
            host: raw.host,
            port: raw.port,
            tls: raw.tls,
            bot_name: raw.bot_name.to_lowercase(),
            home_channel: raw.home_channel.to_lowercase(),
            auxiliary_channels: auxiliary_channels
                .into_iter()
                .map(|c| c.to_lowercase())
                .collect(),
            privileged_user,
            token_env: raw.token_env,
            log_level: raw.log_level,
            max_message_len: raw.max_message_len,
            timing: raw.timing,
            moderation: raw.moderation,
            announcements: raw.announcements,
            leaderboard: raw.leaderboard,
            metrics: raw.metrics,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the resolved configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        for (what, name) in [
            ("bot_name", &self.bot_name),
            ("home_channel", &self.home_channel),
            ("privileged_user", &self.privileged_user),
        ] {
            if !is_plain_word(name) {
                return Err(anyhow!("{what} '{name}' must be a non-empty word"));
            }
        }
        if let Some(bad) = self.auxiliary_channels.iter().find(|c| !is_plain_word(c)) {
            return Err(anyhow!("auxiliary channel '{bad}' must be a non-empty word"));
        }
        if self.max_message_len < 4 {
            return Err(anyhow!("max_message_len must be at least 4"));
        }

        let t = &self.timing;
        for (what, d) in [
            ("timing.reconnect_backoff", t.reconnect_backoff),
            ("timing.read_timeout", t.read_timeout),
            ("timing.connect_timeout", t.connect_timeout),
            ("timing.join_timeout", t.join_timeout),
            ("timing.ping_interval", t.ping_interval),
            ("timing.ping_grace", t.ping_grace),
            ("moderation.disable_duration", self.moderation.disable_duration),
        ] {
            if d.is_zero() {
                return Err(anyhow!("{what} must be greater than zero"));
            }
        }
        if t.ping_grace >= t.ping_interval {
            return Err(anyhow!(
                "timing.ping_grace ({:?}) must be shorter than timing.ping_interval ({:?})",
                t.ping_grace,
                t.ping_interval
            ));
        }

        for a in &self.announcements {
            if !is_plain_word(&a.channel) {
                return Err(anyhow!("announcement channel '{}' must be a word", a.channel));
            }
            if a.interval.is_zero() {
                return Err(anyhow!(
                    "announcement interval for #{} must be greater than zero",
                    a.channel
                ));
            }
            if a.text.trim().is_empty() {
                return Err(anyhow!("announcement text for #{} is empty", a.channel));
            }
        }

        Ok(())
    }

    /// Reads the OAuth token from the environment variable named by `token_env`.
    pub fn load_credential(&self) -> Result<Credential> {
        let token = std::env::var(&self.token_env).with_context(|| {
            format!(
                "OAuth token not found: set the '{}' environment variable",
                self.token_env
            )
        })?;
        let token = token.trim();
        if token.is_empty() {
            return Err(anyhow!("'{}' is set but empty", self.token_env));
        }
        Ok(Credential::new(token.strip_prefix("oauth:").unwrap_or(token)))
    }

    /// The home channel followed by every distinct auxiliary channel, in join order.
    pub fn channels_to_join(&self) -> Vec<String> {
        let mut channels = vec![self.home_channel.clone()];
        for channel in &self.auxiliary_channels {
            if !channels.contains(channel) {
                channels.push(channel.clone());
            }
        }
        channels
    }
}

fn is_plain_word(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}
