//! Configuration types for the DNS bot
//!
//! This module defines all configuration structures used throughout the crate.
//! Secrets (`api_token`, `bot_token`) are redacted from `Debug` output.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::model::ChatId;

/// Main bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Root domains offered in the domain menus
    pub domains: Vec<String>,

    /// External IP resolver configuration
    #[serde(default)]
    pub ip_resolver: IpResolverConfig,

    /// Conversation session settings
    #[serde(default)]
    pub session: SessionConfig,

    /// DDNS scheduler settings
    #[serde(default)]
    pub ddns: DdnsConfig,

    /// Chat transport settings
    pub telegram: TelegramConfig,
}

impl BotConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.domains.is_empty() {
            return Err(crate::Error::config("No domains configured"));
        }
        for domain in &self.domains {
            if domain.is_empty() || domain.contains(char::is_whitespace) {
                return Err(crate::Error::config(format!("Invalid domain: {:?}", domain)));
            }
        }

        self.provider.validate()?;
        self.ip_resolver.validate()?;
        self.session.validate()?;
        self.ddns.validate()?;
        self.telegram.validate()?;

        Ok(())
    }
}

/// DNS provider configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare provider
    Cloudflare {
        /// Cloudflare API token
        api_token: String,
        /// Known zone IDs by root domain; anything missing is looked up
        #[serde(default)]
        zone_ids: BTreeMap<String, String>,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare { api_token, .. } => {
                if api_token.is_empty() {
                    return Err(crate::Error::config("Cloudflare API token cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom provider config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderConfig::Cloudflare { zone_ids, .. } => f
                .debug_struct("Cloudflare")
                .field("api_token", &"***")
                .field("zone_ids", zone_ids)
                .finish(),
            ProviderConfig::Custom { factory, .. } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .finish_non_exhaustive(),
        }
    }
}

/// External IP resolver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpResolverConfig {
    /// Plain-text HTTP lookup services, one per family
    Http {
        /// URL answering with the public IPv4 address
        #[serde(default = "default_v4_url")]
        v4_url: String,
        /// URL answering with the public IPv6 address
        #[serde(default = "default_v6_url")]
        v6_url: String,
        /// Request timeout in seconds
        #[serde(default = "default_resolver_timeout_secs")]
        timeout_secs: u64,
    },

    /// Custom resolver
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl IpResolverConfig {
    /// Validate the resolver configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            IpResolverConfig::Http {
                v4_url,
                v6_url,
                timeout_secs,
            } => {
                if v4_url.is_empty() || v6_url.is_empty() {
                    return Err(crate::Error::config("IP resolver URLs cannot be empty"));
                }
                if *timeout_secs == 0 {
                    return Err(crate::Error::config("IP resolver timeout must be > 0"));
                }
                Ok(())
            }
            IpResolverConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom IP resolver factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom IP resolver config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            IpResolverConfig::Http { .. } => "http",
            IpResolverConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for IpResolverConfig {
    fn default() -> Self {
        IpResolverConfig::Http {
            v4_url: default_v4_url(),
            v6_url: default_v6_url(),
            timeout_secs: default_resolver_timeout_secs(),
        }
    }
}

/// Conversation session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sessions idle for longer than this are evicted
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// How often the reaper looks for idle sessions
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,

    /// Records per page in list views
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.idle_timeout_secs == 0 {
            return Err(crate::Error::config("Session idle timeout must be > 0"));
        }
        if self.reap_interval_secs == 0 {
            return Err(crate::Error::config("Session reap interval must be > 0"));
        }
        if self.page_size == 0 {
            return Err(crate::Error::config("Page size must be > 0"));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
            reap_interval_secs: default_reap_interval_secs(),
            page_size: default_page_size(),
        }
    }
}

/// DDNS scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// Shortest allowed check interval (seconds)
    #[serde(default = "default_min_interval_secs")]
    pub min_interval_secs: u64,

    /// Longest allowed check interval (seconds)
    #[serde(default = "default_max_interval_secs")]
    pub max_interval_secs: u64,

    /// Intervals offered as buttons during DDNS setup
    #[serde(default = "default_preset_intervals")]
    pub preset_intervals: Vec<u64>,

    /// Capacity of the scheduler event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl DdnsConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.min_interval_secs == 0 {
            return Err(crate::Error::config("Minimum DDNS interval must be > 0"));
        }
        if self.min_interval_secs > self.max_interval_secs {
            return Err(crate::Error::config(format!(
                "Minimum DDNS interval ({}) exceeds maximum ({})",
                self.min_interval_secs, self.max_interval_secs
            )));
        }
        if let Some(preset) = self
            .preset_intervals
            .iter()
            .find(|p| !self.allows_interval(**p))
        {
            return Err(crate::Error::config(format!(
                "Preset interval {} is outside [{}, {}]",
                preset, self.min_interval_secs, self.max_interval_secs
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    pub fn allows_interval(&self, secs: u64) -> bool {
        (self.min_interval_secs..=self.max_interval_secs).contains(&secs)
    }
}

impl Default for DdnsConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: default_min_interval_secs(),
            max_interval_secs: default_max_interval_secs(),
            preset_intervals: default_preset_intervals(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Telegram Bot API settings
#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token issued by BotFather
    pub bot_token: String,

    /// Chats allowed to talk to the bot; empty allows everyone
    #[serde(default)]
    pub allowed_chat_ids: Vec<i64>,

    /// Long-poll timeout in seconds
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

impl TelegramConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.bot_token.is_empty() {
            return Err(crate::Error::config("Telegram bot token cannot be empty"));
        }
        Ok(())
    }

    pub fn allowed_chats(&self) -> HashSet<ChatId> {
        self.allowed_chat_ids.iter().copied().map(ChatId).collect()
    }
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"***")
            .field("allowed_chat_ids", &self.allowed_chat_ids)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

fn default_v4_url() -> String {
    "https://api.ipify.org".to_string()
}

fn default_v6_url() -> String {
    "https://api6.ipify.org".to_string()
}

fn default_resolver_timeout_secs() -> u64 {
    10
}

fn default_idle_timeout_secs() -> u64 {
    30 * 60
}

fn default_reap_interval_secs() -> u64 {
    60
}

fn default_page_size() -> usize {
    crate::pagination::DEFAULT_PAGE_SIZE
}

fn default_min_interval_secs() -> u64 {
    60
}

fn default_max_interval_secs() -> u64 {
    86_400
}

fn default_preset_intervals() -> Vec<u64> {
    vec![60, 300, 600]
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_poll_timeout_secs() -> u64 {
    30
}
