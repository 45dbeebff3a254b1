// # dnsbotd - DNS Bot Daemon
//
// Thin integration layer around dnsbot-core:
//
// 1. Reading configuration from environment variables
// 2. Initializing tracing and the runtime
// 3. Registering providers and IP resolvers
// 4. Wiring the conversation engine to the Telegram transport
// 5. Shutting down on SIGTERM / SIGINT
//
// Conversation and DDNS logic live in dnsbot-core.
//
// ## Configuration
//
// ### Telegram
// - `DNSBOT_TELEGRAM_TOKEN`: Bot token (required)
// - `DNSBOT_ALLOWED_CHAT_IDS`: Comma-separated chat IDs; empty allows every chat
// - `DNSBOT_POLL_TIMEOUT_SECS`: Long-poll timeout (default 30)
//
// ### Domains
// - `DNSBOT_DOMAINS`: Comma-separated root domains offered in menus (required)
//
// ### DNS Provider
// - `DNSBOT_PROVIDER_TYPE`: Provider type (cloudflare)
// - `DNSBOT_CLOUDFLARE_API_TOKEN`: API token (required for cloudflare)
// - `DNSBOT_CLOUDFLARE_ZONE_IDS`: `domain=zone_id` pairs, comma-separated (optional)
//
// ### IP Resolver
// - `DNSBOT_IP_RESOLVER_TYPE`: Resolver type (http)
// - `DNSBOT_IP_V4_URL` / `DNSBOT_IP_V6_URL`: Lookup services
// - `DNSBOT_IP_TIMEOUT_SECS`: Request timeout (default 10)
//
// ### Sessions
// - `DNSBOT_SESSION_IDLE_SECS`: Idle eviction threshold (default 1800)
// - `DNSBOT_SESSION_REAP_SECS`: Reaper period (default 60)
// - `DNSBOT_PAGE_SIZE`: Records per page (default 5)
//
// ### DDNS
// - `DNSBOT_DDNS_MIN_INTERVAL_SECS` / `DNSBOT_DDNS_MAX_INTERVAL_SECS`: Interval bounds
//
// ### Logging
// - `DNSBOT_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export DNSBOT_TELEGRAM_TOKEN=123456:ABC
// export DNSBOT_ALLOWED_CHAT_IDS=11111111
// export DNSBOT_DOMAINS=example.com,example.org
// export DNSBOT_CLOUDFLARE_API_TOKEN=your_token
//
// dnsbotd
// ```

use anyhow::{Context, Result};
use dnsbot_core::config::{SessionConfig, TelegramConfig};
use dnsbot_core::traits::{DnsProvider, EventSource, IpResolver, MessagingGateway};
use dnsbot_core::{
    BotConfig, ChatQueue, Clock, ConversationEngine, DdnsConfig, DdnsScheduler, EngineSettings,
    IpResolverConfig, MemorySessionStore, ProviderConfig, ProviderRegistry, SchedulerEvent,
    SystemClock,
};
use dnsbot_telegram::TelegramBot;
use std::collections::BTreeMap;
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Upper bound for draining queued chat events on shutdown
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum BotExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<BotExitCode> for ExitCode {
    fn from(code: BotExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Raw settings as read from the environment
struct Config {
    telegram_token: String,
    allowed_chat_ids: Vec<i64>,
    poll_timeout_secs: Option<u64>,
    domains: Vec<String>,
    provider_type: String,
    cloudflare_api_token: String,
    cloudflare_zone_ids: BTreeMap<String, String>,
    ip_resolver_type: String,
    ip_v4_url: Option<String>,
    ip_v6_url: Option<String>,
    ip_timeout_secs: Option<u64>,
    session_idle_secs: Option<u64>,
    session_reap_secs: Option<u64>,
    page_size: Option<usize>,
    ddns_min_interval_secs: Option<u64>,
    ddns_max_interval_secs: Option<u64>,
    log_level: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("telegram_token", &"***")
            .field("allowed_chat_ids", &self.allowed_chat_ids)
            .field("domains", &self.domains)
            .field("provider_type", &self.provider_type)
            .field("cloudflare_api_token", &"***")
            .field("cloudflare_zone_ids", &self.cloudflare_zone_ids)
            .field("ip_resolver_type", &self.ip_resolver_type)
            .field("log_level", &self.log_level)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let number = |name: &str| parse_var(name, var(name));

        Ok(Self {
            telegram_token: var("DNSBOT_TELEGRAM_TOKEN").unwrap_or_default(),
            allowed_chat_ids: split_list(var("DNSBOT_ALLOWED_CHAT_IDS"))
                .iter()
                .map(|id| {
                    id.parse()
                        .with_context(|| format!("DNSBOT_ALLOWED_CHAT_IDS: invalid chat ID '{}'", id))
                })
                .collect::<Result<_>>()?,
            poll_timeout_secs: number("DNSBOT_POLL_TIMEOUT_SECS")?,
            domains: split_list(var("DNSBOT_DOMAINS"))
                .into_iter()
                .map(|d| d.trim_end_matches('.').to_ascii_lowercase())
                .collect(),
            provider_type: var("DNSBOT_PROVIDER_TYPE").unwrap_or_else(|| "cloudflare".to_string()),
            cloudflare_api_token: var("DNSBOT_CLOUDFLARE_API_TOKEN").unwrap_or_default(),
            cloudflare_zone_ids: parse_zone_ids(var("DNSBOT_CLOUDFLARE_ZONE_IDS"))?,
            ip_resolver_type: var("DNSBOT_IP_RESOLVER_TYPE").unwrap_or_else(|| "http".to_string()),
            ip_v4_url: var("DNSBOT_IP_V4_URL"),
            ip_v6_url: var("DNSBOT_IP_V6_URL"),
            ip_timeout_secs: number("DNSBOT_IP_TIMEOUT_SECS")?,
            session_idle_secs: number("DNSBOT_SESSION_IDLE_SECS")?,
            session_reap_secs: number("DNSBOT_SESSION_REAP_SECS")?,
            page_size: parse_var("DNSBOT_PAGE_SIZE", var("DNSBOT_PAGE_SIZE"))?,
            ddns_min_interval_secs: number("DNSBOT_DDNS_MIN_INTERVAL_SECS")?,
            ddns_max_interval_secs: number("DNSBOT_DDNS_MAX_INTERVAL_SECS")?,
            log_level: var("DNSBOT_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the settings the core cannot check itself
    fn validate(&self) -> Result<()> {
        if self.telegram_token.is_empty() {
            anyhow::bail!(
                "DNSBOT_TELEGRAM_TOKEN is required. \
                Set it via: export DNSBOT_TELEGRAM_TOKEN=123456:ABC"
            );
        }

        match self.provider_type.as_str() {
            "cloudflare" => {
                if self.cloudflare_api_token.is_empty() {
                    anyhow::bail!(
                        "DNSBOT_CLOUDFLARE_API_TOKEN is required when DNSBOT_PROVIDER_TYPE=cloudflare"
                    );
                }
            }
            _ => anyhow::bail!(
                "DNSBOT_PROVIDER_TYPE '{}' is not supported. \
                Supported providers: cloudflare",
                self.provider_type
            ),
        }

        match self.ip_resolver_type.as_str() {
            "http" => {}
            _ => anyhow::bail!(
                "DNSBOT_IP_RESOLVER_TYPE '{}' is not supported. \
                Supported types: http",
                self.ip_resolver_type
            ),
        }

        for url in [&self.ip_v4_url, &self.ip_v6_url].into_iter().flatten() {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                anyhow::bail!("IP resolver URL must use HTTP or HTTPS scheme. Got: {}", url);
            }
        }

        if self.domains.is_empty() {
            anyhow::bail!(
                "DNSBOT_DOMAINS must contain at least one domain. \
                Set it via: export DNSBOT_DOMAINS=example.com,example.org"
            );
        }
        for domain in &self.domains {
            validate_domain_name(domain)?;
        }
        for domain in self.cloudflare_zone_ids.keys() {
            validate_domain_name(domain)
                .with_context(|| "DNSBOT_CLOUDFLARE_ZONE_IDS contains an invalid domain")?;
        }

        parse_log_level(&self.log_level)?;

        Ok(())
    }

    /// Map onto the core configuration, filling unset values with defaults
    fn into_bot_config(self) -> BotConfig {
        let resolver_defaults = IpResolverConfig::default();
        let ip_resolver = match resolver_defaults {
            IpResolverConfig::Http {
                v4_url,
                v6_url,
                timeout_secs,
            } => IpResolverConfig::Http {
                v4_url: self.ip_v4_url.unwrap_or(v4_url),
                v6_url: self.ip_v6_url.unwrap_or(v6_url),
                timeout_secs: self.ip_timeout_secs.unwrap_or(timeout_secs),
            },
            other => other,
        };

        let session_defaults = SessionConfig::default();
        let ddns_defaults = DdnsConfig::default();
        let min_interval_secs = self
            .ddns_min_interval_secs
            .unwrap_or(ddns_defaults.min_interval_secs);
        let max_interval_secs = self
            .ddns_max_interval_secs
            .unwrap_or(ddns_defaults.max_interval_secs);

        BotConfig {
            provider: ProviderConfig::Cloudflare {
                api_token: self.cloudflare_api_token,
                zone_ids: self.cloudflare_zone_ids,
            },
            domains: self.domains,
            ip_resolver,
            session: SessionConfig {
                idle_timeout_secs: self
                    .session_idle_secs
                    .unwrap_or(session_defaults.idle_timeout_secs),
                reap_interval_secs: self
                    .session_reap_secs
                    .unwrap_or(session_defaults.reap_interval_secs),
                page_size: self.page_size.unwrap_or(session_defaults.page_size),
            },
            ddns: DdnsConfig {
                min_interval_secs,
                max_interval_secs,
                // Only offer presets the bounds allow
                preset_intervals: ddns_defaults
                    .preset_intervals
                    .into_iter()
                    .filter(|p| (min_interval_secs..=max_interval_secs).contains(p))
                    .collect(),
                ..DdnsConfig::default()
            },
            telegram: TelegramConfig {
                bot_token: self.telegram_token,
                allowed_chat_ids: self.allowed_chat_ids,
                poll_timeout_secs: self.poll_timeout_secs.unwrap_or(30),
            },
        }
    }
}

/// Split a comma-separated variable, dropping blanks
fn split_list(value: Option<String>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse an optional variable; set-but-invalid is an error
fn parse_var<T>(name: &str, value: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{}: invalid value '{}': {}", name, raw, e)),
    }
}

/// Parse `domain=zone_id` pairs
fn parse_zone_ids(value: Option<String>) -> Result<BTreeMap<String, String>> {
    split_list(value)
        .iter()
        .map(|pair| {
            let (domain, zone) = pair.split_once('=').with_context(|| {
                format!(
                    "DNSBOT_CLOUDFLARE_ZONE_IDS: expected domain=zone_id, got '{}'",
                    pair
                )
            })?;
            Ok((
                domain.trim().trim_end_matches('.').to_ascii_lowercase(),
                zone.trim().to_string(),
            ))
        })
        .collect()
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "DNSBOT_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

/// Validate that a string is a valid domain name
///
/// Basic RFC 1035 checks; catches common typos, not every invalid name.
fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        anyhow::bail!("Domain name cannot be empty");
    }

    if domain.len() > 253 {
        anyhow::bail!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        );
    }

    for label in domain.split('.') {
        if label.is_empty() {
            anyhow::bail!("Domain name has empty label: '{}'", domain);
        }

        if label.len() > 63 {
            anyhow::bail!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            );
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            anyhow::bail!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric and hyphen only.",
                label
            );
        }

        if label.starts_with('-') || label.ends_with('-') {
            anyhow::bail!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            );
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return BotExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return BotExitCode::ConfigError.into();
    }

    let log_level = parse_log_level(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return BotExitCode::ConfigError.into();
    }

    let bot_config = config.into_bot_config();
    if let Err(e) = bot_config.validate() {
        error!("Configuration validation error: {}", e);
        return BotExitCode::ConfigError.into();
    }

    info!("Starting dnsbotd");
    info!("Configuration loaded: {:?}", bot_config);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return BotExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        let bot = match Bot::build(&bot_config) {
            Ok(bot) => bot,
            Err(e) => {
                error!("Startup error: {:#}", e);
                return BotExitCode::ConfigError;
            }
        };

        match bot.run().await {
            Ok(()) => BotExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                BotExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Everything the daemon wires together
struct Bot {
    engine: Arc<ConversationEngine>,
    transport: Arc<TelegramBot>,
    sessions: Arc<MemorySessionStore>,
    scheduler_events: mpsc::Receiver<SchedulerEvent>,
    session_config: SessionConfig,
}

impl Bot {
    /// Instantiate components from configuration
    fn build(config: &BotConfig) -> Result<Self> {
        let registry = ProviderRegistry::new();

        #[cfg(feature = "cloudflare")]
        {
            info!("Registering Cloudflare provider");
            dnsbot_provider_cloudflare::register(&registry);
        }

        #[cfg(feature = "http")]
        {
            info!("Registering HTTP IP resolver");
            dnsbot_ip_http::register(&registry);
        }

        let provider: Arc<dyn DnsProvider> = registry
            .create_provider(&config.provider)
            .context("Failed to create DNS provider")?
            .into();
        let resolver: Arc<dyn IpResolver> = registry
            .create_ip_resolver(&config.ip_resolver)
            .context("Failed to create IP resolver")?
            .into();
        info!(
            "Using provider '{}' and IP resolver '{}'",
            provider.provider_name(),
            resolver.resolver_name()
        );

        let transport = Arc::new(
            TelegramBot::new(&config.telegram).context("Failed to create Telegram client")?,
        );
        let gateway: Arc<dyn MessagingGateway> = transport.clone();

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let sessions = Arc::new(MemorySessionStore::with_clock(Arc::clone(&clock)));

        let (scheduler, scheduler_events) = DdnsScheduler::new(
            Arc::clone(&provider),
            resolver,
            Some(Arc::clone(&gateway)),
            Arc::clone(&clock),
            &config.ddns,
        )
        .context("Failed to create DDNS scheduler")?;

        let engine = Arc::new(ConversationEngine::new(
            sessions.clone(),
            gateway,
            provider,
            scheduler,
            clock,
            EngineSettings::from_config(config),
        ));

        Ok(Self {
            engine,
            transport,
            sessions,
            scheduler_events,
            session_config: config.session.clone(),
        })
    }

    /// Serve chat events until a shutdown signal arrives
    async fn run(self) -> Result<()> {
        let Bot {
            engine,
            transport,
            sessions,
            scheduler_events,
            session_config,
        } = self;

        let event_logger = tokio::spawn(log_scheduler_events(scheduler_events));
        let reaper = dnsbot_core::session::spawn_reaper(
            sessions,
            Duration::from_secs(session_config.reap_interval_secs),
            Duration::from_secs(session_config.idle_timeout_secs),
        );

        let queue = ChatQueue::new(Arc::clone(&engine));
        let mut inbound = transport.events();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        info!("Bot ready, waiting for messages");

        let outcome = loop {
            tokio::select! {
                signal = &mut shutdown => {
                    break signal.map(|name| info!("Received shutdown signal: {}", name));
                }
                event = inbound.next() => match event {
                    Some(event) => {
                        debug!("Inbound event for chat {}", event.chat_id);
                        queue.submit(event);
                    }
                    None => break Err(anyhow::anyhow!("Inbound event stream ended unexpectedly")),
                },
            }
        };

        info!("Shutting down");

        // Stops polling
        drop(inbound);

        let stopped = engine.scheduler().stop_all();
        info!("Stopped {} DDNS task(s)", stopped);

        if tokio::time::timeout(SHUTDOWN_TIMEOUT, queue.shutdown())
            .await
            .is_err()
        {
            warn!("Chat queue did not drain within {:?}", SHUTDOWN_TIMEOUT);
        }

        reaper.abort();
        event_logger.abort();

        outcome
    }
}

/// Log every scheduler event until the scheduler goes away
async fn log_scheduler_events(mut events: mpsc::Receiver<SchedulerEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SchedulerEvent::TaskStarted {
                domain,
                interval_secs,
            } => info!("DDNS task started: {} every {}s", domain, interval_secs),
            SchedulerEvent::TickSkipped { domain } => {
                debug!("DDNS tick skipped for {}: previous tick still running", domain)
            }
            SchedulerEvent::IpUnchanged { domain, ip } => {
                debug!("DDNS {} unchanged at {}", domain, ip)
            }
            SchedulerEvent::RecordUpdated {
                domain,
                previous,
                current,
            } => match previous {
                Some(previous) => info!("DDNS {} updated: {} -> {}", domain, previous, current),
                None => info!("DDNS {} set to {}", domain, current),
            },
            SchedulerEvent::TickFailed { domain, error } => {
                warn!("DDNS tick failed for {}: {}", domain, error)
            }
            SchedulerEvent::TaskStopped { domain } => info!("DDNS task stopped: {}", domain),
        }
    }
}

/// Resolve once SIGTERM or SIGINT arrives
#[cfg(unix)]
async fn shutdown_signal() -> Result<&'static str> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Resolve once CTRL-C arrives
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for CTRL-C")?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DNSBOT_TELEGRAM_TOKEN", "123:abc"),
            ("DNSBOT_DOMAINS", "example.com, Example.org."),
            ("DNSBOT_CLOUDFLARE_API_TOKEN", "cf-token"),
        ]
    }

    #[test]
    fn test_minimal_config_validates() {
        let config = load(&minimal()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.domains, vec!["example.com", "example.org"]);

        let bot = config.into_bot_config();
        assert!(bot.validate().is_ok());
        assert_eq!(bot.session.idle_timeout_secs, 1800);
        assert_eq!(bot.ddns.min_interval_secs, 60);
        assert!(bot.telegram.allowed_chat_ids.is_empty());
    }

    #[test]
    fn test_missing_token_rejected() {
        let config = load(&[("DNSBOT_DOMAINS", "example.com")]).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_domains_rejected() {
        let mut vars = minimal();
        vars.retain(|(k, _)| *k != "DNSBOT_DOMAINS");
        assert!(load(&vars).unwrap().validate().is_err());
    }

    #[test]
    fn test_unsupported_provider_rejected() {
        let mut vars = minimal();
        vars.push(("DNSBOT_PROVIDER_TYPE", "route53"));
        assert!(load(&vars).unwrap().validate().is_err());
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let mut vars = minimal();
        vars.push(("DNSBOT_SESSION_IDLE_SECS", "half an hour"));
        let err = load(&vars).unwrap_err();
        assert!(err.to_string().contains("DNSBOT_SESSION_IDLE_SECS"));
    }

    #[test]
    fn test_chat_ids_and_zone_ids() {
        let mut vars = minimal();
        vars.push(("DNSBOT_ALLOWED_CHAT_IDS", "42, -1001234"));
        vars.push(("DNSBOT_CLOUDFLARE_ZONE_IDS", "example.com=z1,example.org=z2"));
        let config = load(&vars).unwrap();
        config.validate().unwrap();

        let bot = config.into_bot_config();
        assert_eq!(bot.telegram.allowed_chat_ids, vec![42, -1001234]);
        match bot.provider {
            ProviderConfig::Cloudflare { zone_ids, .. } => {
                assert_eq!(zone_ids.get("example.org").map(String::as_str), Some("z2"));
            }
            other => panic!("unexpected provider: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_zone_pair_rejected() {
        let mut vars = minimal();
        vars.push(("DNSBOT_CLOUDFLARE_ZONE_IDS", "example.com"));
        assert!(load(&vars).is_err());
    }

    #[test]
    fn test_interval_bounds_flow_into_core_config() {
        let mut vars = minimal();
        vars.push(("DNSBOT_DDNS_MIN_INTERVAL_SECS", "600"));
        let bot = load(&vars).unwrap().into_bot_config();

        assert!(bot.validate().is_ok());
        assert_eq!(bot.ddns.min_interval_secs, 600);
        assert_eq!(bot.ddns.preset_intervals, vec![600]);

        let mut vars = minimal();
        vars.push(("DNSBOT_DDNS_MIN_INTERVAL_SECS", "600"));
        vars.push(("DNSBOT_DDNS_MAX_INTERVAL_SECS", "60"));
        assert!(load(&vars).unwrap().into_bot_config().validate().is_err());
    }

    #[test]
    fn test_log_level_validation() {
        assert_eq!(parse_log_level("DEBUG").unwrap(), Level::DEBUG);
        assert!(parse_log_level("verbose").is_err());
    }

    #[test]
    fn test_domain_name_validation() {
        assert!(validate_domain_name("example.com").is_ok());
        assert!(validate_domain_name("sub-1.example.com").is_ok());
        assert!(validate_domain_name("example..com").is_err());
        assert!(validate_domain_name("-bad.example.com").is_err());
        assert!(validate_domain_name("bad_label.com").is_err());
        assert!(validate_domain_name(&"a".repeat(64)).is_err());
    }
}
