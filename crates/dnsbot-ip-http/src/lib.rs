// # HTTP IP Resolver
//
// Discovers the host's public address by asking a plain-text lookup service
// (ipify and friends) over HTTP.
//
// ## Behavior
//
// - One URL per address family; an A record asks the IPv4 service, an AAAA
//   record the IPv6 one
// - One request per call, no caching and no retries (the DDNS scheduler
//   simply tries again on its next tick)
// - An answer of the wrong family is an error, never silently accepted

use async_trait::async_trait;
use dnsbot_core::ProviderRegistry;
use dnsbot_core::config::IpResolverConfig;
use dnsbot_core::model::IpFamily;
use dnsbot_core::traits::{IpResolver, IpResolverFactory};
use dnsbot_core::{Error, Result};

use std::net::IpAddr;
use std::time::Duration;

/// Default lookup service for IPv4
pub const DEFAULT_V4_URL: &str = "https://api.ipify.org";

/// Default lookup service for IPv6
pub const DEFAULT_V6_URL: &str = "https://api6.ipify.org";

/// HTTP-based public IP resolver
#[derive(Debug, Clone)]
pub struct HttpIpResolver {
    v4_url: String,
    v6_url: String,
    client: reqwest::Client,
}

impl HttpIpResolver {
    /// Create a resolver
    ///
    /// # Parameters
    ///
    /// - `v4_url`: service answering with the public IPv4 address
    /// - `v6_url`: service answering with the public IPv6 address
    /// - `timeout`: per-request timeout
    pub fn new(
        v4_url: impl Into<String>,
        v6_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            v4_url: v4_url.into(),
            v6_url: v6_url.into(),
            client,
        })
    }

    fn url(&self, family: IpFamily) -> &str {
        match family {
            IpFamily::V4 => &self.v4_url,
            IpFamily::V6 => &self.v6_url,
        }
    }
}

#[async_trait]
impl IpResolver for HttpIpResolver {
    async fn current_ip(&self, family: IpFamily) -> Result<IpAddr> {
        let url = self.url(family);
        tracing::debug!("Resolving public {} address via {}", family, url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::ip_resolver(format!("Request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::ip_resolver(format!(
                "{} answered HTTP {}",
                url,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::ip_resolver(format!("Failed to read response: {}", e)))?;

        parse_answer(&body, family)
    }

    fn resolver_name(&self) -> &'static str {
        "http"
    }
}

/// Parse a plain-text lookup answer and check its family
fn parse_answer(body: &str, family: IpFamily) -> Result<IpAddr> {
    let text = body.trim();
    let ip: IpAddr = text
        .parse()
        .map_err(|_| Error::ip_resolver(format!("Invalid IP address: {}", text)))?;

    if IpFamily::of(&ip) != family {
        return Err(Error::ip_resolver(format!("Expected {}, got: {}", family, ip)));
    }
    Ok(ip)
}

/// Factory for creating HTTP IP resolvers
pub struct HttpFactory;

impl IpResolverFactory for HttpFactory {
    fn create(&self, config: &IpResolverConfig) -> Result<Box<dyn IpResolver>> {
        match config {
            IpResolverConfig::Http {
                v4_url,
                v6_url,
                timeout_secs,
            } => Ok(Box::new(HttpIpResolver::new(
                v4_url.clone(),
                v6_url.clone(),
                Duration::from_secs(*timeout_secs),
            )?)),
            _ => Err(Error::config("Invalid config for HTTP IP resolver")),
        }
    }
}

/// Register the HTTP IP resolver with a registry
pub fn register(registry: &ProviderRegistry) {
    registry.register_ip_resolver("http", Box::new(HttpFactory));
}
