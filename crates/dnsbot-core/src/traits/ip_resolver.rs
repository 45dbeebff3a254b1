// # External IP Resolver Trait
//
// Defines the interface for discovering this host's public address.
//
// ## Implementations
//
// - HTTP lookup services: `dnsbot-ip-http` crate
//
// The DDNS scheduler calls `current_ip` once per tick for the family the task's
// record type stores (A -> IPv4, AAAA -> IPv6).

use async_trait::async_trait;
use std::net::IpAddr;

use crate::model::IpFamily;

/// Trait for external IP resolver implementations
///
/// Resolvers are observers: they answer "what is the public address right
/// now" and nothing else. No caching beyond a single call, no retries, no
/// decisions about whether DNS needs updating.
#[async_trait]
pub trait IpResolver: Send + Sync {
    /// Resolve the current public address for `family`
    ///
    /// # Returns
    ///
    /// - `Ok(IpAddr)`: an address of the requested family
    /// - `Err(Error)`: lookup failed or answered with the wrong family
    async fn current_ip(&self, family: IpFamily) -> Result<IpAddr, crate::Error>;

    /// Resolver name (for logging/debugging)
    fn resolver_name(&self) -> &'static str;
}

/// Helper trait for constructing IP resolvers from configuration
pub trait IpResolverFactory: Send + Sync {
    /// Create an IpResolver instance from configuration
    fn create(
        &self,
        config: &crate::config::IpResolverConfig,
    ) -> Result<Box<dyn IpResolver>, crate::Error>;
}
