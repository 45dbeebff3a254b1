//! Plugin-based provider registry
//!
//! DNS providers and IP resolvers are registered by type name and
//! instantiated from configuration, so the daemon never hardcodes which
//! implementations exist.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dnsbot_core::registry::ProviderRegistry;
//!
//! let registry = ProviderRegistry::new();
//! dnsbot_provider_cloudflare::register(&registry);
//! dnsbot_ip_http::register(&registry);
//!
//! let provider = registry.create_provider(&config.provider)?;
//! let resolver = registry.create_ip_resolver(&config.ip_resolver)?;
//! ```

use crate::config::{IpResolverConfig, ProviderConfig};
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, DnsProviderFactory, IpResolver, IpResolverFactory};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Provider registry for plugin-based provider and resolver creation
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered DNS provider factories
    providers: RwLock<HashMap<String, Box<dyn DnsProviderFactory>>>,

    /// Registered IP resolver factories
    ip_resolvers: RwLock<HashMap<String, Box<dyn IpResolverFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DNS provider factory
    ///
    /// # Parameters
    ///
    /// - `name`: Provider type name (e.g., "cloudflare")
    /// - `factory`: Factory object for creating provider instances
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn DnsProviderFactory>) {
        let mut providers = self.providers.write().unwrap_or_else(PoisonError::into_inner);
        providers.insert(name.into(), factory);
    }

    /// Register an IP resolver factory
    pub fn register_ip_resolver(
        &self,
        name: impl Into<String>,
        factory: Box<dyn IpResolverFactory>,
    ) {
        let mut resolvers = self.ip_resolvers.write().unwrap_or_else(PoisonError::into_inner);
        resolvers.insert(name.into(), factory);
    }

    /// Create a DNS provider from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn DnsProvider>)`: Created provider instance
    /// - `Err(Error)`: If provider type is not registered or creation fails
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        let provider_type = config.type_name();
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config)
    }

    /// Create an IP resolver from configuration
    pub fn create_ip_resolver(&self, config: &IpResolverConfig) -> Result<Box<dyn IpResolver>> {
        let resolver_type = config.type_name();
        let resolvers = self.ip_resolvers.read().unwrap_or_else(PoisonError::into_inner);

        let factory = resolvers.get(resolver_type).ok_or_else(|| {
            Error::config(format!("Unknown IP resolver type: {}", resolver_type))
        })?;

        factory.create(config)
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// List all registered IP resolver types
    pub fn list_ip_resolvers(&self) -> Vec<String> {
        let resolvers = self.ip_resolvers.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = resolvers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_provider(&self, name: &str) -> bool {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn has_ip_resolver(&self, name: &str) -> bool {
        self.ip_resolvers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }
}
