// # DNS Provider Trait
//
// Defines the interface for reading and mutating DNS records via a provider API.
//
// ## Implementations
//
// - Cloudflare: `dnsbot-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use dnsbot_core::DnsProvider;
//
// let records = provider.list_records("www.example.com", false).await?;
// provider
//     .upsert_record("www.example.com", "192.168.1.1".parse()?, RecordType::A, false)
//     .await?;
// ```

use async_trait::async_trait;
use std::net::IpAddr;

use crate::model::{DnsRecordSnapshot, RecordType};

/// Result of an upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Record existed and was changed
    Updated {
        /// The previous content, if it parsed as an address
        previous_ip: Option<IpAddr>,
        /// The new IP address
        new_ip: IpAddr,
    },
    /// Record already had the requested content (no-op)
    Unchanged {
        /// The current IP address
        current_ip: IpAddr,
    },
    /// Record was created (didn't exist before)
    Created {
        /// The created IP address
        new_ip: IpAddr,
    },
}

impl UpsertOutcome {
    /// One-line description for chat replies
    pub fn describe(&self, name: &str) -> String {
        match self {
            UpsertOutcome::Created { new_ip } => format!("Created {} -> {}", name, new_ip),
            UpsertOutcome::Updated {
                previous_ip: Some(previous),
                new_ip,
            } => format!("Updated {}: {} -> {}", name, previous, new_ip),
            UpsertOutcome::Updated {
                previous_ip: None,
                new_ip,
            } => format!("Updated {} -> {}", name, new_ip),
            UpsertOutcome::Unchanged { current_ip } => {
                format!("{} already points to {}", name, current_ip)
            }
        }
    }
}

/// Trait for DNS provider implementations
///
/// Providers are single-shot: one logical operation per call, no retries, no
/// caching, no background tasks. Failures are returned as
/// [`Error::Provider`](crate::Error::Provider) with the reason and, when the
/// API answered, its HTTP status.
///
/// Callers own all coordination. One-shot chat workflows surface errors to the
/// user; the DDNS scheduler retries on its next tick.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Resolve the zone that owns `domain`
    ///
    /// # Returns
    ///
    /// - `Ok(Some(zone_id))`: zone found
    /// - `Ok(None)`: no zone on this account covers the domain
    /// - `Err(Error)`: the lookup itself failed
    async fn resolve_zone_id(&self, domain: &str) -> Result<Option<String>, crate::Error>;

    /// List records
    ///
    /// With `include_all_in_zone == false` only records named exactly `domain`
    /// are returned; with `true` every record in the zone owning `domain` is.
    /// The order is the provider's and is preserved by callers.
    async fn list_records(
        &self,
        domain: &str,
        include_all_in_zone: bool,
    ) -> Result<Vec<DnsRecordSnapshot>, crate::Error>;

    /// Create the record or point the existing one at `ip`
    async fn upsert_record(
        &self,
        domain: &str,
        ip: IpAddr,
        record_type: RecordType,
        proxied: bool,
    ) -> Result<UpsertOutcome, crate::Error>;

    /// Overwrite one specific record, addressed by its IDs
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        name: &str,
        ip: IpAddr,
        record_type: RecordType,
        proxied: bool,
    ) -> Result<(), crate::Error>;

    /// Delete one specific record, addressed by its IDs
    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<(), crate::Error>;

    /// Delete every record named exactly `domain`
    ///
    /// # Returns
    ///
    /// The number of records deleted
    async fn delete_all_records_for_domain(&self, domain: &str) -> Result<usize, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn DnsProvider>, crate::Error>;
}
