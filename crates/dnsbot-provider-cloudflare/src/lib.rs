// # Cloudflare DNS Provider
//
// Cloudflare API v4 implementation of `DnsProvider` for the DNS chat bot.
//
// ## Behavior
//
// - One logical operation per call; failures are returned, never retried
// - HTTP timeout of 30 seconds on every request
// - Status codes mapped to readable reasons (401/403, 404, 409, 429, 5xx) and
//   kept on the error so the chat can show them
// - Zone IDs come from configuration when known, otherwise from `GET /zones`
//
// ## Security
//
// - The API token never appears in logs or `Debug` output
// - Construction fails if the token is empty
//
// ## API Reference
//
// - List zones: GET `/zones?name=...`
// - List records: GET `/zones/:zone_id/dns_records?name=...&type=...`
// - Create record: POST `/zones/:zone_id/dns_records`
// - Overwrite record: PUT `/zones/:zone_id/dns_records/:record_id`
// - Delete record: DELETE `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use dnsbot_core::config::ProviderConfig;
use dnsbot_core::model::{DnsRecordSnapshot, RecordType};
use dnsbot_core::traits::{DnsProvider, DnsProviderFactory, UpsertOutcome};
use dnsbot_core::{Error, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::Duration;

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Records fetched per page when listing
const PER_PAGE: u32 = 100;

/// Provider name used in errors and logs
const NAME: &str = "cloudflare";

/// Envelope every v4 response is wrapped in
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Record {
    id: String,
    #[serde(default)]
    zone_id: Option<String>,
    name: String,
    #[serde(rename = "type")]
    record_type: RecordType,
    content: String,
    #[serde(default)]
    proxied: bool,
}

impl Record {
    fn into_snapshot(self, zone_id: &str) -> DnsRecordSnapshot {
        DnsRecordSnapshot {
            id: self.id,
            zone_id: self.zone_id.unwrap_or_else(|| zone_id.to_string()),
            name: self.name,
            record_type: self.record_type,
            content: self.content,
            proxied: self.proxied,
        }
    }
}

/// Cloudflare DNS provider
///
/// Stateless apart from the configured zone map; safe to share behind an `Arc`.
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Known zone IDs by root domain
    zone_ids: BTreeMap<String, String>,

    /// HTTP client for API requests
    client: reqwest::Client,

    base_url: String,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("zone_ids", &self.zone_ids)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:DNS:Edit permissions
    /// - `zone_ids`: Zone IDs by root domain; domains not listed are looked up
    ///
    /// # Errors
    ///
    /// Returns a config error for an empty token or if the HTTP client
    /// cannot be built.
    pub fn new(api_token: impl Into<String>, zone_ids: BTreeMap<String, String>) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        let zone_ids = zone_ids
            .into_iter()
            .map(|(domain, id)| (normalize(&domain), id))
            .collect();

        Ok(Self {
            api_token,
            zone_ids,
            client,
            base_url: CLOUDFLARE_API_BASE.to_string(),
        })
    }

    /// Point the provider at another API endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and unwrap the v4 envelope
    async fn call<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<(T, Option<ResultInfo>)> {
        let response = request
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::provider(NAME, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status.as_u16(), &body, what));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| Error::provider(NAME, format!("Failed to parse response: {}", e)))?;

        if !envelope.success {
            return Err(Error::provider_status(
                NAME,
                format!("{} failed: {}", what, describe(&envelope.errors)),
                status.as_u16(),
            ));
        }

        let result = envelope.result.ok_or_else(|| {
            Error::provider(NAME, format!("{} failed: response has no result", what))
        })?;
        Ok((result, envelope.result_info))
    }

    /// Look up the zone ID for a domain
    ///
    /// Tries the configured map first (longest matching suffix wins), then
    /// asks the API for each candidate zone name from the most to the least
    /// specific.
    async fn lookup_zone(&self, domain: &str) -> Result<Option<String>> {
        let domain = normalize(domain);

        for candidate in candidate_zones(&domain) {
            if let Some(id) = self.zone_ids.get(candidate) {
                tracing::debug!("Using configured zone ID for {}", candidate);
                return Ok(Some(id.clone()));
            }
        }

        for candidate in candidate_zones(&domain) {
            tracing::debug!("Looking up zone ID for {}", candidate);
            let request = self
                .client
                .get(self.url("/zones"))
                .query(&[("name", candidate)]);
            let (zones, _): (Vec<Zone>, _) = self.call(request, "Zone lookup").await?;

            if let Some(zone) = zones.into_iter().next() {
                tracing::debug!("Found zone ID for {}", candidate);
                return Ok(Some(zone.id));
            }
        }

        Ok(None)
    }

    async fn require_zone(&self, domain: &str) -> Result<String> {
        self.lookup_zone(domain)
            .await?
            .ok_or_else(|| Error::not_found(format!("No Cloudflare zone covers {}", domain)))
    }

    /// List records in a zone, following pagination
    async fn fetch_records(
        &self,
        zone_id: &str,
        name: Option<&str>,
        record_type: Option<&RecordType>,
    ) -> Result<Vec<DnsRecordSnapshot>> {
        let mut records = Vec::new();
        let mut page = 1u32;

        loop {
            let mut query = vec![
                ("page", page.to_string()),
                ("per_page", PER_PAGE.to_string()),
            ];
            if let Some(name) = name {
                query.push(("name", name.to_string()));
            }
            if let Some(record_type) = record_type {
                query.push(("type", record_type.as_str().to_string()));
            }

            let request = self
                .client
                .get(self.url(&format!("/zones/{}/dns_records", zone_id)))
                .query(&query);
            let (batch, info): (Vec<Record>, _) = self.call(request, "Record lookup").await?;

            records.extend(batch.into_iter().map(|r| r.into_snapshot(zone_id)));

            let total_pages = info.map(|i| i.total_pages).unwrap_or(1);
            if page >= total_pages {
                break;
            }
            page += 1;
        }

        Ok(records)
    }

    async fn write_record(
        &self,
        zone_id: &str,
        record_id: Option<&str>,
        name: &str,
        ip: IpAddr,
        record_type: &RecordType,
        proxied: bool,
    ) -> Result<()> {
        let payload = serde_json::json!({
            "type": record_type.as_str(),
            "name": name,
            "content": ip.to_string(),
            "ttl": 1,
            "proxied": proxied,
        });

        let request = match record_id {
            Some(id) => self
                .client
                .put(self.url(&format!("/zones/{}/dns_records/{}", zone_id, id))),
            None => self
                .client
                .post(self.url(&format!("/zones/{}/dns_records", zone_id))),
        };

        let _: (serde_json::Value, _) = self
            .call(request.json(&payload), "Record write")
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn resolve_zone_id(&self, domain: &str) -> Result<Option<String>> {
        self.lookup_zone(domain).await
    }

    async fn list_records(
        &self,
        domain: &str,
        include_all_in_zone: bool,
    ) -> Result<Vec<DnsRecordSnapshot>> {
        let zone_id = self.require_zone(domain).await?;
        let name = normalize(domain);
        let filter = (!include_all_in_zone).then_some(name.as_str());

        let records = self.fetch_records(&zone_id, filter, None).await?;
        tracing::debug!("Listed {} record(s) for {}", records.len(), domain);
        Ok(records)
    }

    /// Create the record, or point the first matching one at `ip`
    ///
    /// A record already holding `ip` with the same proxy flag is left alone.
    async fn upsert_record(
        &self,
        domain: &str,
        ip: IpAddr,
        record_type: RecordType,
        proxied: bool,
    ) -> Result<UpsertOutcome> {
        let name = normalize(domain);
        let zone_id = self.require_zone(&name).await?;
        let existing = self
            .fetch_records(&zone_id, Some(&name), Some(&record_type))
            .await?
            .into_iter()
            .next();

        match existing {
            Some(record) => {
                let previous_ip = record.content.parse::<IpAddr>().ok();
                if previous_ip == Some(ip) && record.proxied == proxied {
                    tracing::info!("DNS record already has correct IP: {} -> {}", name, ip);
                    return Ok(UpsertOutcome::Unchanged { current_ip: ip });
                }

                self.write_record(&zone_id, Some(&record.id), &name, ip, &record_type, proxied)
                    .await?;
                tracing::info!("DNS record updated: {} -> {} (was: {})", name, ip, record.content);
                Ok(UpsertOutcome::Updated {
                    previous_ip,
                    new_ip: ip,
                })
            }
            None => {
                self.write_record(&zone_id, None, &name, ip, &record_type, proxied)
                    .await?;
                tracing::info!("DNS record created: {} -> {}", name, ip);
                Ok(UpsertOutcome::Created { new_ip: ip })
            }
        }
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        name: &str,
        ip: IpAddr,
        record_type: RecordType,
        proxied: bool,
    ) -> Result<()> {
        self.write_record(zone_id, Some(record_id), name, ip, &record_type, proxied)
            .await?;
        tracing::info!("DNS record {} updated: {} -> {}", record_id, name, ip);
        Ok(())
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.url(&format!("/zones/{}/dns_records/{}", zone_id, record_id)));
        let _: (serde_json::Value, _) = self.call(request, "Record delete").await?;
        tracing::info!("DNS record {} deleted", record_id);
        Ok(())
    }

    async fn delete_all_records_for_domain(&self, domain: &str) -> Result<usize> {
        let name = normalize(domain);
        let zone_id = self.require_zone(&name).await?;
        let records = self.fetch_records(&zone_id, Some(&name), None).await?;

        for record in &records {
            self.delete_record(&record.zone_id, &record.id).await?;
        }
        Ok(records.len())
    }

    fn provider_name(&self) -> &'static str {
        NAME
    }
}

fn normalize(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Zone names that could own `domain`, most specific first
///
/// Single-label names are never zones.
fn candidate_zones(domain: &str) -> impl Iterator<Item = &str> {
    let suffixes = domain
        .match_indices('.')
        .map(move |(i, _)| &domain[i + 1..]);

    std::iter::once(domain)
        .chain(suffixes)
        .filter(|name| name.contains('.'))
}

fn describe(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "unknown error".to_string();
    }
    errors
        .iter()
        .map(|e| format!("{} (code {})", e.message, e.code))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Map a non-success HTTP status to a provider error
fn status_error(status: u16, body: &str, what: &str) -> Error {
    let message = match status {
        401 | 403 => {
            "Authentication failed: Invalid API token or insufficient permissions".to_string()
        }
        404 => format!("{} failed: not found", what),
        409 => "Conflict: Record is being updated by another process".to_string(),
        429 => "Rate limit exceeded. Please retry later".to_string(),
        500..=599 => format!("Cloudflare server error (transient): {}", body),
        _ => format!("{} failed: {}", what, body),
    };
    Error::provider_status(NAME, message, status)
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory;

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::Cloudflare {
                api_token,
                zone_ids,
            } => Ok(Box::new(CloudflareProvider::new(
                api_token.clone(),
                zone_ids.clone(),
            )?)),
            _ => Err(Error::config("Invalid config for Cloudflare provider")),
        }
    }
}

/// Register the Cloudflare provider with a registry
///
/// # Example
///
/// ```rust
/// use dnsbot_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// dnsbot_provider_cloudflare::register(&registry);
/// assert!(registry.has_provider("cloudflare"));
/// ```
pub fn register(registry: &dnsbot_core::ProviderRegistry) {
    registry.register_provider(NAME, Box::new(CloudflareFactory));
}
