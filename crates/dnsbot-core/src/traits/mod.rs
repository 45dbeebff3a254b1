//! Core traits for the DNS bot
//!
//! This module defines the abstract interfaces for every external collaborator.
//!
//! - [`DnsProvider`]: Read and mutate DNS records via provider APIs
//! - [`IpResolver`]: Discover the current public address
//! - [`MessagingGateway`] / [`EventSource`]: The chat transport
//! - [`SessionStore`]: Per-chat conversation state

pub mod dns_provider;
pub mod ip_resolver;
pub mod messaging;
pub mod session_store;

pub use dns_provider::{DnsProvider, DnsProviderFactory, UpsertOutcome};
pub use ip_resolver::{IpResolver, IpResolverFactory};
pub use messaging::{Button, EventSource, Keyboard, MessageOptions, MessagingGateway};
pub use session_store::SessionStore;
