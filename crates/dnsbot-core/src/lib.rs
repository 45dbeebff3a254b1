// # dnsbot-core
//
// Core library for the chat-driven DNS / DDNS bot.
//
// ## Architecture Overview
//
// - **ConversationEngine**: per-chat state machine driving the set/get/delete/DDNS workflows
// - **ChatQueue**: serializes events per chat in front of the engine
// - **SessionStore**: per-chat conversation state with idle eviction
// - **Pagination**: page cursor and page-local record selectors
// - **DdnsScheduler**: one recurring, cancellable reconcile task per domain
// - **DnsProvider / IpResolver / MessagingGateway**: traits for every external collaborator
// - **ProviderRegistry**: plugin-based registry for providers and resolvers
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic never touches HTTP or a chat API directly
// 2. **Single writer per chat**: A chat's events are handled one at a time
// 3. **Plugin-Based**: Providers are registered dynamically, no hard-coded if-else
// 4. **Library-First**: The daemon is thin wiring around this crate
// 5. **Process-lifetime state**: Sessions and DDNS tasks are lost on restart

pub mod clock;
pub mod config;
pub mod conversation;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod pagination;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod traits;

// Re-export core types for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BotConfig, DdnsConfig, IpResolverConfig, ProviderConfig};
pub use conversation::{Action, ConversationEngine, DispatchOutcome, EngineSettings, InboundEvent};
pub use dispatch::ChatQueue;
pub use error::{Error, Result};
pub use model::{ChatId, DnsRecordSnapshot, IpFamily, MessageId, RecordType};
pub use registry::ProviderRegistry;
pub use scheduler::{DdnsScheduler, SchedulerEvent};
pub use session::{MemorySessionStore, Session, SessionState};
pub use traits::{DnsProvider, IpResolver, MessagingGateway, SessionStore};
