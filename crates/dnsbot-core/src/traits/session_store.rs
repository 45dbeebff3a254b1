// # Session Store Trait
//
// Defines keyed storage of per-chat conversation state.
//
// ## Purpose
//
// A session exists only while a workflow is in progress; there is at most one
// per chat. Handlers read a copy, mutate it, and write it back. Nothing is
// persisted: a restart drops every in-progress workflow.
//
// ## Implementations
//
// - In-memory: [`MemorySessionStore`](crate::session::MemorySessionStore)

use async_trait::async_trait;
use std::time::Duration;

use crate::model::ChatId;
use crate::session::Session;

/// Trait for session store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks. Each
/// call is atomic on its own; read-modify-write sequences spanning several
/// calls are serialized per chat by [`ChatQueue`](crate::dispatch::ChatQueue).
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Get a copy of the chat's session
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Session))`: a workflow is in progress
    /// - `Ok(None)`: no session
    async fn get(&self, chat_id: ChatId) -> Result<Option<Session>, crate::Error>;

    /// Insert or replace the chat's session, stamping its last activity
    async fn put(&self, session: Session) -> Result<(), crate::Error>;

    /// Delete the chat's session
    ///
    /// # Returns
    ///
    /// `true` if a session existed
    async fn delete(&self, chat_id: ChatId) -> Result<bool, crate::Error>;

    /// Refresh the chat's last activity
    ///
    /// # Returns
    ///
    /// `true` if a session existed
    async fn touch(&self, chat_id: ChatId) -> Result<bool, crate::Error>;

    /// Evict every session idle for longer than `max_idle`
    ///
    /// # Returns
    ///
    /// The chats whose sessions were evicted
    async fn evict_idle(&self, max_idle: Duration) -> Result<Vec<ChatId>, crate::Error>;

    /// Number of live sessions
    async fn len(&self) -> Result<usize, crate::Error>;
}
