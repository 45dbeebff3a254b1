// # Memory Session Store
//
// In-memory implementation of SessionStore.
//
// ## Crash Behavior
//
// - All sessions are lost on restart/crash
// - Users have to restart any workflow they were in the middle of
// - DDNS tasks are owned by the scheduler, not by sessions, and are unaffected
//   by eviction (they are still lost on restart)

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::Error;
use crate::clock::{Clock, SystemClock};
use crate::model::ChatId;
use crate::session::Session;
use crate::traits::SessionStore;

/// In-memory session store
///
/// Sessions live in a HashMap protected by a RwLock. `last_activity` is
/// stamped from the injected [`Clock`] on `put` and `touch`.
///
/// # Example
///
/// ```rust,no_run
/// use dnsbot_core::session::{MemorySessionStore, Session, SessionState};
/// use dnsbot_core::traits::SessionStore;
/// use dnsbot_core::model::ChatId;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemorySessionStore::new();
///
///     let session = Session::new(ChatId(42), SessionState::WaitingIp, chrono::Utc::now());
///     store.put(session).await?;
///
///     assert!(store.get(ChatId(42)).await?.is_some());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct MemorySessionStore {
    inner: Arc<RwLock<HashMap<ChatId, Session>>>,
    clock: Arc<dyn Clock>,
}

impl MemorySessionStore {
    /// Create a new empty store on the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a new empty store on the given clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Clear all sessions
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemorySessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySessionStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, chat_id: ChatId) -> Result<Option<Session>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(&chat_id).cloned())
    }

    async fn put(&self, mut session: Session) -> Result<(), Error> {
        session.last_activity = self.clock.now();
        let mut guard = self.inner.write().await;
        guard.insert(session.chat_id, session);
        Ok(())
    }

    async fn delete(&self, chat_id: ChatId) -> Result<bool, Error> {
        let mut guard = self.inner.write().await;
        Ok(guard.remove(&chat_id).is_some())
    }

    async fn touch(&self, chat_id: ChatId) -> Result<bool, Error> {
        let now = self.clock.now();
        let mut guard = self.inner.write().await;
        match guard.get_mut(&chat_id) {
            Some(session) => {
                session.last_activity = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn evict_idle(&self, max_idle: Duration) -> Result<Vec<ChatId>, Error> {
        let max_idle = chrono::Duration::from_std(max_idle)
            .map_err(|e| Error::invalid_input(format!("Idle timeout out of range: {}", e)))?;
        let now = self.clock.now();

        let mut guard = self.inner.write().await;
        let expired: Vec<ChatId> = guard
            .values()
            .filter(|session| now.signed_duration_since(session.last_activity) > max_idle)
            .map(|session| session.chat_id)
            .collect();

        for chat_id in &expired {
            guard.remove(chat_id);
        }

        Ok(expired)
    }

    async fn len(&self) -> Result<usize, Error> {
        Ok(self.inner.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::session::SessionState;

    fn session(chat: i64) -> Session {
        Session::new(ChatId(chat), SessionState::WaitingIp, chrono::Utc::now())
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemorySessionStore::new();

        assert!(store.is_empty().await);

        store.put(session(1)).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 1);

        let retrieved = store.get(ChatId(1)).await.unwrap();
        assert_eq!(retrieved.unwrap().state, SessionState::WaitingIp);

        assert!(store.delete(ChatId(1)).await.unwrap());
        assert!(!store.delete(ChatId(1)).await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_one_session_per_chat() {
        let store = MemorySessionStore::new();

        store.put(session(1)).await.unwrap();
        let mut replacement = session(1);
        replacement.state = SessionState::WaitingProxy;
        store.put(replacement).await.unwrap();

        assert_eq!(store.len().await.unwrap(), 1);
        assert_eq!(
            store.get(ChatId(1)).await.unwrap().unwrap().state,
            SessionState::WaitingProxy
        );
    }

    #[tokio::test]
    async fn test_evict_idle_uses_clock() {
        let clock = ManualClock::default();
        let store = MemorySessionStore::with_clock(Arc::new(clock.clone()));

        store.put(session(1)).await.unwrap();
        clock.advance(chrono::Duration::minutes(20));
        store.put(session(2)).await.unwrap();
        clock.advance(chrono::Duration::minutes(15));

        let evicted = store.evict_idle(Duration::from_secs(30 * 60)).await.unwrap();

        assert_eq!(evicted, vec![ChatId(1)]);
        assert!(store.get(ChatId(2)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_touch_keeps_session_alive() {
        let clock = ManualClock::default();
        let store = MemorySessionStore::with_clock(Arc::new(clock.clone()));

        store.put(session(1)).await.unwrap();
        clock.advance(chrono::Duration::minutes(25));
        assert!(store.touch(ChatId(1)).await.unwrap());
        clock.advance(chrono::Duration::minutes(25));

        let evicted = store.evict_idle(Duration::from_secs(30 * 60)).await.unwrap();
        assert!(evicted.is_empty());
        assert!(!store.touch(ChatId(9)).await.unwrap());
    }
}
