//! Session registry and lifecycle management

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use story_mcp_core::{Result, StoryMcpError, StoryRuntime};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A live, addressable story interpreter instance.
///
/// The runtime sits behind a `tokio::sync::Mutex`: operations on different
/// sessions run concurrently, operations on the same session serialize and
/// each sees the previous one's post-state.
pub struct Session {
    id: String,
    runtime: Mutex<Box<dyn StoryRuntime>>,
    saved_state: Mutex<Option<String>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Lock the runtime for exclusive access
    pub async fn runtime(&self) -> MutexGuard<'_, Box<dyn StoryRuntime>> {
        self.runtime.lock().await
    }

    /// Cache the most recent save blob for later `load_state` without args
    pub async fn remember_state(&self, state_json: String) {
        *self.saved_state.lock().await = Some(state_json);
    }

    pub async fn last_saved_state(&self) -> Option<String> {
        self.saved_state.lock().await.clone()
    }
}

/// Registry of active sessions
pub struct SessionManager {
    sessions: DashMap<String, Arc<Session>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Register a fresh runtime under the given id, or a generated UUID.
    ///
    /// The session is fully constructed before insertion, so a concurrent
    /// lookup never observes a partial one. On an id collision the rejected
    /// runtime's execution context is released before the error returns.
    pub async fn create(
        &self,
        runtime: Box<dyn StoryRuntime>,
        session_id: Option<String>,
    ) -> Result<Arc<Session>> {
        let id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());

        match self.sessions.entry(id.clone()) {
            Entry::Occupied(_) => {
                let mut runtime = runtime;
                if let Err(e) = runtime.shutdown().await {
                    warn!(session_id = %id, error = %e, "Shutdown of rejected runtime failed");
                }
                Err(StoryMcpError::SessionExists(id))
            }
            Entry::Vacant(slot) => {
                let session = Arc::new(Session {
                    id: id.clone(),
                    runtime: Mutex::new(runtime),
                    saved_state: Mutex::new(None),
                });
                slot.insert(session.clone());
                info!(session_id = %id, "Session created");
                Ok(session)
            }
        }
    }

    /// Look up a session by id
    pub fn get(&self, session_id: &str) -> Result<Arc<Session>> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoryMcpError::SessionNotFound(session_id.to_string()))
    }

    /// Ids of all live sessions
    pub fn list(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Remove a session and release its runtime resources.
    ///
    /// Idempotent: ending an unknown session returns false rather than
    /// erroring, so client cleanup can retry freely. The runtime's execution
    /// context is released before this returns.
    pub async fn end(&self, session_id: &str) -> bool {
        match self.sessions.remove(session_id) {
            Some((_, session)) => {
                let mut runtime = session.runtime().await;
                if let Err(e) = runtime.shutdown().await {
                    warn!(session_id, error = %e, "Runtime shutdown reported an error");
                }
                info!(session_id, "Session ended");
                true
            }
            None => {
                debug!(session_id, "end_session on unknown session (no-op)");
                false
            }
        }
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
