//! Scope session management.
//!
//! Each MCP client scope owns a [`Scope`] and the accessor instances created
//! in it. Closing the session cancels the scope, which releases every hive
//! those instances cached.

use crate::accessor::{AccessorRegistry, FileSystemAccessor};
use crate::error::AccessorResult;
use crate::scope::Scope;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A single client scope.
pub struct ScopeSession {
    pub id: String,
    pub scope: Scope,
    /// Accessor instances, one per scheme, created on first use.
    accessors: Mutex<HashMap<String, Arc<dyn FileSystemAccessor>>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl ScopeSession {
    fn new(id: String) -> Self {
        ScopeSession {
            id,
            scope: Scope::new(),
            accessors: Mutex::new(HashMap::new()),
            created_at: chrono::Utc::now(),
        }
    }

    /// The instance of `scheme` bound to this scope.
    pub fn accessor(
        &self,
        registry: &Arc<AccessorRegistry>,
        scheme: &str,
    ) -> AccessorResult<Arc<dyn FileSystemAccessor>> {
        let mut accessors = self.accessors.lock();
        if let Some(accessor) = accessors.get(scheme) {
            return Ok(accessor.clone());
        }
        let accessor = registry.resolve(scheme, &self.scope)?;
        accessors.insert(scheme.to_string(), accessor.clone());
        Ok(accessor)
    }

    pub fn accessor_schemes(&self) -> Vec<String> {
        let mut schemes: Vec<String> = self.accessors.lock().keys().cloned().collect();
        schemes.sort();
        schemes
    }
}

/// Session store shared by the server's tool handlers.
#[derive(Clone, Default)]
pub struct ScopeStore {
    sessions: Arc<RwLock<HashMap<String, Arc<ScopeSession>>>>,
}

impl ScopeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new scope and return it.
    pub async fn create(&self) -> Arc<ScopeSession> {
        let id = uuid::Uuid::new_v4().to_string();
        let session = Arc::new(ScopeSession::new(id.clone()));
        self.sessions.write().await.insert(id, session.clone());
        session
    }

    pub async fn get(&self, id: &str) -> Option<Arc<ScopeSession>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Remove a scope, cancel it and wait for its teardowns.
    ///
    /// Returns false if no such scope exists.
    pub async fn close(&self, id: &str) -> bool {
        let session = match self.sessions.write().await.remove(id) {
            Some(s) => s,
            None => return false,
        };
        // Joining watcher threads blocks.
        let scope = session.scope.clone();
        if tokio::task::spawn_blocking(move || scope.close()).await.is_err() {
            tracing::warn!("scope {}: teardown task failed", id);
        }
        true
    }

    /// Snapshot of all scopes: (id, accessor schemes, created_at).
    pub async fn list(&self) -> Vec<(String, Vec<String>, String)> {
        let sessions = self.sessions.read().await;
        let mut result: Vec<_> = sessions
            .values()
            .map(|s| (s.id.clone(), s.accessor_schemes(), s.created_at.to_rfc3339()))
            .collect();
        result.sort_by(|a, b| a.2.cmp(&b.2));
        result
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
