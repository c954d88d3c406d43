//! Tutoring sessions
//!
//! One `SessionController` per student, held by the `SessionManager`.
//! Sessions never share state; the shared pieces are the stateless
//! services in `SessionServices`.

mod controller;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use controller::{
    ChatReply, DocumentStatus, FinalizeOutcome, SessionController, SessionError, SessionServices,
    SessionView,
};
pub use traits::*;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Shared handle to one session; the mutex serializes its operations
pub type SessionHandle = Arc<Mutex<SessionController>>;

/// Registry of live sessions
pub struct SessionManager {
    services: SessionServices,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionManager {
    pub fn new(services: SessionServices) -> Self {
        Self {
            services,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Start a fresh session at the intake stage
    pub async fn create(&self) -> (String, SessionHandle) {
        let id = uuid::Uuid::new_v4().to_string();
        let handle = Arc::new(Mutex::new(SessionController::new(
            id.clone(),
            self.services.clone(),
        )));
        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::clone(&handle));
        tracing::info!(session_id = %id, "Session created");
        (id, handle)
    }

    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Drop a session; unsaved state is lost
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            tracing::info!(session_id = %id, "Session closed");
        }
        removed
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
