//! HTTP API for MathBuddy
//!
//! JSON endpoints for the four-stage wizard. Each session is addressed by
//! id and driven only through its controller.

mod handlers;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::db::Database;
use crate::document::ExternalToolExtractor;
use crate::llm::ModelRegistry;
use crate::render::ResponseRenderer;
use crate::script::Limits;
use crate::session::{DatabaseStorage, RegistryLlmClient, SessionManager, SessionServices};
use crate::system_prompt::ContextInjector;
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub db: Database,
    pub llm_registry: Arc<ModelRegistry>,
}

impl AppState {
    /// Wire production collaborators
    pub fn new(db: Database, llm_registry: Arc<ModelRegistry>, render_timeout: Duration) -> Self {
        let model_id = llm_registry.default_model_id().to_string();
        let services = SessionServices {
            llm: Arc::new(RegistryLlmClient::new(Arc::clone(&llm_registry), model_id)),
            store: Arc::new(DatabaseStorage::new(db.clone())),
            extractor: Arc::new(ExternalToolExtractor::default()),
            renderer: ResponseRenderer::new(Limits::default().with_timeout(render_timeout)),
            injector: ContextInjector::default(),
        };
        Self::with_services(services, db, llm_registry)
    }

    pub fn with_services(
        services: SessionServices,
        db: Database,
        llm_registry: Arc<ModelRegistry>,
    ) -> Self {
        Self {
            sessions: Arc::new(SessionManager::new(services)),
            db,
            llm_registry,
        }
    }
}
