//! HTTP API for the Q&A tutor

mod handlers;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::oracle::TutorOracle;
use crate::runtime::{ConversationStore, SessionManager, SessionSettings};
use std::sync::Arc;

/// Session manager as used by the HTTP layer
pub type SharedManager = SessionManager<Arc<dyn ConversationStore>, Arc<dyn TutorOracle>>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SharedManager>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        oracle: Arc<dyn TutorOracle>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            sessions: Arc::new(SessionManager::new(store, oracle, settings)),
        }
    }
}
