use crate::db::DatabaseManager;
use crate::llm::LlmManager;

/// Shared application state for the web server. Immutable after start-up.
pub struct AppState {
    pub llm_manager: LlmManager,
    pub db_manager: DatabaseManager,
}

impl AppState {
    pub fn new(llm_manager: LlmManager, db_manager: DatabaseManager) -> Self {
        Self {
            llm_manager,
            db_manager,
        }
    }

    /// Both the database target and the LLM credential are present.
    pub fn fully_configured(&self) -> bool {
        self.db_manager.is_configured() && self.llm_manager.is_configured()
    }
}
