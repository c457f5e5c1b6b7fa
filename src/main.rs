use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

mod config;
mod db;
mod llm;
mod pipeline;
mod util;
mod web;

use crate::config::{AppConfig, CliArgs};
use crate::db::{redact, DatabaseManager};
use crate::llm::LlmManager;
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = AppConfig::new(&args)?;

    init_tracing(config.logging.json);

    match &config.database.url {
        Some(url) => info!("Database target: {}", redact(url)),
        None => warn!("DATABASE_URL environment variable is not set"),
    }
    if !config.llm_configured() {
        warn!("GROQ_API_KEY environment variable is not set");
    }

    let db_manager = match DatabaseManager::new(config.database.url.as_deref()) {
        Ok(manager) => manager,
        Err(e) => {
            error!("Invalid database configuration: {}", e);
            return Err(e.into());
        }
    };

    info!("Initializing LLM manager with backend: {}", config.llm.backend);
    let llm_manager = match LlmManager::new(&config.llm) {
        Ok(manager) => manager,
        Err(e) => {
            error!("Invalid LLM configuration: {}", e);
            return Err(e.into());
        }
    };

    let app_state = Arc::new(AppState::new(llm_manager, db_manager));

    info!("Starting query service on {}:{}", config.web.host, config.web.port);
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e);
        }
    }

    Ok(())
}
