pub mod fence;
pub mod models;
pub mod prompt;
pub mod providers;

use crate::config::LlmConfig;
use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug)]
pub enum LlmError {
    ConnectionError(String),
    ResponseError(String),
    ConfigError(String),
}

impl LlmError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, LlmError::ConfigError(_))
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::ConnectionError(msg) => write!(f, "LLM connection error: {}", msg),
            LlmError::ResponseError(msg) => write!(f, "LLM response error: {}", msg),
            LlmError::ConfigError(msg) => write!(f, "{}", msg),
        }
    }
}

impl Error for LlmError {}

/// A completion backend. Returns the model's raw text; cleanup happens in `LlmManager`.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    async fn generate_sql(&self, question: &str, schema: &str) -> Result<String, LlmError>;
}

pub struct LlmManager {
    generator: Option<Box<dyn SqlGenerator + Send + Sync>>,
}

impl LlmManager {
    /// Without an API key the manager starts unconfigured and every call fails.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        if config.api_key.is_none() {
            return Ok(Self { generator: None });
        }

        let generator: Box<dyn SqlGenerator + Send + Sync> = match config.backend.as_str() {
            "groq" | "remote" => Box::new(providers::remote::RemoteLlmProvider::new(config)?),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Self {
            generator: Some(generator),
        })
    }

    #[cfg(test)]
    pub fn with_generator(generator: Box<dyn SqlGenerator + Send + Sync>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    #[cfg(test)]
    pub fn unconfigured() -> Self {
        Self { generator: None }
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_some()
    }

    /// Asks the model for SQL answering `question` and strips any code fence from the reply.
    pub async fn generate_sql(&self, question: &str) -> Result<String, LlmError> {
        let generator = self
            .generator
            .as_deref()
            .ok_or_else(|| LlmError::ConfigError("GROQ_API_KEY is not configured".to_string()))?;

        let raw = generator
            .generate_sql(question, prompt::SCHEMA_DESCRIPTION)
            .await?;
        debug!("Raw completion: {}", raw);

        let sql = fence::strip_code_fences(&raw);
        if sql.is_empty() {
            return Err(LlmError::ResponseError(
                "Completion contained no SQL".to_string(),
            ));
        }

        // Generated statements run unchecked; make writes visible in the logs at least.
        if !fence::is_read_only(&sql) {
            warn!("Generated SQL is not a read-only statement: {}", sql);
        }

        Ok(sql)
    }
}
