use crate::db::{DatabaseManager, Row};
use crate::llm::{LlmError, LlmManager};
use std::fmt;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Why a question produced no SQL at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    Configuration(String),
    Generation(String),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::Configuration(msg) => write!(f, "{}", msg),
            QueryError::Generation(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for QueryError {}

impl From<LlmError> for QueryError {
    fn from(err: LlmError) -> Self {
        if err.is_configuration() {
            QueryError::Configuration(err.to_string())
        } else {
            QueryError::Generation(err.to_string())
        }
    }
}

/// Result of one question: no SQL, SQL that failed to run, or SQL plus its rows.
#[derive(Debug)]
pub enum QueryOutcome {
    Failed(QueryError),
    PartialSuccess { sql: String, error: String },
    Success { sql: String, data: Vec<Row> },
}

/// Generate SQL for `question`, then run it.
///
/// Generation problems are fatal. Execution problems are reported next to the SQL that
/// was attempted, since a wrong statement is an expected outcome of generation.
pub async fn run_query(llm: &LlmManager, db: &DatabaseManager, question: &str) -> QueryOutcome {
    let start_time = Instant::now();
    info!("Processing question: {}", question);

    // Checked up front so a missing database does not cost an LLM call.
    if !db.is_configured() {
        error!("Query rejected: DATABASE_URL is not configured");
        return QueryOutcome::Failed(QueryError::Configuration(
            "DATABASE_URL is not configured".to_string(),
        ));
    }

    let sql = match llm.generate_sql(question).await {
        Ok(sql) => sql,
        Err(e) => {
            error!("SQL generation failed: {}", e);
            return QueryOutcome::Failed(e.into());
        }
    };
    debug!("Generated SQL: {}", sql);

    match db.execute(&sql).await {
        Ok(data) => {
            info!(
                "Query executed successfully. Row count: {}, Execution time: {}ms",
                data.len(),
                start_time.elapsed().as_millis()
            );
            QueryOutcome::Success { sql, data }
        }
        Err(e) => {
            warn!("SQL execution failed for `{}`: {}", sql, e);
            QueryOutcome::PartialSuccess {
                sql,
                error: format!("SQL execution failed: {}", e),
            }
        }
    }
}
