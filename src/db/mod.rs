pub mod duckdb_exec;
pub mod postgres_exec;

use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use tracing::debug;

/// One result row: column name to value, in the column order the engine returned.
pub type Row = serde_json::Map<String, serde_json::Value>;

#[derive(Debug)]
pub enum DbError {
    NotConfigured(String),
    ConnectionError(String),
    QueryError(String),
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::NotConfigured(msg) => write!(f, "{}", msg),
            DbError::ConnectionError(msg) => write!(f, "Database error: {}", msg),
            DbError::QueryError(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl Error for DbError {}

#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Opens a connection for this call only, runs `sql`, returns every row.
    async fn execute(&self, sql: &str) -> Result<Vec<Row>, DbError>;

    /// Trial connection used by the health endpoint.
    async fn ping(&self) -> Result<(), DbError> {
        self.execute("SELECT 1").await.map(|_| ())
    }
}

/// Where `DATABASE_URL` points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    Postgres(String),
    DuckDb(String),
}

impl DatabaseTarget {
    pub fn parse(url: &str) -> Result<Self, DbError> {
        let url = url.trim();
        let (scheme, rest) = url.split_once("://").ok_or_else(|| {
            DbError::NotConfigured(format!("DATABASE_URL has no scheme: {}", redact(url)))
        })?;

        // `postgresql+psycopg://` and friends name a client driver, not a different engine.
        let base_scheme = scheme.split('+').next().unwrap_or(scheme).to_ascii_lowercase();

        match base_scheme.as_str() {
            "postgresql" | "postgres" => Ok(DatabaseTarget::Postgres(format!(
                "postgresql://{}",
                rest
            ))),
            "duckdb" if !rest.is_empty() => Ok(DatabaseTarget::DuckDb(rest.to_string())),
            "duckdb" => Err(DbError::NotConfigured(
                "DATABASE_URL for duckdb needs a path, e.g. duckdb://invoices.db".to_string(),
            )),
            other => Err(DbError::NotConfigured(format!(
                "Unsupported database scheme: {}",
                other
            ))),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            DatabaseTarget::Postgres(_) => "postgres",
            DatabaseTarget::DuckDb(_) => "duckdb",
        }
    }
}

/// Strips the password from a connection URL before it goes into a log line.
pub fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            let credentials = &url[scheme_end + 3..at];
            match credentials.split_once(':') {
                Some((user, _)) => format!("{}{}:***{}", &url[..scheme_end + 3], user, &url[at..]),
                None => url.to_string(),
            }
        }
        _ => url.to_string(),
    }
}

/// NUMERIC/DECIMAL text to a JSON number; falls back to the text if it does not fit an f64.
pub fn decimal_to_json(text: &str) -> serde_json::Value {
    match text.parse::<f64>() {
        Ok(num) => serde_json::Number::from_f64(num)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::json!(text)),
        Err(_) => serde_json::json!(text),
    }
}

pub struct DatabaseManager {
    executor: Option<Box<dyn SqlExecutor + Send + Sync>>,
}

impl DatabaseManager {
    /// A missing URL is allowed; queries then fail with `DbError::NotConfigured`.
    pub fn new(url: Option<&str>) -> Result<Self, DbError> {
        let Some(url) = url else {
            return Ok(Self { executor: None });
        };

        let target = DatabaseTarget::parse(url)?;
        debug!("Database backend: {} ({})", target.backend_name(), redact(url));

        let executor: Box<dyn SqlExecutor + Send + Sync> = match target {
            DatabaseTarget::Postgres(url) => Box::new(postgres_exec::PostgresExecutor::new(url)),
            DatabaseTarget::DuckDb(path) => Box::new(duckdb_exec::DuckDbExecutor::new(path)),
        };

        Ok(Self {
            executor: Some(executor),
        })
    }

    #[cfg(test)]
    pub fn with_executor(executor: Box<dyn SqlExecutor + Send + Sync>) -> Self {
        Self {
            executor: Some(executor),
        }
    }

    #[cfg(test)]
    pub fn unconfigured() -> Self {
        Self { executor: None }
    }

    pub fn is_configured(&self) -> bool {
        self.executor.is_some()
    }

    pub async fn execute(&self, sql: &str) -> Result<Vec<Row>, DbError> {
        self.executor()?.execute(sql).await
    }

    pub async fn ping(&self) -> Result<(), DbError> {
        self.executor()?.ping().await
    }

    fn executor(&self) -> Result<&(dyn SqlExecutor + Send + Sync), DbError> {
        self.executor
            .as_deref()
            .ok_or_else(|| DbError::NotConfigured("DATABASE_URL is not configured".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_qualified_scheme_is_normalized() {
        let target = DatabaseTarget::parse("postgresql+psycopg://app:secret@db:5432/invoices").unwrap();
        assert_eq!(
            target,
            DatabaseTarget::Postgres("postgresql://app:secret@db:5432/invoices".to_string())
        );
    }

    #[test]
    fn plain_postgres_schemes_are_accepted() {
        assert_eq!(
            DatabaseTarget::parse("postgres://localhost/app").unwrap(),
            DatabaseTarget::Postgres("postgresql://localhost/app".to_string())
        );
        assert_eq!(
            DatabaseTarget::parse("postgresql://localhost/app").unwrap(),
            DatabaseTarget::Postgres("postgresql://localhost/app".to_string())
        );
    }

    #[test]
    fn duckdb_targets_keep_their_path() {
        assert_eq!(
            DatabaseTarget::parse("duckdb://:memory:").unwrap(),
            DatabaseTarget::DuckDb(":memory:".to_string())
        );
        assert_eq!(
            DatabaseTarget::parse("duckdb:///var/lib/invoices.duckdb").unwrap(),
            DatabaseTarget::DuckDb("/var/lib/invoices.duckdb".to_string())
        );
        assert!(DatabaseTarget::parse("duckdb://").is_err());
    }

    #[test]
    fn unknown_schemes_are_rejected() {
        assert!(DatabaseTarget::parse("mysql://localhost/app").is_err());
        assert!(DatabaseTarget::parse("localhost:5432").is_err());
    }

    #[test]
    fn redact_hides_password_only() {
        assert_eq!(
            redact("postgresql://app:secret@db:5432/invoices"),
            "postgresql://app:***@db:5432/invoices"
        );
        assert_eq!(redact("duckdb://:memory:"), "duckdb://:memory:");
    }

    #[tokio::test]
    async fn unconfigured_manager_reports_configuration_error() {
        let manager = DatabaseManager::new(None).unwrap();
        assert!(!manager.is_configured());

        let err = manager.execute("SELECT 1").await.unwrap_err();
        assert!(matches!(err, DbError::NotConfigured(_)));
        assert_eq!(err.to_string(), "DATABASE_URL is not configured");
    }

    #[tokio::test]
    async fn duckdb_manager_executes_queries() {
        let manager = DatabaseManager::new(Some("duckdb://:memory:")).unwrap();
        let rows = manager.execute("SELECT 7 AS lucky").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["lucky"], serde_json::json!(7));
        manager.ping().await.unwrap();
    }
}
