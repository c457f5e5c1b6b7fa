use crate::db::{decimal_to_json, DbError, Row, SqlExecutor};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use duckdb::types::{TimeUnit, Value};
use duckdb::Connection;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

/// Runs statements against a DuckDB database file (or `:memory:`).
pub struct DuckDbExecutor {
    path: String,
}

impl DuckDbExecutor {
    pub fn new(path: String) -> Self {
        Self { path }
    }
}

fn open(path: &str) -> Result<Connection, DbError> {
    let conn = if path == ":memory:" {
        Connection::open_in_memory()
    } else {
        Connection::open(path)
    };
    conn.map_err(|e| DbError::ConnectionError(e.to_string()))
}

#[async_trait]
impl SqlExecutor for DuckDbExecutor {
    async fn execute(&self, sql: &str) -> Result<Vec<Row>, DbError> {
        let path = self.path.clone();
        let sql = sql.to_string();

        // DuckDB is synchronous; keep it off the async workers.
        tokio::task::spawn_blocking(move || {
            let conn = open(&path)?;
            let rows = fetch_all(&conn, &sql);
            // The connection is dropped (closed) here whether or not the fetch succeeded.
            drop(conn);
            rows
        })
        .await
        .map_err(|e| DbError::QueryError(format!("Query task failed: {}", e)))?
    }
}

fn fetch_all(conn: &Connection, sql: &str) -> Result<Vec<Row>, DbError> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| DbError::QueryError(e.to_string()))?;
    let mut rows = stmt
        .query([])
        .map_err(|e| DbError::QueryError(e.to_string()))?;

    // Column names are only known once the statement has run.
    let columns = rows
        .as_ref()
        .map(|stmt| stmt.column_names())
        .unwrap_or_default();

    let mut result = Vec::new();
    while let Some(row) = rows.next().map_err(|e| DbError::QueryError(e.to_string()))? {
        let mut mapped = Row::new();
        for (idx, name) in columns.iter().enumerate() {
            let value: Value = row
                .get(idx)
                .map_err(|e| DbError::QueryError(e.to_string()))?;
            mapped.insert(name.clone(), to_json(value));
        }
        result.push(mapped);
    }

    debug!("DuckDB returned {} rows", result.len());
    Ok(result)
}

fn to_json(value: Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Boolean(v) => json!(v),
        Value::TinyInt(v) => json!(v),
        Value::SmallInt(v) => json!(v),
        Value::Int(v) => json!(v),
        Value::BigInt(v) => json!(v),
        Value::HugeInt(v) => i64::try_from(v)
            .map(|v| json!(v))
            .unwrap_or_else(|_| json!(v.to_string())),
        Value::UTinyInt(v) => json!(v),
        Value::USmallInt(v) => json!(v),
        Value::UInt(v) => json!(v),
        Value::UBigInt(v) => json!(v),
        Value::Float(v) => json!(v),
        Value::Double(v) => json!(v),
        Value::Decimal(v) => decimal_to_json(&v.to_string()),
        Value::Text(v) => json!(v),
        Value::Blob(v) => json!(v),
        Value::Date32(days) => days
            .checked_add(UNIX_EPOCH_DAYS_FROM_CE)
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            .map(|d| json!(d.to_string()))
            // 'infinity'/'-infinity' and anything else chrono cannot represent.
            .unwrap_or_else(|| json!(if days > 0 { "infinity" } else { "-infinity" })),
        Value::Timestamp(unit, v) => DateTime::from_timestamp_micros(to_micros(unit, v))
            .map(|ts| json!(ts.naive_utc().format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
            .unwrap_or(JsonValue::Null),
        Value::Time64(unit, v) => {
            let micros = to_micros(unit, v);
            NaiveTime::from_num_seconds_from_midnight_opt(
                (micros / 1_000_000) as u32,
                ((micros % 1_000_000) * 1_000) as u32,
            )
            .map(|t| json!(t.to_string()))
            .unwrap_or(JsonValue::Null)
        }
        other => json!(format!("{:?}", other)),
    }
}

// 1970-01-01 counted from 0001-01-01 (CE day 1).
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn to_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value * 1_000_000,
        TimeUnit::Millisecond => value * 1_000,
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor_for(path: &std::path::Path) -> DuckDbExecutor {
        DuckDbExecutor::new(path.to_string_lossy().to_string())
    }

    #[tokio::test]
    async fn in_memory_select_preserves_column_order_and_types() {
        let executor = DuckDbExecutor::new(":memory:".to_string());
        let rows = executor
            .execute("SELECT 'Acme Corp' AS name, 42 AS invoices, 1250.50::DECIMAL(10,2) AS total, NULL AS note, true AS active")
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        let columns: Vec<&String> = rows[0].keys().collect();
        assert_eq!(columns, vec!["name", "invoices", "total", "note", "active"]);
        assert_eq!(rows[0]["name"], json!("Acme Corp"));
        assert_eq!(rows[0]["invoices"], json!(42));
        assert_eq!(rows[0]["total"], json!(1250.5));
        assert_eq!(rows[0]["note"], JsonValue::Null);
        assert_eq!(rows[0]["active"], json!(true));
    }

    #[tokio::test]
    async fn dates_are_rendered_as_iso_strings() {
        let executor = DuckDbExecutor::new(":memory:".to_string());
        let rows = executor
            .execute("SELECT DATE '2024-03-15' AS issue_date, TIMESTAMP '2024-03-15 10:30:00' AS created_at")
            .await
            .unwrap();

        assert_eq!(rows[0]["issue_date"], json!("2024-03-15"));
        assert_eq!(rows[0]["created_at"], json!("2024-03-15T10:30:00"));
    }

    #[tokio::test]
    async fn each_call_sees_committed_data_in_a_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoices.duckdb");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE vendors (id INTEGER, name VARCHAR);
                 INSERT INTO vendors VALUES (1, 'Acme'), (2, 'Globex'), (3, 'Initech');",
            )
            .unwrap();
        }

        let executor = executor_for(&path);
        let rows = executor
            .execute("SELECT id, name FROM vendors ORDER BY id")
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2]["name"], json!("Initech"));

        let empty = executor
            .execute("SELECT * FROM vendors WHERE id > 100")
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn invalid_sql_is_a_query_error() {
        let executor = DuckDbExecutor::new(":memory:".to_string());
        let err = executor.execute("SELEC nonsense").await.unwrap_err();
        assert!(matches!(err, DbError::QueryError(_)));
        assert!(err.to_string().starts_with("Database error:"));
    }

    #[tokio::test]
    async fn missing_table_is_a_query_error() {
        let executor = DuckDbExecutor::new(":memory:".to_string());
        let err = executor.execute("SELECT * FROM payments").await.unwrap_err();
        assert!(matches!(err, DbError::QueryError(_)));
    }

    #[tokio::test]
    async fn unreachable_database_is_a_connection_error() {
        let executor = DuckDbExecutor::new("/nonexistent-dir/for/sure/invoices.duckdb".to_string());
        let err = executor.ping().await.unwrap_err();
        assert!(matches!(err, DbError::ConnectionError(_)));
    }

    #[test]
    fn decimal_text_becomes_a_number() {
        assert_eq!(decimal_to_json("19.99"), json!(19.99));
        assert_eq!(decimal_to_json("not-a-number"), json!("not-a-number"));
    }

    #[test]
    fn out_of_range_dates_do_not_overflow() {
        assert_eq!(to_json(Value::Date32(i32::MAX)), json!("infinity"));
        assert_eq!(to_json(Value::Date32(-i32::MAX)), json!("-infinity"));
        assert_eq!(to_json(Value::Date32(19_797)), json!("2024-03-15"));
    }
}
