use crate::db::{decimal_to_json, DbError, Row, SqlExecutor};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat};
use serde_json::{json, Value as JsonValue};
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Column, Connection, Executor, Row as _, TypeInfo, ValueRef};
use std::iter::Peekable;
use std::str::Chars;
use tracing::{debug, warn};

/// Runs statements against PostgreSQL, one connection per call.
///
/// Statements go through the simple query protocol, so every value arrives in
/// Postgres' text format and is mapped to JSON by column type name.
pub struct PostgresExecutor {
    url: String,
}

impl PostgresExecutor {
    pub fn new(url: String) -> Self {
        Self { url }
    }
}

#[async_trait]
impl SqlExecutor for PostgresExecutor {
    async fn execute(&self, sql: &str) -> Result<Vec<Row>, DbError> {
        let mut conn = PgConnection::connect(&self.url)
            .await
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;

        let fetched = (&mut conn).fetch_all(sqlx::raw_sql(sql)).await;

        // Close before looking at the result so every exit path releases the connection.
        if let Err(e) = conn.close().await {
            warn!("Failed to close database connection cleanly: {}", e);
        }

        let rows = fetched.map_err(|e| DbError::QueryError(e.to_string()))?;
        debug!("PostgreSQL returned {} rows", rows.len());

        rows.iter().map(row_to_json).collect()
    }
}

fn row_to_json(row: &PgRow) -> Result<Row, DbError> {
    let mut mapped = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        mapped.insert(column.name().to_string(), column_value(row, idx)?);
    }
    Ok(mapped)
}

fn column_value(row: &PgRow, idx: usize) -> Result<JsonValue, DbError> {
    let raw = row
        .try_get_raw(idx)
        .map_err(|e| DbError::QueryError(e.to_string()))?;
    if raw.is_null() {
        return Ok(JsonValue::Null);
    }
    let type_name = raw.type_info().name().to_string();
    let text = raw
        .as_str()
        .map_err(|e| DbError::QueryError(format!("column {}: {}", idx, e)))?;

    Ok(text_to_json(&type_name, text))
}

/// Maps one value in Postgres text output format to JSON.
///
/// Numbers, booleans, JSON and arrays keep their shape. Timestamps are rewritten to
/// ISO-8601. Anything else (INTERVAL, MONEY, UUID, enums, domains) stays as Postgres
/// printed it.
fn text_to_json(type_name: &str, text: &str) -> JsonValue {
    if let Some(element_type) = type_name.strip_suffix("[]") {
        return match parse_array(text) {
            Some(items) => array_to_json(element_type, items),
            None => {
                warn!("Could not parse {} value, returning it as text", type_name);
                json!(text)
            }
        };
    }

    match type_name {
        "BOOL" => match text {
            "t" => json!(true),
            "f" => json!(false),
            other => json!(other),
        },
        "INT2" | "INT4" | "INT8" | "OID" => text
            .parse::<i64>()
            .map(|v| json!(v))
            .unwrap_or_else(|_| json!(text)),
        // NaN and Infinity have no JSON number, so they stay text.
        "FLOAT4" | "FLOAT8" | "NUMERIC" => decimal_to_json(text),
        "TIMESTAMP" => NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
            .map(|ts| json!(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
            .unwrap_or_else(|_| json!(text)),
        "TIMESTAMPTZ" => DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z")
            .map(|ts| json!(ts.to_rfc3339_opts(SecondsFormat::AutoSi, false)))
            .unwrap_or_else(|_| json!(text)),
        "JSON" | "JSONB" => serde_json::from_str(text).unwrap_or_else(|_| json!(text)),
        _ => json!(text),
    }
}

#[derive(Debug, PartialEq)]
enum ArrayItem {
    Null,
    Text(String),
    Nested(Vec<ArrayItem>),
}

fn array_to_json(element_type: &str, items: Vec<ArrayItem>) -> JsonValue {
    JsonValue::Array(
        items
            .into_iter()
            .map(|item| match item {
                ArrayItem::Null => JsonValue::Null,
                ArrayItem::Text(text) => text_to_json(element_type, &text),
                ArrayItem::Nested(inner) => array_to_json(element_type, inner),
            })
            .collect(),
    )
}

/// Parses an array literal such as `{Acme,"Globex Corp",NULL}` or `{{1,2},{3,4}}`.
fn parse_array(text: &str) -> Option<Vec<ArrayItem>> {
    // Arrays with non-default bounds print as `[0:1]={...}`.
    let body = if text.starts_with('[') {
        text.split_once('=')?.1
    } else {
        text
    };

    let mut chars = body.chars().peekable();
    let items = parse_array_level(&mut chars)?;
    match chars.next() {
        None => Some(items),
        Some(_) => None,
    }
}

fn parse_array_level(chars: &mut Peekable<Chars<'_>>) -> Option<Vec<ArrayItem>> {
    if chars.next()? != '{' {
        return None;
    }

    let mut items = Vec::new();
    if chars.peek() == Some(&'}') {
        chars.next();
        return Some(items);
    }

    loop {
        let item = match chars.peek()? {
            '{' => ArrayItem::Nested(parse_array_level(chars)?),
            '"' => {
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next()? {
                        '\\' => value.push(chars.next()?),
                        '"' => break,
                        c => value.push(c),
                    }
                }
                ArrayItem::Text(value)
            }
            _ => {
                let mut value = String::new();
                while let Some(&c) = chars.peek() {
                    if c == ',' || c == '}' {
                        break;
                    }
                    value.push(c);
                    chars.next();
                }
                // Only the unquoted word is NULL; a quoted "NULL" is text.
                if value == "NULL" {
                    ArrayItem::Null
                } else {
                    ArrayItem::Text(value)
                }
            }
        };
        items.push(item);

        match chars.next()? {
            ',' => continue,
            '}' => return Some(items),
            _ => return None,
        }
    }
}
