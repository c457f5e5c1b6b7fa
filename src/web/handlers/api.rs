use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::db::Row;
use crate::pipeline::{run_query, QueryError, QueryOutcome};
use crate::web::state::AppState;

const SERVICE_NAME: &str = "vanna-ai";

// Query types

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub sql: String,
    pub data: Vec<Row>,
    pub error: Option<String>,
}

/// Request-level failure, rendered as `{"detail": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    detail: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: &self.detail })).into_response()
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: err.to_string(),
        }
    }
}

impl IntoResponse for QueryOutcome {
    fn into_response(self) -> Response {
        match self {
            QueryOutcome::Failed(err) => ApiError::from(err).into_response(),
            QueryOutcome::PartialSuccess { sql, error } => Json(QueryResponse {
                sql,
                data: Vec::new(),
                error: Some(error),
            })
            .into_response(),
            QueryOutcome::Success { sql, data } => Json(QueryResponse {
                sql,
                data,
                error: None,
            })
            .into_response(),
        }
    }
}

// Service info and health types

#[derive(Debug, Serialize)]
pub struct Endpoints {
    pub health: &'static str,
    pub query: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub message: &'static str,
    pub version: &'static str,
    pub endpoints: Endpoints,
    pub status: &'static str,
}

#[derive(Debug, Default, Deserialize)]
pub struct HealthParams {
    #[serde(default)]
    pub check_connection: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub service: &'static str,
    pub status: &'static str,
    pub database_configured: bool,
    pub groq_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_connected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// API Implementations

pub async fn service_info(State(state): State<Arc<AppState>>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "Vanna AI Query Service",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: Endpoints {
            health: "/health",
            query: "/query (POST)",
        },
        status: if state.fully_configured() {
            "running"
        } else {
            "configured"
        },
    })
}

// Never fails; problems are reported in the body.
pub async fn health(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HealthParams>,
) -> Json<HealthReport> {
    let database_configured = state.db_manager.is_configured();
    let groq_configured = state.llm_manager.is_configured();

    let mut report = HealthReport {
        service: SERVICE_NAME,
        status: "ok",
        database_configured,
        groq_configured,
        database_connected: None,
        database_error: None,
        message: None,
    };

    if !database_configured || !groq_configured {
        report.status = "warning";
        report.message = Some("Some environment variables are missing".to_string());
    }

    if params.check_connection && database_configured {
        match state.db_manager.ping().await {
            Ok(()) => report.database_connected = Some(true),
            Err(e) => {
                warn!("Health check could not reach the database: {}", e);
                report.status = "error";
                report.database_connected = Some(false);
                report.database_error = Some(e.to_string());
            }
        }
    }

    Json(report)
}

// Natural language query; `run_query` logs failures.
pub async fn nl_query(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QueryRequest>,
) -> QueryOutcome {
    run_query(&state.llm_manager, &state.db_manager, &payload.query).await
}
