use crate::ai;
use crate::config::Config;
use crate::db::{Database, ReportRow};
use crate::reporting::{self, WorkerOutcome};
use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/api/v1/cron/generate-reports",
            post(generate_reports).get(generate_reports),
        )
        .route("/api/v1/status", get(status))
        .route("/api/v1/reports/:date", get(reports_for_date))
        .route("/api/v1/report/:worker_id/:date", get(report_detail))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct TriggerPayload {
    processed: usize,
    details: Vec<WorkerOutcome>,
}

#[derive(Debug, Serialize)]
struct StatusPayload {
    api_port: u16,
    ai_configured: bool,
    latest_report_date: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReportsPayload {
    date: String,
    count: usize,
    reports: Vec<ReportRow>,
}

/// Scheduler-facing trigger: authorizes against the shared secret, then runs
/// the full pipeline for yesterday (UTC) on a blocking worker thread.
async fn generate_reports(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<Json<TriggerPayload>> {
    authorize(&state.config, &headers)?;

    let config = Arc::clone(&state.config);
    let target_date = reporting::default_target_date();

    let outcomes = tokio::task::spawn_blocking(move || {
        reporting::process_reports(&config, target_date)
    })
    .await
    .context("Report pipeline task panicked")
    .and_then(|result| result)
    .map_err(|err| {
        error!(error = %err, date = %target_date, "report generation failed");
        ApiError::Internal("Failed to generate reports".to_string())
    })?;

    info!(
        date = %target_date,
        processed = outcomes.len(),
        "report trigger completed"
    );

    Ok(Json(TriggerPayload {
        processed: outcomes.len(),
        details: outcomes,
    }))
}

fn authorize(config: &Config, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(secret) = config.resolve_cron_secret() else {
        return Ok(());
    };

    let presented = headers
        .get("x-cron-secret")
        .or_else(|| headers.get("authorization"))
        .and_then(|value| value.to_str().ok());

    if presented != Some(secret.as_str()) {
        return Err(ApiError::Unauthorized);
    }

    Ok(())
}

async fn status(State(state): State<ApiState>) -> ApiResult<Json<StatusPayload>> {
    let database = Database::open(&state.config.db_path)?;

    Ok(Json(StatusPayload {
        api_port: state.config.api_port,
        ai_configured: ai::is_configured(&state.config),
        latest_report_date: database.latest_report_date()?,
    }))
}

async fn reports_for_date(
    State(state): State<ApiState>,
    Path(date): Path<String>,
) -> ApiResult<Json<ReportsPayload>> {
    let target_date = parse_date(&date)?;
    let database = Database::open(&state.config.db_path)?;
    let reports = database.reports_for_date(&target_date.format("%Y-%m-%d").to_string())?;

    Ok(Json(ReportsPayload {
        date: target_date.format("%Y-%m-%d").to_string(),
        count: reports.len(),
        reports,
    }))
}

async fn report_detail(
    State(state): State<ApiState>,
    Path((worker_id, date)): Path<(String, String)>,
) -> ApiResult<Json<ReportRow>> {
    let target_date = parse_date(&date)?;
    let database = Database::open(&state.config.db_path)?;

    let report = database
        .report_for(&worker_id, &target_date.format("%Y-%m-%d").to_string())?
        .ok_or_else(|| {
            ApiError::NotFound(format!("No report for worker {worker_id} on {target_date}"))
        })?;

    Ok(Json(report))
}

fn parse_date(input: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|_| {
        ApiError::BadRequest(format!("Invalid date format: {input}. Example: 2026-08-30"))
    })
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
enum ApiError {
    Unauthorized,
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Unauthorized" })),
            )
                .into_response(),
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": message })),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret_config() -> Config {
        Config {
            cron_secret: Some("s3cret".to_string()),
            ..Config::default()
        }
    }

    #[test]
    fn authorize_passes_without_configured_secret() {
        let config = Config::default();
        assert!(authorize(&config, &HeaderMap::new()).is_ok());
    }

    #[test]
    fn authorize_rejects_missing_and_wrong_secret() {
        let config = secret_config();

        assert!(matches!(
            authorize(&config, &HeaderMap::new()),
            Err(ApiError::Unauthorized)
        ));

        let mut headers = HeaderMap::new();
        headers.insert("x-cron-secret", "wrong".parse().expect("header"));
        assert!(matches!(
            authorize(&config, &headers),
            Err(ApiError::Unauthorized)
        ));
    }

    #[test]
    fn authorize_accepts_either_header() {
        let config = secret_config();

        let mut dedicated = HeaderMap::new();
        dedicated.insert("x-cron-secret", "s3cret".parse().expect("header"));
        assert!(authorize(&config, &dedicated).is_ok());

        let mut bearer_style = HeaderMap::new();
        bearer_style.insert("authorization", "s3cret".parse().expect("header"));
        assert!(authorize(&config, &bearer_style).is_ok());
    }

    #[test]
    fn parse_date_validates_format() {
        assert!(parse_date("2026-08-30").is_ok());
        assert!(matches!(
            parse_date("30/08/2026"),
            Err(ApiError::BadRequest(_))
        ));
    }
}
