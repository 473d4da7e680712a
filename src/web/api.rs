use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::AppState;
use crate::errors::{AppError, AppResult, ExportError};
use crate::models::{LookupResponse, RemoveResponse};

#[derive(Debug, Deserialize)]
pub struct VinQuery {
    pub vin: String,
}

/// Boundary validation: trims, uppercases, and requires exactly 17
/// characters. Runs before any cache or upstream interaction.
fn validate_vin(raw: &str) -> AppResult<String> {
    let vin = raw.trim().to_ascii_uppercase();
    let length = vin.chars().count();
    if length != 17 {
        return Err(AppError::invalid_vin(format!(
            "VIN must be exactly 17 characters, got {length}"
        )));
    }
    Ok(vin)
}

pub async fn lookup_vin(
    Query(params): Query<VinQuery>,
    State(state): State<AppState>,
) -> AppResult<Json<LookupResponse>> {
    let vin = validate_vin(&params.vin)?;
    let result = state.lookup.lookup(&vin).await?;
    Ok(Json(LookupResponse::from_record(
        result.record,
        result.was_cached,
    )))
}

pub async fn remove_vin(
    Query(params): Query<VinQuery>,
    State(state): State<AppState>,
) -> AppResult<Json<RemoveResponse>> {
    let vin = validate_vin(&params.vin)?;
    let deleted = state.lookup.remove(&vin).await?;
    Ok(Json(RemoveResponse {
        vin,
        cache_delete_success: deleted,
    }))
}

/// Full cache snapshot as a Parquet download. Overwrites the prior export on
/// disk, then serves the fresh bytes.
pub async fn export_cache(State(state): State<AppState>) -> AppResult<(HeaderMap, Vec<u8>)> {
    let records = state.database.list_vin_records().await?;
    let path = state.exporter.write_snapshot(&records)?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| AppError::Export(ExportError::Io(e)))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("attachment; filename=\"export_vin_cache.parquet\""),
    );
    Ok((headers, bytes))
}

/// One-time setup: creates the cache table. Not idempotent, a second call
/// fails since the table already exists.
pub async fn create_table(State(state): State<AppState>) -> AppResult<String> {
    state.database.create_vin_table().await?;
    info!("Cache table created via /create_table");
    Ok("Table created successfully".to_string())
}

pub async fn health_check(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let pool = state.database.pool();
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&pool)
        .await
        .map_err(AppError::Database)?;

    Ok(Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}
