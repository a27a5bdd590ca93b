use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::storage::StorageError;
use crate::AppState;
use shared::{LocationPatch, LocationRecord, NewLocation, Page};

const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 500;

/// Health check
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

fn status_for(e: &StorageError) -> StatusCode {
    match e {
        StorageError::NotFound(_) => StatusCode::NOT_FOUND,
        StorageError::Invalid(_) => StatusCode::BAD_REQUEST,
        StorageError::Io(_) | StorageError::Json(_) => {
            tracing::error!("Storage error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn page_url(headers: &HeaderMap, page: usize, page_size: usize) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    format!(
        "http://{}/api/parking-locations?page={}&page_size={}",
        host, page, page_size
    )
}

/// List locations, newest first
pub async fn list_locations(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
    headers: HeaderMap,
) -> Json<Page<LocationRecord>> {
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let (count, results) = state.store.list(page, page_size).await;

    let has_more = page.checked_mul(page_size).is_some_and(|seen| seen < count);
    let next = page
        .checked_add(1)
        .filter(|_| has_more)
        .map(|n| page_url(&headers, n, page_size));
    let previous = (page > 1).then(|| page_url(&headers, page - 1, page_size));
    Json(Page {
        count,
        next,
        previous,
        results,
    })
}

pub async fn get_location(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<LocationRecord>, StatusCode> {
    state
        .store
        .get(id)
        .await
        .map(Json)
        .map_err(|e| status_for(&e))
}

pub async fn create_location(
    State(state): State<AppState>,
    Json(fields): Json<NewLocation>,
) -> Result<(StatusCode, Json<LocationRecord>), StatusCode> {
    let record = state.store.create(fields).await.map_err(|e| status_for(&e))?;
    tracing::info!(id = record.id, code = %record.location_code, "Location created");
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn update_location(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<LocationPatch>,
) -> Result<Json<LocationRecord>, StatusCode> {
    let record = state
        .store
        .update(id, patch)
        .await
        .map_err(|e| status_for(&e))?;
    tracing::debug!(id, "Location updated");
    Ok(Json(record))
}

pub async fn delete_location(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    state.store.delete(id).await.map_err(|e| status_for(&e))?;
    tracing::info!(id, "Location deleted");
    Ok(StatusCode::NO_CONTENT)
}
