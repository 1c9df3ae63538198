use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tidemark_core::snapshots::{from_epoch_millis, Snapshot};

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

/// Epoch-millisecond bounds; `from` inclusive, `to` exclusive.
#[derive(Debug, Default, Deserialize)]
struct RangeQuery {
    from: Option<i64>,
    to: Option<i64>,
}

fn bound(raw: Option<i64>, default: DateTime<Utc>) -> ApiResult<DateTime<Utc>> {
    match raw {
        None => Ok(default),
        Some(ms) => from_epoch_millis(ms)
            .ok_or_else(|| ApiError::BadRequest(format!("timestamp {} is out of range", ms))),
    }
}

async fn get_snapshots(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
    Query(range): Query<RangeQuery>,
) -> ApiResult<Json<Vec<Snapshot>>> {
    let from = bound(range.from, DateTime::<Utc>::MIN_UTC)?;
    let to = bound(range.to, DateTime::<Utc>::MAX_UTC)?;
    if from > to {
        return Err(ApiError::BadRequest("'from' must not be after 'to'".to_string()));
    }
    Ok(Json(
        state
            .snapshot_repository
            .query_range(&account_id, from, to)?,
    ))
}

async fn get_latest_snapshot(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> ApiResult<Json<Snapshot>> {
    state
        .snapshot_repository
        .latest(&account_id)?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/accounts/{id}/snapshots", get(get_snapshots))
        .route("/accounts/{id}/snapshots/latest", get(get_latest_snapshot))
}
