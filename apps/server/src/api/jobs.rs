use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use tidemark_core::jobs::{JobCursor, JobName, JobRunOutcome};

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

async fn run_capture(State(state): State<Arc<AppState>>) -> Json<JobRunOutcome> {
    Json(state.runner.run_capture(Utc::now()).await)
}

async fn run_compaction(State(state): State<Arc<AppState>>) -> Json<JobRunOutcome> {
    Json(state.runner.run_compaction(Utc::now()).await)
}

async fn get_cursor(
    State(state): State<Arc<AppState>>,
    Path(job): Path<String>,
) -> ApiResult<Json<JobCursor>> {
    let job: JobName = job.parse().map_err(|_| ApiError::NotFound)?;
    Ok(Json(state.runner.cursor(job)?))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs/capture/run", post(run_capture))
        .route("/jobs/compaction/run", post(run_compaction))
        .route("/jobs/{job}/cursor", get(get_cursor))
}
