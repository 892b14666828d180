use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::grading::{GradeExamRequest, JobStatusResponse, TriggerResponse};
use crate::services::orchestrator;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/grade", post(trigger_grading))
        .route("/jobs/:job_id", get(job_status))
}

/// Fire-and-forget trigger: the caller gets an acceptance immediately and
/// polls the job record for the outcome. Coding questions can take many
/// seconds of sandbox round-trips, far beyond a sane request timeout.
async fn trigger_grading(
    State(state): State<AppState>,
    Json(payload): Json<GradeExamRequest>,
) -> Result<(StatusCode, Json<TriggerResponse>), ApiError> {
    payload.validate().map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let rate_key = format!("rl:grade:{}", payload.user_id);
    let allowed = state
        .redis()
        .rate_limit(
            &rate_key,
            state.settings().grading().trigger_rate_limit,
            state.settings().grading().trigger_rate_window_seconds,
        )
        .await
        .unwrap_or(true);
    if !allowed {
        return Err(ApiError::TooManyRequests("Too many grading requests, try again later"));
    }

    repositories::jobs::create_if_absent(
        state.db(),
        repositories::jobs::CreateJob {
            id: &payload.job_id,
            user_id: &payload.user_id,
            exam_id: &payload.exam_id,
            total_questions: payload.questions.len() as i32,
            now: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create grading job"))?;

    tracing::info!(
        job_id = %payload.job_id,
        user_id = %payload.user_id,
        exam_id = %payload.exam_id,
        questions = payload.questions.len(),
        "Grading job accepted"
    );
    metrics::counter!("grading_jobs_triggered_total").increment(1);

    // Detached on purpose: the orchestrator records its own failures in the
    // job row, so nothing here needs to observe the task.
    tokio::spawn(orchestrator::process_job(state.clone(), payload));

    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerResponse { success: true, message: "Grading started".to_string() }),
    ))
}

async fn job_status(
    Path(job_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let job = repositories::jobs::find_by_id(state.db(), &job_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch grading job"))?
        .ok_or_else(|| ApiError::NotFound(format!("Grading job {job_id} not found")))?;

    Ok(Json(JobStatusResponse::from_job(job)))
}
