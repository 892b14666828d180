use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::GradingJob;
use crate::db::types::JobStatus;

pub(crate) const COLUMNS: &str = "\
    id, user_id, exam_id, status, progress, graded_questions, total_questions, \
    result_data, error_message, created_at, updated_at";

pub(crate) struct CreateJob<'a> {
    pub(crate) id: &'a str,
    pub(crate) user_id: &'a str,
    pub(crate) exam_id: &'a str,
    pub(crate) total_questions: i32,
    pub(crate) now: PrimitiveDateTime,
}

/// Conflict-tolerant insert: re-triggering an existing job id locates the
/// existing row instead of erroring.
pub(crate) async fn create_if_absent(
    pool: &PgPool,
    params: CreateJob<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO grading_jobs \
            (id, user_id, exam_id, status, progress, graded_questions, total_questions, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, 0, 0, $5, $6, $6) \
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(params.id)
    .bind(params.user_id)
    .bind(params.exam_id)
    .bind(JobStatus::Pending)
    .bind(params.total_questions)
    .bind(params.now)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    job_id: &str,
) -> Result<Option<GradingJob>, sqlx::Error> {
    sqlx::query_as::<_, GradingJob>(&format!(
        "SELECT {COLUMNS} FROM grading_jobs WHERE id = $1"
    ))
    .bind(job_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn mark_processing(
    pool: &PgPool,
    job_id: &str,
    total_questions: i32,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE grading_jobs \
         SET status = $1, total_questions = $2, graded_questions = 0, progress = 0, \
             error_message = NULL, updated_at = $3 \
         WHERE id = $4 AND status NOT IN ($5, $6)",
    )
    .bind(JobStatus::Processing)
    .bind(total_questions)
    .bind(now)
    .bind(job_id)
    .bind(JobStatus::Completed)
    .bind(JobStatus::Failed)
    .execute(pool)
    .await?;

    Ok(updated.rows_affected() > 0)
}

pub(crate) async fn update_progress(
    pool: &PgPool,
    job_id: &str,
    graded_questions: i32,
    total_questions: i32,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    let progress = if total_questions > 0 {
        (graded_questions * 100 / total_questions).clamp(0, 100)
    } else {
        0
    };

    sqlx::query(
        "UPDATE grading_jobs \
         SET graded_questions = $1, progress = $2, updated_at = $3 \
         WHERE id = $4 AND status = $5",
    )
    .bind(graded_questions)
    .bind(progress)
    .bind(now)
    .bind(job_id)
    .bind(JobStatus::Processing)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn complete(
    pool: &PgPool,
    job_id: &str,
    result_data: &serde_json::Value,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE grading_jobs \
         SET status = $1, progress = 100, graded_questions = total_questions, \
             result_data = $2, error_message = NULL, updated_at = $3 \
         WHERE id = $4 AND status = $5",
    )
    .bind(JobStatus::Completed)
    .bind(Json(result_data))
    .bind(now)
    .bind(job_id)
    .bind(JobStatus::Processing)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn fail(
    pool: &PgPool,
    job_id: &str,
    error_message: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE grading_jobs \
         SET status = $1, error_message = $2, updated_at = $3 \
         WHERE id = $4 AND status NOT IN ($5, $6)",
    )
    .bind(JobStatus::Failed)
    .bind(error_message)
    .bind(now)
    .bind(job_id)
    .bind(JobStatus::Completed)
    .bind(JobStatus::Failed)
    .execute(pool)
    .await?;
    Ok(())
}
