use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::ExamResult;

pub(crate) const COLUMNS: &str = "\
    id, user_id, exam_id, earned_points, total_points, percentage, grade, \
    duration_seconds, question_results, completed_at, created_at";

pub(crate) struct CreateExamResult<'a> {
    pub(crate) id: &'a str,
    pub(crate) user_id: &'a str,
    pub(crate) exam_id: &'a str,
    pub(crate) earned_points: f64,
    pub(crate) total_points: f64,
    pub(crate) percentage: f64,
    pub(crate) grade: &'a str,
    pub(crate) duration_seconds: f64,
    pub(crate) question_results: serde_json::Value,
    pub(crate) completed_at: PrimitiveDateTime,
}

/// One result per (user, exam): the unique constraint turns a racing
/// duplicate grading run into a no-op instead of a double insert.
pub(crate) async fn create_if_absent(
    pool: &PgPool,
    params: CreateExamResult<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO exam_results \
            (id, user_id, exam_id, earned_points, total_points, percentage, grade, \
             duration_seconds, question_results, completed_at, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10) \
         ON CONFLICT (user_id, exam_id) DO NOTHING",
    )
    .bind(params.id)
    .bind(params.user_id)
    .bind(params.exam_id)
    .bind(params.earned_points)
    .bind(params.total_points)
    .bind(params.percentage)
    .bind(params.grade)
    .bind(params.duration_seconds)
    .bind(Json(params.question_results))
    .bind(params.completed_at)
    .execute(pool)
    .await?;
    Ok(())
}

#[allow(dead_code)]
pub(crate) async fn find_by_user_and_exam(
    pool: &PgPool,
    user_id: &str,
    exam_id: &str,
) -> Result<Option<ExamResult>, sqlx::Error> {
    sqlx::query_as::<_, ExamResult>(&format!(
        "SELECT {COLUMNS} FROM exam_results WHERE user_id = $1 AND exam_id = $2"
    ))
    .bind(user_id)
    .bind(exam_id)
    .fetch_optional(pool)
    .await
}
