use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::ExamDraft;

pub(crate) const COLUMNS: &str =
    "id, user_id, exam_id, draft_data, created_at, updated_at";

/// Drafts are written by the exam-taking flow; the grading core only ever
/// deletes them after a successful grade. The upsert exists for
/// collaborating services and tests.
#[allow(dead_code)]
pub(crate) async fn upsert(
    pool: &PgPool,
    id: &str,
    user_id: &str,
    exam_id: &str,
    draft_data: serde_json::Value,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO exam_drafts (id, user_id, exam_id, draft_data, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $5) \
         ON CONFLICT (user_id, exam_id) \
         DO UPDATE SET draft_data = EXCLUDED.draft_data, updated_at = EXCLUDED.updated_at",
    )
    .bind(id)
    .bind(user_id)
    .bind(exam_id)
    .bind(Json(draft_data))
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

#[allow(dead_code)]
pub(crate) async fn find_by_user_and_exam(
    pool: &PgPool,
    user_id: &str,
    exam_id: &str,
) -> Result<Option<ExamDraft>, sqlx::Error> {
    sqlx::query_as::<_, ExamDraft>(&format!(
        "SELECT {COLUMNS} FROM exam_drafts WHERE user_id = $1 AND exam_id = $2"
    ))
    .bind(user_id)
    .bind(exam_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn delete_by_user_and_exam(
    pool: &PgPool,
    user_id: &str,
    exam_id: &str,
) -> Result<bool, sqlx::Error> {
    let deleted = sqlx::query("DELETE FROM exam_drafts WHERE user_id = $1 AND exam_id = $2")
        .bind(user_id)
        .bind(exam_id)
        .execute(pool)
        .await?;

    Ok(deleted.rows_affected() > 0)
}
