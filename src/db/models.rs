use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::JobStatus;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct GradingJob {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) exam_id: String,
    pub(crate) status: JobStatus,
    pub(crate) progress: i32,
    pub(crate) graded_questions: i32,
    pub(crate) total_questions: i32,
    pub(crate) result_data: Option<Json<serde_json::Value>>,
    pub(crate) error_message: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ExamResult {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) exam_id: String,
    pub(crate) earned_points: f64,
    pub(crate) total_points: f64,
    pub(crate) percentage: f64,
    pub(crate) grade: String,
    pub(crate) duration_seconds: f64,
    pub(crate) question_results: Json<serde_json::Value>,
    pub(crate) completed_at: PrimitiveDateTime,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ExamDraft {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) exam_id: String,
    pub(crate) draft_data: Json<serde_json::Value>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}
