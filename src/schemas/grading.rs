use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::Validate;

pub(crate) use crate::core::time::format_primitive;
use crate::db::models::GradingJob;
use crate::db::types::JobStatus;

/// A submitted answer as it appears on the wire: a bare value for
/// single-answer questions (free text, a choice id, a source string, a
/// true/false flag) or a list for multi-select questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum AnswerValue {
    Bool(bool),
    Single(String),
    Many(Vec<String>),
}

impl AnswerValue {
    /// Normalizes to one value: lists collapse to their first element.
    pub(crate) fn first(&self) -> Option<String> {
        match self {
            Self::Bool(value) => Some(value.to_string()),
            Self::Single(value) => Some(value.clone()),
            Self::Many(values) => values.first().cloned(),
        }
    }

    pub(crate) fn values(&self) -> Vec<String> {
        match self {
            Self::Bool(value) => vec![value.to_string()],
            Self::Single(value) => vec![value.clone()],
            Self::Many(values) => values.clone(),
        }
    }

    pub(crate) fn is_many(&self) -> bool {
        matches!(self, Self::Many(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum QuestionKind {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
    Coding,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TestCase {
    #[serde(default)]
    pub(crate) input: String,
    #[serde(default)]
    pub(crate) expected_output: String,
    #[serde(default)]
    pub(crate) is_hidden: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuestionDefinition {
    pub(crate) id: String,
    #[serde(rename = "type")]
    pub(crate) kind: QuestionKind,
    pub(crate) points: f64,
    #[serde(default)]
    pub(crate) correct_answer: Option<AnswerValue>,
    #[serde(default)]
    pub(crate) language: Option<String>,
    #[serde(default)]
    pub(crate) test_cases: Vec<TestCase>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GradeExamRequest {
    #[validate(length(min = 1, message = "jobId must not be empty"))]
    pub(crate) job_id: String,
    #[validate(length(min = 1, message = "userId must not be empty"))]
    pub(crate) user_id: String,
    #[validate(length(min = 1, message = "examId must not be empty"))]
    pub(crate) exam_id: String,
    #[serde(default)]
    pub(crate) answers: HashMap<String, AnswerValue>,
    #[validate(length(min = 1, message = "questions must not be empty"))]
    pub(crate) questions: Vec<QuestionDefinition>,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) start_time: OffsetDateTime,
}

/// One executed test case, ordered by `test_index` regardless of the order
/// in which concurrent executions completed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TestCaseOutcome {
    pub(crate) test_index: usize,
    pub(crate) passed: bool,
    pub(crate) input: String,
    pub(crate) expected_output: String,
    pub(crate) actual_output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
    pub(crate) is_hidden: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TestRunSummary {
    pub(crate) passed: usize,
    pub(crate) total: usize,
    pub(crate) results: Vec<TestCaseOutcome>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuestionResult {
    pub(crate) question_id: String,
    pub(crate) user_answer: Option<AnswerValue>,
    pub(crate) earned_points: f64,
    pub(crate) max_points: f64,
    pub(crate) is_correct: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) test_results: Option<TestRunSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExamResultData {
    pub(crate) question_results: Vec<QuestionResult>,
    pub(crate) earned_points: f64,
    pub(crate) total_points: f64,
    pub(crate) percentage: f64,
    pub(crate) grade: String,
    pub(crate) duration_seconds: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct TriggerResponse {
    pub(crate) success: bool,
    pub(crate) message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobStatusResponse {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) exam_id: String,
    pub(crate) status: JobStatus,
    pub(crate) progress: i32,
    pub(crate) graded_questions: i32,
    pub(crate) total_questions: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) result_data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error_message: Option<String>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl JobStatusResponse {
    pub(crate) fn from_job(job: GradingJob) -> Self {
        Self {
            id: job.id,
            user_id: job.user_id,
            exam_id: job.exam_id,
            status: job.status,
            progress: job.progress,
            graded_questions: job.graded_questions,
            total_questions: job.total_questions,
            result_data: job.result_data.map(|value| value.0),
            error_message: job.error_message,
            created_at: format_primitive(job.created_at),
            updated_at: format_primitive(job.updated_at),
        }
    }
}
