use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use time::OffsetDateTime;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc as now_primitive;
use crate::repositories;
use crate::schemas::grading::{
    ExamResultData, GradeExamRequest, QuestionKind, QuestionResult,
};
use crate::services::graders;

/// Entry point for a detached grading run. The body is the job's
/// catch-everything boundary: whatever fails inside `grade_exam`, the job
/// record ends up in a terminal state so pollers never spin on a stuck
/// `processing` row.
pub(crate) async fn process_job(state: AppState, request: GradeExamRequest) {
    let job_id = request.job_id.clone();
    let timer = Instant::now();

    match grade_exam(&state, &request).await {
        Ok(()) => {
            metrics::counter!("grading_jobs_total", "status" => "completed").increment(1);
            metrics::histogram!("grading_job_duration_seconds")
                .record(timer.elapsed().as_secs_f64());
            tracing::info!(job_id = %job_id, "Grading job completed");
        }
        Err(err) => {
            metrics::counter!("grading_jobs_total", "status" => "failed").increment(1);
            tracing::error!(job_id = %job_id, error = %err, "Grading job failed");
            if let Err(store_err) =
                repositories::jobs::fail(state.db(), &job_id, &format!("{err:#}"), now_primitive())
                    .await
            {
                tracing::error!(
                    job_id = %job_id,
                    error = %store_err,
                    "Failed to record grading job failure"
                );
            }
        }
    }
}

async fn grade_exam(state: &AppState, request: &GradeExamRequest) -> Result<()> {
    let total = request.questions.len();

    let marked =
        repositories::jobs::mark_processing(state.db(), &request.job_id, total as i32, now_primitive())
            .await
            .context("Failed to mark grading job as processing")?;
    if !marked {
        tracing::info!(job_id = %request.job_id, "Skipping grading job already in a terminal state");
        return Ok(());
    }

    // One limiter for the whole job: peak in-flight sandbox calls stay at
    // the configured bound no matter how many coding questions the exam has.
    let limiter = Arc::new(Semaphore::new(
        state.settings().grading().max_concurrent_executions as usize,
    ));

    let mut slots: Vec<Option<QuestionResult>> = vec![None; total];
    let mut graded = 0usize;

    // Phase 1: deterministic questions, sequential in input order, with
    // granular progress after each one.
    for (index, question) in request.questions.iter().enumerate() {
        let answer = request.answers.get(&question.id);
        let graded_answer = match question.kind {
            QuestionKind::MultipleChoice => graders::grade_multiple_choice(
                answer,
                question.correct_answer.as_ref(),
                question.points,
            ),
            QuestionKind::TrueFalse => {
                graders::grade_true_false(answer, question.correct_answer.as_ref(), question.points)
            }
            QuestionKind::ShortAnswer => graders::grade_short_answer(
                answer,
                question.correct_answer.as_ref(),
                question.points,
            ),
            QuestionKind::Coding => continue,
        };

        slots[index] = Some(QuestionResult {
            question_id: question.id.clone(),
            user_answer: answer.cloned(),
            earned_points: graded_answer.earned_points,
            max_points: question.points,
            is_correct: graded_answer.is_correct,
            test_results: None,
        });
        graded += 1;

        repositories::jobs::update_progress(
            state.db(),
            &request.job_id,
            graded as i32,
            total as i32,
            now_primitive(),
        )
        .await
        .context("Failed to persist grading progress")?;
    }

    // Phase 2: coding questions fan out concurrently; progress advances as
    // each one resolves, in whatever order they finish.
    let mut tasks = JoinSet::new();
    for (index, question) in request.questions.iter().enumerate() {
        if question.kind != QuestionKind::Coding {
            continue;
        }

        let execution = state.execution().clone();
        let limiter = Arc::clone(&limiter);
        let question = question.clone();
        let answer = request.answers.get(&question.id).cloned();

        tasks.spawn(async move {
            let (graded_answer, summary) =
                graders::grade_coding(&execution, limiter, &question, answer.as_ref()).await;
            (
                index,
                QuestionResult {
                    question_id: question.id,
                    user_answer: answer,
                    earned_points: graded_answer.earned_points,
                    max_points: question.points,
                    is_correct: graded_answer.is_correct,
                    test_results: Some(summary),
                },
            )
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let (index, result) = joined.context("Coding question grading task failed")?;
        slots[index] = Some(result);
        graded += 1;

        repositories::jobs::update_progress(
            state.db(),
            &request.job_id,
            graded as i32,
            total as i32,
            now_primitive(),
        )
        .await
        .context("Failed to persist grading progress")?;
    }

    let question_results: Vec<QuestionResult> = slots
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .context("Not every question produced a result")?;

    let duration_seconds =
        (OffsetDateTime::now_utc() - request.start_time).as_seconds_f64().max(0.0);
    let result = build_result(question_results, duration_seconds);
    let payload =
        serde_json::to_value(&result).context("Failed to serialize exam result")?;

    let now = now_primitive();
    let result_id = Uuid::new_v4().to_string();
    repositories::results::create_if_absent(
        state.db(),
        repositories::results::CreateExamResult {
            id: &result_id,
            user_id: &request.user_id,
            exam_id: &request.exam_id,
            earned_points: result.earned_points,
            total_points: result.total_points,
            percentage: result.percentage,
            grade: &result.grade,
            duration_seconds: result.duration_seconds,
            question_results: serde_json::to_value(&result.question_results)
                .context("Failed to serialize question results")?,
            completed_at: now,
        },
    )
    .await
    .context("Failed to persist exam result")?;

    // The draft is how the UI detects an unfinished exam; it must not
    // survive a successful grade. A failed job leaves it untouched.
    repositories::drafts::delete_by_user_and_exam(state.db(), &request.user_id, &request.exam_id)
        .await
        .context("Failed to delete exam draft")?;

    repositories::jobs::complete(state.db(), &request.job_id, &payload, now_primitive())
        .await
        .context("Failed to mark grading job completed")?;

    Ok(())
}

fn build_result(question_results: Vec<QuestionResult>, duration_seconds: f64) -> ExamResultData {
    let earned_points =
        graders::round2(question_results.iter().map(|result| result.earned_points).sum());
    let total_points: f64 = question_results.iter().map(|result| result.max_points).sum();
    let percentage = if total_points > 0.0 {
        graders::round2(earned_points / total_points * 100.0)
    } else {
        0.0
    };

    ExamResultData {
        question_results,
        earned_points,
        total_points,
        percentage,
        grade: graders::letter_grade(percentage).to_string(),
        duration_seconds,
    }
}

#[cfg(test)]
mod tests {
    use super::build_result;
    use crate::schemas::grading::{QuestionResult, TestRunSummary};

    fn question(id: &str, earned: f64, max: f64, correct: bool) -> QuestionResult {
        QuestionResult {
            question_id: id.to_string(),
            user_answer: None,
            earned_points: earned,
            max_points: max,
            is_correct: correct,
            test_results: None,
        }
    }

    #[test]
    fn perfect_exam_gets_full_percentage_and_grade_a() {
        let mut coding = question("q3", 2.0, 2.0, true);
        coding.test_results =
            Some(TestRunSummary { passed: 2, total: 2, results: Vec::new() });

        let result = build_result(
            vec![question("q1", 1.0, 1.0, true), question("q2", 1.0, 1.0, true), coding],
            42.0,
        );

        assert_eq!(result.earned_points, 4.0);
        assert_eq!(result.total_points, 4.0);
        assert_eq!(result.percentage, 100.0);
        assert_eq!(result.grade, "A");
        assert_eq!(result.duration_seconds, 42.0);
    }

    #[test]
    fn partial_credit_rounds_percentage_to_two_decimals() {
        let result = build_result(
            vec![question("q1", 1.0, 1.0, true), question("q2", 1.0, 3.0, false)],
            10.0,
        );

        assert_eq!(result.earned_points, 2.0);
        assert_eq!(result.total_points, 4.0);
        assert_eq!(result.percentage, 50.0);
        assert_eq!(result.grade, "F");
    }

    #[test]
    fn zero_total_points_guards_division() {
        let result = build_result(vec![question("q1", 0.0, 0.0, false)], 1.0);

        assert_eq!(result.percentage, 0.0);
        assert_eq!(result.grade, "F");
    }

    #[test]
    fn grade_tracks_thresholds() {
        let result = build_result(
            vec![question("q1", 8.5, 10.0, false)],
            0.0,
        );
        assert_eq!(result.percentage, 85.0);
        assert_eq!(result.grade, "B");
    }
}
