use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::schemas::grading::{AnswerValue, QuestionDefinition, TestRunSummary};
use crate::services::execution::ExecutionClient;
use crate::services::test_runner;

#[derive(Debug, Clone, Copy)]
pub(crate) struct GradedAnswer {
    pub(crate) earned_points: f64,
    pub(crate) is_correct: bool,
}

impl GradedAnswer {
    fn incorrect() -> Self {
        Self { earned_points: 0.0, is_correct: false }
    }

    fn full(points: f64) -> Self {
        Self { earned_points: points, is_correct: true }
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub(crate) fn letter_grade(percentage: f64) -> &'static str {
    if percentage >= 90.0 {
        "A"
    } else if percentage >= 80.0 {
        "B"
    } else if percentage >= 70.0 {
        "C"
    } else if percentage >= 60.0 {
        "D"
    } else {
        "F"
    }
}

/// A list-shaped correct answer means multi-select: exact set equality, no
/// partial credit. A scalar correct answer compares against the first
/// submitted value.
pub(crate) fn grade_multiple_choice(
    answer: Option<&AnswerValue>,
    correct: Option<&AnswerValue>,
    points: f64,
) -> GradedAnswer {
    let Some(correct) = correct else {
        return GradedAnswer::incorrect();
    };
    let Some(answer) = answer else {
        return GradedAnswer::incorrect();
    };

    if correct.is_many() {
        let submitted = answer.values();
        let correct_values = correct.values();
        let submitted_set: HashSet<&str> =
            submitted.iter().map(String::as_str).collect();
        let exact = submitted.len() == correct_values.len()
            && correct_values.iter().all(|value| submitted_set.contains(value.as_str()));
        if exact {
            GradedAnswer::full(points)
        } else {
            GradedAnswer::incorrect()
        }
    } else {
        match (answer.first(), correct.first()) {
            (Some(submitted), Some(expected)) if submitted == expected => {
                GradedAnswer::full(points)
            }
            _ => GradedAnswer::incorrect(),
        }
    }
}

pub(crate) fn grade_true_false(
    answer: Option<&AnswerValue>,
    correct: Option<&AnswerValue>,
    points: f64,
) -> GradedAnswer {
    let submitted = answer.and_then(AnswerValue::first);
    let expected = correct.and_then(AnswerValue::first);

    match (submitted, expected) {
        (Some(submitted), Some(expected)) if submitted == expected => GradedAnswer::full(points),
        _ => GradedAnswer::incorrect(),
    }
}

/// OR semantics across the accepted answers: matching any one of them,
/// case-insensitively and ignoring surrounding whitespace, earns full
/// credit.
pub(crate) fn grade_short_answer(
    answer: Option<&AnswerValue>,
    accepted: Option<&AnswerValue>,
    points: f64,
) -> GradedAnswer {
    let Some(submitted) = answer.and_then(AnswerValue::first) else {
        return GradedAnswer::incorrect();
    };
    let Some(accepted) = accepted else {
        return GradedAnswer::incorrect();
    };

    let submitted = submitted.trim().to_lowercase();
    let matched = accepted
        .values()
        .iter()
        .any(|candidate| candidate.trim().to_lowercase() == submitted);

    if matched {
        GradedAnswer::full(points)
    } else {
        GradedAnswer::incorrect()
    }
}

/// Proportional credit by fraction of test cases passed. Blank submissions
/// and empty suites short-circuit to zero without touching the sandbox.
pub(crate) async fn grade_coding(
    execution: &ExecutionClient,
    limiter: Arc<Semaphore>,
    question: &QuestionDefinition,
    answer: Option<&AnswerValue>,
) -> (GradedAnswer, TestRunSummary) {
    let code = answer.and_then(AnswerValue::first).unwrap_or_default();
    let language = question.language.as_deref().unwrap_or_default();

    if code.trim().is_empty() || question.test_cases.is_empty() {
        let summary = TestRunSummary {
            passed: 0,
            total: question.test_cases.len(),
            results: Vec::new(),
        };
        return (GradedAnswer::incorrect(), summary);
    }

    let summary =
        test_runner::run(execution, limiter, &code, language, &question.test_cases).await;

    let earned = round2(summary.passed as f64 / summary.total as f64 * question.points);
    let graded = GradedAnswer {
        earned_points: earned,
        is_correct: summary.total > 0 && summary.passed == summary.total,
    };

    (graded, summary)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::extract::State;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::schemas::grading::{QuestionKind, TestCase};
    use crate::test_support;

    fn single(value: &str) -> AnswerValue {
        AnswerValue::Single(value.to_string())
    }

    fn many(values: &[&str]) -> AnswerValue {
        AnswerValue::Many(values.iter().map(|value| value.to_string()).collect())
    }

    fn coding_question(points: f64, code_cases: Vec<TestCase>) -> QuestionDefinition {
        QuestionDefinition {
            id: "q".to_string(),
            kind: QuestionKind::Coding,
            points,
            correct_answer: None,
            language: Some("python".to_string()),
            test_cases: code_cases,
        }
    }

    #[test]
    fn single_choice_compares_first_value() {
        let graded = grade_multiple_choice(Some(&single("B")), Some(&single("B")), 1.0);
        assert!(graded.is_correct);
        assert_eq!(graded.earned_points, 1.0);

        // Array-submitted single answers normalize to their first element
        let graded = grade_multiple_choice(Some(&many(&["B", "C"])), Some(&single("B")), 1.0);
        assert!(graded.is_correct);

        let graded = grade_multiple_choice(Some(&single("A")), Some(&single("B")), 1.0);
        assert!(!graded.is_correct);
        assert_eq!(graded.earned_points, 0.0);
    }

    #[test]
    fn multi_select_requires_exact_set_equality() {
        let correct = many(&["A", "C"]);

        let graded = grade_multiple_choice(Some(&many(&["A", "C"])), Some(&correct), 2.0);
        assert!(graded.is_correct);
        assert_eq!(graded.earned_points, 2.0);

        // Order does not matter
        assert!(grade_multiple_choice(Some(&many(&["C", "A"])), Some(&correct), 2.0).is_correct);

        // Missing a selection scores zero
        let graded = grade_multiple_choice(Some(&many(&["A"])), Some(&correct), 2.0);
        assert_eq!(graded.earned_points, 0.0);

        // An extra selection scores zero
        let graded = grade_multiple_choice(Some(&many(&["A", "C", "D"])), Some(&correct), 2.0);
        assert_eq!(graded.earned_points, 0.0);
    }

    #[test]
    fn missing_answers_score_zero_without_panicking() {
        assert!(!grade_multiple_choice(None, Some(&single("B")), 1.0).is_correct);
        assert!(!grade_multiple_choice(Some(&single("B")), None, 1.0).is_correct);
        assert!(!grade_true_false(None, Some(&single("true")), 1.0).is_correct);
        assert!(!grade_short_answer(None, Some(&single("x")), 1.0).is_correct);
        assert!(!grade_short_answer(Some(&single("x")), None, 1.0).is_correct);
    }

    #[test]
    fn true_false_accepts_bool_and_string_forms() {
        let graded =
            grade_true_false(Some(&AnswerValue::Bool(true)), Some(&single("true")), 1.0);
        assert!(graded.is_correct);

        let graded =
            grade_true_false(Some(&single("false")), Some(&AnswerValue::Bool(false)), 1.0);
        assert!(graded.is_correct);

        let graded =
            grade_true_false(Some(&AnswerValue::Bool(false)), Some(&single("true")), 1.0);
        assert!(!graded.is_correct);
    }

    #[test]
    fn short_answer_matches_any_accepted_answer_loosely() {
        let accepted = many(&["paris", "Paris "]);

        assert!(grade_short_answer(Some(&single("paris")), Some(&accepted), 1.0).is_correct);
        assert!(grade_short_answer(Some(&single("PARIS")), Some(&accepted), 1.0).is_correct);
        assert!(grade_short_answer(Some(&single("  Paris ")), Some(&accepted), 1.0).is_correct);
        assert!(!grade_short_answer(Some(&single("london")), Some(&accepted), 1.0).is_correct);
    }

    #[test]
    fn letter_grade_thresholds() {
        assert_eq!(letter_grade(100.0), "A");
        assert_eq!(letter_grade(90.0), "A");
        assert_eq!(letter_grade(89.99), "B");
        assert_eq!(letter_grade(80.0), "B");
        assert_eq!(letter_grade(70.0), "C");
        assert_eq!(letter_grade(60.0), "D");
        assert_eq!(letter_grade(59.99), "F");
        assert_eq!(letter_grade(0.0), "F");
    }

    #[test]
    fn round2_rounds_to_two_decimals() {
        assert_eq!(round2(1.0 / 3.0 * 10.0), 3.33);
        assert_eq!(round2(2.0 / 3.0 * 100.0), 66.67);
        assert_eq!(round2(0.1 + 0.2), 0.3);
        assert_eq!(round2(5.0), 5.0);
    }

    #[tokio::test]
    async fn blank_code_short_circuits_without_sandbox_calls() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/execute",
                post(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(json!({"run": {"output": "", "stderr": ""}}))
                }),
            )
            .with_state(hits.clone());
        let base_url = test_support::spawn_stub_server(app).await;
        let client = test_support::execution_client_for(&base_url).await;

        let question = coding_question(
            4.0,
            vec![TestCase {
                input: "1".to_string(),
                expected_output: "1".to_string(),
                is_hidden: false,
            }],
        );

        let blank = AnswerValue::Single("   \n".to_string());
        let (graded, summary) =
            grade_coding(&client, Arc::new(Semaphore::new(5)), &question, Some(&blank)).await;

        assert_eq!(graded.earned_points, 0.0);
        assert!(!graded.is_correct);
        assert_eq!(summary.total, 1);
        assert_eq!(summary.passed, 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        // Zero test cases short-circuits the same way
        let question = coding_question(4.0, Vec::new());
        let code = AnswerValue::Single("print(1)".to_string());
        let (graded, summary) =
            grade_coding(&client, Arc::new(Semaphore::new(5)), &question, Some(&code)).await;

        assert_eq!(graded.earned_points, 0.0);
        assert_eq!(summary.total, 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn partial_passes_earn_proportional_credit() {
        // Echo stub: a case passes when its expected output equals its input
        let app = Router::new().route(
            "/execute",
            post(|Json(body): Json<serde_json::Value>| async move {
                let stdin = body["stdin"].as_str().unwrap_or_default().to_string();
                if stdin == "fail" {
                    Json(json!({"run": {"output": "", "stderr": "wrong"}}))
                } else {
                    Json(json!({"run": {"output": stdin, "stderr": ""}}))
                }
            }),
        );
        let base_url = test_support::spawn_stub_server(app).await;
        let client = test_support::execution_client_for(&base_url).await;

        let cases = vec![
            TestCase { input: "1".into(), expected_output: "1".into(), is_hidden: false },
            TestCase { input: "fail".into(), expected_output: "2".into(), is_hidden: false },
            TestCase { input: "fail".into(), expected_output: "3".into(), is_hidden: true },
        ];
        let question = coding_question(10.0, cases);
        let code = AnswerValue::Single("solution".to_string());

        let (graded, summary) =
            grade_coding(&client, Arc::new(Semaphore::new(5)), &question, Some(&code)).await;

        assert_eq!(summary.passed, 1);
        assert_eq!(summary.total, 3);
        assert_eq!(graded.earned_points, 3.33);
        assert!(!graded.is_correct);
    }
}
