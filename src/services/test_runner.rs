use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::schemas::grading::{TestCase, TestCaseOutcome, TestRunSummary};
use crate::services::execution::{ExecutionClient, ExecutionOutcome};

/// Runs every test case of one submission against the sandbox. In-flight
/// executions are bounded by the job-wide limiter, and results are
/// reassembled by index so the published order always matches the input
/// order regardless of completion order. A single case failure never aborts
/// the batch.
pub(crate) async fn run(
    execution: &ExecutionClient,
    limiter: Arc<Semaphore>,
    code: &str,
    language: &str,
    test_cases: &[TestCase],
) -> TestRunSummary {
    let mut tasks = JoinSet::new();

    for (index, case) in test_cases.iter().enumerate() {
        let execution = execution.clone();
        let limiter = Arc::clone(&limiter);
        let code = code.to_string();
        let language = language.to_string();
        let case = case.clone();

        tasks.spawn(async move {
            // The limiter lives as long as the job; it is never closed.
            let _permit = match limiter.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return (index, aborted_case(index, &case)),
            };
            let outcome = execution.execute(&code, &language, &case.input).await;
            (index, evaluate_case(index, &case, outcome))
        });
    }

    let mut slots: Vec<Option<TestCaseOutcome>> = Vec::with_capacity(test_cases.len());
    slots.resize_with(test_cases.len(), || None);

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome)) => slots[index] = Some(outcome),
            Err(err) => tracing::error!(error = %err, "Test case task aborted"),
        }
    }

    // An aborted task leaves a failed placeholder so the summary stays
    // index-aligned with the input cases.
    let results: Vec<TestCaseOutcome> = slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| slot.unwrap_or_else(|| aborted_case(index, &test_cases[index])))
        .collect();

    let passed = results.iter().filter(|result| result.passed).count();

    TestRunSummary { passed, total: results.len(), results }
}

fn evaluate_case(index: usize, case: &TestCase, outcome: ExecutionOutcome) -> TestCaseOutcome {
    let passed =
        outcome.success && outcome.output.trim_end() == case.expected_output.trim_end();

    TestCaseOutcome {
        test_index: index,
        passed,
        input: case.input.clone(),
        expected_output: case.expected_output.clone(),
        actual_output: outcome.output,
        error: outcome.error,
        is_hidden: case.is_hidden,
    }
}

fn aborted_case(index: usize, case: &TestCase) -> TestCaseOutcome {
    TestCaseOutcome {
        test_index: index,
        passed: false,
        input: case.input.clone(),
        expected_output: case.expected_output.clone(),
        actual_output: String::new(),
        error: Some("test case execution aborted".to_string()),
        is_hidden: case.is_hidden,
    }
}
