use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use crate::core::config::Settings;

/// Language → runtime version pairs, kept in sync with the sandbox
/// deployment.
const RUNTIMES: &[(&str, &str)] = &[
    ("python", "3.10.0"),
    ("javascript", "18.15.0"),
    ("java", "15.0.2"),
    ("c++", "10.2.0"),
    ("c", "10.2.0"),
    ("go", "1.16.2"),
    ("rust", "1.68.2"),
];

#[derive(Debug, Clone)]
pub(crate) struct ExecutionOutcome {
    pub(crate) success: bool,
    pub(crate) output: String,
    pub(crate) error: Option<String>,
}

impl ExecutionOutcome {
    fn failure(error: String) -> Self {
        Self { success: false, output: String::new(), error: Some(error) }
    }
}

enum Attempt {
    Done(ExecutionOutcome),
    Transient(String),
}

#[derive(Debug, Clone)]
pub(crate) struct ExecutionClient {
    client: Client,
    base_url: String,
    run_timeout_ms: u64,
    max_retries: u32,
    initial_retry_delay: Duration,
}

impl ExecutionClient {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.sandbox().timeout_seconds);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .context("Failed to build sandbox HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.sandbox().base_url.trim_end_matches('/').to_string(),
            run_timeout_ms: settings.sandbox().run_timeout_ms,
            max_retries: settings.sandbox().max_retries,
            initial_retry_delay: Duration::from_millis(settings.sandbox().retry_delay_ms),
        })
    }

    pub(crate) fn runtime_version(language: &str) -> Option<&'static str> {
        RUNTIMES.iter().find(|(name, _)| *name == language).map(|(_, version)| *version)
    }

    /// Runs one snippet against the sandbox. Failures never propagate as
    /// errors: an unsupported language, an exhausted retry budget or a
    /// sandbox-side error all degrade to a failed outcome that the caller
    /// scores as "test case did not pass".
    pub(crate) async fn execute(
        &self,
        code: &str,
        language: &str,
        stdin: &str,
    ) -> ExecutionOutcome {
        let Some(version) = Self::runtime_version(language) else {
            metrics::counter!("sandbox_executions_total", "status" => "unsupported").increment(1);
            return ExecutionOutcome::failure(format!("Unsupported language: {language}"));
        };

        let endpoint = format!("{}/execute", self.base_url);
        let payload = json!({
            "language": language,
            "version": version,
            "files": [{"content": code}],
            "stdin": stdin,
            "run_timeout": self.run_timeout_ms,
        });

        let mut delay = self.initial_retry_delay;
        let mut last_error = String::from("sandbox execution failed");

        for attempt in 0..=self.max_retries {
            match self.attempt_execute(&endpoint, &payload).await {
                Attempt::Done(outcome) => {
                    let status = if outcome.success { "success" } else { "failed" };
                    metrics::counter!("sandbox_executions_total", "status" => status).increment(1);
                    return outcome;
                }
                Attempt::Transient(message) => {
                    last_error = message;
                    if attempt < self.max_retries {
                        tracing::warn!(
                            language,
                            attempt,
                            error = %last_error,
                            "Transient sandbox failure, retrying"
                        );
                        metrics::counter!("sandbox_execution_retries_total").increment(1);
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                }
            }
        }

        metrics::counter!("sandbox_executions_total", "status" => "exhausted").increment(1);
        ExecutionOutcome::failure(last_error)
    }

    async fn attempt_execute(&self, endpoint: &str, payload: &Value) -> Attempt {
        let response = match self.client.post(endpoint).json(payload).send().await {
            Ok(response) => response,
            Err(err) => return Attempt::Transient(format!("Failed to call sandbox API: {err}")),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Attempt::Transient("Sandbox rate limit exceeded (429)".to_string());
        }

        let raw_body = match response.text().await {
            Ok(text) => text,
            Err(err) => {
                return Attempt::Transient(format!("Failed to read sandbox response: {err}"))
            }
        };

        if !status.is_success() {
            return Attempt::Done(ExecutionOutcome::failure(format!(
                "Sandbox returned status {status}: {raw_body}"
            )));
        }

        let parsed = match serde_json::from_str::<Value>(&raw_body) {
            Ok(value) => value,
            Err(err) => {
                return Attempt::Done(ExecutionOutcome::failure(format!(
                    "Sandbox returned non-JSON body: {err}"
                )))
            }
        };

        let run = parsed.get("run").cloned().unwrap_or(Value::Null);
        let output =
            run.get("output").and_then(Value::as_str).unwrap_or_default().to_string();
        let stderr = run.get("stderr").and_then(Value::as_str).unwrap_or_default();

        // A non-empty stderr counts as failure even when the run "succeeded";
        // the captured output is still returned for diagnostics.
        if !stderr.trim().is_empty() {
            return Attempt::Done(ExecutionOutcome {
                success: false,
                output,
                error: Some(stderr.to_string()),
            });
        }

        Attempt::Done(ExecutionOutcome { success: true, output, error: None })
    }
}
