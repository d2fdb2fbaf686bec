use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::info;

use crate::utils::logging::TIMING_TARGET;

#[derive(Debug)]
pub struct OperationTimer {
    operation: String,
    ticket: u64,
    started_at: DateTime<Utc>,
    started_perf: Instant,
    status: String,
    detail: Option<String>,
    completed: bool,
}

impl OperationTimer {
    pub fn new(operation: &str, ticket: u64) -> Self {
        OperationTimer {
            operation: operation.to_string(),
            ticket,
            started_at: Utc::now(),
            started_perf: Instant::now(),
            status: "success".to_string(),
            detail: None,
            completed: false,
        }
    }

    pub fn log_started(&self) {
        info!(
            target: TIMING_TARGET,
            "event=operation_started operation={} ticket={} started_at={}",
            self.operation,
            self.ticket,
            self.started_at.to_rfc3339()
        );
    }

    pub fn mark_status(&mut self, status: &str, detail: Option<String>) {
        self.status = status.to_string();
        self.detail = detail;
    }

    pub fn log_completed(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        let completed_at = Utc::now();
        let duration = self.started_perf.elapsed().as_secs_f64();
        info!(
            target: TIMING_TARGET,
            "event=operation_completed operation={} ticket={} started_at={} completed_at={} duration_s={:.3} status={} detail={}",
            self.operation,
            self.ticket,
            self.started_at.to_rfc3339(),
            completed_at.to_rfc3339(),
            duration,
            self.status,
            self.detail.clone().unwrap_or_default()
        );
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        if !self.completed {
            self.mark_status("cancelled", None);
            self.log_completed();
        }
    }
}

pub fn start_operation_timer(operation: &str, ticket: u64) -> OperationTimer {
    let timer = OperationTimer::new(operation, ticket);
    timer.log_started();
    timer
}

pub fn complete_operation_timer(timer: &mut OperationTimer, status: &str, detail: Option<String>) {
    timer.mark_status(status, detail);
    timer.log_completed();
}

pub async fn log_llm_timing<T, F, Fut>(
    provider: &str,
    model: &str,
    operation: &str,
    metadata: Option<JsonValue>,
    call: F,
) -> Result<T, anyhow::Error>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let started_at = Utc::now();
    let started_perf = Instant::now();
    let metadata_text = metadata
        .as_ref()
        .map(|value| value.to_string())
        .unwrap_or_else(|| "{}".to_string());
    info!(
        target: TIMING_TARGET,
        "event=llm_request provider={} model={} operation={} started_at={} metadata={}",
        provider,
        model,
        operation,
        started_at.to_rfc3339(),
        metadata_text
    );

    let result = call().await;
    let status = if result.is_err() { "error" } else { "success" };

    let completed_at = Utc::now();
    let duration = started_perf.elapsed().as_secs_f64();
    info!(
        target: TIMING_TARGET,
        "event=llm_response provider={} model={} operation={} completed_at={} duration_s={:.3} status={} metadata={}",
        provider,
        model,
        operation,
        completed_at.to_rfc3339(),
        duration,
        status,
        metadata_text
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completing_twice_only_logs_once() {
        let mut timer = OperationTimer::new("generate", 3);
        complete_operation_timer(&mut timer, "fallback", Some("translation unavailable".into()));
        assert!(timer.completed);
        assert_eq!(timer.status, "fallback");
        complete_operation_timer(&mut timer, "success", None);
        assert_eq!(timer.status, "success");
        assert!(timer.completed);
    }

    #[tokio::test]
    async fn llm_timing_passes_through_the_result() {
        let ok = log_llm_timing("gemini", "model", "test", None, || async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err: Result<(), _> = log_llm_timing("gemini", "model", "test", None, || async {
            Err(anyhow::anyhow!("boom"))
        })
        .await;
        assert!(err.is_err());
    }
}
