//! Tracer collaborator: records completed and failed operations.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::errors::ApplicationError;

pub trait Tracer: Send + Sync {
    /// Records a successful operation.
    fn trace(&self, correlation_id: Option<&str>, operation: &str, elapsed: Duration);

    /// Records a failed operation.
    fn failure(
        &self,
        correlation_id: Option<&str>,
        operation: &str,
        error: &ApplicationError,
        elapsed: Duration,
    );
}

/// Writes traces as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTracer;

impl Tracer for LogTracer {
    fn trace(&self, correlation_id: Option<&str>, operation: &str, elapsed: Duration) {
        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = elapsed.as_millis() as u64;
        debug!(correlation_id, operation, duration_ms, "operation complete");
    }

    fn failure(
        &self,
        correlation_id: Option<&str>,
        operation: &str,
        error: &ApplicationError,
        elapsed: Duration,
    ) {
        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = elapsed.as_millis() as u64;
        warn!(
            correlation_id,
            operation,
            duration_ms,
            code = %error.code,
            "operation failed: {error}"
        );
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullTracer;

impl Tracer for NullTracer {
    fn trace(&self, _correlation_id: Option<&str>, _operation: &str, _elapsed: Duration) {}

    fn failure(
        &self,
        _correlation_id: Option<&str>,
        _operation: &str,
        _error: &ApplicationError,
        _elapsed: Duration,
    ) {
    }
}

/// Span of one traced operation. Ending it consumes the value.
#[must_use = "a trace timing records nothing until it is ended"]
pub struct TraceTiming {
    tracer: Arc<dyn Tracer>,
    correlation_id: Option<String>,
    operation: String,
    start: Instant,
}

impl TraceTiming {
    pub fn begin(tracer: Arc<dyn Tracer>, correlation_id: Option<&str>, operation: &str) -> Self {
        Self {
            tracer,
            correlation_id: correlation_id.map(str::to_string),
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn end_trace(self) {
        self.tracer
            .trace(self.correlation_id.as_deref(), &self.operation, self.start.elapsed());
    }

    pub fn end_failure(self, error: &ApplicationError) {
        self.tracer.failure(
            self.correlation_id.as_deref(),
            &self.operation,
            error,
            self.start.elapsed(),
        );
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingTracer {
        events: Mutex<Vec<String>>,
    }

    impl Tracer for RecordingTracer {
        fn trace(&self, correlation_id: Option<&str>, operation: &str, _elapsed: Duration) {
            self.events
                .lock()
                .push(format!("ok:{operation}:{}", correlation_id.unwrap_or("-")));
        }

        fn failure(
            &self,
            _correlation_id: Option<&str>,
            operation: &str,
            error: &ApplicationError,
            _elapsed: Duration,
        ) {
            self.events.lock().push(format!("err:{operation}:{}", error.code));
        }
    }

    #[test]
    fn timing_reports_success_and_failure() {
        let tracer = Arc::new(RecordingTracer::default());

        TraceTiming::begin(tracer.clone(), Some("c1"), "svc.op").end_trace();
        TraceTiming::begin(tracer.clone(), None, "svc.op")
            .end_failure(&ApplicationError::unknown(None, "BOOM", "boom"));

        assert_eq!(*tracer.events.lock(), vec!["ok:svc.op:c1", "err:svc.op:BOOM"]);
    }

    #[test]
    fn log_tracer_does_not_panic() {
        LogTracer.trace(Some("c"), "op", Duration::from_millis(1));
        LogTracer.failure(None, "op", &ApplicationError::unknown(None, "X", "x"), Duration::ZERO);
    }
}
