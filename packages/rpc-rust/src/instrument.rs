//! Call instrumentation: logging, counters and tracing around one operation.
//!
//! [`Instrumenter::instrument_exec`] returns an [`InstrumentTiming`] guard that
//! must be closed exactly once. Ending it consumes the guard; dropping an
//! unclosed guard closes it as a success.

use std::sync::Arc;

use switchyard_core::refer::{COUNTERS, TRACER};
use switchyard_core::{
    ApplicationError, CounterTiming, Counters, LogTracer, MetricsCounters, References,
    TraceTiming, Tracer,
};
use tracing::{error, info_span, trace, Span};

/// Builds [`InstrumentTiming`] guards from the configured collaborators.
#[derive(Clone)]
pub struct Instrumenter {
    counters: Arc<dyn Counters>,
    tracer: Arc<dyn Tracer>,
}

impl Default for Instrumenter {
    fn default() -> Self {
        Self {
            counters: Arc::new(MetricsCounters),
            tracer: Arc::new(LogTracer),
        }
    }
}

impl Instrumenter {
    #[must_use]
    pub fn new(counters: Arc<dyn Counters>, tracer: Arc<dyn Tracer>) -> Self {
        Self { counters, tracer }
    }

    /// Uses the `counters` and `tracer` references when present, falling
    /// back to the `metrics` facade and the log tracer.
    #[must_use]
    pub fn from_references(references: &References) -> Self {
        let defaults = Self::default();
        Self {
            counters: references
                .get_optional::<dyn Counters>(COUNTERS)
                .unwrap_or(defaults.counters),
            tracer: references
                .get_optional::<dyn Tracer>(TRACER)
                .unwrap_or(defaults.tracer),
        }
    }

    /// Instruments a server-side execution (`exec` counters).
    pub fn instrument_exec(&self, correlation_id: Option<&str>, name: &str) -> InstrumentTiming {
        trace!(correlation_id, "Executing {} method", name);
        self.begin(correlation_id, name, "exec")
    }

    /// Instruments a client-side call (`call` counters).
    pub fn instrument_call(&self, correlation_id: Option<&str>, name: &str) -> InstrumentTiming {
        trace!(correlation_id, "Calling {} method", name);
        self.begin(correlation_id, name, "call")
    }

    fn begin(&self, correlation_id: Option<&str>, name: &str, verb: &'static str) -> InstrumentTiming {
        self.counters.increment_one(&format!("{name}.{verb}_count"));
        let span = info_span!("rpc", operation = %name, verb, correlation_id);
        InstrumentTiming {
            inner: Some(TimingState {
                correlation_id: correlation_id.map(str::to_string),
                name: name.to_string(),
                verb,
                counters: Arc::clone(&self.counters),
                counter_timing: CounterTiming::start(
                    Arc::clone(&self.counters),
                    format!("{name}.{verb}_time"),
                ),
                trace_timing: TraceTiming::begin(Arc::clone(&self.tracer), correlation_id, name),
                span,
            }),
        }
    }
}

struct TimingState {
    correlation_id: Option<String>,
    name: String,
    verb: &'static str,
    counters: Arc<dyn Counters>,
    counter_timing: CounterTiming,
    trace_timing: TraceTiming,
    span: Span,
}

impl TimingState {
    fn succeed(self) {
        let _ = self.counter_timing.end_timing();
        self.trace_timing.end_trace();
    }

    fn fail(self, err: &ApplicationError) {
        let _ = self.counter_timing.end_timing();
        let action = if self.verb == "call" { "call" } else { "execute" };
        error!(
            correlation_id = self.correlation_id.as_deref(),
            code = %err.code,
            "Failed to {} {} method: {}",
            action,
            self.name,
            err
        );
        self.counters
            .increment_one(&format!("{}.{}_errors", self.name, self.verb));
        self.trace_timing.end_failure(err);
    }
}

/// Scoped timing of one operation, closed exactly once.
#[must_use = "dropping the timing immediately records a zero-length success"]
pub struct InstrumentTiming {
    inner: Option<TimingState>,
}

impl InstrumentTiming {
    /// Span covering the operation, for `.instrument()` on its future.
    #[must_use]
    pub fn span(&self) -> Span {
        self.inner
            .as_ref()
            .map_or_else(Span::none, |state| state.span.clone())
    }

    pub fn end_success(mut self) {
        if let Some(state) = self.inner.take() {
            state.succeed();
        }
    }

    pub fn end_failure(mut self, err: &ApplicationError) {
        if let Some(state) = self.inner.take() {
            state.fail(err);
        }
    }

    /// Ends as success or failure depending on `result`.
    pub fn end_timing<T>(self, result: &Result<T, ApplicationError>) {
        match result {
            Ok(_) => self.end_success(),
            Err(err) => self.end_failure(err),
        }
    }
}

impl Drop for InstrumentTiming {
    fn drop(&mut self) {
        if let Some(state) = self.inner.take() {
            state.succeed();
        }
    }
}

#[cfg(test)]
mod tests {
    use switchyard_core::{MemoryCounters, NullTracer};

    use super::*;

    fn instrumenter() -> (Instrumenter, Arc<MemoryCounters>) {
        let counters = Arc::new(MemoryCounters::new());
        (Instrumenter::new(counters.clone(), Arc::new(NullTracer)), counters)
    }

    #[test]
    fn success_counts_call_and_time() {
        let (instrumenter, counters) = instrumenter();
        instrumenter.instrument_exec(Some("c"), "dummy.get").end_success();

        assert_eq!(counters.count("dummy.get.exec_count"), 1);
        assert_eq!(counters.timing_samples("dummy.get.exec_time"), 1);
        assert_eq!(counters.count("dummy.get.exec_errors"), 0);
    }

    #[test]
    fn failure_counts_errors_once() {
        let (instrumenter, counters) = instrumenter();
        let err = ApplicationError::unknown(None, "BOOM", "boom");
        instrumenter.instrument_call(None, "dummy.get").end_failure(&err);

        assert_eq!(counters.count("dummy.get.call_count"), 1);
        assert_eq!(counters.count("dummy.get.call_errors"), 1);
        assert_eq!(counters.timing_samples("dummy.get.call_time"), 1);
    }

    #[test]
    fn dropped_guard_ends_once_as_success() {
        let (instrumenter, counters) = instrumenter();
        {
            let _timing = instrumenter.instrument_exec(None, "dummy.drop");
        }
        assert_eq!(counters.timing_samples("dummy.drop.exec_time"), 1);
        assert_eq!(counters.count("dummy.drop.exec_errors"), 0);
    }

    #[test]
    fn end_timing_dispatches_on_result() {
        let (instrumenter, counters) = instrumenter();
        let failed: Result<(), _> = Err(ApplicationError::conflict(None, "C", "c"));
        instrumenter.instrument_exec(None, "op").end_timing(&failed);
        instrumenter.instrument_exec(None, "op").end_timing(&Ok::<_, ApplicationError>(1));

        assert_eq!(counters.count("op.exec_count"), 2);
        assert_eq!(counters.count("op.exec_errors"), 1);
        assert_eq!(counters.timing_samples("op.exec_time"), 2);
    }

    #[test]
    fn from_references_prefers_registered_counters() {
        let counters = Arc::new(MemoryCounters::new());
        let references = References::new();
        references.put::<dyn Counters>(COUNTERS, counters.clone());

        Instrumenter::from_references(&references)
            .instrument_exec(None, "op")
            .end_success();
        assert_eq!(counters.count("op.exec_count"), 1);
    }
}
