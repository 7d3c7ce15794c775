use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use switchyard_core::refer::CONTROLLER;
use switchyard_core::{ApplicationError, Commandable, Openable, Parameters, References};
use tracing::Instrument;

use crate::instrument::Instrumenter;
use crate::services::commandable::operation_name;

/// Calls a controller in the same process through its command set.
///
/// Shares the call signature and instrumentation of
/// [`CommandableHttpClient`](super::CommandableHttpClient), so typed clients
/// can switch between in-process and remote calls.
pub struct DirectClient {
    name: String,
    controller: Option<Arc<dyn Commandable>>,
    instrumenter: Instrumenter,
    opened: AtomicBool,
}

impl DirectClient {
    /// `name` prefixes the instrumentation names, like a base route.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            controller: None,
            instrumenter: Instrumenter::default(),
            opened: AtomicBool::new(false),
        }
    }

    /// Picks up the `controller` reference when present.
    pub fn set_references(&mut self, references: &References) {
        self.controller = references.get_optional::<dyn Commandable>(CONTROLLER);
        self.instrumenter = Instrumenter::from_references(references);
    }

    pub fn set_controller(&mut self, controller: Arc<dyn Commandable>) {
        self.controller = Some(controller);
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.opened.load(Ordering::Acquire)
    }

    /// # Errors
    ///
    /// Returns `NO_CONTROLLER` when no controller was set.
    pub async fn open(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        if self.controller.is_none() {
            return Err(ApplicationError::configuration(
                correlation_id,
                "NO_CONTROLLER",
                "Controller reference is missing",
            ));
        }
        self.opened.store(true, Ordering::Release);
        Ok(())
    }

    /// # Errors
    ///
    /// Currently infallible; the signature matches [`Openable`].
    pub async fn close(&self, _correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        self.opened.store(false, Ordering::Release);
        Ok(())
    }

    /// Executes command `name` and decodes its result as `T`.
    ///
    /// # Errors
    ///
    /// Returns `NOT_OPENED` before open, `DESERIALIZATION_FAILED` when the
    /// result has the wrong shape, or the command's own error.
    pub async fn call_command<T: DeserializeOwned>(
        &self,
        name: &str,
        correlation_id: Option<&str>,
        params: Parameters,
    ) -> Result<T, ApplicationError> {
        let controller = match (&self.controller, self.is_open()) {
            (Some(controller), true) => Arc::clone(controller),
            _ => {
                return Err(ApplicationError::invalid_state(
                    correlation_id,
                    "NOT_OPENED",
                    "The direct client is not opened",
                ))
            }
        };

        let timing = self
            .instrumenter
            .instrument_call(correlation_id, &operation_name(&self.name, name));
        let result = async {
            let value = controller
                .command_set()
                .execute(correlation_id, name, params)
                .await?;
            serde_json::from_value(value).map_err(|e| {
                ApplicationError::invocation(
                    correlation_id,
                    "DESERIALIZATION_FAILED",
                    "Failed to deserialize the command result",
                )
                .with_cause(e)
            })
        }
        .instrument(timing.span())
        .await;
        timing.end_timing(&result);
        result
    }
}

#[async_trait]
impl Openable for DirectClient {
    fn is_open(&self) -> bool {
        DirectClient::is_open(self)
    }

    async fn open(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        DirectClient::open(self, correlation_id).await
    }

    async fn close(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        DirectClient::close(self, correlation_id).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use switchyard_core::{Command, CommandSet};

    use super::*;

    struct Adder(Arc<CommandSet>);

    impl Adder {
        fn new() -> Self {
            let mut set = CommandSet::new();
            set.add_command(Command::new("add", None, |_, params: Parameters| async move {
                let a: i64 = params.get_required_as("a")?;
                let b: i64 = params.get_required_as("b")?;
                Ok(json!(a + b))
            }))
            .unwrap();
            Self(Arc::new(set))
        }
    }

    impl Commandable for Adder {
        fn command_set(&self) -> Arc<CommandSet> {
            Arc::clone(&self.0)
        }
    }

    #[tokio::test]
    async fn open_without_controller_fails() {
        let client = DirectClient::new("calc");
        let err = client.open(Some("c")).await.unwrap_err();
        assert_eq!(err.code, "NO_CONTROLLER");
        assert!(!client.is_open());
    }

    #[tokio::test]
    async fn calls_controller_in_process() {
        let references = References::new();
        references.put::<dyn Commandable>(CONTROLLER, Arc::new(Adder::new()));

        let mut client = DirectClient::new("calc");
        client.set_references(&references);
        client.open(None).await.unwrap();

        let params = Parameters::from_json(None, json!({"a": 2, "b": 3})).unwrap();
        let sum: i64 = client.call_command("add", None, params).await.unwrap();
        assert_eq!(sum, 5);

        let err = client
            .call_command::<Value>("missing", Some("c"), Parameters::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, "CMD_NOT_FOUND");
    }

    #[tokio::test]
    async fn call_before_open_is_invalid_state() {
        let mut client = DirectClient::new("calc");
        client.set_controller(Arc::new(Adder::new()));
        let err = client
            .call_command::<Value>("add", None, Parameters::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, "NOT_OPENED");
    }
}
