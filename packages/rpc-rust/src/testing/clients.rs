//! Typed `Dummy` clients over HTTP and in-process.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use switchyard_core::{ApplicationError, DataPage, FilterParams, PagingParams, Parameters};

use super::dummy::Dummy;
use crate::clients::{CommandableHttpClient, DirectClient, RestClientConfig};

/// Operations of the dummy service, independent of the transport.
#[async_trait]
pub trait DummyClient: Send + Sync {
    async fn get_dummies(
        &self,
        correlation_id: Option<&str>,
        filter: FilterParams,
        paging: PagingParams,
    ) -> Result<DataPage<Dummy>, ApplicationError>;

    async fn get_dummy_by_id(
        &self,
        correlation_id: Option<&str>,
        dummy_id: &str,
    ) -> Result<Option<Dummy>, ApplicationError>;

    async fn create_dummy(
        &self,
        correlation_id: Option<&str>,
        dummy: Dummy,
    ) -> Result<Option<Dummy>, ApplicationError>;

    async fn update_dummy(
        &self,
        correlation_id: Option<&str>,
        dummy: Dummy,
    ) -> Result<Option<Dummy>, ApplicationError>;

    async fn delete_dummy(
        &self,
        correlation_id: Option<&str>,
        dummy_id: &str,
    ) -> Result<Option<Dummy>, ApplicationError>;

    async fn check_correlation_id(
        &self,
        correlation_id: Option<&str>,
    ) -> Result<Option<String>, ApplicationError>;

    async fn raise_exception(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError>;

    async fn ping(&self) -> Result<bool, ApplicationError>;
}

#[derive(Deserialize)]
struct CorrelationEcho {
    correlation_id: Option<String>,
}

fn params(value: serde_json::Value) -> Result<Parameters, ApplicationError> {
    Parameters::from_json(None, value)
}

/// Implements [`DummyClient`] on top of the client's own `call` method.
macro_rules! impl_dummy_client {
    ($client:ty) => {
        #[async_trait]
        impl DummyClient for $client {
            async fn get_dummies(
                &self,
                correlation_id: Option<&str>,
                filter: FilterParams,
                paging: PagingParams,
            ) -> Result<DataPage<Dummy>, ApplicationError> {
                let params = params(json!({"filter": filter, "paging": paging}))?;
                self.call("get_dummies", correlation_id, params).await
            }

            async fn get_dummy_by_id(
                &self,
                correlation_id: Option<&str>,
                dummy_id: &str,
            ) -> Result<Option<Dummy>, ApplicationError> {
                let params = params(json!({"dummy_id": dummy_id}))?;
                self.call("get_dummy_by_id", correlation_id, params).await
            }

            async fn create_dummy(
                &self,
                correlation_id: Option<&str>,
                dummy: Dummy,
            ) -> Result<Option<Dummy>, ApplicationError> {
                let params = params(json!({"dummy": dummy}))?;
                self.call("create_dummy", correlation_id, params).await
            }

            async fn update_dummy(
                &self,
                correlation_id: Option<&str>,
                dummy: Dummy,
            ) -> Result<Option<Dummy>, ApplicationError> {
                let params = params(json!({"dummy": dummy}))?;
                self.call("update_dummy", correlation_id, params).await
            }

            async fn delete_dummy(
                &self,
                correlation_id: Option<&str>,
                dummy_id: &str,
            ) -> Result<Option<Dummy>, ApplicationError> {
                let params = params(json!({"dummy_id": dummy_id}))?;
                self.call("delete_dummy", correlation_id, params).await
            }

            async fn check_correlation_id(
                &self,
                correlation_id: Option<&str>,
            ) -> Result<Option<String>, ApplicationError> {
                let echo: CorrelationEcho = self
                    .call("check_correlation_id", correlation_id, Parameters::new())
                    .await?;
                Ok(echo.correlation_id)
            }

            async fn raise_exception(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
                self.call("raise_exception", correlation_id, Parameters::new())
                    .await
            }

            async fn ping(&self) -> Result<bool, ApplicationError> {
                self.call("ping_dummy", None, Parameters::new()).await
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Over HTTP
// ---------------------------------------------------------------------------

/// [`DummyClient`] calling a commandable HTTP service.
pub struct DummyCommandableHttpClient {
    client: CommandableHttpClient,
}

impl DummyCommandableHttpClient {
    #[must_use]
    pub fn new(config: RestClientConfig) -> Self {
        Self {
            client: CommandableHttpClient::new(config),
        }
    }

    #[must_use]
    pub fn from_client(client: CommandableHttpClient) -> Self {
        Self { client }
    }

    #[must_use]
    pub fn inner(&self) -> &CommandableHttpClient {
        &self.client
    }

    pub fn inner_mut(&mut self) -> &mut CommandableHttpClient {
        &mut self.client
    }

    async fn call<T: DeserializeOwned>(
        &self,
        name: &str,
        correlation_id: Option<&str>,
        params: Parameters,
    ) -> Result<T, ApplicationError> {
        self.client.call_command(name, correlation_id, &params).await
    }
}

impl_dummy_client!(DummyCommandableHttpClient);

// ---------------------------------------------------------------------------
// In-process
// ---------------------------------------------------------------------------

/// [`DummyClient`] calling the controller directly.
pub struct DummyDirectClient {
    client: DirectClient,
}

impl Default for DummyDirectClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyDirectClient {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: DirectClient::new("dummy"),
        }
    }

    #[must_use]
    pub fn inner(&self) -> &DirectClient {
        &self.client
    }

    pub fn inner_mut(&mut self) -> &mut DirectClient {
        &mut self.client
    }

    async fn call<T: DeserializeOwned>(
        &self,
        name: &str,
        correlation_id: Option<&str>,
        params: Parameters,
    ) -> Result<T, ApplicationError> {
        self.client.call_command(name, correlation_id, params).await
    }
}

impl_dummy_client!(DummyDirectClient);
