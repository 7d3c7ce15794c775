use std::ops::{Deref, DerefMut};

use http::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use switchyard_core::ApplicationError;
use tracing::Instrument;

use super::config::RestClientConfig;
use super::rest_client::RestClient;
use crate::services::commandable::operation_name;

/// Client for services that publish a command set.
///
/// Typed clients wrap this and delegate every operation to
/// [`CommandableHttpClient::call_command`].
pub struct CommandableHttpClient {
    client: RestClient,
}

impl CommandableHttpClient {
    #[must_use]
    pub fn new(config: RestClientConfig) -> Self {
        Self {
            client: RestClient::new(config),
        }
    }

    #[must_use]
    pub fn from_client(client: RestClient) -> Self {
        Self { client }
    }

    /// POSTs `params` to `{base_route}/{name}`, instrumented as `{base_route}.{name}`.
    ///
    /// `params` is usually a [`Parameters`](switchyard_core::Parameters) map,
    /// but any serializable entity is sent as the body as is.
    ///
    /// # Errors
    ///
    /// Returns the [`RestClient`] call errors, including the server's own.
    pub async fn call_command<T, P>(
        &self,
        name: &str,
        correlation_id: Option<&str>,
        params: &P,
    ) -> Result<T, ApplicationError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let timing = self
            .client
            .instrument_call(correlation_id, &operation_name(self.client.base_route(), name));
        let result = self
            .client
            .call_with_body(correlation_id, Method::POST, name, params)
            .instrument(timing.span())
            .await;
        timing.end_timing(&result);
        result
    }
}

impl Deref for CommandableHttpClient {
    type Target = RestClient;

    fn deref(&self) -> &RestClient {
        &self.client
    }
}

impl DerefMut for CommandableHttpClient {
    fn deref_mut(&mut self) -> &mut RestClient {
        &mut self.client
    }
}
