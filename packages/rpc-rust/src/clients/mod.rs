//! Client side: REST calls with retries, commandable and in-process clients.

pub mod commandable_client;
pub mod config;
pub mod direct_client;
pub mod rest_client;
pub mod retry;
pub mod transport;

pub use commandable_client::CommandableHttpClient;
pub use config::{ClientOptions, CorrelationIdPlace, RestClientConfig};
pub use direct_client::DirectClient;
pub use rest_client::{add_filter_params, add_paging_params, RestClient};
pub use retry::{AttemptOutcome, RetryFailure, RetryPolicy};
pub use transport::{HttpTransport, ReqwestTransport, TransportError, TransportRequest, TransportResponse};
