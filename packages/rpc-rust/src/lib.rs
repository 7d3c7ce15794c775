//! Switchyard RPC: a shared HTTP endpoint, REST and commandable services
//! mounted on it, and the clients that call them.
//!
//! Services register their routes with an [`HttpEndpoint`] before it opens;
//! the endpoint builds one router from all registrations. Clients resolve a
//! connection, retry transient failures and turn error responses back into
//! [`ApplicationError`](switchyard_core::ApplicationError)s.

pub mod clients;
pub mod connect;
pub mod instrument;
pub mod services;
pub mod testing;

pub use clients::{CommandableHttpClient, DirectClient, RestClient, RestClientConfig};
pub use connect::HttpConnectionResolver;
pub use instrument::{InstrumentTiming, Instrumenter};
pub use services::{
    CommandableHttpService, EndpointConfig, HttpEndpoint, RestRoutes, RestService,
    RestServiceConfig,
};
