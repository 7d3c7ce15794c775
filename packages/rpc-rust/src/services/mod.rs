//! Server side: the shared HTTP endpoint and the services mounted on it.

pub mod about;
pub mod commandable;
pub mod config;
pub mod endpoint;
pub mod heartbeat;
pub mod middleware;
pub mod request;
pub mod response;
pub mod rest_service;
pub mod status;
pub mod swagger;

pub use about::{about_service, AboutConfig, AboutOperations, AboutReport};
pub use commandable::{CommandableHttpService, CommandableRoutes};
pub use config::{CredentialConfig, EndpointConfig, EndpointOptions, RestServiceConfig, SwaggerConfig};
pub use endpoint::{EndpointState, HttpEndpoint, Registrable, RouteRegistrar};
pub use heartbeat::{heartbeat_service, HeartbeatConfig};
pub use request::{HttpRequest, CORRELATION_ID};
pub use response::ErrorResponse;
pub use rest_service::{RestRoutes, RestService, ServiceRoutes};
pub use status::{status_service, StatusConfig, StatusReport};
