//! Hosts the `Dummy` fixtures on one shared endpoint for manual checks.
//!
//! ```text
//! curl -X POST localhost:3000/v1/dummy/get_dummies -d '{}'
//! curl localhost:3000/heartbeat
//! curl localhost:3000/about
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use switchyard_core::refer::{CONTEXT_INFO, CONTROLLER, ENDPOINT};
use switchyard_core::{Commandable, ContextInfo, References};
use switchyard_rpc::services::{
    about_service, heartbeat_service, status_service, AboutConfig, CommandableHttpService,
    EndpointConfig, HeartbeatConfig, HttpEndpoint, RestService, RestServiceConfig, StatusConfig,
};
use switchyard_rpc::testing::DummyController;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Parser)]
#[command(name = "dummy-server", about = "Serves the dummy commandable service over HTTP")]
struct Args {
    #[arg(long, env = "HTTP_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "HTTP_PORT", default_value_t = 3000)]
    port: u16,

    /// Publish the generated OpenAPI document at `/v1/dummy/swagger`.
    #[arg(long, env = "SWAGGER_ENABLE")]
    swagger: bool,

    /// Expose Prometheus metrics on this address.
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,

    #[arg(long, env = "LOG_JSON")]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "switchyard=debug,dummy_server=debug,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    if let Some(addr) = args.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to install Prometheus exporter")?;
        info!(%addr, "Serving metrics");
    }

    let references = References::new();
    let controller: Arc<dyn Commandable> = DummyController::new();
    references.put(CONTROLLER, controller);
    references.put(
        CONTEXT_INFO,
        Arc::new(
            ContextInfo::new("dummy-server", uuid::Uuid::new_v4().simple().to_string())
                .with_description("Switchyard dummy server"),
        ),
    );
    let endpoint = Arc::new(HttpEndpoint::new(EndpointConfig::http(&args.host, args.port)));
    references.put(ENDPOINT, Arc::clone(&endpoint));
    endpoint.set_references(&references);

    let dummy = CommandableHttpService::new("v1/dummy");
    let mut config = RestServiceConfig::with_base_route("v1/dummy");
    config.swagger.enable = args.swagger;
    dummy.configure(config);

    let services: Vec<RestService> = vec![
        (*dummy).clone(),
        heartbeat_service(HeartbeatConfig::default()),
        about_service(AboutConfig::default()),
        status_service(StatusConfig::default()),
    ];

    for service in &services {
        service.set_references(&references)?;
        service.open(None).await?;
    }
    endpoint.open(None).await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutting down");

    endpoint.close(None).await?;
    for service in &services {
        service.close(None).await?;
        service.unset_references();
    }
    Ok(())
}
