//! End-to-end runs of the dummy service over a real listener.

use std::sync::Arc;

use serde_json::{json, Value};
use switchyard_core::refer::{CONTEXT_INFO, CONTROLLER, ENDPOINT};
use switchyard_core::{Commandable, ContextInfo, FilterParams, PagingParams, References};

use super::clients::{DummyClient, DummyCommandableHttpClient};
use super::dummy::{Dummy, DummyController};
use crate::clients::{CorrelationIdPlace, RestClientConfig};
use crate::services::{
    about_service, heartbeat_service, status_service, AboutConfig, CommandableHttpService,
    EndpointConfig, HeartbeatConfig, HttpEndpoint, RestService, RestServiceConfig, StatusConfig,
};

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// A shared endpoint with the given services mounted and opened.
struct Server {
    endpoint: Arc<HttpEndpoint>,
    services: Vec<RestService>,
    uri: String,
}

impl Server {
    async fn start(references: &References, services: Vec<RestService>) -> Self {
        let mounted = services
            .into_iter()
            .map(|service| (references, service))
            .collect();
        Self::start_each(mounted).await
    }

    /// Mounts each service with its own references on one shared endpoint.
    async fn start_each(mounted: Vec<(&References, RestService)>) -> Self {
        let port = free_port();
        let endpoint = Arc::new(HttpEndpoint::new(EndpointConfig::http("127.0.0.1", port)));
        let mut services = Vec::with_capacity(mounted.len());
        for (references, service) in mounted {
            references.put(ENDPOINT, Arc::clone(&endpoint));
            service.set_references(references).unwrap();
            service.open(None).await.unwrap();
            services.push(service);
        }
        endpoint.open(None).await.unwrap();
        Self {
            endpoint,
            services,
            uri: format!("http://127.0.0.1:{port}"),
        }
    }

    async fn stop(self) {
        self.endpoint.close(None).await.unwrap();
        for service in &self.services {
            service.close(None).await.unwrap();
            service.unset_references();
        }
    }
}

fn dummy_references() -> References {
    let references = References::new();
    references.put::<dyn Commandable>(CONTROLLER, DummyController::new());
    references
}

fn dummy_service(base_route: &str, swagger: bool) -> RestService {
    let service = CommandableHttpService::new(base_route);
    let mut config = RestServiceConfig::with_base_route(base_route);
    config.swagger.enable = swagger;
    service.configure(config);
    (*service).clone()
}

async fn open_client(uri: &str, base_route: &str, place: CorrelationIdPlace) -> DummyCommandableHttpClient {
    let mut config = RestClientConfig::new(uri, base_route);
    config.options.retries = 1;
    config.options.correlation_id_place = place;
    let client = DummyCommandableHttpClient::new(config);
    client.inner().open(None).await.unwrap();
    client
}

#[tokio::test]
async fn commandable_crud_over_http() {
    let references = dummy_references();
    let server = Server::start(&references, vec![dummy_service("v1/dummy", false)]).await;
    let client = open_client(&server.uri, "v1/dummy", CorrelationIdPlace::Query).await;

    let created = client
        .create_dummy(Some("c1"), Dummy::new("Key 1", "Content 1"))
        .await
        .unwrap()
        .unwrap();
    let id = created.id.clone().unwrap();
    let second = client
        .create_dummy(None, Dummy::new("Key 2", "Content 2"))
        .await
        .unwrap()
        .unwrap();

    let page = client
        .get_dummies(None, FilterParams::new(), PagingParams::new(None, None, true))
        .await
        .unwrap();
    assert_eq!(page.total, Some(2));
    assert_eq!(page.data, vec![created.clone(), second]);

    let filtered = client
        .get_dummies(None, FilterParams::new().with("key", "Key 1"), PagingParams::default())
        .await
        .unwrap();
    assert_eq!(filtered.data, vec![created.clone()]);

    let mut changed = created.clone();
    changed.content = Some("Updated".into());
    let updated = client.update_dummy(None, changed.clone()).await.unwrap();
    assert_eq!(updated, Some(changed.clone()));

    assert_eq!(client.get_dummy_by_id(None, &id).await.unwrap(), Some(changed.clone()));
    assert_eq!(client.delete_dummy(None, &id).await.unwrap(), Some(changed));
    assert_eq!(client.get_dummy_by_id(None, &id).await.unwrap(), None);
    assert!(client.ping().await.unwrap());

    client.inner().close(None).await.unwrap();
    server.stop().await;
}

#[tokio::test]
async fn controller_errors_reach_the_client() {
    let references = dummy_references();
    let server = Server::start(&references, vec![dummy_service("v1/dummy", false)]).await;
    let client = open_client(&server.uri, "v1/dummy", CorrelationIdPlace::Query).await;

    let err = client.raise_exception(Some("err-1")).await.unwrap_err();
    assert_eq!(err.code, "TEST_ERROR");
    assert_eq!(err.status, 404);
    assert_eq!(err.correlation_id.as_deref(), Some("err-1"));

    let invalid: Result<Value, _> = client
        .inner()
        .call_command(
            "create_dummy",
            Some("err-2"),
            &switchyard_core::Parameters::from_json(None, json!({"dummy": {"content": "no key"}})).unwrap(),
        )
        .await;
    let err = invalid.unwrap_err();
    assert_eq!(err.code, "INVALID_DATA");
    assert_eq!(err.status, 400);

    server.stop().await;
}

#[tokio::test]
async fn correlation_id_travels_in_query_or_headers() {
    let references = dummy_references();
    let server = Server::start(&references, vec![dummy_service("v1/dummy", false)]).await;

    for place in [CorrelationIdPlace::Query, CorrelationIdPlace::Headers] {
        let client = open_client(&server.uri, "v1/dummy", place).await;
        let echoed = client.check_correlation_id(Some("test_cor_id")).await.unwrap();
        assert_eq!(echoed.as_deref(), Some("test_cor_id"), "{place:?}");
        assert_eq!(client.check_correlation_id(None).await.unwrap(), None);
    }

    server.stop().await;
}

#[tokio::test]
async fn services_share_one_endpoint() {
    let references = dummy_references();
    let server = Server::start(
        &references,
        vec![dummy_service("v1/dummy", false), dummy_service("v2/dummy", false)],
    )
    .await;
    assert!(server.services.iter().all(|s| !s.has_local_endpoint()));

    let v1 = open_client(&server.uri, "v1/dummy", CorrelationIdPlace::Query).await;
    let v2 = open_client(&server.uri, "v2/dummy", CorrelationIdPlace::Query).await;

    let created = v1
        .create_dummy(None, Dummy::new("shared", "one"))
        .await
        .unwrap()
        .unwrap();
    let found = v2.get_dummy_by_id(None, created.id.as_deref().unwrap()).await.unwrap();
    assert_eq!(found, Some(created));

    server.stop().await;
}

#[tokio::test]
async fn services_with_own_controllers_do_not_interfere() {
    let (first, second) = (dummy_references(), dummy_references());
    let server = Server::start_each(vec![
        (&first, dummy_service("v1/dummy", false)),
        (&second, dummy_service("v2/dummy", false)),
    ])
    .await;
    assert!(server.services.iter().all(|s| !s.has_local_endpoint()));

    let v1 = open_client(&server.uri, "v1/dummy", CorrelationIdPlace::Query).await;
    let v2 = open_client(&server.uri, "v2/dummy", CorrelationIdPlace::Query).await;

    let created = v1
        .create_dummy(None, Dummy::new("only-v1", "one"))
        .await
        .unwrap()
        .unwrap();
    let id = created.id.clone().unwrap();

    assert_eq!(v1.get_dummy_by_id(None, &id).await.unwrap(), Some(created));
    assert_eq!(v2.get_dummy_by_id(None, &id).await.unwrap(), None);
    let page = v2
        .get_dummies(None, FilterParams::new(), PagingParams::new(None, None, true))
        .await
        .unwrap();
    assert_eq!(page.total, Some(0));

    server.stop().await;
}

#[tokio::test]
async fn generated_open_api_document_is_served() {
    let references = dummy_references();
    let server = Server::start(&references, vec![dummy_service("v1/dummy", true)]).await;

    let response = reqwest::get(format!("{}/v1/dummy/swagger", server.uri)).await.unwrap();
    assert_eq!(response.status(), 200);
    let doc: Value = response.json().await.unwrap();
    assert!(doc["paths"]["/v1/dummy/create_dummy"]["post"].is_object());
    assert!(doc["paths"]["/v1/dummy/ping_dummy"]["post"].is_object());

    server.stop().await;
}

#[tokio::test]
async fn heartbeat_status_about_and_unknown_routes() {
    let references = dummy_references();
    references.put(CONTEXT_INFO, Arc::new(ContextInfo::new("dummy", "ctx-1")));
    let server = Server::start(
        &references,
        vec![
            heartbeat_service(HeartbeatConfig::default()),
            status_service(StatusConfig::default()),
            about_service(AboutConfig::default()),
        ],
    )
    .await;

    let heartbeat = reqwest::get(format!("{}/heartbeat", server.uri)).await.unwrap();
    assert_eq!(heartbeat.status(), 200);
    let stamp: String = heartbeat.json().await.unwrap();
    assert!(stamp.contains('T') && stamp.ends_with('Z'), "{stamp}");

    let status: Value = reqwest::get(format!("{}/status", server.uri))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["name"], "dummy");
    assert_eq!(status["id"], "ctx-1");
    assert!(status["components"]
        .as_array()
        .unwrap()
        .iter()
        .any(|c| c == "controller"));

    let about: Value = reqwest::Client::new()
        .get(format!("{}/about", server.uri))
        .header("user-agent", "scenario-client")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(about["server"]["name"], "dummy");
    assert_eq!(about["server"]["host"], "127.0.0.1");
    assert_eq!(about["client"]["client"], "scenario-client");

    let missing = reqwest::get(format!("{}/nowhere", server.uri)).await.unwrap();
    assert_eq!(missing.status(), 404);
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body["code"], "ROUTE_NOT_FOUND");

    server.stop().await;
}
