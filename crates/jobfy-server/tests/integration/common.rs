use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use jobfy_core::testutil::{MockCredentials, MockHttpClient, MockResponse, StubAdapter, listing};
use jobfy_core::{AdapterRegistry, MemorySink, ScrapeOrchestrator};
use jobfy_server::routes;
use jobfy_server::state::AppState;

pub const TEST_API_KEY: &str = "test-secret-key";

pub struct TestApp {
    pub router: Router,
    pub client: MockHttpClient,
    pub sink: MemorySink,
}

/// Two public stub sites (`alpha`, `beta`) and one login site (`gamma`,
/// with credentials), all answering with canned listings.
pub fn default_client() -> MockHttpClient {
    MockHttpClient::new()
        .route(
            "https://alpha.test/search",
            MockResponse::ok(listing(&[
                ("Rust Engineer", "Acme", "https://alpha.test/jobs/1"),
                ("Go Engineer", "Globex", "https://alpha.test/jobs/2"),
            ])),
        )
        .route(
            "https://beta.test/search",
            MockResponse::ok(listing(&[("Data Engineer", "Initech", "/jobs/9")])),
        )
        .route("https://gamma.test/login", MockResponse::ok("welcome back"))
        .route(
            "https://gamma.test/search",
            MockResponse::ok(listing(&[("Platform Engineer", "Hooli", "/jobs/3")])),
        )
}

pub fn setup_test_app(client: MockHttpClient) -> TestApp {
    let registry = AdapterRegistry::builder()
        .register(StubAdapter::new("alpha"))
        .and_then(|b| b.register(StubAdapter::new("beta")))
        .and_then(|b| b.register(StubAdapter::new("gamma").with_auth()))
        .and_then(|b| b.register(StubAdapter::new("delta").with_auth()))
        .expect("valid stub registry")
        .build();

    let sink = MemorySink::new();
    let orchestrator = ScrapeOrchestrator::new(
        registry,
        client.clone(),
        MockCredentials::new().with("gamma", "me", "secret"),
        sink.clone(),
    );
    let state = Arc::new(AppState::new(orchestrator, TEST_API_KEY.to_string()));

    TestApp {
        router: routes::router(state),
        client,
        sink,
    }
}

impl TestApp {
    /// Send an authenticated request and decode the JSON body (`Null` when empty).
    pub async fn send(&self, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {TEST_API_KEY}"));
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).unwrap())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    /// Poll a run until it reaches a terminal status.
    pub async fn wait_for_run(&self, run_id: &str) -> serde_json::Value {
        for _ in 0..200 {
            let (status, run) = self.send("GET", &format!("/v1/runs/{run_id}"), None).await;
            assert_eq!(status, StatusCode::OK);
            if run["status"] == "completed" || run["status"] == "failed" {
                return run;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("run {run_id} did not finish");
    }
}
