use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use crate::common::{TEST_API_KEY, default_client, setup_test_app};

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app(default_client());

    let response = app
        .router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["sites"], 4);
}

#[tokio::test]
async fn openapi_document_is_public() {
    let app = setup_test_app(default_client());

    let response = app
        .router
        .oneshot(
            Request::get("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["paths"]["/v1/scrape"].is_object());
}

#[tokio::test]
async fn unauthenticated_request_returns_401() {
    let app = setup_test_app(default_client());

    let response = app
        .router
        .oneshot(Request::get("/v1/sites").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_api_key_returns_401() {
    let app = setup_test_app(default_client());

    let response = app
        .router
        .oneshot(
            Request::get("/v1/sites")
                .header("authorization", "Bearer wrong-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "unauthorized");
    assert!(!json["message"].as_str().unwrap().contains(TEST_API_KEY));
}

#[tokio::test]
async fn list_sites_reports_credentials() {
    let app = setup_test_app(default_client());

    let (status, json) = app.send("GET", "/v1/sites", None).await;
    assert_eq!(status, StatusCode::OK);

    let sites = json["sites"].as_array().unwrap();
    let ids: Vec<_> = sites.iter().map(|s| s["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["alpha", "beta", "gamma", "delta"]);

    assert_eq!(sites[0]["requires_auth"], false);
    assert_eq!(sites[2]["requires_auth"], true);
    assert_eq!(sites[2]["credentials_configured"], true);
    assert_eq!(sites[3]["credentials_configured"], false);
}

#[tokio::test]
async fn scrape_run_completes_and_collects_offers() {
    let app = setup_test_app(default_client());

    let (status, json) = app
        .send(
            "POST",
            "/v1/scrape",
            Some(serde_json::json!({"sites": ["alpha", "beta", "gamma"], "keyword": "engineer"})),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let run_id = json["run_id"].as_str().unwrap().to_string();

    let run = app.wait_for_run(&run_id).await;
    assert_eq!(run["status"], "completed");
    assert_eq!(run["jobs_found"], 4);
    assert_eq!(run["keyword"], "engineer");
    assert_eq!(run["per_site_outcome"]["alpha"]["count"], 2);
    assert_eq!(run["per_site_outcome"]["gamma"]["error"], serde_json::Value::Null);
    assert!(run["finished_at"].is_string());
    assert_eq!(app.client.calls_to("https://gamma.test/login"), 1);

    let (status, offers) = app.send("GET", "/v1/jobs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(offers["total"], 4);

    let (_, filtered) = app.send("GET", "/v1/jobs?source=beta", None).await;
    assert_eq!(filtered["total"], 1);
    assert_eq!(filtered["offers"][0]["apply_link"], "https://beta.test/jobs/9");
    assert_eq!(filtered["offers"][0]["company"], "Initech");

    let (_, searched) = app.send("GET", "/v1/jobs?search=RUST&limit=1", None).await;
    assert_eq!(searched["total"], 1);
    assert_eq!(searched["offers"][0]["title"], "Rust Engineer");
    assert_eq!(app.sink.len(), 4);
}

#[tokio::test]
async fn repeated_runs_do_not_duplicate_offers() {
    let app = setup_test_app(default_client());

    for _ in 0..2 {
        let (status, json) = app
            .send("POST", "/v1/scrape", Some(serde_json::json!({"sites": ["alpha"]})))
            .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        app.wait_for_run(json["run_id"].as_str().unwrap()).await;
    }

    let (_, offers) = app.send("GET", "/v1/jobs", None).await;
    assert_eq!(offers["total"], 2);

    let (_, runs) = app.send("GET", "/v1/runs", None).await;
    assert_eq!(runs["total"], 2);
}

#[tokio::test]
async fn missing_credentials_fail_only_that_site() {
    let app = setup_test_app(default_client());

    let (_, json) = app
        .send(
            "POST",
            "/v1/scrape",
            Some(serde_json::json!({"sites": ["alpha", "delta"]})),
        )
        .await;
    let run = app.wait_for_run(json["run_id"].as_str().unwrap()).await;

    assert_eq!(run["status"], "completed");
    assert_eq!(run["jobs_found"], 2);
    assert_eq!(
        run["per_site_outcome"]["delta"]["error"],
        "AuthenticationError"
    );
    assert_eq!(app.client.calls_to("https://delta.test"), 0);
}

#[tokio::test]
async fn invalid_scrape_request_returns_400() {
    let app = setup_test_app(default_client());

    let (status, json) = app
        .send("POST", "/v1/scrape", Some(serde_json::json!({"sites": []})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");

    let (status, json) = app
        .send(
            "POST",
            "/v1/scrape",
            Some(serde_json::json!({"sites": ["alpha", "nowhere"]})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].as_str().unwrap().contains("nowhere"));
    assert_eq!(app.client.call_count(), 0);

    // Rejected requests are still part of the run history.
    let (_, runs) = app.send("GET", "/v1/runs", None).await;
    assert_eq!(runs["total"], 2);
    assert!(
        runs["runs"]
            .as_array()
            .unwrap()
            .iter()
            .all(|r| r["status"] == "failed")
    );
}

#[tokio::test]
async fn get_unknown_run_returns_404() {
    let app = setup_test_app(default_client());

    let (status, json) = app
        .send("GET", &format!("/v1/runs/{}", Uuid::new_v4()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn cancel_run_lifecycle() {
    let app = setup_test_app(default_client().with_latency(Duration::from_secs(30)));

    let (_, json) = app
        .send(
            "POST",
            "/v1/scrape",
            Some(serde_json::json!({"sites": ["alpha", "beta"]})),
        )
        .await;
    let run_id = json["run_id"].as_str().unwrap().to_string();

    let (status, _) = app.send("DELETE", &format!("/v1/runs/{run_id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let run = app.wait_for_run(&run_id).await;
    assert_eq!(run["status"], "completed");
    assert_eq!(run["jobs_found"], 0);
    assert_eq!(run["per_site_outcome"]["alpha"]["error"], "Cancelled");
    assert_eq!(run["per_site_outcome"]["beta"]["error"], "Cancelled");

    let (status, json) = app.send("DELETE", &format!("/v1/runs/{run_id}"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "conflict");

    let (status, _) = app
        .send("DELETE", &format!("/v1/runs/{}", Uuid::new_v4()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
