use std::time::Duration;

use axum_test::TestServer;
use serde_json::{json, Value};
use server::config::AppConfig;
use server::{create_router, state::AppState};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup_test_server() -> (TestServer, MockServer) {
    let mock_service = MockServer::start().await;

    let mut config = AppConfig::default();
    config.generation_service.base_url = format!("{}/api", mock_service.uri());

    let state = AppState::new(config).expect("Failed to create app state");
    let app = create_router(state);
    let server = TestServer::new(app).expect("Failed to create test server");

    (server, mock_service)
}

fn artifact(id: &str) -> Value {
    json!({
        "id": id,
        "name": format!("template_{}", id),
        "categoryRef": 9,
        "signature": "fn(input: string) -> string"
    })
}

async fn mount_initial(mock: &MockServer, body: Value) {
    Mock::given(method("POST"))
        .and(path("/api/generate/initial"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(mock)
        .await;
}

async fn mount_continue(mock: &MockServer, after_unit: u64, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/api/generate/continue"))
        .and(body_partial_json(json!({ "lastProcessedUnit": after_unit })))
        .respond_with(response)
        .mount(mock)
        .await;
}

fn continuation(artifact_id: &str, last: u64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "artifacts": [artifact(artifact_id)],
        "lastProcessedUnit": last
    }))
}

fn initial_body(artifact_id: &str, last: u64, total: u64) -> Value {
    json!({
        "artifacts": [artifact(artifact_id)],
        "totalUnits": total,
        "lastProcessedUnit": last,
        "sideChannelIds": { "applicationRef": "42", "categoryRefs": [9] }
    })
}

fn start_body() -> Value {
    json!({
        "inputDocument": "get weather\nset alarm\nplay music",
        "instructions": "one template per intent",
        "domainHint": "assistant"
    })
}

async fn wait_for_status(server: &TestServer, status: &str) -> Value {
    for _ in 0..300 {
        let body: Value = server.get("/api/generation").await.json();
        if body["session"]["status"] == status {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session never reached status {}", status);
}

async fn continue_requests(mock: &MockServer) -> Vec<Value> {
    mock.received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == "/api/generate/continue")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

async fn wait_for_continue_requests(mock: &MockServer, count: usize) {
    for _ in 0..300 {
        if continue_requests(mock).await.len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("generation service never saw {} continuation calls", count);
}

mod health {
    use super::*;

    #[tokio::test]
    async fn test_health_endpoint() {
        let (server, _mock) = setup_test_server().await;

        let response = server.get("/health").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["generation_status"], "idle");
    }

    #[tokio::test]
    async fn test_openapi_document_served() {
        let (server, _mock) = setup_test_server().await;

        let response = server.get("/api/openapi.json").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert!(body["paths"]["/api/generation/start"].is_object());
    }
}

mod generation_lifecycle {
    use super::*;

    #[tokio::test]
    async fn test_initial_snapshot_is_idle() {
        let (server, _mock) = setup_test_server().await;

        let response = server.get("/api/generation").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["session"]["status"], "idle");
        assert_eq!(body["progressPercent"], 0);
        assert_eq!(body["artifacts"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_start_rejects_empty_document() {
        let (server, mock) = setup_test_server().await;

        let response = server
            .post("/api/generation/start")
            .json(&json!({ "inputDocument": "   " }))
            .await;

        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["error"], "bad_request");
        assert!(mock.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_generation_runs_to_completion() {
        let (server, mock) = setup_test_server().await;
        mount_initial(&mock, initial_body("A1", 100, 300)).await;
        mount_continue(&mock, 100, continuation("A1", 200)).await;
        mount_continue(&mock, 200, continuation("A2", 300)).await;

        let response = server.post("/api/generation/start").json(&start_body()).await;

        response.assert_status(axum::http::StatusCode::ACCEPTED);
        let started: Value = response.json();
        assert!(started["sessionId"].is_string());
        assert_eq!(started["generation"], 1);

        let body = wait_for_status(&server, "completed").await;
        assert_eq!(body["progressPercent"], 100);
        assert_eq!(body["session"]["lastProcessedUnit"], 300);
        let ids: Vec<&str> = body["artifacts"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["A1", "A2"]);
        assert_eq!(body["latest"]["id"], "A2");
        assert_eq!(
            body["artifacts"][0]["signature"],
            "fn(input: string) -> string"
        );

        let requests = continue_requests(&mock).await;
        assert_eq!(requests.len(), 2);
        for request in &requests {
            assert_eq!(request["previousArtifactId"], "A1");
            assert_eq!(request["applicationRef"], "42");
            assert_eq!(request["sideChannelIds"]["applicationRef"], "42");
            assert_eq!(request["domainHint"], "assistant");
        }
    }

    #[tokio::test]
    async fn test_artifact_lookup() {
        let (server, mock) = setup_test_server().await;
        mount_initial(&mock, initial_body("A1", 100, 100)).await;

        server.post("/api/generation/start").json(&start_body()).await;
        wait_for_status(&server, "completed").await;

        let list: Value = server.get("/api/generation/artifacts").await.json();
        assert_eq!(list.as_array().unwrap().len(), 1);

        let response = server.get("/api/generation/artifacts/A1").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["name"], "template_A1");

        server
            .get("/api/generation/artifacts/missing")
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn test_missing_application_ref_fails_session() {
        let (server, mock) = setup_test_server().await;
        mount_initial(
            &mock,
            json!({
                "artifacts": [artifact("A1")],
                "totalUnits": 300,
                "lastProcessedUnit": 100
            }),
        )
        .await;
        mount_continue(&mock, 100, continuation("A2", 300)).await;

        server.post("/api/generation/start").json(&start_body()).await;

        let body = wait_for_status(&server, "failed").await;
        assert!(body["session"]["error"]
            .as_str()
            .unwrap()
            .contains("application reference"));
        assert!(continue_requests(&mock).await.is_empty());
    }

    #[tokio::test]
    async fn test_service_error_fails_session() {
        let (server, mock) = setup_test_server().await;
        Mock::given(method("POST"))
            .and(path("/api/generate/initial"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({ "error": { "message": "model unavailable" } })),
            )
            .mount(&mock)
            .await;

        server
            .post("/api/generation/start")
            .json(&start_body())
            .await
            .assert_status(axum::http::StatusCode::ACCEPTED);

        let body = wait_for_status(&server, "failed").await;
        assert!(body["session"]["error"]
            .as_str()
            .unwrap()
            .contains("model unavailable"));
    }

    #[tokio::test]
    async fn test_reset_returns_idle_snapshot() {
        let (server, mock) = setup_test_server().await;
        mount_initial(&mock, initial_body("A1", 100, 100)).await;

        server.post("/api/generation/start").json(&start_body()).await;
        wait_for_status(&server, "completed").await;

        let response = server.post("/api/generation/reset").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["session"]["status"], "idle");
        assert_eq!(body["artifacts"].as_array().unwrap().len(), 0);
        assert!(body.get("latest").is_none());
    }
}

mod generation_control {
    use super::*;

    #[tokio::test]
    async fn test_pause_and_resume_require_matching_state() {
        let (server, _mock) = setup_test_server().await;

        let response = server.post("/api/generation/pause").await;
        response.assert_status(axum::http::StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["error"], "conflict");

        server
            .post("/api/generation/resume")
            .await
            .assert_status(axum::http::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_start_rejected_while_generating() {
        let (server, mock) = setup_test_server().await;
        mount_initial(&mock, initial_body("A1", 100, 300)).await;
        mount_continue(
            &mock,
            100,
            continuation("A2", 300).set_delay(Duration::from_millis(300)),
        )
        .await;

        server.post("/api/generation/start").json(&start_body()).await;
        wait_for_continue_requests(&mock, 1).await;

        server
            .post("/api/generation/start")
            .json(&start_body())
            .await
            .assert_status(axum::http::StatusCode::CONFLICT);

        wait_for_status(&server, "completed").await;
    }

    #[tokio::test]
    async fn test_pause_keeps_in_flight_result_then_resume_completes() {
        let (server, mock) = setup_test_server().await;
        mount_initial(&mock, initial_body("A1", 100, 300)).await;
        mount_continue(
            &mock,
            100,
            continuation("A2", 200).set_delay(Duration::from_millis(300)),
        )
        .await;
        mount_continue(&mock, 200, continuation("A3", 300)).await;

        server.post("/api/generation/start").json(&start_body()).await;
        wait_for_continue_requests(&mock, 1).await;

        let response = server.post("/api/generation/pause").await;
        response.assert_status(axum::http::StatusCode::ACCEPTED);
        let pending: Value = response.json();
        assert_eq!(pending["session"]["cancelRequested"], true);

        let paused = wait_for_status(&server, "paused").await;
        assert_eq!(paused["session"]["lastProcessedUnit"], 200);
        assert_eq!(paused["artifacts"].as_array().unwrap().len(), 2);
        assert_eq!(continue_requests(&mock).await.len(), 1);

        let response = server.post("/api/generation/resume").await;
        response.assert_status(axum::http::StatusCode::ACCEPTED);
        let resumed: Value = response.json();
        assert_eq!(resumed["generation"], 2);

        let body = wait_for_status(&server, "completed").await;
        assert_eq!(body["artifacts"].as_array().unwrap().len(), 3);

        let requests = continue_requests(&mock).await;
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1]["previousArtifactId"], "A2");
        assert_eq!(requests[1]["lastProcessedUnit"], 200);
    }
}
