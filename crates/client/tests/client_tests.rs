use serde_json::json;
use templater_client::{
    ClientError, ContinueGenerateRequest, GenerationClient, GenerationService,
    InitialGenerateRequest,
};
use templater_core::{EntityId, SideChannelIds};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn initial_request() -> InitialGenerateRequest {
    InitialGenerateRequest {
        input_document: "first line\nsecond line".to_string(),
        instructions: "one template per endpoint".to_string(),
        domain_hint: "logistics".to_string(),
    }
}

fn continue_request() -> ContinueGenerateRequest {
    ContinueGenerateRequest {
        input_document: "first line\nsecond line".to_string(),
        instructions: "one template per endpoint".to_string(),
        last_processed_unit: 1,
        previous_artifact_id: EntityId::from("11"),
        category_ref: Some(EntityId::from("3")),
        application_ref: Some(EntityId::from("42")),
        domain_hint: "logistics".to_string(),
        side_channel_ids: SideChannelIds::new("42"),
    }
}

#[tokio::test]
async fn test_initial_generate_parses_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/generate/initial"))
        .and(body_partial_json(json!({
            "inputDocument": "first line\nsecond line",
            "domainHint": "logistics"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "artifacts": [{"id": 11, "name": "track_parcel", "categoryRef": 3}],
            "totalUnits": 2,
            "lastProcessedUnit": 1,
            "sideChannelIds": {"applicationRef": "42", "categoryRefs": ["3"]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = GenerationClient::new(server.uri());
    let response = client.initial_generate(&initial_request()).await.unwrap();

    assert_eq!(response.artifacts[0].id.as_str(), "11");
    assert_eq!(response.total_units, 2);
    assert_eq!(
        response.side_channel_ids.unwrap().application_ref,
        Some(EntityId::from("42"))
    );
}

#[tokio::test]
async fn test_continue_generate_sends_threaded_ids() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/generate/continue"))
        .and(header("Authorization", "Bearer secret"))
        .and(body_partial_json(json!({
            "lastProcessedUnit": 1,
            "previousArtifactId": "11",
            "applicationRef": "42",
            "sideChannelIds": {"applicationRef": "42"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "artifacts": [{"id": 12, "name": "cancel_parcel"}],
            "lastProcessedUnit": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = GenerationClient::new(server.uri()).with_api_key("secret");
    let response = client.continue_generate(&continue_request()).await.unwrap();

    assert_eq!(response.artifacts.len(), 1);
    assert_eq!(response.last_processed_unit, 2);
    assert!(response.total_units.is_none());
}

#[tokio::test]
async fn test_api_error_message_is_extracted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/generate/initial"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "error": {"message": "document too short", "code": "invalid_input"}
        })))
        .mount(&server)
        .await;

    let client = GenerationClient::new(server.uri());
    let err = client.initial_generate(&initial_request()).await.unwrap_err();

    match err {
        ClientError::Api { status, message } => {
            assert_eq!(status, 422);
            assert_eq!(message, "document too short");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_rate_limit_without_retries_surfaces() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/generate/continue"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .expect(1)
        .mount(&server)
        .await;

    let client = GenerationClient::new(server.uri());
    let err = client.continue_generate(&continue_request()).await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::RateLimited {
            retry_after: Some(7)
        }
    ));
}

#[tokio::test]
async fn test_server_error_is_retried_when_configured() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/generate/initial"))
        .respond_with(ResponseTemplate::new(503).set_body_string("warming up"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/generate/initial"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "artifacts": [],
            "totalUnits": 10,
            "lastProcessedUnit": 0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = GenerationClient::new(server.uri()).with_max_retries(1);
    let response = client.initial_generate(&initial_request()).await.unwrap();

    assert!(response.artifacts.is_empty());
    assert_eq!(response.total_units, 10);
}
