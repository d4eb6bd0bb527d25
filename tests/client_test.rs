//! End-to-end tests against a local mock HTTP server.

use escher_request::{EscherClient, RequestConfig, RequestConfigOptions, RetryPolicy};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_string, header_exists, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_with_options(server: &MockServer, options: RequestConfigOptions) -> EscherClient {
    let mut config = RequestConfig::new("127.0.0.1", options);
    config.set_to_unsecure(Some(server.address().port()));
    EscherClient::new("key-id", "secret", config).unwrap()
}

fn client_for(server: &MockServer) -> EscherClient {
    client_with_options(server, RequestConfigOptions::default())
}

#[tokio::test]
async fn test_get_parses_json_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/administrator/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1, "name": "admin" })))
        .mount(&server)
        .await;

    let response = client_for(&server).get("/administrator/1").await.unwrap();
    assert_eq!(response.status_code, 200);
    assert_eq!(response.status_message, "OK");
    assert_eq!(response.body, json!({ "id": 1, "name": "admin" }));
}

#[tokio::test]
async fn test_non_json_body_passes_through_as_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/export"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("a;b\n1;2", "text/csv"))
        .mount(&server)
        .await;

    let response = client_for(&server).get("/export").await.unwrap();
    assert_eq!(response.body, Value::String("a;b\n1;2".to_owned()));
}

#[tokio::test]
async fn test_post_sends_signed_json_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/administrator"))
        .and(body_string(r#"{"name":"Almanach"}"#))
        .and(header_exists("x-ems-date"))
        .and(header_regex(
            "x-ems-auth",
            "SignedHeaders=content-type;host;x-ems-date,",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "created": true })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client_for(&server)
        .post("/administrator", &json!({ "name": "Almanach" }))
        .await
        .unwrap();
    assert_eq!(response.body, json!({ "created": true }));
}

#[tokio::test]
async fn test_get_can_carry_a_signed_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/filter"))
        .and(body_string(r#"{"ids":[1,2]}"#))
        .and(header_exists("x-ems-auth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "count": 2 })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client_for(&server)
        .get_with_data("/filter", &json!({ "ids": [1, 2] }))
        .await
        .unwrap();
    assert_eq!(response.body, json!({ "count": 2 }));
}

#[tokio::test]
async fn test_csv_payload_is_sent_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/import"))
        .and(body_string("name;email\na;a@x.hu"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let mut options = RequestConfigOptions::default();
    options.headers = Some(vec![
        ("content-type".to_owned(), "text/csv".to_owned()),
        ("host".to_owned(), "127.0.0.1".to_owned()),
    ]);
    let client = client_with_options(&server, options);

    let response = client
        .post("/import", &Value::String("name;email\na;a@x.hu".to_owned()))
        .await
        .unwrap();
    assert_eq!(response.body, json!({ "ok": true }));
}

#[tokio::test]
async fn test_prefix_is_prepended_to_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/internal/administrator/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = RequestConfig::create_for_internal_api("127.0.0.1", true);
    config.set_to_unsecure(Some(server.address().port()));
    let client = EscherClient::new("key-id", "secret", config).unwrap();

    let response = client.get("/administrator/1").await.unwrap();
    assert_eq!(response.body, json!({ "id": 1 }));
}

#[tokio::test]
async fn test_error_status_carries_parsed_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/administrator/1"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "replyText": "invalid id" })),
        )
        .mount(&server)
        .await;

    let err = client_for(&server).get("/administrator/1").await.unwrap_err();
    assert_eq!(err.code, 400);
    assert_eq!(err.message, "Error in http response (status: 400)");
    assert_eq!(err.data, json!({ "replyText": "invalid id" }));
    assert!(err.original_code.is_none());
}

#[tokio::test]
async fn test_empty_body_is_rejected_by_default() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/administrator/1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .delete("/administrator/1")
        .await
        .unwrap_err();
    assert_eq!(err.code, 500);
    assert_eq!(err.message, "Empty http response");
    assert_eq!(err.data, Value::String("No Content".to_owned()));
}

#[tokio::test]
async fn test_empty_body_allowed_when_configured() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/administrator/1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = client_with_options(
        &server,
        RequestConfigOptions {
            allow_empty_response: Some(true),
            ..RequestConfigOptions::default()
        },
    );
    let response = client.delete("/administrator/1").await.unwrap();
    assert_eq!(response.status_code, 204);
    assert_eq!(response.body, Value::String(String::new()));
}

#[tokio::test]
async fn test_oversized_body_is_a_fatal_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/big"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(vec![b'x'; 64], "application/json"),
        )
        .mount(&server)
        .await;

    let client = client_with_options(
        &server,
        RequestConfigOptions {
            max_body_size: Some(16),
            ..RequestConfigOptions::default()
        },
    );
    let err = client.get("/big").await.unwrap_err();
    assert_eq!(err.code, 500);
    assert!(err.message.contains("limit of 16 bytes"));
    assert!(err.original_code.is_none());
}

#[tokio::test]
async fn test_connection_refused_is_recoverable() {
    // bind and drop to get a port with nothing listening on it
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let mut config = RequestConfig::new("127.0.0.1", RequestConfigOptions::default());
    config.set_to_unsecure(Some(port));
    let client = EscherClient::new("key-id", "secret", config).unwrap();

    let err = client.get("/health").await.unwrap_err();
    assert_eq!(err.code, 503);
    assert_eq!(err.original_code.as_deref(), Some("ECONNREFUSED"));
}

#[tokio::test]
async fn test_slow_response_times_out_as_recoverable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ok": true }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let client = client_with_options(
        &server,
        RequestConfigOptions {
            timeout: Some(50),
            ..RequestConfigOptions::default()
        },
    );
    let err = client.get("/slow").await.unwrap_err();
    assert_eq!(err.code, 503);
    assert_eq!(err.original_code.as_deref(), Some("ETIMEDOUT"));
    assert_eq!(err.message, "timeout of 50ms exceeded");
}

#[tokio::test]
async fn test_timeout_aborts_the_in_flight_transfer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ok": true }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = client_with_options(
        &server,
        RequestConfigOptions {
            timeout: Some(50),
            ..RequestConfigOptions::default()
        },
    );

    let started = std::time::Instant::now();
    let err = client.get("/slow").await.unwrap_err();
    assert_eq!(err.original_code.as_deref(), Some("ETIMEDOUT"));
    // the cancelled attempt must give up long before the server responds
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_server_error_is_retried_with_policy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "replyText": "boom" })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_options(
        &server,
        RequestConfigOptions {
            retry_policy: Some(RetryPolicy {
                max_attempts: 2,
                base_delay_ms: 1,
                max_delay_ms: 10,
                ..RetryPolicy::default()
            }),
            ..RequestConfigOptions::default()
        },
    );
    let response = client.get("/flaky").await.unwrap();
    assert_eq!(response.body, json!({ "ok": true }));
}

#[tokio::test]
async fn test_client_error_is_never_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bad"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "replyText": "nope" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_options(
        &server,
        RequestConfigOptions {
            retry_policy: Some(RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 1,
                max_delay_ms: 10,
                ..RetryPolicy::default()
            }),
            ..RequestConfigOptions::default()
        },
    );
    let err = client.get("/bad").await.unwrap_err();
    assert_eq!(err.code, 400);
    server.verify().await;
}

#[tokio::test]
async fn test_without_policy_server_error_fails_immediately() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({ "replyText": "down" })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server).get("/down").await.unwrap_err();
    assert_eq!(err.code, 503);
    assert_eq!(err.data, json!({ "replyText": "down" }));
    server.verify().await;
}
