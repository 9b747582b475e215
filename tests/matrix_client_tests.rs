// tests/matrix_client_tests.rs

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use webhook2matrix::config::{MatrixConfig, MatrixWithPassword, MatrixWithToken};
use webhook2matrix::error::AppError;
use webhook2matrix::matrix::{ChatSession, MatrixClient, ONLINE_MESSAGE};

const ROOM_ID: &str = "!room:example.org";

fn token_config(server: &MockServer) -> MatrixConfig {
    MatrixConfig::Token(MatrixWithToken {
        base_url: server.uri(),
        user_id: "@relay:example.org".to_string(),
        room_id: ROOM_ID.to_string(),
        access_token: "syt_static".to_string(),
    })
}

fn password_config(server: &MockServer) -> MatrixConfig {
    MatrixConfig::Password(MatrixWithPassword {
        base_url: server.uri(),
        user_id: "@relay:example.org".to_string(),
        room_id: ROOM_ID.to_string(),
        password: "hunter2".to_string(),
    })
}

fn send_path_matcher() -> impl wiremock::Match {
    path_regex(r"^/_matrix/client/v3/rooms/.+/send/m\.room\.message/.+$")
}

#[tokio::test]
async fn token_connect_posts_the_online_notice_once() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(send_path_matcher())
        .and(header("authorization", "Bearer syt_static"))
        .and(body_partial_json(
            json!({ "msgtype": "m.text", "body": ONLINE_MESSAGE }),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "event_id": "$1" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = MatrixClient::connect(&token_config(&server)).await;
    assert!(client.is_ok(), "connect failed: {:?}", client.err());
}

#[tokio::test]
async fn password_login_uses_the_returned_access_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/_matrix/client/v3/login"))
        .and(body_partial_json(json!({
            "type": "m.login.password",
            "identifier": { "type": "m.id.user", "user": "@relay:example.org" },
            "password": "hunter2"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "syt_from_login" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(send_path_matcher())
        .and(header("authorization", "Bearer syt_from_login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "event_id": "$1" })))
        .expect(2)
        .mount(&server)
        .await;

    let client = MatrixClient::connect(&password_config(&server))
        .await
        .expect("connect should succeed");

    client
        .send_message(ROOM_ID, "follow-up")
        .await
        .expect("send should reuse the login token");
}

#[tokio::test]
async fn rejected_login_is_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/_matrix/client/v3/login"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(json!({ "errcode": "M_FORBIDDEN", "error": "Invalid password" })),
        )
        .mount(&server)
        .await;

    let result = MatrixClient::connect(&password_config(&server)).await;
    match result {
        Err(AppError::Login { message }) => assert!(message.contains("403")),
        other => panic!("expected Login error, got {other:?}"),
    }
}

#[tokio::test]
async fn homeserver_error_on_send_is_a_dispatch_error() {
    let server = MockServer::start().await;

    // First send (the online notice) succeeds, subsequent sends fail.
    Mock::given(method("PUT"))
        .and(send_path_matcher())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "event_id": "$1" })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(send_path_matcher())
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "errcode": "M_UNKNOWN" })),
        )
        .mount(&server)
        .await;

    let client = MatrixClient::connect(&token_config(&server))
        .await
        .expect("connect should succeed");

    let result = client.send_message(ROOM_ID, "disk full").await;
    match result {
        Err(AppError::Dispatch { message }) => assert!(message.contains("500")),
        other => panic!("expected Dispatch error, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_online_notice_fails_connect() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(send_path_matcher())
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "errcode": "M_FORBIDDEN" })))
        .mount(&server)
        .await;

    let result = MatrixClient::connect(&token_config(&server)).await;
    assert!(matches!(result, Err(AppError::Dispatch { .. })));
}
