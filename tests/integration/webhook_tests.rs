//! Silence webhook scenarios

use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::common::test_app::{basic_auth, body_json, ALLOWED_EMAIL, WEBHOOK_PASS, WEBHOOK_USER};
use crate::common::TestApp;

fn silence_event(email: &str, until: &str) -> Value {
    json!({
        "event": {"type": "silence", "until": until},
        "user": {"email": email},
        "alert_group": {
            "id": "g1",
            "title": "Database down",
            "permalinks": {"web": "https://irm/alert-groups/g1"},
            "last_alert": {"payload": {"alerts": [{
                "fingerprint": "fp",
                "labels": {"alertname": "X", "severity": "warn"}
            }]}}
        }
    })
}

fn auth() -> String {
    basic_auth(WEBHOOK_USER, WEBHOOK_PASS)
}

#[tokio::test]
async fn test_allow_listed_user_creates_silences() {
    let app = TestApp::new().await;

    let response = app
        .post_webhook(
            Some(&auth()),
            &silence_event(ALLOWED_EMAIL, "2030-01-01T00:00:00Z"),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "silenced");
    assert_eq!(body["alert_group_id"], "g1");
    assert_eq!(body["silences_created"], "1");

    let created = app.am.created_silences();
    assert_eq!(created.len(), 1);
    let silence = &created[0];
    assert_eq!(silence["createdBy"], ALLOWED_EMAIL);
    assert_eq!(silence["endsAt"], "2030-01-01T00:00:00+00:00");
    let comment = silence["comment"].as_str().unwrap();
    assert!(comment.contains("Database down"));
    assert!(comment.contains("https://irm/alert-groups/g1"));
    assert!(comment.contains("(ID: g1)"));

    // One exact, non-regex matcher per label.
    assert_eq!(
        silence["matchers"],
        json!([
            {"name": "alertname", "value": "X", "isEqual": true, "isRegex": false},
            {"name": "severity", "value": "warn", "isEqual": true, "isRegex": false}
        ])
    );

    // The compensating path must not have fired.
    assert!(app.irm.unsilenced().is_empty());
}

#[tokio::test]
async fn test_unlisted_user_is_unsilenced() {
    let app = TestApp::new().await;

    let response = app
        .post_webhook(
            Some(&auth()),
            &silence_event("stranger@co", "2030-01-01T00:00:00Z"),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "unsilenced");
    assert_eq!(body["alert_group_id"], "g1");

    assert_eq!(app.irm.unsilenced(), vec!["g1"]);
    assert!(app.am.created_silences().is_empty());
}

#[tokio::test]
async fn test_bad_credentials_are_rejected_with_challenge() {
    let app = TestApp::new().await;

    let response = app
        .post_webhook(
            Some(&basic_auth(WEBHOOK_USER, "wrong")),
            &silence_event(ALLOWED_EMAIL, "2030-01-01T00:00:00Z"),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let challenge = response
        .headers()
        .get("www-authenticate")
        .expect("missing WWW-Authenticate header");
    assert!(challenge.to_str().unwrap().starts_with("Basic"));

    assert!(app.am.created_silences().is_empty());
    assert!(app.irm.unsilenced().is_empty());
}

#[tokio::test]
async fn test_missing_credentials_are_rejected() {
    let app = TestApp::new().await;

    let response = app
        .post_webhook(None, &silence_event(ALLOWED_EMAIL, "2030-01-01T00:00:00Z"))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_empty_event_type_is_ignored() {
    let app = TestApp::new().await;

    let mut event = silence_event(ALLOWED_EMAIL, "2030-01-01T00:00:00Z");
    event["event"]["type"] = json!("");

    let response = app.post_webhook(Some(&auth()), &event).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ignored");
    assert_eq!(body["reason"], "no event type");

    assert!(app.am.created_silences().is_empty());
    assert!(app.irm.unsilenced().is_empty());
}

#[tokio::test]
async fn test_non_silence_event_is_ignored() {
    let app = TestApp::new().await;

    let mut event = silence_event(ALLOWED_EMAIL, "2030-01-01T00:00:00Z");
    event["event"]["type"] = json!("acknowledge");

    let response = app.post_webhook(Some(&auth()), &event).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["reason"], "not a silence event");
}

#[tokio::test]
async fn test_allow_listed_user_without_until_is_ignored() {
    let app = TestApp::new().await;

    let response = app
        .post_webhook(Some(&auth()), &silence_event(ALLOWED_EMAIL, ""))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ignored");
    assert_eq!(body["reason"], "no until time");
    assert!(app.am.created_silences().is_empty());
}

#[tokio::test]
async fn test_unparseable_until_is_a_bad_request() {
    let app = TestApp::new().await;

    let response = app
        .post_webhook(Some(&auth()), &silence_event(ALLOWED_EMAIL, "next tuesday"))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.am.created_silences().is_empty());
}

#[tokio::test]
async fn test_invalid_json_is_a_bad_request() {
    let app = TestApp::new().await;

    let response = app
        .request(
            axum::http::Request::builder()
                .method("POST")
                .uri("/webhook")
                .header("authorization", auth())
                .header("content-type", "application/json")
                .body(axum::body::Body::from("{not json"))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_method_is_not_allowed() {
    let app = TestApp::new().await;

    let response = app
        .request(
            axum::http::Request::builder()
                .method("GET")
                .uri("/webhook")
                .header("authorization", auth())
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_silence_per_alert_in_group() {
    let app = TestApp::new().await;

    let mut event = silence_event(ALLOWED_EMAIL, "2030-01-01T00:00:00Z");
    event["alert_group"]["last_alert"]["payload"]["alerts"] = json!([
        {"fingerprint": "fp1", "labels": {"alertname": "X"}},
        {"fingerprint": "fp2", "labels": {"alertname": "Y"}}
    ]);

    let response = app.post_webhook(Some(&auth()), &event).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["silences_created"], "2");
    assert_eq!(app.am.created_silences().len(), 2);
}

#[tokio::test]
async fn test_zero_created_silences_is_an_error() {
    let app = TestApp::new().await;
    app.am
        .state
        .fail_create_silence
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let response = app
        .post_webhook(
            Some(&auth()),
            &silence_event(ALLOWED_EMAIL, "2030-01-01T00:00:00Z"),
        )
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_unsilence_failure_surfaces_as_server_error() {
    let app = TestApp::new().await;
    app.irm
        .state
        .fail_unsilence
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let response = app
        .post_webhook(
            Some(&auth()),
            &silence_event("stranger@co", "2030-01-01T00:00:00Z"),
        )
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
