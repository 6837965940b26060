//! HttpTransport against an in-process backend

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use zoe::session::ERROR_TEXT;
use zoe::{
    AuthError, ChatSession, ChatTransport, CredentialResolver, Credentials, Feedback,
    HttpTransport, RemoteSync, SubmitOutcome, TransportError,
};

const TOKEN: &str = "tok-1";

#[derive(Clone, Default)]
struct Seen {
    bodies: Arc<Mutex<Vec<(String, Value)>>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", TOKEN))
        .unwrap_or(false)
}

async fn query(
    State(seen): State<Seen>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "bad token"})));
    }
    seen.bodies.lock().unwrap().push(("query".into(), body.clone()));
    let answer = format!("re: {}", body["query"].as_str().unwrap_or_default());
    (StatusCode::OK, Json(json!({"answer": answer})))
}

async fn feedback(
    State(seen): State<Seen>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "bad token"})));
    }
    seen.bodies.lock().unwrap().push(("feedback".into(), body));
    (StatusCode::OK, Json(json!({"status": "recorded"})))
}

async fn broken_query() -> Json<Value> {
    Json(json!({"result": "no answer field"}))
}

async fn failing() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "backend down")
}

async fn spawn_backend() -> (String, Seen) {
    let seen = Seen::default();
    let app = Router::new()
        .route("/api/v1/query", post(query))
        .route("/api/v1/feedback", post(feedback))
        .route("/broken/api/v1/query", post(broken_query))
        .route("/down/api/v1/query", post(failing))
        .route("/down/api/v1/feedback", post(failing))
        .with_state(seen.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (format!("http://{}", addr), seen)
}

struct FixedCredentials;

#[async_trait]
impl CredentialResolver for FixedCredentials {
    async fn resolve_credentials(&self) -> Result<Credentials, AuthError> {
        Ok(Credentials {
            id_token: TOKEN.into(),
            user_id: "user-1".into(),
        })
    }
}

#[tokio::test]
async fn test_send_prompt_posts_query_with_bearer() {
    let (base, seen) = spawn_backend().await;
    let transport = HttpTransport::new(base);

    let answer = transport.send_prompt(TOKEN, "Hola", Some("user-1")).await.unwrap();
    assert_eq!(answer.answer, "re: Hola");

    let bodies = seen.bodies.lock().unwrap().clone();
    assert_eq!(
        bodies,
        vec![("query".to_string(), json!({"query": "Hola", "user_id": "user-1"}))]
    );
}

#[tokio::test]
async fn test_user_id_can_be_left_out() {
    let (base, seen) = spawn_backend().await;
    let transport = HttpTransport::new(base).with_user_id(false);

    transport.send_prompt(TOKEN, "Hola", Some("user-1")).await.unwrap();

    let bodies = seen.bodies.lock().unwrap().clone();
    assert_eq!(bodies[0].1, json!({"query": "Hola"}));
}

#[tokio::test]
async fn test_bad_token_is_http_error() {
    let (base, _) = spawn_backend().await;
    let transport = HttpTransport::new(base);

    let err = transport.send_prompt("wrong", "Hola", None).await.unwrap_err();
    match err {
        TransportError::Http { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("bad token"));
        }
        other => panic!("expected http error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_answer_is_malformed() {
    let (base, _) = spawn_backend().await;
    let transport = HttpTransport::new(format!("{}/broken", base));

    let err = transport.send_prompt(TOKEN, "Hola", None).await.unwrap_err();
    assert!(matches!(err, TransportError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_unreachable_backend_is_request_error() {
    let transport = HttpTransport::new("http://127.0.0.1:1");
    let err = transport.send_prompt(TOKEN, "Hola", None).await.unwrap_err();
    assert!(matches!(err, TransportError::Request(_)));
}

#[tokio::test]
async fn test_send_feedback_posts_kind() {
    let (base, seen) = spawn_backend().await;
    let transport = HttpTransport::new(base);

    let ack = transport.send_feedback(TOKEN, "m-1", Feedback::Like).await.unwrap();
    assert_eq!(ack.0, json!({"status": "recorded"}));

    let bodies = seen.bodies.lock().unwrap().clone();
    assert_eq!(
        bodies,
        vec![("feedback".to_string(), json!({"message_id": "m-1", "feedback": "like"}))]
    );
}

#[tokio::test]
async fn test_session_round_trip_over_http() {
    let (base, _) = spawn_backend().await;
    let session = ChatSession::new(Arc::new(FixedCredentials), Arc::new(HttpTransport::new(base)));

    session.set_input("Hola");
    let outcome = session.submit().await;
    assert!(matches!(outcome, SubmitOutcome::Answered));

    let contents: Vec<_> = session.messages().into_iter().map(|m| m.content).collect();
    assert_eq!(contents[1..], ["Hola".to_string(), "re: Hola".to_string()]);
    assert!(!session.is_in_flight());
}

#[tokio::test]
async fn test_session_with_backend_down() {
    let (base, _) = spawn_backend().await;
    let session = ChatSession::new(
        Arc::new(FixedCredentials),
        Arc::new(HttpTransport::new(format!("{}/down", base))),
    );

    let outcome = session.send("Hola").await;
    assert!(matches!(outcome, SubmitOutcome::Failed(_)));
    assert_eq!(session.messages().last().unwrap().content, ERROR_TEXT);

    let report = session.toggle_feedback("welcome", Feedback::Like).await;
    assert_eq!(report.local, Some(Feedback::Like));
    assert!(matches!(report.remote, RemoteSync::Failed(_)));
}
