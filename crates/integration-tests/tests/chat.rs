//! Integration tests for the travel assistant endpoints and the retry
//! wrapper behind them.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::post;
use serde_json::json;

use wanderlance_api::ai::retry::{BUSY_FALLBACK, INVALID_FALLBACK, QUOTA_FALLBACK};
use wanderlance_api::ai::{AiError, GeminiClient, HistoryTurn, TextGenerator};
use wanderlance_api::config::AiConfig;
use wanderlance_integration_tests::{ScriptedGenerator, TestApp};

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test]
async fn test_chat_persists_both_turns() {
    let app = TestApp::new().await;
    let (token, _) = app.register("ana", "ana@example.com").await;

    let response = app
        .post(
            "/api/chat",
            json!({"message": "Best time to visit Porto?", "sessionId": "porto"}),
            Some(&token),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["response"], "echo: Best time to visit Porto?");
    assert_eq!(response.body["sessionId"], "porto");

    let session = app.get("/api/chat/sessions/porto", Some(&token)).await;
    assert_eq!(session.status, StatusCode::OK);
    let messages = session.body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
}

#[tokio::test]
async fn test_sessions_are_private() {
    let app = TestApp::new().await;
    let (ana, _) = app.register("ana", "ana@example.com").await;
    let (bo, _) = app.register("bo", "bo@example.com").await;

    app.post(
        "/api/chat",
        json!({"message": "hello", "sessionId": "shared-name"}),
        Some(&ana),
    )
    .await;

    let other = app.get("/api/chat/sessions/shared-name", Some(&bo)).await;
    assert_eq!(other.status, StatusCode::OK);
    assert!(other.body["messages"].as_array().unwrap().is_empty());

    let anonymous = app.get("/api/chat/sessions/shared-name", None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_clear_session_removes_only_that_session() {
    let app = TestApp::new().await;
    let (ana, _) = app.register("ana", "ana@example.com").await;
    let (bo, _) = app.register("bo", "bo@example.com").await;

    for (token, session) in [(&ana, "a"), (&ana, "a"), (&ana, "b"), (&bo, "a")] {
        let response = app
            .post(
                "/api/chat",
                json!({"message": "hi", "sessionId": session}),
                Some(token),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK);
    }

    let cleared = app.delete("/api/chat/sessions/a", Some(&ana)).await;
    assert_eq!(cleared.status, StatusCode::OK);
    assert_eq!(cleared.body["deleted"], 4);

    let remaining = |body: &serde_json::Value| body["messages"].as_array().unwrap().len();
    assert_eq!(
        remaining(&app.get("/api/chat/sessions/a", Some(&ana)).await.body),
        0
    );
    assert_eq!(
        remaining(&app.get("/api/chat/sessions/b", Some(&ana)).await.body),
        2
    );
    assert_eq!(
        remaining(&app.get("/api/chat/sessions/a", Some(&bo)).await.body),
        2
    );
}

#[tokio::test]
async fn test_chat_validation() {
    let app = TestApp::new().await;
    let (token, _) = app.register("ana", "ana@example.com").await;

    let empty = app
        .post(
            "/api/chat",
            json!({"message": "   ", "sessionId": "s"}),
            Some(&token),
        )
        .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
    assert_eq!(empty.error(), Some("Message is required"));

    let bad_session = app
        .post(
            "/api/chat",
            json!({"message": "hi", "sessionId": "has spaces"}),
            Some(&token),
        )
        .await;
    assert_eq!(bad_session.status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Auto-chat
// =============================================================================

#[tokio::test]
async fn test_auto_chat_is_anonymous_and_stateless() {
    let app = TestApp::new().await;

    let response = app
        .post(
            "/api/auto-chat",
            json!({
                "message": "Where should I go in May?",
                "history": [
                    {"role": "user", "content": "I like hiking"},
                    {"role": "model", "content": "Great, mountains it is."}
                ]
            }),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["response"], "echo: Where should I go in May?");

    assert!(!app.data_file().exists());
}

#[tokio::test]
async fn test_auto_chat_status() {
    let app = TestApp::new().await;

    let response = app.get("/api/auto-chat/status", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["configured"], true);
    assert_eq!(response.body["model"], "scripted");
}

// =============================================================================
// Retry wrapper
// =============================================================================

#[tokio::test]
async fn test_rate_limits_exhaust_budget_then_fall_back() {
    let generator = ScriptedGenerator::failing(|| AiError::RateLimited("slow down".to_string()));
    let app = TestApp::with_generator(generator.clone()).await;

    let response = app
        .post("/api/auto-chat", json!({"message": "hello"}), None)
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["response"], BUSY_FALLBACK);
    assert_eq!(generator.calls(), 3);
}

#[tokio::test]
async fn test_attempt_budget_is_configurable() {
    let generator = ScriptedGenerator::failing(|| AiError::Server {
        status: 503,
        message: "overloaded".to_string(),
    });
    let app = TestApp::with_config(|c| c.ai.max_attempts = 5, generator.clone()).await;

    let response = app
        .post("/api/auto-chat", json!({"message": "hello"}), None)
        .await;

    assert_eq!(response.body["response"], BUSY_FALLBACK);
    assert_eq!(generator.calls(), 5);
}

#[tokio::test]
async fn test_non_retryable_errors_stop_after_one_attempt() {
    let cases: [(fn() -> AiError, &str); 2] = [
        (
            || AiError::Api {
                status: 403,
                reason: "PERMISSION_DENIED".to_string(),
                message: "Quota exceeded for project".to_string(),
            },
            QUOTA_FALLBACK,
        ),
        (
            || AiError::Api {
                status: 400,
                reason: "INVALID_ARGUMENT".to_string(),
                message: "Request contains an invalid argument.".to_string(),
            },
            INVALID_FALLBACK,
        ),
    ];

    for (make, expected) in cases {
        let generator = ScriptedGenerator::failing(make);
        let app = TestApp::with_generator(generator.clone()).await;

        let response = app
            .post("/api/auto-chat", json!({"message": "hello"}), None)
            .await;
        assert_eq!(response.body["response"], expected);
        assert_eq!(generator.calls(), 1);
    }
}

#[tokio::test]
async fn test_recovers_after_transient_failure() {
    let generator = ScriptedGenerator::scripted(vec![
        Err(AiError::RateLimited("busy".to_string())),
        Ok("Try the Douro valley.".to_string()),
    ]);
    let app = TestApp::with_generator(generator.clone()).await;

    let response = app
        .post("/api/auto-chat", json!({"message": "Wine trip?"}), None)
        .await;
    assert_eq!(response.body["response"], "Try the Douro valley.");
    assert_eq!(generator.calls(), 2);
}

/// The real client against a local stand-in for the provider that always
/// answers 429.
#[tokio::test]
async fn test_gemini_client_retries_http_429() {
    use std::sync::atomic::{AtomicU32, Ordering};

    let hits = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&hits);
    let provider = Router::new().route(
        "/models/{*rest}",
        post(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    r#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#,
                )
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, provider).await });

    let config = AiConfig {
        api_key: Some("test-key".into()),
        api_url: format!("http://{addr}"),
        base_delay: Duration::from_millis(1),
        timeout: Duration::from_secs(5),
        ..AiConfig::default()
    };
    let client: Arc<dyn TextGenerator> = Arc::new(GeminiClient::new(&config).unwrap());

    let direct = client.generate("hi", &[] as &[HistoryTurn]).await;
    assert!(matches!(direct, Err(AiError::RateLimited(_))));

    let app = TestApp::with_generator(client).await;
    let response = app
        .post("/api/auto-chat", json!({"message": "hi"}), None)
        .await;
    assert_eq!(response.body["response"], BUSY_FALLBACK);
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}
