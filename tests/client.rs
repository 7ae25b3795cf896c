//! HTTP client tests against an in-process backend

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use lumen_voice::{
    AudioPayload, ConversationService, DialogueTurn, EmotionSignal, Error, HttpConversationClient,
    InteractionRequest, LongTermMemory, SessionId,
};
use serde_json::{Value, json};

type Captured = Arc<Mutex<Option<Value>>>;

/// Serve `router` on an ephemeral port and return its base URL
async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn client(base_url: &str) -> HttpConversationClient {
    HttpConversationClient::new(base_url, Duration::from_secs(5)).unwrap()
}

fn interact_router(status: StatusCode, body: Value) -> (Router, Captured) {
    let captured = Captured::default();
    let router = Router::new()
        .route(
            "/interact",
            post(
                move |State(captured): State<Captured>, Json(request): Json<Value>| {
                    let body = body.clone();
                    async move {
                        *captured.lock().unwrap() = Some(request);
                        (status, Json(body))
                    }
                },
            ),
        )
        .with_state(Arc::clone(&captured));
    (router, captured)
}

fn request() -> InteractionRequest {
    InteractionRequest {
        session_id: SessionId(3),
        audio: AudioPayload::new(b"ABC".to_vec()),
        emotion: Some(EmotionSignal::dominant("sad")),
        history: vec![DialogueTurn::user("hola"), DialogueTurn::assistant("hola")],
        memory: LongTermMemory {
            name: Some("Ana".to_string()),
            ..LongTermMemory::default()
        },
    }
}

#[tokio::test]
async fn test_create_session() {
    let router = Router::new().route(
        "/session",
        post(|| async { Json(json!({ "session_id": 17 })) }),
    );
    let url = serve(router).await;

    let session = client(&url).create_session().await.unwrap();
    assert_eq!(session, SessionId(17));
}

#[tokio::test]
async fn test_create_session_rejected() {
    let router = Router::new().route(
        "/session",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let url = serve(router).await;

    let err = client(&url).create_session().await.unwrap_err();
    assert!(matches!(err, Error::Connection(_)), "got {err:?}");
}

#[tokio::test]
async fn test_unreachable_backend_is_connection_error() {
    // Bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client(&format!("http://{addr}"));
    assert!(matches!(
        client.create_session().await,
        Err(Error::Connection(_))
    ));
    assert!(matches!(
        client.submit_interaction(&request()).await,
        Err(Error::Connection(_))
    ));
}

#[tokio::test]
async fn test_submit_interaction_round_trip() {
    let (router, captured) = interact_router(
        StatusCode::OK,
        json!({
            "ai_text": "¿Qué tal, Ana?",
            "ai_audio_b64": "QUJD",
            "extracted_memory": { "edad": 30, "color_favorito": "azul" },
            "updated_chat_history": [
                { "role": "user", "content": "hola" },
                { "role": "assistant", "content": "hola" },
                { "role": "user", "content": "estoy triste" },
                { "role": "assistant", "content": "¿Qué tal, Ana?" }
            ]
        }),
    );
    let url = serve(router).await;

    let result = client(&url).submit_interaction(&request()).await.unwrap();

    assert_eq!(result.reply_text, "¿Qué tal, Ana?");
    assert_eq!(
        result.reply_audio.as_ref().map(AudioPayload::as_bytes),
        Some(&b"ABC"[..])
    );
    assert_eq!(result.history.len(), 4);
    assert!(result.extracted_memory.age.is_some());
    assert!(result.extracted_memory.name.is_none());

    let sent = captured.lock().unwrap().clone().unwrap();
    assert_eq!(sent["session_id"], 3);
    assert_eq!(sent["audio_b64"], "QUJD");
    assert_eq!(sent["facial_emotion"]["stable_dominant_emotion"], "sad");
    assert_eq!(sent["chat_history"][0]["role"], "user");
    assert_eq!(sent["long_term_memory"]["nombre"], "Ana");
}

#[tokio::test]
async fn test_submit_interaction_without_audio() {
    let (router, _) = interact_router(
        StatusCode::OK,
        json!({
            "ai_text": "hola",
            "ai_audio_b64": null,
            "updated_chat_history": []
        }),
    );
    let url = serve(router).await;

    let result = client(&url).submit_interaction(&request()).await.unwrap();
    assert!(result.reply_audio.is_none());
    assert!(result.extracted_memory.is_empty());
}

#[tokio::test]
async fn test_odd_memory_values_do_not_fail_the_turn() {
    let (router, _) = interact_router(
        StatusCode::OK,
        json!({
            "ai_text": "Encantada",
            "ai_audio_b64": null,
            "extracted_memory": {
                "nombre": 42,
                "preferencia_personal": ["cafe", "leer"],
                "meta_u_objetivo": "leer más"
            },
            "updated_chat_history": [
                { "role": "user", "content": "me llamo 42" },
                { "role": "assistant", "content": "Encantada" }
            ]
        }),
    );
    let url = serve(router).await;

    let result = client(&url).submit_interaction(&request()).await.unwrap();

    assert_eq!(result.history.len(), 2);
    assert_eq!(result.extracted_memory.name.as_deref(), Some("42"));
    assert!(result.extracted_memory.personal_preference.is_none());
    assert_eq!(result.extracted_memory.goal.as_deref(), Some("leer más"));
}

#[tokio::test]
async fn test_rejection_uses_backend_detail() {
    let (router, _) = interact_router(
        StatusCode::TOO_MANY_REQUESTS,
        json!({ "detail": "rate limited" }),
    );
    let url = serve(router).await;

    let err = client(&url)
        .submit_interaction(&request())
        .await
        .unwrap_err();
    assert!(matches!(&err, Error::Interaction(m) if m == "rate limited"), "got {err:?}");
    assert_eq!(err.user_message(), "rate limited");
}

#[tokio::test]
async fn test_rejection_without_detail_uses_generic_message() {
    let (router, _) = interact_router(StatusCode::INTERNAL_SERVER_ERROR, json!({}));
    let url = serve(router).await;

    let err = client(&url)
        .submit_interaction(&request())
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "Failed to process interaction");
}
