//! HTTP client for the Lumen backend

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use super::ConversationService;
use super::types::{
    AudioPayload, DialogueTurn, EmotionSignal, InteractionRequest, InteractionResult,
    LongTermMemory, SessionId,
};
use crate::{Error, Result};

/// Message used when a rejected interaction carries no usable `detail`
const FALLBACK_INTERACTION_ERROR: &str = "Failed to process interaction";

#[derive(Deserialize)]
struct SessionResponse {
    session_id: SessionId,
}

#[derive(Serialize)]
struct InteractBody<'a> {
    session_id: SessionId,
    audio_b64: String,
    facial_emotion: Option<&'a EmotionSignal>,
    chat_history: &'a [DialogueTurn],
    long_term_memory: &'a LongTermMemory,
}

#[derive(Deserialize)]
struct InteractResponse {
    ai_text: String,
    ai_audio_b64: Option<String>,
    #[serde(default)]
    extracted_memory: Option<LongTermMemory>,
    updated_chat_history: Vec<DialogueTurn>,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// Talks to the backend's `/session` and `/interact` endpoints
///
/// Stateless: no retries, no caching. Every call is one HTTP request.
#[derive(Debug, Clone)]
pub struct HttpConversationClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpConversationClient {
    /// Create a client for the backend at `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if the URL is empty or the HTTP client cannot be built
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(Error::Config("backend URL required".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    /// Backend base URL, without trailing slash
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ConversationService for HttpConversationClient {
    async fn create_session(&self) -> Result<SessionId> {
        let url = format!("{}/session", self.base_url);
        tracing::debug!(url = %url, "creating session");

        let response = self.client.post(&url).send().await.map_err(|e| {
            tracing::error!(error = %e, "session request failed");
            Error::Connection(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "session creation rejected");
            return Err(Error::Connection(format!(
                "session creation failed with status {status}"
            )));
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| Error::Connection(format!("invalid session response: {e}")))?;

        tracing::info!(session_id = %session.session_id, "session created");
        Ok(session.session_id)
    }

    async fn submit_interaction(&self, request: &InteractionRequest) -> Result<InteractionResult> {
        let url = format!("{}/interact", self.base_url);
        tracing::debug!(
            session_id = %request.session_id,
            audio_bytes = request.audio.len(),
            history_len = request.history.len(),
            "submitting interaction"
        );

        let body = InteractBody {
            session_id: request.session_id,
            audio_b64: BASE64.encode(request.audio.as_bytes()),
            facial_emotion: request.emotion.as_ref(),
            chat_history: &request.history,
            long_term_memory: &request.memory,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "interaction request failed");
                Error::Connection(e.to_string())
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = rejection_message(&body);
            tracing::warn!(status = %status, detail = %message, "interaction rejected");
            return Err(Error::Interaction(message));
        }

        let reply: InteractResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse interaction response");
            Error::Interaction(format!("invalid interaction response: {e}"))
        })?;

        into_result(reply)
    }
}

/// Pull the backend's `detail` out of an error body
fn rejection_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.detail)
        .and_then(|detail| match detail {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s),
            _ => None,
        })
        .unwrap_or_else(|| FALLBACK_INTERACTION_ERROR.to_string())
}

fn into_result(reply: InteractResponse) -> Result<InteractionResult> {
    let reply_audio = match reply.ai_audio_b64.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(encoded) => {
            let bytes = BASE64
                .decode(encoded)
                .map_err(|e| Error::Interaction(format!("invalid reply audio: {e}")))?;
            Some(AudioPayload::new(bytes))
        }
    };

    Ok(InteractionResult {
        reply_text: reply.ai_text,
        reply_audio,
        extracted_memory: reply.extracted_memory.unwrap_or_default(),
        history: reply.updated_chat_history,
    })
}
