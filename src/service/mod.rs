//! Remote conversation service
//!
//! The backend does speech recognition, reasoning, memory extraction and speech
//! synthesis. This client only knows its two operations.

mod client;
mod types;

use async_trait::async_trait;

pub use client::HttpConversationClient;
pub use types::{
    Age, AudioPayload, DialogueTurn, EmotionSignal, InteractionRequest, InteractionResult,
    LongTermMemory, Role, SessionId,
};

use crate::Result;

/// Backend operations the turn controller depends on
#[async_trait]
pub trait ConversationService: Send + Sync {
    /// Open a new conversation
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the backend is unreachable or refuses
    async fn create_session(&self) -> Result<SessionId>;

    /// Submit one captured turn and wait for the assistant's reply
    ///
    /// No retries: a failure is final for that turn.
    ///
    /// # Errors
    ///
    /// Returns `Error::Interaction` with the backend's diagnostic on a non-success
    /// status, `Error::Connection` on transport failure
    async fn submit_interaction(&self, request: &InteractionRequest) -> Result<InteractionResult>;
}
