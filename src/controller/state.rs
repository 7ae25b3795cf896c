//! Turn state and the read-only view handed to presentation

use crate::service::{DialogueTurn, LongTermMemory, SessionId};

/// Phase of the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    /// No session yet
    #[default]
    Uninitialized,
    /// Session open; not capturing, nothing in flight
    Idle,
    /// User capture is active
    Listening,
    /// Exactly one interaction request is in flight
    Processing,
}

impl TurnState {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Processing => "processing",
        }
    }
}

/// Identifies one scheduled playback so its completion can be matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackTicket(pub(crate) u64);

/// Snapshot of controller state for presentation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerView {
    pub state: TurnState,
    pub session_id: Option<SessionId>,
    pub is_ai_speaking: bool,
    pub is_user_speaking: bool,
    pub is_processing: bool,
    pub latest_error: Option<String>,
    pub conversation_history: Vec<DialogueTurn>,
    pub long_term_memory: LongTermMemory,
    /// Reply text of the latest successful turn
    pub last_reply: Option<String>,
}
