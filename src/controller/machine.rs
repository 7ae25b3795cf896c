//! Turn-taking state machine
//!
//! Pure and synchronous: every event is applied in full before `handle` returns,
//! and any I/O the transition needs comes back as an [`Effect`] for the runtime
//! to execute. Completions of that I/O re-enter as events.

use super::state::{ControllerView, PlaybackTicket, TurnState};
use crate::Error;
use crate::service::{
    AudioPayload, DialogueTurn, EmotionSignal, InteractionRequest, InteractionResult,
    LongTermMemory, SessionId,
};

/// Shown when the backend could not open a session
pub const SESSION_ERROR_MESSAGE: &str = "Could not connect to the Lumen backend.";

/// Shown when stop-and-submit arrives with no audio
const EMPTY_CAPTURE_MESSAGE: &str = "No audio was captured.";

/// A finished utterance handed over by the capture collaborator
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedTurn {
    pub audio: AudioPayload,
    pub emotion: Option<EmotionSignal>,
}

impl CapturedTurn {
    #[must_use]
    pub const fn new(audio: AudioPayload) -> Self {
        Self {
            audio,
            emotion: None,
        }
    }

    #[must_use]
    pub fn with_emotion(mut self, emotion: EmotionSignal) -> Self {
        self.emotion = Some(emotion);
        self
    }
}

/// Inputs to the state machine
#[derive(Debug)]
pub enum Event {
    /// Intent: open a session (first start, or retry after failure)
    Initialize,
    /// Intent: begin capturing the user
    StartListening,
    /// Intent: end capture and submit the utterance
    StopAndSubmit(CapturedTurn),
    /// Capture collaborator failed to produce audio
    CaptureFailed(String),
    /// Intent: forget all long-term memory
    ResetMemory,
    SessionCreated(SessionId),
    SessionFailed(Error),
    InteractionSucceeded(InteractionResult),
    InteractionFailed(Error),
    /// Audio subsystem finished (or abandoned) a scheduled playback
    PlaybackFinished(PlaybackTicket),
}

/// Side effects requested by a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    CreateSession,
    Submit(InteractionRequest),
    Play {
        ticket: PlaybackTicket,
        audio: AudioPayload,
    },
}

/// Owns conversation state and decides every transition
#[derive(Debug)]
pub struct TurnController {
    state: TurnState,
    session_id: Option<SessionId>,
    session_pending: bool,
    history: Vec<DialogueTurn>,
    memory: LongTermMemory,
    speaking: Option<PlaybackTicket>,
    next_ticket: u64,
    latest_error: Option<String>,
    last_reply: Option<String>,
    auto_listen: bool,
}

impl Default for TurnController {
    fn default() -> Self {
        Self::new(true)
    }
}

impl TurnController {
    /// Create a controller with no session
    ///
    /// With `auto_listen`, capture resumes on its own once a turn completes and
    /// the assistant is not speaking.
    #[must_use]
    pub const fn new(auto_listen: bool) -> Self {
        Self {
            state: TurnState::Uninitialized,
            session_id: None,
            session_pending: false,
            history: Vec::new(),
            memory: LongTermMemory {
                name: None,
                age: None,
                recurring_topic: None,
                personal_preference: None,
                goal: None,
            },
            speaking: None,
            next_ticket: 0,
            latest_error: None,
            last_reply: None,
            auto_listen,
        }
    }

    /// Apply one event
    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::Initialize => self.initialize(),
            Event::StartListening => {
                self.start_listening();
                Vec::new()
            }
            Event::StopAndSubmit(turn) => self.stop_and_submit(turn),
            Event::CaptureFailed(message) => {
                self.capture_failed(message);
                Vec::new()
            }
            Event::ResetMemory => {
                self.reset_memory();
                Vec::new()
            }
            Event::SessionCreated(id) => {
                self.session_created(id);
                Vec::new()
            }
            Event::SessionFailed(err) => {
                self.session_failed(&err);
                Vec::new()
            }
            Event::InteractionSucceeded(result) => self.interaction_succeeded(result),
            Event::InteractionFailed(err) => {
                self.interaction_failed(&err);
                Vec::new()
            }
            Event::PlaybackFinished(ticket) => {
                self.playback_finished(ticket);
                Vec::new()
            }
        }
    }

    /// Request a session if none exists and none is being created
    pub fn initialize(&mut self) -> Vec<Effect> {
        if self.state != TurnState::Uninitialized || self.session_pending {
            tracing::debug!(state = self.state.label(), "initialize ignored");
            return Vec::new();
        }
        self.session_pending = true;
        vec![Effect::CreateSession]
    }

    /// Enter Listening; no-op unless Idle with the assistant silent
    ///
    /// Returns whether capture started.
    pub fn start_listening(&mut self) -> bool {
        if self.state != TurnState::Idle || self.speaking.is_some() {
            tracing::debug!(
                state = self.state.label(),
                speaking = self.speaking.is_some(),
                "start listening ignored"
            );
            return false;
        }
        self.transition(TurnState::Listening);
        true
    }

    /// Leave Listening and submit the captured utterance
    ///
    /// No-op outside Listening: nothing is sent and no state changes.
    pub fn stop_and_submit(&mut self, turn: CapturedTurn) -> Vec<Effect> {
        if self.state != TurnState::Listening {
            tracing::debug!(state = self.state.label(), "stop and submit ignored");
            return Vec::new();
        }
        if turn.audio.is_empty() {
            self.capture_failed(EMPTY_CAPTURE_MESSAGE.to_string());
            return Vec::new();
        }
        let Some(session_id) = self.session_id else {
            // Listening is only reachable with a session
            return Vec::new();
        };

        let request = InteractionRequest {
            session_id,
            audio: turn.audio,
            emotion: turn.emotion,
            history: self.history.clone(),
            memory: self.memory.clone(),
        };
        self.transition(TurnState::Processing);
        vec![Effect::Submit(request)]
    }

    /// Capture produced no payload: back to Idle without submitting
    pub fn capture_failed(&mut self, message: String) {
        if self.state != TurnState::Listening {
            tracing::debug!(state = self.state.label(), "capture failure ignored");
            return;
        }
        tracing::warn!(error = %message, "capture failed");
        self.latest_error = Some(message);
        self.transition(TurnState::Idle);
    }

    /// Clear long-term memory
    pub fn reset_memory(&mut self) {
        tracing::info!("long-term memory reset");
        self.memory = LongTermMemory::default();
    }

    fn session_created(&mut self, id: SessionId) {
        self.session_pending = false;
        if self.state != TurnState::Uninitialized {
            tracing::warn!(session_id = %id, "unexpected session, keeping current one");
            return;
        }
        self.session_id = Some(id);
        self.latest_error = None;
        self.transition(TurnState::Idle);
    }

    fn session_failed(&mut self, err: &Error) {
        self.session_pending = false;
        tracing::error!(error = %err, "session creation failed");
        self.latest_error = Some(SESSION_ERROR_MESSAGE.to_string());
    }

    fn interaction_succeeded(&mut self, result: InteractionResult) -> Vec<Effect> {
        if self.state != TurnState::Processing {
            tracing::warn!(state = self.state.label(), "dropping unexpected interaction result");
            return Vec::new();
        }

        self.history = result.history;
        self.memory.merge(result.extracted_memory);
        self.last_reply = Some(result.reply_text);
        self.latest_error = None;
        self.transition(TurnState::Idle);

        match result.reply_audio.filter(|audio| !audio.is_empty()) {
            Some(audio) => {
                let ticket = PlaybackTicket(self.next_ticket);
                self.next_ticket += 1;
                self.speaking = Some(ticket);
                tracing::debug!(ticket = ticket.0, bytes = audio.len(), "assistant speaking");
                vec![Effect::Play { ticket, audio }]
            }
            None => {
                self.auto_resume();
                Vec::new()
            }
        }
    }

    fn interaction_failed(&mut self, err: &Error) {
        if self.state != TurnState::Processing {
            tracing::warn!(state = self.state.label(), "dropping unexpected interaction failure");
            return;
        }
        tracing::warn!(error = %err, "interaction failed");
        self.latest_error = Some(err.user_message());
        self.transition(TurnState::Idle);
    }

    fn playback_finished(&mut self, ticket: PlaybackTicket) {
        if self.speaking != Some(ticket) {
            tracing::debug!(ticket = ticket.0, "stale playback completion ignored");
            return;
        }
        self.speaking = None;
        tracing::debug!(ticket = ticket.0, "assistant finished speaking");
        self.auto_resume();
    }

    fn auto_resume(&mut self) {
        if self.auto_listen && self.state == TurnState::Idle && self.speaking.is_none() {
            self.transition(TurnState::Listening);
        }
    }

    fn transition(&mut self, next: TurnState) {
        if self.state != next {
            tracing::info!(from = self.state.label(), to = next.label(), "turn state");
            self.state = next;
        }
    }

    #[must_use]
    pub const fn state(&self) -> TurnState {
        self.state
    }

    #[must_use]
    pub const fn is_speaking(&self) -> bool {
        self.speaking.is_some()
    }

    #[must_use]
    pub const fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    #[must_use]
    pub fn history(&self) -> &[DialogueTurn] {
        &self.history
    }

    #[must_use]
    pub const fn memory(&self) -> &LongTermMemory {
        &self.memory
    }

    #[must_use]
    pub fn latest_error(&self) -> Option<&str> {
        self.latest_error.as_deref()
    }

    /// Project the current state for presentation
    #[must_use]
    pub fn view(&self) -> ControllerView {
        ControllerView {
            state: self.state,
            session_id: self.session_id,
            is_ai_speaking: self.speaking.is_some(),
            is_user_speaking: self.state == TurnState::Listening,
            is_processing: self.state == TurnState::Processing,
            latest_error: self.latest_error.clone(),
            conversation_history: self.history.clone(),
            long_term_memory: self.memory.clone(),
            last_reply: self.last_reply.clone(),
        }
    }
}
