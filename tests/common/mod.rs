//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lumen_voice::{
    AudioPayload, ConversationService, ControllerHandle, ControllerRuntime, DialogueTurn, Error,
    InteractionRequest, InteractionResult, LongTermMemory, PlaybackSink, Result, SessionId,
    TurnController,
};
use tokio::sync::Semaphore;

/// Scripted backend that records what it was sent
#[derive(Default)]
pub struct FakeService {
    sessions: Mutex<VecDeque<Result<SessionId>>>,
    replies: Mutex<VecDeque<Result<InteractionResult>>>,
    requests: Mutex<Vec<InteractionRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
}

impl FakeService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every interaction until the returned semaphore gets a permit
    #[must_use]
    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    #[must_use]
    pub fn with_session(self, session: Result<SessionId>) -> Self {
        self.sessions.lock().unwrap().push_back(session);
        self
    }

    #[must_use]
    pub fn with_reply(self, reply: Result<InteractionResult>) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn requests(&self) -> Vec<InteractionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversationService for FakeService {
    async fn create_session(&self) -> Result<SessionId> {
        self.sessions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(SessionId(1)))
    }

    async fn submit_interaction(&self, request: &InteractionRequest) -> Result<InteractionResult> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Interaction("no scripted reply".to_string())));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }
}

/// Playback sink that records audio and finishes only when released
pub struct RecordingSink {
    played: Mutex<Vec<AudioPayload>>,
    gate: Semaphore,
    fail: bool,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self {
            played: Mutex::new(Vec::new()),
            gate: Semaphore::new(0),
            fail: false,
        }
    }

    /// Sink whose playback errors once released
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Let one pending playback finish
    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    pub fn played(&self) -> Vec<AudioPayload> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlaybackSink for RecordingSink {
    async fn play(&self, audio: AudioPayload) -> Result<()> {
        self.played.lock().unwrap().push(audio);
        self.gate.acquire().await.unwrap().forget();
        if self.fail {
            return Err(Error::Audio("device unplugged".to_string()));
        }
        Ok(())
    }
}

/// Spawn a runtime wired to the given fakes
pub fn spawn_controller(
    service: Arc<FakeService>,
    sink: Arc<RecordingSink>,
    auto_listen: bool,
) -> ControllerHandle {
    let (runtime, handle) = ControllerRuntime::new(TurnController::new(auto_listen), service, sink);
    tokio::spawn(runtime.run());
    handle
}

/// A reply that appends one exchange to `history`
#[must_use]
pub fn reply(
    history: &[DialogueTurn],
    user: &str,
    assistant: &str,
    audio: Option<&[u8]>,
) -> InteractionResult {
    let mut updated = history.to_vec();
    updated.push(DialogueTurn::user(user));
    updated.push(DialogueTurn::assistant(assistant));

    InteractionResult {
        reply_text: assistant.to_string(),
        reply_audio: audio.map(|bytes| AudioPayload::new(bytes.to_vec())),
        extracted_memory: LongTermMemory::default(),
        history: updated,
    }
}

/// Some captured audio
#[must_use]
pub fn utterance() -> AudioPayload {
    AudioPayload::new(b"RIFF....WAVEfmt ".to_vec())
}
