//! Event loop that drives the turn controller
//!
//! The runtime owns the [`TurnController`] and is the only place transitions run.
//! Intents arrive from [`ControllerHandle`]s; backend replies and playback
//! completions come back from spawned tasks. Each event is applied, the new view
//! is published, then the resulting effects are started.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use super::machine::{CapturedTurn, Effect, Event, TurnController};
use super::state::ControllerView;
use crate::playback::PlaybackSink;
use crate::service::ConversationService;
use crate::{Error, Result};

/// Intent queue depth
const INTENT_BUFFER: usize = 32;

/// Runs the controller until every handle is dropped
pub struct ControllerRuntime {
    controller: TurnController,
    service: Arc<dyn ConversationService>,
    sink: Arc<dyn PlaybackSink>,
    intents: mpsc::Receiver<Event>,
    completions_tx: mpsc::UnboundedSender<Event>,
    completions: mpsc::UnboundedReceiver<Event>,
    view_tx: watch::Sender<ControllerView>,
}

impl ControllerRuntime {
    /// Wire a controller to its backend and playback collaborators
    #[must_use]
    pub fn new(
        controller: TurnController,
        service: Arc<dyn ConversationService>,
        sink: Arc<dyn PlaybackSink>,
    ) -> (Self, ControllerHandle) {
        let (intents_tx, intents) = mpsc::channel(INTENT_BUFFER);
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(controller.view());

        let runtime = Self {
            controller,
            service,
            sink,
            intents,
            completions_tx,
            completions,
            view_tx,
        };
        let handle = ControllerHandle {
            intents: intents_tx,
            view: view_rx,
        };

        (runtime, handle)
    }

    /// Process events until all handles are gone
    ///
    /// Completions that arrive after that are dropped.
    pub async fn run(mut self) {
        tracing::debug!("controller runtime started");

        loop {
            let event = tokio::select! {
                biased;
                Some(event) = self.completions.recv() => event,
                intent = self.intents.recv() => match intent {
                    Some(event) => event,
                    None => break,
                },
            };
            self.apply(event);
        }

        tracing::debug!("controller runtime stopped");
    }

    fn apply(&mut self, event: Event) {
        let effects = self.controller.handle(event);
        self.view_tx.send_replace(self.controller.view());

        for effect in effects {
            self.execute(effect);
        }
    }

    fn execute(&self, effect: Effect) {
        let completions = self.completions_tx.clone();

        match effect {
            Effect::CreateSession => {
                let service = Arc::clone(&self.service);
                tokio::spawn(async move {
                    let event = match service.create_session().await {
                        Ok(id) => Event::SessionCreated(id),
                        Err(e) => Event::SessionFailed(e),
                    };
                    let _ = completions.send(event);
                });
            }
            Effect::Submit(request) => {
                let service = Arc::clone(&self.service);
                tokio::spawn(async move {
                    let event = match service.submit_interaction(&request).await {
                        Ok(result) => Event::InteractionSucceeded(result),
                        Err(e) => Event::InteractionFailed(e),
                    };
                    let _ = completions.send(event);
                });
            }
            Effect::Play { ticket, audio } => {
                let sink = Arc::clone(&self.sink);
                tokio::spawn(async move {
                    if let Err(e) = sink.play(audio).await {
                        tracing::warn!(error = %e, "playback failed");
                    }
                    let _ = completions.send(Event::PlaybackFinished(ticket));
                });
            }
        }
    }
}

/// Intent API and read-only view for the presentation layer
#[derive(Clone)]
pub struct ControllerHandle {
    intents: mpsc::Sender<Event>,
    view: watch::Receiver<ControllerView>,
}

impl ControllerHandle {
    /// Open the backend session (or retry after a failure)
    ///
    /// # Errors
    ///
    /// Returns `Error::ControllerStopped` if the runtime has exited
    pub async fn initialize(&self) -> Result<()> {
        self.send(Event::Initialize).await
    }

    /// Begin capturing the user; ignored while processing or speaking
    ///
    /// # Errors
    ///
    /// Returns `Error::ControllerStopped` if the runtime has exited
    pub async fn start_listening(&self) -> Result<()> {
        self.send(Event::StartListening).await
    }

    /// End capture and submit the utterance; ignored unless listening
    ///
    /// # Errors
    ///
    /// Returns `Error::ControllerStopped` if the runtime has exited
    pub async fn stop_and_submit(&self, turn: CapturedTurn) -> Result<()> {
        self.send(Event::StopAndSubmit(turn)).await
    }

    /// Report that capture produced no payload
    ///
    /// # Errors
    ///
    /// Returns `Error::ControllerStopped` if the runtime has exited
    pub async fn capture_failed(&self, message: impl Into<String>) -> Result<()> {
        self.send(Event::CaptureFailed(message.into())).await
    }

    /// Forget all long-term memory
    ///
    /// # Errors
    ///
    /// Returns `Error::ControllerStopped` if the runtime has exited
    pub async fn reset_memory(&self) -> Result<()> {
        self.send(Event::ResetMemory).await
    }

    /// Current view
    #[must_use]
    pub fn view(&self) -> ControllerView {
        self.view.borrow().clone()
    }

    /// Receiver that is notified on every published view
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ControllerView> {
        self.view.clone()
    }

    /// Wait until the view satisfies `predicate`, checking the current one first
    ///
    /// # Errors
    ///
    /// Returns `Error::ControllerStopped` if the runtime exits first
    pub async fn wait_until(
        &self,
        predicate: impl FnMut(&ControllerView) -> bool,
    ) -> Result<ControllerView> {
        let mut rx = self.view.clone();
        rx.wait_for(predicate)
            .await
            .map(|view| view.clone())
            .map_err(|_| Error::ControllerStopped)
    }

    async fn send(&self, event: Event) -> Result<()> {
        self.intents
            .send(event)
            .await
            .map_err(|_| Error::ControllerStopped)
    }
}
