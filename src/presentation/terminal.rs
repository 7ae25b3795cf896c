//! Terminal chat session
//!
//! Enter stops the microphone and submits the utterance. `l` starts listening
//! by hand, `r` forgets long-term memory, `q` quits.

use tokio::io::{AsyncBufReadExt, BufReader};

use super::{IndicatorSignal, MicAction, status_line};
use crate::Result;
use crate::controller::{CapturedTurn, ControllerHandle, ControllerView};
use crate::preferences::VoiceOption;
use crate::service::{EmotionSignal, Role};
use crate::voice::Microphone;

/// Turns successive views into the lines worth printing
#[derive(Debug, Default)]
pub struct ViewRenderer {
    status: &'static str,
    error: Option<String>,
    turns_shown: usize,
}

impl ViewRenderer {
    /// Lines that changed since the previous view
    pub fn render(&mut self, view: &ControllerView) -> Vec<String> {
        let mut lines = Vec::new();

        // History is replaced wholesale, so a shrink means a new transcript
        if view.conversation_history.len() < self.turns_shown {
            self.turns_shown = 0;
        }
        for turn in &view.conversation_history[self.turns_shown..] {
            let speaker = match turn.role {
                Role::User => "You",
                Role::Assistant => "Lumen",
            };
            lines.push(format!("{speaker}: {}", turn.content));
        }
        self.turns_shown = view.conversation_history.len();

        if view.latest_error != self.error {
            if let Some(error) = &view.latest_error {
                lines.push(format!("Error: {error}"));
            }
            self.error.clone_from(&view.latest_error);
        }

        let status = status_line(view);
        if status != self.status {
            if !status.is_empty() {
                lines.push(format!("[{status}]"));
            }
            self.status = status;
        }

        lines
    }
}

/// Interactive voice chat in the terminal
pub struct TerminalSession {
    handle: ControllerHandle,
    microphone: Microphone,
    emotion: Option<EmotionSignal>,
    renderer: ViewRenderer,
}

impl TerminalSession {
    /// Create a session driving `handle` with input from `microphone`
    #[must_use]
    pub fn new(handle: ControllerHandle, microphone: Microphone) -> Self {
        Self {
            handle,
            microphone,
            emotion: None,
            renderer: ViewRenderer::default(),
        }
    }

    /// Attach an emotion signal to every submitted utterance
    #[must_use]
    pub fn with_emotion(mut self, emotion: Option<EmotionSignal>) -> Self {
        self.emotion = emotion;
        self
    }

    /// Print the greeting for the selected voice
    pub fn greet(voice: Option<&VoiceOption>) {
        match voice {
            Some(v) => println!("Talking with Lumen ({}, {}).", v.name, v.description),
            None => println!("Talking with Lumen."),
        }
        println!("Enter: send | l: listen | r: reset memory | q: quit\n");
    }

    /// Run until the user quits or stdin closes
    ///
    /// # Errors
    ///
    /// Returns error if stdin fails or the controller stops
    #[allow(clippy::future_not_send)]
    pub async fn run(mut self) -> Result<()> {
        let mut views = self.handle.subscribe();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        let view = views.borrow_and_update().clone();
        self.on_view(&view).await?;

        loop {
            tokio::select! {
                changed = views.changed() => {
                    if changed.is_err() {
                        tracing::debug!("controller stopped");
                        break;
                    }
                    let view = views.borrow_and_update().clone();
                    self.on_view(&view).await?;
                }
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    match line.trim().to_lowercase().as_str() {
                        "q" | "quit" | "exit" => break,
                        "l" => self.handle.start_listening().await?,
                        "r" => {
                            self.handle.reset_memory().await?;
                            println!("Memory cleared.");
                        }
                        _ => self.submit().await?,
                    }
                }
            }
        }

        self.microphone.abandon();
        Ok(())
    }

    async fn on_view(&mut self, view: &ControllerView) -> Result<()> {
        for line in self.renderer.render(view) {
            println!("{line}");
        }

        match IndicatorSignal::from(view).mic_action(self.microphone.is_recording()) {
            MicAction::Begin => {
                if let Err(e) = self.microphone.begin() {
                    self.handle.capture_failed(e.user_message()).await?;
                }
            }
            MicAction::Abandon => self.microphone.abandon(),
            MicAction::Keep => {}
        }
        Ok(())
    }

    async fn submit(&mut self) -> Result<()> {
        if !self.handle.view().is_user_speaking {
            tracing::debug!("enter pressed while not listening");
            return Ok(());
        }

        match self.microphone.finish() {
            Ok(audio) => {
                let mut turn = CapturedTurn::new(audio);
                turn.emotion.clone_from(&self.emotion);
                self.handle.stop_and_submit(turn).await
            }
            Err(e) => self.handle.capture_failed(e.user_message()).await,
        }
    }
}
