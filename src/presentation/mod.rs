//! Presentation adapter
//!
//! Reads controller views and forwards user intent. Never writes controller state
//! directly.

mod terminal;

pub use terminal::{TerminalSession, ViewRenderer};

use crate::controller::ControllerView;

/// What the presence indicator consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndicatorSignal {
    pub is_ai_speaking: bool,
    pub is_user_speaking: bool,
}

impl From<&ControllerView> for IndicatorSignal {
    fn from(view: &ControllerView) -> Self {
        Self {
            is_ai_speaking: view.is_ai_speaking,
            is_user_speaking: view.is_user_speaking,
        }
    }
}

/// What to do with the microphone for an indicator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicAction {
    Begin,
    Abandon,
    Keep,
}

impl IndicatorSignal {
    /// The microphone runs only while the user has the floor
    #[must_use]
    pub const fn mic_action(self, recording: bool) -> MicAction {
        let wanted = self.is_user_speaking && !self.is_ai_speaking;
        match (wanted, recording) {
            (true, false) => MicAction::Begin,
            (false, true) => MicAction::Abandon,
            _ => MicAction::Keep,
        }
    }
}

/// One-line status for the current view
#[must_use]
pub const fn status_line(view: &ControllerView) -> &'static str {
    if view.is_processing {
        "Processing..."
    } else if view.is_ai_speaking {
        "Lumen is speaking..."
    } else if view.is_user_speaking {
        "Listening... press Enter to send."
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::TurnState;

    #[test]
    fn test_status_line_priority() {
        let mut view = ControllerView::default();
        assert_eq!(status_line(&view), "");

        view.state = TurnState::Listening;
        view.is_user_speaking = true;
        assert_eq!(status_line(&view), "Listening... press Enter to send.");

        view.is_user_speaking = false;
        view.state = TurnState::Idle;
        view.is_ai_speaking = true;
        assert_eq!(status_line(&view), "Lumen is speaking...");

        view.is_processing = true;
        assert_eq!(status_line(&view), "Processing...");
    }

    #[test]
    fn test_indicator_signal() {
        let view = ControllerView {
            is_ai_speaking: true,
            ..ControllerView::default()
        };
        assert_eq!(
            IndicatorSignal::from(&view),
            IndicatorSignal {
                is_ai_speaking: true,
                is_user_speaking: false,
            }
        );
    }

    #[test]
    fn test_mic_follows_user_turn() {
        let listening = IndicatorSignal {
            is_ai_speaking: false,
            is_user_speaking: true,
        };
        assert_eq!(listening.mic_action(false), MicAction::Begin);
        assert_eq!(listening.mic_action(true), MicAction::Keep);

        let speaking = IndicatorSignal {
            is_ai_speaking: true,
            is_user_speaking: false,
        };
        assert_eq!(speaking.mic_action(true), MicAction::Abandon);
        assert_eq!(speaking.mic_action(false), MicAction::Keep);

        assert_eq!(IndicatorSignal::default().mic_action(true), MicAction::Abandon);
    }
}
