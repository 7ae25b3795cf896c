//! Lumen Voice - turn-taking client for the Lumen conversational assistant
//!
//! Coordinates microphone capture, the remote Lumen backend and speaker
//! playback into one continuous speak / reply / speak loop.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              Presentation (terminal)                 │
//! │     status line │ indicator │ Enter = stop + send    │
//! └──────────┬─────────────────────────▲────────────────┘
//!     intents│                         │views
//! ┌──────────▼─────────────────────────┴────────────────┐
//! │               Turn-taking controller                 │
//! │  Uninitialized → Idle ↔ Listening → Processing       │
//! │  session │ history │ long-term memory │ speaking     │
//! └──────────┬─────────────────────────┬────────────────┘
//!            │                         │
//! ┌──────────▼──────────┐   ┌──────────▼────────────────┐
//! │  Lumen backend      │   │  Audio                     │
//! │  /session /interact │   │  mic capture │ playback    │
//! └─────────────────────┘   └────────────────────────────┘
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod playback;
pub mod preferences;
pub mod presentation;
pub mod service;
pub mod voice;

pub use config::Config;
pub use controller::{
    CapturedTurn, ControllerHandle, ControllerRuntime, ControllerView, TurnController, TurnState,
};
pub use error::{Error, Result};
pub use playback::{PlaybackSink, SilentSink};
pub use preferences::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore, VOICES};
pub use service::{
    AudioPayload, ConversationService, DialogueTurn, EmotionSignal, HttpConversationClient,
    InteractionRequest, InteractionResult, LongTermMemory, Role, SessionId,
};
