//! Turn-taking controller
//!
//! Owns conversation state (session, transcript, long-term memory, turn phase)
//! and allows at most one interaction request in flight.
//!
//! ```text
//!  Uninitialized ──session──▶ Idle ──start──▶ Listening ──stop+submit──▶ Processing
//!                               ▲                 ▲                          │
//!                               │                 └──── auto-resume ◀────────┤
//!                               └──────────── reply / failure ◀──────────────┘
//!
//!  Speaking (orthogonal): set when a reply carries audio, cleared by the
//!  matching playback completion; Listening is never entered while set.
//! ```

mod machine;
mod runtime;
mod state;

pub use machine::{CapturedTurn, Effect, Event, SESSION_ERROR_MESSAGE, TurnController};
pub use runtime::{ControllerHandle, ControllerRuntime};
pub use state::{ControllerView, PlaybackTicket, TurnState};
