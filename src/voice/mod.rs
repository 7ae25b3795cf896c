//! Audio hardware collaborators
//!
//! Microphone capture produces the utterance the controller submits; speaker
//! playback renders the assistant's reply and reports completion.

mod capture;
mod playback;

pub use capture::{MIN_UTTERANCE_SAMPLES, Microphone, SAMPLE_RATE, encode_wav, rms};
pub use playback::{PLAYBACK_SAMPLE_RATE, Speaker, SpeakerSink, decode_mp3, resample, sine_tone};
