//! Conversation payload types
//!
//! Field names on the wire follow the Lumen backend schema; Rust names describe
//! what the values mean.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Backend-issued conversation identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Speaker of a dialogue turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One utterance in the conversation transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueTurn {
    pub role: Role,
    pub content: String,
}

impl DialogueTurn {
    /// Create a user turn
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant turn
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Age as extracted by the backend: a number when it could parse one, free text otherwise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Age {
    Number(serde_json::Number),
    Text(String),
}

/// Durable facts extracted from the conversation
///
/// The field set is closed: keys the backend sends that are not listed here are
/// dropped on deserialization. Values come from unvalidated model output, so each
/// field accepts any scalar and drops lists or objects rather than failing the
/// whole reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LongTermMemory {
    #[serde(
        rename = "nombre",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,

    #[serde(
        rename = "edad",
        default,
        deserialize_with = "lenient_age",
        skip_serializing_if = "Option::is_none"
    )]
    pub age: Option<Age>,

    #[serde(
        rename = "tema_recurrente",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub recurring_topic: Option<String>,

    #[serde(
        rename = "preferencia_personal",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub personal_preference: Option<String>,

    #[serde(
        rename = "meta_u_objetivo",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub goal: Option<String>,
}

/// Strings as-is, numbers and bools as text, anything else dropped
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(other) => {
            tracing::warn!(value = %other, "ignoring non-scalar memory value");
            None
        }
    })
}

fn lenient_age<'de, D>(deserializer: D) -> Result<Option<Age>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => Some(Age::Number(n)),
        Some(Value::String(s)) => Some(Age::Text(s)),
        Some(Value::Bool(b)) => Some(Age::Text(b.to_string())),
        Some(other) => {
            tracing::warn!(value = %other, "ignoring non-scalar age");
            None
        }
    })
}

impl LongTermMemory {
    /// Merge a fresh extraction into this memory
    ///
    /// Fields present in `update` overwrite; absent fields keep their prior value.
    pub fn merge(&mut self, update: Self) {
        overwrite(&mut self.name, update.name);
        overwrite(&mut self.age, update.age);
        overwrite(&mut self.recurring_topic, update.recurring_topic);
        overwrite(&mut self.personal_preference, update.personal_preference);
        overwrite(&mut self.goal, update.goal);
    }

    /// Whether no field is set
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.age.is_none()
            && self.recurring_topic.is_none()
            && self.personal_preference.is_none()
            && self.goal.is_none()
    }
}

fn overwrite<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Emotion signal accompanying a captured utterance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionSignal {
    pub stable_dominant_emotion: Option<String>,
    pub average_scores: Option<BTreeMap<String, f64>>,
}

impl EmotionSignal {
    /// A signal naming a dominant emotion with no per-emotion scores
    #[must_use]
    pub fn dominant(emotion: impl Into<String>) -> Self {
        Self {
            stable_dominant_emotion: Some(emotion.into()),
            average_scores: Some(BTreeMap::new()),
        }
    }
}

/// Opaque encoded audio (WAV from the microphone, MP3 from the backend)
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AudioPayload(Vec<u8>);

impl AudioPayload {
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for AudioPayload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for AudioPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AudioPayload({} bytes)", self.0.len())
    }
}

/// Unit of work sent to the backend for one turn
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionRequest {
    pub session_id: SessionId,
    pub audio: AudioPayload,
    pub emotion: Option<EmotionSignal>,
    pub history: Vec<DialogueTurn>,
    pub memory: LongTermMemory,
}

/// Backend reply for one turn
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionResult {
    pub reply_text: String,
    /// Synthesized speech, `None` when the backend produced none
    pub reply_audio: Option<AudioPayload>,
    pub extracted_memory: LongTermMemory,
    /// Authoritative transcript after this turn
    pub history: Vec<DialogueTurn>,
}
