//! Persisted user preferences
//!
//! Only the selected assistant voice is stored. It is read once at startup by the
//! presentation layer and injected from there; the controller never sees it.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// An assistant voice the backend can speak with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceOption {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

/// Voices offered to the user
pub const VOICES: &[VoiceOption] = &[
    VoiceOption {
        id: "sarah",
        name: "Sarah",
        description: "Warm and empathetic",
    },
    VoiceOption {
        id: "alex",
        name: "Alex",
        description: "Calm and professional",
    },
    VoiceOption {
        id: "jordan",
        name: "Jordan",
        description: "Friendly and supportive",
    },
    VoiceOption {
        id: "riley",
        name: "Riley",
        description: "Gentle and understanding",
    },
];

/// Look up a voice by id (case-insensitive)
#[must_use]
pub fn find_voice(id: &str) -> Option<&'static VoiceOption> {
    let id = id.trim();
    VOICES.iter().find(|v| v.id.eq_ignore_ascii_case(id))
}

/// The stored voice, or `None` when nothing usable is stored
///
/// An unreadable store or an id no longer in [`VOICES`] is logged and treated
/// as unset, so the caller falls back to asking.
#[must_use]
pub fn stored_voice(store: &dyn PreferenceStore) -> Option<&'static VoiceOption> {
    match store.selected_voice() {
        Ok(Some(id)) => {
            let voice = find_voice(&id);
            if voice.is_none() {
                tracing::warn!(voice = %id, "ignoring unknown stored voice");
            }
            voice
        }
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(error = %e, "could not read voice preference");
            None
        }
    }
}

/// Storage for the selected voice
pub trait PreferenceStore: Send + Sync {
    /// Selected voice id, if the user has picked one
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read
    fn selected_voice(&self) -> Result<Option<String>>;

    /// Persist the selected voice
    ///
    /// # Errors
    ///
    /// Returns error if the voice is unknown or the store cannot be written
    fn set_selected_voice(&self, voice_id: &str) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PreferencesFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    selected_voice: Option<String>,
}

/// Preferences kept in a TOML file
#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    /// File name inside the data directory
    pub const FILE_NAME: &'static str = "preferences.toml";

    /// Store backed by `<data_dir>/preferences.toml`
    #[must_use]
    pub fn in_dir(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(Self::FILE_NAME),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<PreferencesFile> {
        if !self.path.exists() {
            return Ok(PreferencesFile::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(toml::from_str(&content)?)
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn selected_voice(&self) -> Result<Option<String>> {
        Ok(self.read()?.selected_voice)
    }

    fn set_selected_voice(&self, voice_id: &str) -> Result<()> {
        let voice = find_voice(voice_id)
            .ok_or_else(|| Error::Preferences(format!("unknown voice: {voice_id}")))?;

        let mut prefs = self.read().unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "discarding unreadable preferences");
            PreferencesFile::default()
        });
        prefs.selected_voice = Some(voice.id.to_string());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string(&prefs).map_err(|e| Error::Preferences(e.to_string()))?;
        std::fs::write(&self.path, content)?;

        tracing::info!(voice = voice.id, path = %self.path.display(), "voice preference saved");
        Ok(())
    }
}

/// In-process preferences, for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    voice: Mutex<Option<String>>,
}

impl MemoryPreferenceStore {
    #[must_use]
    pub fn with_voice(voice_id: &str) -> Self {
        Self {
            voice: Mutex::new(Some(voice_id.to_string())),
        }
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn selected_voice(&self) -> Result<Option<String>> {
        self.voice
            .lock()
            .map(|v| v.clone())
            .map_err(|_| Error::Preferences("preference lock poisoned".to_string()))
    }

    fn set_selected_voice(&self, voice_id: &str) -> Result<()> {
        let voice = find_voice(voice_id)
            .ok_or_else(|| Error::Preferences(format!("unknown voice: {voice_id}")))?;
        let mut slot = self
            .voice
            .lock()
            .map_err(|_| Error::Preferences("preference lock poisoned".to_string()))?;
        *slot = Some(voice.id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_voice_case_insensitive() {
        assert_eq!(find_voice(" Sarah ").map(|v| v.id), Some("sarah"));
        assert!(find_voice("hal").is_none());
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePreferenceStore::in_dir(dir.path());

        assert_eq!(store.selected_voice().unwrap(), None);

        store.set_selected_voice("Riley").unwrap();
        assert_eq!(store.selected_voice().unwrap().as_deref(), Some("riley"));

        // A second store over the same file sees the persisted value
        let reopened = FilePreferenceStore::in_dir(dir.path());
        assert_eq!(reopened.selected_voice().unwrap().as_deref(), Some("riley"));
    }

    #[test]
    fn test_file_store_creates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePreferenceStore::in_dir(&dir.path().join("nested").join("lumen"));

        store.set_selected_voice("alex").unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_unknown_voice_rejected() {
        let store = MemoryPreferenceStore::default();
        assert!(store.set_selected_voice("hal").is_err());
        assert_eq!(store.selected_voice().unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_is_an_error_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePreferenceStore::in_dir(dir.path());
        std::fs::write(store.path(), "selected_voice = [").unwrap();

        assert!(store.selected_voice().is_err());

        // Writing replaces the corrupt file
        store.set_selected_voice("jordan").unwrap();
        assert_eq!(store.selected_voice().unwrap().as_deref(), Some("jordan"));
    }

    #[test]
    fn test_stored_voice_falls_back_on_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePreferenceStore::in_dir(dir.path());
        std::fs::write(store.path(), "selected_voice = [").unwrap();
        assert!(stored_voice(&store).is_none());

        std::fs::write(store.path(), "selected_voice = \"hal\"\n").unwrap();
        assert!(stored_voice(&store).is_none());

        std::fs::write(store.path(), "selected_voice = \"alex\"\n").unwrap();
        assert_eq!(stored_voice(&store).map(|v| v.id), Some("alex"));
    }
}
