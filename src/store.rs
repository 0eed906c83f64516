//! Caches for the in-progress draft and the last generated timetable.
//!
//! Entries are plain JSON, kept in memory or in a state directory. An entry
//! that no longer parses is deleted and treated as absent.

use crate::data::{EditorState, GeneratedTimetable};
use crate::error::StoreError;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const DRAFT_FILE: &str = "draft.json";
pub const RESULT_FILE: &str = "timetable.json";

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// A single JSON document, either in memory or on disk.
#[derive(Debug)]
enum Slot {
    Memory(Option<String>),
    File(PathBuf),
}

impl Slot {
    fn read(&self) -> Result<Option<String>, StoreError> {
        match self {
            Self::Memory(body) => Ok(body.clone()),
            Self::File(path) => match fs::read_to_string(path) {
                Ok(body) => Ok(Some(body)),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(io_error(path, e)),
            },
        }
    }

    fn write(&mut self, body: String) -> Result<(), StoreError> {
        match self {
            Self::Memory(slot) => {
                *slot = Some(body);
                Ok(())
            }
            Self::File(path) => fs::write(&*path, body).map_err(|e| io_error(path, e)),
        }
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        match self {
            Self::Memory(slot) => {
                *slot = None;
                Ok(())
            }
            Self::File(path) => match fs::remove_file(&*path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(io_error(path, e)),
            },
        }
    }

    /// Reads and decodes the entry, deleting it when it does not parse.
    fn load<T: DeserializeOwned>(&mut self, what: &str) -> Result<Option<T>, StoreError> {
        let Some(body) = self.read()? else {
            return Ok(None);
        };
        match serde_json::from_str(&body) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Discarding unreadable {what}: {e}");
                self.clear()?;
                Ok(None)
            }
        }
    }
}

fn open_slot(dir: Option<&Path>, file: &str) -> Result<Slot, StoreError> {
    match dir {
        None => Ok(Slot::Memory(None)),
        Some(dir) => {
            fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
            Ok(Slot::File(dir.join(file)))
        }
    }
}

fn millis_since_epoch(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct SavedDraft {
    saved_at: u64,
    state: EditorState,
}

/// Resumable editing state, valid for `ttl` after it was saved.
#[derive(Debug)]
pub struct DraftStore {
    slot: Slot,
    ttl: Duration,
}

impl DraftStore {
    pub fn open(dir: Option<&Path>, ttl: Duration) -> Result<Self, StoreError> {
        Ok(Self {
            slot: open_slot(dir, DRAFT_FILE)?,
            ttl,
        })
    }

    pub fn save(&mut self, state: &EditorState, now: SystemTime) -> Result<(), StoreError> {
        let draft = SavedDraft {
            saved_at: millis_since_epoch(now),
            state: state.clone(),
        };
        self.slot.write(serde_json::to_string(&draft)?)
    }

    /// The saved draft, unless it is missing, unreadable or expired.
    pub fn load(&mut self, now: SystemTime) -> Result<Option<EditorState>, StoreError> {
        let Some(draft) = self.slot.load::<SavedDraft>("draft")? else {
            return Ok(None);
        };
        let age = millis_since_epoch(now).saturating_sub(draft.saved_at);
        if u128::from(age) > self.ttl.as_millis() {
            debug!("Draft expired {age} ms after saving");
            self.slot.clear()?;
            return Ok(None);
        }
        Ok(Some(draft.state))
    }

    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.slot.clear()
    }
}

/// The last successful generator response, kept for the display phase.
#[derive(Debug)]
pub struct ResultStore {
    slot: Slot,
}

impl ResultStore {
    pub fn open(dir: Option<&Path>) -> Result<Self, StoreError> {
        Ok(Self {
            slot: open_slot(dir, RESULT_FILE)?,
        })
    }

    pub fn save(&mut self, timetable: &GeneratedTimetable) -> Result<(), StoreError> {
        self.slot.write(serde_json::to_string(timetable)?)
    }

    pub fn load(&mut self) -> Result<Option<GeneratedTimetable>, StoreError> {
        self.slot.load("cached timetable")
    }

    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.slot.clear()
    }
}
