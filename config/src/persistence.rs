//! State carried between runs in `<data_dir>/state.json`.
//!
//! The file is one JSON object. `courses` holds the course store in compact
//! form; every other key is the opaque state of the source with that name.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use autocoupons_types::CourseStore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::atomic_write::{atomic_write, recover_bak_file};

pub const STATE_FILE: &str = "state.json";
pub const COURSES_KEY: &str = "courses";

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode state: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("`{0}` is reserved and cannot name a source")]
    ReservedName(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    courses: CourseStore,
    #[serde(flatten)]
    sources: BTreeMap<String, serde_json::Value>,
}

impl PersistedState {
    #[must_use]
    pub fn path(data_dir: &Path) -> PathBuf {
        data_dir.join(STATE_FILE)
    }

    /// Load the state saved in `data_dir`, or an empty state on first run.
    pub fn load(data_dir: &Path) -> Result<Self, StateError> {
        let path = Self::path(data_dir);
        recover_bak_file(&path);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No saved state");
                return Ok(Self::default());
            }
            Err(source) => return Err(StateError::Read { path, source }),
        };
        let state: Self = serde_json::from_slice(&bytes)
            .map_err(|source| StateError::Parse { path: path.clone(), source })?;
        tracing::debug!(
            path = %path.display(),
            courses = state.courses.len(),
            sources = state.sources.len(),
            "Loaded state"
        );
        Ok(state)
    }

    pub fn save(&self, data_dir: &Path) -> Result<(), StateError> {
        let path = Self::path(data_dir);
        let json = serde_json::to_vec_pretty(self).map_err(StateError::Encode)?;
        atomic_write(&path, &json).map_err(|source| StateError::Write {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Saved state");
        Ok(())
    }

    #[must_use]
    pub fn source(&self, name: &str) -> Option<&serde_json::Value> {
        self.sources.get(name)
    }

    /// Replace a source's state. `None` forgets it.
    pub fn set_source(
        &mut self,
        name: &str,
        state: Option<serde_json::Value>,
    ) -> Result<(), StateError> {
        if name == COURSES_KEY {
            return Err(StateError::ReservedName(name.to_string()));
        }
        match state {
            Some(state) => self.sources.insert(name.to_string(), state),
            None => self.sources.remove(name),
        };
        Ok(())
    }

    #[must_use]
    pub fn courses(&self) -> &CourseStore {
        &self.courses
    }

    pub fn courses_mut(&mut self) -> &mut CourseStore {
        &mut self.courses
    }
}
