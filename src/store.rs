use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::adaptive::types::StudentState;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("stored state corrupt for {student_id}: {reason}")]
    Corrupt { student_id: String, reason: String },
    #[error("invalid student id: {0:?}")]
    InvalidStudentId(String),
}

/// Where student states live between updates. Implementations must be safe to
/// share across threads; serialising writes for one student is the caller's
/// job (see `TutorService`).
pub trait StudentStateRepository: Send + Sync {
    fn load(&self, student_id: &str) -> Result<Option<StudentState>, StoreError>;

    fn save(&self, student_id: &str, state: &StudentState) -> Result<(), StoreError>;

    fn load_or_default(&self, student_id: &str) -> Result<StudentState, StoreError> {
        Ok(self.load(student_id)?.unwrap_or_default())
    }
}

impl<R: StudentStateRepository + ?Sized> StudentStateRepository for Arc<R> {
    fn load(&self, student_id: &str) -> Result<Option<StudentState>, StoreError> {
        (**self).load(student_id)
    }

    fn save(&self, student_id: &str, state: &StudentState) -> Result<(), StoreError> {
        (**self).save(student_id, state)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStudentStore {
    states: RwLock<HashMap<String, StudentState>>,
}

impl InMemoryStudentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_states<I>(states: I) -> Self
    where
        I: IntoIterator<Item = (String, StudentState)>,
    {
        Self {
            states: RwLock::new(states.into_iter().collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }

    pub fn student_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.states.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl StudentStateRepository for InMemoryStudentStore {
    fn load(&self, student_id: &str) -> Result<Option<StudentState>, StoreError> {
        Ok(self.states.read().get(student_id).cloned())
    }

    fn save(&self, student_id: &str, state: &StudentState) -> Result<(), StoreError> {
        self.states
            .write()
            .insert(student_id.to_string(), state.clone());
        Ok(())
    }
}

/// One pretty-printed JSON document per student under `dir`. Writes go to a
/// temporary file first and are renamed into place.
#[derive(Debug, Clone)]
pub struct JsonFileStudentStore {
    dir: PathBuf,
}

impl JsonFileStudentStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, student_id: &str) -> Result<PathBuf, StoreError> {
        let valid = !student_id.is_empty()
            && student_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidStudentId(student_id.to_string()));
        }
        Ok(self.dir.join(format!("{student_id}.json")))
    }
}

impl StudentStateRepository for JsonFileStudentStore {
    fn load(&self, student_id: &str) -> Result<Option<StudentState>, StoreError> {
        let path = self.path_for(student_id)?;
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Unavailable(format!("{}: {e}", path.display()))),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                student_id: student_id.to_string(),
                reason: e.to_string(),
            })
    }

    fn save(&self, student_id: &str, state: &StudentState) -> Result<(), StoreError> {
        let path = self.path_for(student_id)?;
        let json = serde_json::to_string_pretty(state).map_err(|e| StoreError::Corrupt {
            student_id: student_id.to_string(),
            reason: e.to_string(),
        })?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .and_then(|()| std::fs::rename(&tmp, &path))
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.display())))
    }
}
