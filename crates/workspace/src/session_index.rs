use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::session::SavedSession;
use crate::util::write_atomic;

/// File name of the JSON session index inside the data directory.
pub const SESSION_INDEX_FILE: &str = "workspaces_info.json";

/// Errors raised by durable session storage.
/// 工作階段持久化相關的錯誤。
#[derive(Debug, Error)]
pub enum SessionIndexError {
    #[error("session index IO error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid session index payload: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Durable key-value store for sessions, keyed by workspace root path.
/// 以工作區根路徑為鍵的工作階段儲存介面。
pub trait SessionIndex: Send + Sync {
    fn load(&self, workspace_path: &str) -> Result<Option<SavedSession>, SessionIndexError>;
    fn save(&self, workspace_path: &str, session: &SavedSession) -> Result<(), SessionIndexError>;
}

impl<T: SessionIndex + ?Sized> SessionIndex for Arc<T> {
    fn load(&self, workspace_path: &str) -> Result<Option<SavedSession>, SessionIndexError> {
        (**self).load(workspace_path)
    }

    fn save(&self, workspace_path: &str, session: &SavedSession) -> Result<(), SessionIndexError> {
        (**self).save(workspace_path, session)
    }
}

type SessionMap = BTreeMap<String, SavedSession>;

/// Stores every workspace session in one JSON object on disk.
/// 將所有工作區的工作階段存放於單一 JSON 檔案。
#[derive(Debug)]
pub struct JsonSessionIndex {
    path: PathBuf,
}

impl JsonSessionIndex {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Index stored under `data_dir` with the default file name.
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::new(data_dir.as_ref().join(SESSION_INDEX_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_map(&self) -> Result<SessionMap, SessionIndexError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(SessionMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(SessionMap::new()),
            Err(err) => Err(SessionIndexError::Io(err)),
        }
    }
}

impl SessionIndex for JsonSessionIndex {
    fn load(&self, workspace_path: &str) -> Result<Option<SavedSession>, SessionIndexError> {
        Ok(self.load_map()?.remove(workspace_path))
    }

    fn save(&self, workspace_path: &str, session: &SavedSession) -> Result<(), SessionIndexError> {
        let mut map = self.load_map()?;
        map.insert(workspace_path.to_string(), session.clone());
        let json = serde_json::to_vec_pretty(&map)?;
        write_atomic(&self.path, &json)?;
        Ok(())
    }
}

/// In-process session index.
#[derive(Debug, Default)]
pub struct MemorySessionIndex {
    entries: Mutex<SessionMap>,
}

impl SessionIndex for MemorySessionIndex {
    fn load(&self, workspace_path: &str) -> Result<Option<SavedSession>, SessionIndexError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(workspace_path).cloned())
    }

    fn save(&self, workspace_path: &str, session: &SavedSession) -> Result<(), SessionIndexError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(workspace_path.to_string(), session.clone());
        Ok(())
    }
}
