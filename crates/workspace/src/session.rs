use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::session_index::{SessionIndex, SessionIndexError};
use crate::util::{is_same_or_descendant, rebase_path};

/// Durable form of a workspace session, keyed by workspace root in the index.
/// 工作階段的持久化格式，以工作區根路徑為鍵。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSession {
    #[serde(default)]
    pub opened_files_paths: Vec<String>,
    #[serde(default)]
    pub selected_file_path: String,
}

/// Open tabs and selection of the active workspace.
/// 目前工作區的分頁與選取狀態。
///
/// A selected path that is not among the opened tabs is a *preview*: it is
/// shown in the editor but not pinned to the tab bar until opened again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStore {
    opened_files_paths: Vec<String>,
    selected_file_path: String,
    loaded: bool,
}

impl SessionStore {
    /// Builds a loaded session from its durable form.
    /// 由持久化資料建立已載入的工作階段。
    pub fn hydrate(saved: SavedSession) -> Self {
        let mut opened = Vec::with_capacity(saved.opened_files_paths.len());
        for path in saved.opened_files_paths {
            if !opened.contains(&path) {
                opened.push(path);
            }
        }
        Self {
            opened_files_paths: opened,
            selected_file_path: saved.selected_file_path,
            loaded: true,
        }
    }

    pub fn opened_files(&self) -> &[String] {
        &self.opened_files_paths
    }

    pub fn selected(&self) -> &str {
        &self.selected_file_path
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// The selected path when it is not pinned as a tab.
    /// 若選取的檔案尚未固定為分頁則回傳其路徑。
    pub fn preview(&self) -> Option<&str> {
        let selected = self.selected_file_path.as_str();
        if selected.is_empty() || self.is_pinned(selected) {
            None
        } else {
            Some(selected)
        }
    }

    pub fn is_pinned(&self, path: &str) -> bool {
        self.opened_files_paths.iter().any(|p| p == path)
    }

    /// Tree click: previews a new path, pins the one that is already selected.
    /// 點選檔案：不同檔案時預覽，已選取時固定為分頁。
    pub fn open_file(&mut self, path: &str) {
        if self.selected_file_path == path {
            self.pin(path);
        } else {
            self.select(path);
        }
    }

    pub fn select(&mut self, path: &str) {
        self.selected_file_path = path.to_string();
    }

    /// Appends `path` to the tabs if it is not there yet.
    /// 若尚未開啟則將路徑加入分頁（不重新排序）。
    pub fn pin(&mut self, path: &str) -> bool {
        if self.is_pinned(path) {
            return false;
        }
        self.opened_files_paths.push(path.to_string());
        true
    }

    /// Closes a tab; a closed selection falls back to the next tab, then the previous one.
    /// 關閉分頁；若關閉的是選取中的分頁，改選下一個，其次上一個，否則清空。
    pub fn close_tab(&mut self, path: &str) -> bool {
        if let Some(idx) = self.opened_files_paths.iter().position(|p| p == path) {
            let fallback = self
                .opened_files_paths
                .get(idx + 1)
                .or_else(|| idx.checked_sub(1).and_then(|i| self.opened_files_paths.get(i)))
                .cloned()
                .unwrap_or_default();
            self.opened_files_paths.remove(idx);
            if self.selected_file_path == path {
                self.selected_file_path = fallback;
            }
            return true;
        }
        if !path.is_empty() && self.selected_file_path == path {
            // Closing the preview.
            self.selected_file_path = self.opened_files_paths.last().cloned().unwrap_or_default();
            return true;
        }
        false
    }

    /// Rewrites tab and selection paths after `old` was renamed to `new`.
    /// 重新命名後改寫分頁與選取路徑。
    pub fn retarget(&mut self, old: &str, new: &str) {
        for path in &mut self.opened_files_paths {
            if let Some(rebased) = rebase_path(path, old, new) {
                *path = rebased;
            }
        }
        if let Some(rebased) = rebase_path(&self.selected_file_path, old, new) {
            self.selected_file_path = rebased;
        }
    }

    /// Drops every tab at or below a deleted path.
    /// 移除位於已刪除路徑（含）之下的所有分頁。
    pub fn forget(&mut self, removed: &str) {
        let gone = |path: &str| is_same_or_descendant(path, removed);
        if !self.selected_file_path.is_empty() && gone(&self.selected_file_path) {
            let fallback = match self
                .opened_files_paths
                .iter()
                .position(|p| *p == self.selected_file_path)
            {
                Some(idx) => self.opened_files_paths[idx + 1..]
                    .iter()
                    .find(|p| !gone(p))
                    .or_else(|| self.opened_files_paths[..idx].iter().rev().find(|p| !gone(p))),
                None => self.opened_files_paths.iter().rev().find(|p| !gone(p)),
            };
            self.selected_file_path = fallback.cloned().unwrap_or_default();
        }
        self.opened_files_paths.retain(|p| !gone(p));
    }

    pub fn snapshot(&self) -> SavedSession {
        SavedSession {
            opened_files_paths: self.opened_files_paths.clone(),
            selected_file_path: self.selected_file_path.clone(),
        }
    }

    /// Writes the session to the durable index under `workspace_path` and unloads it.
    /// 將工作階段寫入持久化索引，並標記為未載入。
    pub fn prepare_close(
        &mut self,
        workspace_path: &str,
        index: &dyn SessionIndex,
    ) -> Result<(), SessionIndexError> {
        debug!(
            workspace = workspace_path,
            tabs = self.opened_files_paths.len(),
            "flushing session"
        );
        index.save(workspace_path, &self.snapshot())?;
        self.loaded = false;
        Ok(())
    }
}
