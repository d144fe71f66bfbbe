use std::path::{Component, Path};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::{Backend, BackendError};
use crate::config::SyncConfig;
use crate::path_set::{PathSet, PathSetChange};
use crate::scheduler::{SyncScheduler, SyncStream};
use crate::session::{SavedSession, SessionStore};
use crate::session_index::{SessionIndex, SessionIndexError};
use crate::tree::{Lookup, TreeCache, TreeNode};
use crate::util::{is_separator, join_path, parent_prefix};

/// Errors surfaced by [`WorkspaceController`].
/// [`WorkspaceController`] 可能回傳的錯誤。
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("no workspace is loaded")]
    NotLoaded,
    #[error("invalid name `{name}`: {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Session(#[from] SessionIndexError),
}

/// User-facing message queued when a backend operation fails.
/// 後端操作失敗時提供給使用者的提示。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
}

/// Lifecycle of the current workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceState {
    Unloaded,
    Loading,
    Loaded,
}

/// Tree and session of the one workspace materialised in memory.
/// 目前唯一載入於記憶體中的工作區（目錄樹與工作階段）。
#[derive(Debug)]
pub struct ActiveWorkspace {
    root: String,
    tree: TreeCache,
    session: SessionStore,
}

impl ActiveWorkspace {
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn tree(&self) -> &TreeCache {
        &self.tree
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }
}

#[derive(Debug)]
enum Phase {
    Unloaded,
    Loading,
    Loaded(ActiveWorkspace),
}

/// Routes user intents through the backend and into the local caches.
/// 將使用者操作先交由後端執行，成功後再更新本地快取。
///
/// Structural changes are applied to the tree only after the backend call
/// succeeded; a failure queues a [`Notice`] and leaves every cache untouched.
pub struct WorkspaceController<B: Backend + 'static> {
    backend: Arc<B>,
    sessions: Box<dyn SessionIndex>,
    sync: SyncConfig,
    scheduler: SyncScheduler,
    roots: PathSet,
    roots_loaded: bool,
    phase: Phase,
    notices: Vec<Notice>,
}

impl<B: Backend + 'static> WorkspaceController<B> {
    pub fn new(backend: Arc<B>, sessions: Box<dyn SessionIndex>, sync: SyncConfig) -> Self {
        Self {
            backend,
            sessions,
            sync,
            scheduler: SyncScheduler::new(),
            roots: PathSet::new(),
            roots_loaded: false,
            phase: Phase::Unloaded,
            notices: Vec::new(),
        }
    }

    pub fn state(&self) -> WorkspaceState {
        match self.phase {
            Phase::Unloaded => WorkspaceState::Unloaded,
            Phase::Loading => WorkspaceState::Loading,
            Phase::Loaded(_) => WorkspaceState::Loaded,
        }
    }

    pub fn roots(&self) -> &PathSet {
        &self.roots
    }

    pub fn active(&self) -> Option<&ActiveWorkspace> {
        match &self.phase {
            Phase::Loaded(active) => Some(active),
            _ => None,
        }
    }

    /// Drains queued failure notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Number of debounced writes that have not completed.
    pub fn pending_writes(&self) -> usize {
        self.scheduler.pending()
    }

    // ----- workspace roots -------------------------------------------------

    /// Hydrates the root list from the backend.
    /// 從後端載入工作區根路徑清單。
    pub async fn load_roots(&mut self) -> Result<(), WorkspaceError> {
        let persisted = match self.backend.load_workspace_roots().await {
            Ok(persisted) => persisted,
            Err(err) => return Err(self.fail(err)),
        };
        self.roots = PathSet::from_persisted(persisted);
        self.roots_loaded = true;
        info!(count = self.roots.len(), "workspaces loaded");
        Ok(())
    }

    pub fn add_root(&mut self, path: &str) -> PathSetChange {
        let change = self.roots.add(path);
        match &change {
            PathSetChange::Unchanged => debug!(path, "workspace already tracked"),
            PathSetChange::Replaced { previous } => {
                info!(path, previous = %previous, "workspace narrowed")
            }
            PathSetChange::Absorbed { removed } => {
                info!(path, absorbed = removed.len(), "workspace absorbed nested roots")
            }
            PathSetChange::Appended => info!(path, "workspace added"),
        }
        if change.is_changed() {
            self.schedule_roots_persist();
        }
        change
    }

    pub fn remove_root(&mut self, path: &str) -> bool {
        let removed = self.roots.remove(path);
        if removed {
            info!(path, "workspace removed");
            self.schedule_roots_persist();
        }
        removed
    }

    fn schedule_roots_persist(&mut self) {
        // Nothing to reconcile until the persisted list has been read.
        if !self.roots_loaded {
            return;
        }
        let backend = Arc::clone(&self.backend);
        let snapshot = self.roots.to_vec();
        self.scheduler.schedule(
            SyncStream::WorkspaceList,
            self.sync.workspace_list_delay(),
            async move {
                if let Err(err) = backend.persist_workspace_roots(snapshot).await {
                    warn!(error = %err, "failed to save workspaces");
                }
            },
        );
    }

    // ----- lifecycle -------------------------------------------------------

    /// Loads the session and a fresh tree for `root`, closing any open workspace first.
    /// 載入指定工作區的工作階段與目錄樹；若已有開啟的工作區則先關閉。
    pub async fn open_workspace(&mut self, root: &str) -> Result<(), WorkspaceError> {
        self.close_workspace()?;
        self.phase = Phase::Loading;
        debug!(root, "loading workspace");

        let saved = match self.sessions.load(root) {
            Ok(saved) => saved.unwrap_or_default(),
            Err(err) => {
                warn!(root, error = %err, "unreadable session, starting empty");
                SavedSession::default()
            }
        };
        let snapshot = match self.backend.enumerate_tree(root).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.phase = Phase::Unloaded;
                return Err(self.fail(err));
            }
        };

        self.phase = Phase::Loaded(ActiveWorkspace {
            root: root.to_string(),
            tree: TreeCache::new(snapshot),
            session: SessionStore::hydrate(saved),
        });
        info!(root, "workspace loaded");
        Ok(())
    }

    /// Flushes the session and discards the tree.
    /// 儲存工作階段並釋放目錄樹。
    ///
    /// Content edits still inside their debounce window are dropped, not flushed.
    pub fn close_workspace(&mut self) -> Result<(), WorkspaceError> {
        let Phase::Loaded(mut active) = std::mem::replace(&mut self.phase, Phase::Unloaded) else {
            return Ok(());
        };
        let dropped = self.scheduler.cancel_content();
        if dropped > 0 {
            debug!(root = %active.root, dropped, "pending content saves discarded on close");
        }
        active
            .session
            .prepare_close(&active.root, self.sessions.as_ref())?;
        info!(root = %active.root, "workspace closed");
        Ok(())
    }

    // ----- structural intents ----------------------------------------------

    pub async fn create_file(
        &mut self,
        parent_dir: &str,
        name: &str,
    ) -> Result<Lookup, WorkspaceError> {
        self.create_entry(parent_dir, name, false).await
    }

    pub async fn create_directory(
        &mut self,
        parent_dir: &str,
        name: &str,
    ) -> Result<Lookup, WorkspaceError> {
        self.create_entry(parent_dir, name, true).await
    }

    async fn create_entry(
        &mut self,
        parent_dir: &str,
        name: &str,
        is_dir: bool,
    ) -> Result<Lookup, WorkspaceError> {
        let name = validate_name(name)?;
        self.loaded_mut()?;

        let result = if is_dir {
            self.backend.create_directory(parent_dir, name).await
        } else {
            self.backend.create_file(parent_dir, name).await
        };
        if let Err(err) = result {
            return Err(self.fail(err));
        }

        let path = join_path(parent_dir, name);
        let node = if is_dir {
            TreeNode::directory(name, path.clone(), Vec::new())
        } else {
            TreeNode::file(name, path.clone())
        };
        let lookup = self.loaded_mut()?.tree.insert(parent_dir, node);
        if !lookup.is_found() {
            debug!(parent = parent_dir, path = %path, "created entry has no cached parent");
        }
        Ok(lookup)
    }

    /// Deletes a cached entry on the backend, then from the tree and the tabs.
    /// 刪除項目：先呼叫後端，成功後更新目錄樹與分頁。
    ///
    /// Paths that are not in the cache (or the root itself) are left alone.
    /// Content saves still pending underneath the deleted path are discarded.
    pub async fn delete_entry(&mut self, path: &str) -> Result<Lookup, WorkspaceError> {
        let Some(is_dir) = self.cached_kind(path)? else {
            debug!(path, "delete target not in cache");
            return Ok(Lookup::NotFound);
        };
        let result = if is_dir {
            self.backend.delete_directory(path).await
        } else {
            self.backend.delete_file(path).await
        };
        if let Err(err) = result {
            return Err(self.fail(err));
        }

        let dropped = self.scheduler.cancel_under(path);
        if dropped > 0 {
            debug!(path, dropped, "pending content saves discarded with deleted entry");
        }
        let active = self.loaded_mut()?;
        let lookup = active.tree.delete(path);
        active.session.forget(path);
        Ok(lookup)
    }

    /// Renames a cached entry; descendants and open tabs follow the new path.
    /// 重新命名項目；子孫節點與已開啟的分頁會一併更新路徑。
    ///
    /// Content saves pending for the entry or anything below it are written first.
    pub async fn rename_entry(
        &mut self,
        old_path: &str,
        new_name: &str,
    ) -> Result<Lookup, WorkspaceError> {
        let new_name = validate_name(new_name)?;
        let Some(is_dir) = self.cached_kind(old_path)? else {
            debug!(path = old_path, "rename target not in cache");
            return Ok(Lookup::NotFound);
        };
        let new_path = format!("{}{}", parent_prefix(old_path), new_name);
        if new_path == old_path {
            return Ok(Lookup::Found);
        }

        // Unsaved edits go to the entry before it moves, never to the stale path afterwards.
        let flushed = self.scheduler.flush_under(old_path).await;
        if flushed > 0 {
            debug!(path = old_path, flushed, "pending content saves flushed before rename");
        }
        let result = if is_dir {
            self.backend.rename_directory(old_path, new_name).await
        } else {
            self.backend.rename_file(old_path, new_name).await
        };
        if let Err(err) = result {
            return Err(self.fail(err));
        }

        let active = self.loaded_mut()?;
        let lookup = active.tree.rename(old_path, new_name);
        active.session.retarget(old_path, &new_path);
        Ok(lookup)
    }

    /// Kind of a non-root cached entry: `Some(true)` for directories.
    fn cached_kind(&mut self, path: &str) -> Result<Option<bool>, WorkspaceError> {
        let active = self.loaded_mut()?;
        if path == active.root {
            return Ok(None);
        }
        Ok(active.tree.find(path).map(|node| node.is_dir))
    }

    // ----- tabs and content ------------------------------------------------

    pub fn open_file(&mut self, path: &str) -> Result<(), WorkspaceError> {
        self.loaded_mut()?.session.open_file(path);
        Ok(())
    }

    pub fn pin_file(&mut self, path: &str) -> Result<(), WorkspaceError> {
        self.loaded_mut()?.session.pin(path);
        Ok(())
    }

    pub fn close_tab(&mut self, path: &str) -> Result<bool, WorkspaceError> {
        Ok(self.loaded_mut()?.session.close_tab(path))
    }

    pub async fn read_file(&mut self, path: &str) -> Result<String, WorkspaceError> {
        self.loaded_mut()?;
        match self.backend.read_file_contents(path).await {
            Ok(text) => Ok(text),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Schedules a debounced save of the editor buffer for `path`.
    /// 排程延遲儲存指定檔案的編輯內容。
    pub fn update_content(
        &mut self,
        path: &str,
        text: impl Into<String>,
    ) -> Result<(), WorkspaceError> {
        self.loaded_mut()?;
        let backend = Arc::clone(&self.backend);
        let target = path.to_string();
        let text = text.into();
        self.scheduler.schedule(
            SyncStream::Content(path.to_string()),
            self.sync.content_save_delay(),
            async move {
                if let Err(err) = backend.write_file_contents(&target, &text).await {
                    warn!(path = %target, error = %err, "failed to save file");
                }
            },
        );
        Ok(())
    }

    /// Waits until every debounced write has fired.
    pub async fn settle(&mut self) {
        self.scheduler.settle().await;
    }

    fn loaded_mut(&mut self) -> Result<&mut ActiveWorkspace, WorkspaceError> {
        match &mut self.phase {
            Phase::Loaded(active) => Ok(active),
            _ => Err(WorkspaceError::NotLoaded),
        }
    }

    fn fail(&mut self, err: BackendError) -> WorkspaceError {
        warn!(error = %err, "backend operation failed");
        self.notices.push(Notice {
            message: err.to_string(),
        });
        WorkspaceError::Backend(err)
    }
}

/// Accepts a single, non-empty path component.
fn validate_name(value: &str) -> Result<&str, WorkspaceError> {
    let trimmed = value.trim();
    let invalid = |reason| WorkspaceError::InvalidName {
        name: value.to_string(),
        reason,
    };
    if trimmed.is_empty() {
        return Err(invalid("name cannot be empty"));
    }
    let mut components = Path::new(trimmed).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !trimmed.contains(is_separator) => Ok(trimmed),
        _ => Err(invalid("name must be a single path component")),
    }
}
