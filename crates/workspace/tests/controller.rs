use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::tempdir;
use writeright_workspace::{
    Backend, BackendError, BackendOp, LocalBackend, Lookup, MemorySessionIndex, PathSetChange,
    SavedSession, SessionIndex, SyncConfig, TreeNode, WorkspaceController, WorkspaceError,
    WorkspaceState,
};

/// Backend double that records every call and fails the operations it is told to.
#[derive(Default)]
struct RecordingBackend {
    calls: Mutex<Vec<String>>,
    failing: Mutex<Vec<BackendOp>>,
    persisted_roots: Mutex<Vec<Vec<String>>>,
    writes: Mutex<Vec<(String, String)>>,
    stored_roots: Vec<String>,
}

impl RecordingBackend {
    fn with_roots(roots: &[&str]) -> Self {
        Self {
            stored_roots: roots.iter().map(|r| r.to_string()).collect(),
            ..Self::default()
        }
    }

    fn fail(&self, op: BackendOp) {
        self.failing.lock().unwrap().push(op);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn check(&self, op: BackendOp, path: &str) -> Result<(), BackendError> {
        self.calls.lock().unwrap().push(format!("{op}: {path}"));
        if self.failing.lock().unwrap().contains(&op) {
            return Err(BackendError::io(
                op,
                path,
                io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
            ));
        }
        Ok(())
    }
}

fn snapshot(root: &str) -> TreeNode {
    TreeNode::directory(
        "w",
        root,
        vec![
            TreeNode::directory(
                "d",
                format!("{root}/d"),
                vec![
                    TreeNode::file("a.md", format!("{root}/d/a.md")),
                    TreeNode::directory(
                        "sub",
                        format!("{root}/d/sub"),
                        vec![TreeNode::file("b.md", format!("{root}/d/sub/b.md"))],
                    ),
                ],
            ),
            TreeNode::file("top.md", format!("{root}/top.md")),
        ],
    )
}

#[async_trait]
impl Backend for RecordingBackend {
    async fn load_workspace_roots(&self) -> Result<Vec<String>, BackendError> {
        self.check(BackendOp::LoadRoots, "")?;
        Ok(self.stored_roots.clone())
    }

    async fn persist_workspace_roots(&self, roots: Vec<String>) -> Result<(), BackendError> {
        self.check(BackendOp::PersistRoots, "")?;
        self.persisted_roots.lock().unwrap().push(roots);
        Ok(())
    }

    async fn enumerate_tree(&self, root_path: &str) -> Result<TreeNode, BackendError> {
        self.check(BackendOp::EnumerateTree, root_path)?;
        Ok(snapshot(root_path))
    }

    async fn create_file(&self, parent_dir: &str, name: &str) -> Result<(), BackendError> {
        self.check(BackendOp::CreateFile, &format!("{parent_dir}/{name}"))
    }

    async fn create_directory(&self, parent_dir: &str, name: &str) -> Result<(), BackendError> {
        self.check(BackendOp::CreateDirectory, &format!("{parent_dir}/{name}"))
    }

    async fn delete_file(&self, path: &str) -> Result<(), BackendError> {
        self.check(BackendOp::DeleteFile, path)
    }

    async fn delete_directory(&self, path: &str) -> Result<(), BackendError> {
        self.check(BackendOp::DeleteDirectory, path)
    }

    async fn rename_file(&self, old_path: &str, _new_name: &str) -> Result<(), BackendError> {
        self.check(BackendOp::RenameFile, old_path)
    }

    async fn rename_directory(&self, old_path: &str, _new_name: &str) -> Result<(), BackendError> {
        self.check(BackendOp::RenameDirectory, old_path)
    }

    async fn read_file_contents(&self, path: &str) -> Result<String, BackendError> {
        self.check(BackendOp::ReadFile, path)?;
        Ok(format!("contents of {path}"))
    }

    async fn write_file_contents(&self, path: &str, content: &str) -> Result<(), BackendError> {
        self.check(BackendOp::WriteFile, path)?;
        self.writes
            .lock()
            .unwrap()
            .push((path.to_string(), content.to_string()));
        Ok(())
    }
}

struct Harness {
    backend: Arc<RecordingBackend>,
    sessions: Arc<MemorySessionIndex>,
    controller: WorkspaceController<RecordingBackend>,
}

fn harness(backend: RecordingBackend) -> Harness {
    let backend = Arc::new(backend);
    let sessions = Arc::new(MemorySessionIndex::default());
    let controller = WorkspaceController::new(
        Arc::clone(&backend),
        Box::new(Arc::clone(&sessions)),
        SyncConfig::default(),
    );
    Harness {
        backend,
        sessions,
        controller,
    }
}

async fn loaded(root: &str) -> Harness {
    let mut h = harness(RecordingBackend::default());
    h.controller.open_workspace(root).await.unwrap();
    h
}

#[tokio::test]
async fn open_hydrates_session_and_tree() {
    let mut h = harness(RecordingBackend::default());
    h.sessions
        .save(
            "/w",
            &SavedSession {
                opened_files_paths: vec!["/w/top.md".into()],
                selected_file_path: "/w/d/a.md".into(),
            },
        )
        .unwrap();

    assert_eq!(h.controller.state(), WorkspaceState::Unloaded);
    h.controller.open_workspace("/w").await.unwrap();
    assert_eq!(h.controller.state(), WorkspaceState::Loaded);

    let active = h.controller.active().unwrap();
    assert_eq!(active.root(), "/w");
    assert!(active.tree().contains("/w/d/sub/b.md"));
    assert_eq!(active.session().opened_files(), ["/w/top.md"]);
    assert_eq!(active.session().preview(), Some("/w/d/a.md"));
}

#[tokio::test]
async fn failed_enumeration_returns_to_unloaded_with_notice() {
    let backend = RecordingBackend::default();
    backend.fail(BackendOp::EnumerateTree);
    let mut h = harness(backend);

    let err = h.controller.open_workspace("/w").await.unwrap_err();
    assert!(matches!(err, WorkspaceError::Backend(_)));
    assert_eq!(h.controller.state(), WorkspaceState::Unloaded);
    let notices = h.controller.take_notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].message.contains("read folder hierarchy"));
}

#[tokio::test]
async fn intents_require_a_loaded_workspace() {
    let mut h = harness(RecordingBackend::default());
    let err = h.controller.create_file("/w", "x.md").await.unwrap_err();
    assert!(matches!(err, WorkspaceError::NotLoaded));
    assert!(matches!(
        h.controller.delete_entry("/w/top.md").await,
        Err(WorkspaceError::NotLoaded)
    ));
    assert!(matches!(
        h.controller.open_file("/w/top.md"),
        Err(WorkspaceError::NotLoaded)
    ));
    assert!(h.backend.calls().is_empty());
}

#[tokio::test]
async fn create_applies_to_cache_after_backend_success() {
    let mut h = loaded("/w").await;
    let outcome = h.controller.create_file("/w/d", " new.md ").await.unwrap();
    assert_eq!(outcome, Lookup::Found);
    let outcome = h.controller.create_directory("/w", "drafts").await.unwrap();
    assert_eq!(outcome, Lookup::Found);

    let tree = h.controller.active().unwrap().tree();
    let created = tree.find("/w/d/new.md").unwrap();
    assert!(!created.is_dir);
    assert!(tree.find("/w/drafts").unwrap().is_dir);
    assert!(h.backend.calls().contains(&"create file: /w/d/new.md".to_string()));
}

#[tokio::test]
async fn failed_create_leaves_cache_untouched() {
    let mut h = loaded("/w").await;
    h.backend.fail(BackendOp::CreateFile);
    let before = h.controller.active().unwrap().tree().clone();

    let err = h.controller.create_file("/w", "x.md").await.unwrap_err();
    assert!(matches!(err, WorkspaceError::Backend(_)));
    assert_eq!(h.controller.active().unwrap().tree(), &before);
    assert_eq!(h.controller.take_notices().len(), 1);
    assert!(h.controller.take_notices().is_empty());
}

#[tokio::test]
async fn invalid_names_never_reach_the_backend() {
    let mut h = loaded("/w").await;
    let calls = h.backend.calls().len();
    assert!(matches!(
        h.controller.create_file("/w", "a/b").await,
        Err(WorkspaceError::InvalidName { .. })
    ));
    assert!(matches!(
        h.controller.rename_entry("/w/top.md", "  ").await,
        Err(WorkspaceError::InvalidName { .. })
    ));
    assert_eq!(h.backend.calls().len(), calls);
}

#[tokio::test]
async fn rename_directory_moves_descendants_and_tabs() {
    let mut h = loaded("/w").await;
    h.controller.open_file("/w/d/sub/b.md").unwrap();
    h.controller.open_file("/w/d/sub/b.md").unwrap();
    h.controller.pin_file("/w/top.md").unwrap();

    let outcome = h.controller.rename_entry("/w/d", "docs").await.unwrap();
    assert_eq!(outcome, Lookup::Found);

    let active = h.controller.active().unwrap();
    assert!(active.tree().contains("/w/docs/sub/b.md"));
    assert!(!active.tree().contains("/w/d/a.md"));
    assert_eq!(
        active.session().opened_files(),
        ["/w/docs/sub/b.md", "/w/top.md"]
    );
    assert_eq!(active.session().selected(), "/w/docs/sub/b.md");
    assert!(h.backend.calls().contains(&"rename folder: /w/d".to_string()));
}

#[tokio::test]
async fn rename_to_same_name_skips_backend() {
    let mut h = loaded("/w").await;
    let calls = h.backend.calls().len();
    let outcome = h.controller.rename_entry("/w/top.md", "top.md").await.unwrap();
    assert_eq!(outcome, Lookup::Found);
    assert_eq!(h.backend.calls().len(), calls);
}

#[tokio::test]
async fn failed_rename_keeps_old_paths() {
    let mut h = loaded("/w").await;
    h.backend.fail(BackendOp::RenameFile);
    assert!(h.controller.rename_entry("/w/top.md", "x.md").await.is_err());
    assert!(h.controller.active().unwrap().tree().contains("/w/top.md"));
}

#[tokio::test]
async fn delete_removes_subtree_and_repeat_is_a_no_op() {
    let mut h = loaded("/w").await;
    h.controller.open_file("/w/d/a.md").unwrap();
    h.controller.open_file("/w/d/a.md").unwrap();
    h.controller.pin_file("/w/top.md").unwrap();

    assert_eq!(h.controller.delete_entry("/w/d").await.unwrap(), Lookup::Found);
    let active = h.controller.active().unwrap();
    assert!(!active.tree().contains("/w/d/sub/b.md"));
    assert_eq!(active.session().opened_files(), ["/w/top.md"]);
    assert_eq!(active.session().selected(), "/w/top.md");

    let calls = h.backend.calls().len();
    assert_eq!(h.controller.delete_entry("/w/d").await.unwrap(), Lookup::NotFound);
    assert_eq!(h.backend.calls().len(), calls);
}

#[tokio::test]
async fn root_is_never_deleted() {
    let mut h = loaded("/w").await;
    assert_eq!(h.controller.delete_entry("/w").await.unwrap(), Lookup::NotFound);
    assert!(h.controller.active().unwrap().tree().contains("/w"));
}

#[tokio::test]
async fn close_flushes_session_and_reopen_restores_it() {
    let mut h = loaded("/w").await;
    h.controller.open_file("/w/top.md").unwrap();
    h.controller.open_file("/w/top.md").unwrap();
    h.controller.open_file("/w/d/a.md").unwrap();
    h.controller.close_workspace().unwrap();
    assert_eq!(h.controller.state(), WorkspaceState::Unloaded);
    assert!(h.controller.active().is_none());

    let saved = h.sessions.load("/w").unwrap().unwrap();
    assert_eq!(saved.opened_files_paths, vec!["/w/top.md"]);
    assert_eq!(saved.selected_file_path, "/w/d/a.md");

    h.controller.open_workspace("/w").await.unwrap();
    let session = h.controller.active().unwrap().session();
    assert_eq!(session.opened_files(), ["/w/top.md"]);
    assert_eq!(session.selected(), "/w/d/a.md");
}

#[tokio::test]
async fn opening_another_workspace_flushes_the_first() {
    let mut h = loaded("/w").await;
    h.controller.open_file("/w/top.md").unwrap();
    h.controller.open_workspace("/v").await.unwrap();
    assert_eq!(h.controller.active().unwrap().root(), "/v");
    assert_eq!(
        h.sessions.load("/w").unwrap().unwrap().selected_file_path,
        "/w/top.md"
    );
    assert!(h.controller.active().unwrap().session().selected().is_empty());
}

#[tokio::test]
async fn read_file_goes_through_backend() {
    let mut h = loaded("/w").await;
    let text = h.controller.read_file("/w/top.md").await.unwrap();
    assert_eq!(text, "contents of /w/top.md");
}

#[tokio::test(start_paused = true)]
async fn root_changes_persist_once_after_quiet_interval() {
    let mut h = harness(RecordingBackend::with_roots(&["/notes"]));

    // Changes before the list is loaded are never written back.
    h.controller.add_root("/early");
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(h.backend.persisted_roots.lock().unwrap().is_empty());

    h.controller.load_roots().await.unwrap();
    assert_eq!(h.controller.roots().to_vec(), vec!["/notes"]);

    assert_eq!(h.controller.add_root("/a/b"), PathSetChange::Appended);
    h.controller.add_root("/c");
    h.controller.add_root("/a");
    assert!(h.controller.remove_root("/c"));
    assert_eq!(h.controller.add_root("/a"), PathSetChange::Unchanged);
    assert!(!h.controller.remove_root("/missing"));

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(h.backend.persisted_roots.lock().unwrap().is_empty());
    tokio::time::sleep(Duration::from_millis(200)).await;

    let persisted = h.backend.persisted_roots.lock().unwrap().clone();
    assert_eq!(persisted, vec![vec!["/notes".to_string(), "/a".to_string()]]);
}

#[tokio::test(start_paused = true)]
async fn content_edits_coalesce_into_one_write() {
    let mut h = loaded("/w").await;
    for i in 0..5 {
        h.controller
            .update_content("/w/top.md", format!("draft {i}"))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    tokio::time::sleep(Duration::from_millis(300)).await;
    let writes = h.backend.writes.lock().unwrap().clone();
    assert_eq!(
        writes,
        vec![("/w/top.md".to_string(), "draft 4".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn closing_inside_debounce_window_drops_the_edit() {
    let mut h = loaded("/w").await;
    h.controller.update_content("/w/top.md", "unsaved").unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.controller.close_workspace().unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(h.backend.writes.lock().unwrap().is_empty());
    assert!(h.sessions.load("/w").unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn settle_flushes_pending_content_before_close() {
    let mut h = loaded("/w").await;
    h.controller.update_content("/w/top.md", "kept").unwrap();
    assert_eq!(h.controller.pending_writes(), 1);
    h.controller.settle().await;
    h.controller.close_workspace().unwrap();
    assert_eq!(h.backend.writes.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn deleting_an_entry_discards_its_pending_saves() {
    let mut h = loaded("/w").await;
    h.controller.update_content("/w/d/a.md", "edited").unwrap();
    h.controller.update_content("/w/d/sub/b.md", "edited").unwrap();
    h.controller.update_content("/w/top.md", "kept").unwrap();

    assert_eq!(h.controller.delete_entry("/w/d").await.unwrap(), Lookup::Found);
    tokio::time::sleep(Duration::from_secs(1)).await;

    let writes = h.backend.writes.lock().unwrap().clone();
    assert_eq!(writes, vec![("/w/top.md".to_string(), "kept".to_string())]);
}

#[tokio::test(start_paused = true)]
async fn failed_delete_keeps_pending_saves() {
    let mut h = loaded("/w").await;
    h.backend.fail(BackendOp::DeleteFile);
    h.controller.update_content("/w/top.md", "kept").unwrap();
    assert!(h.controller.delete_entry("/w/top.md").await.is_err());
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.backend.writes.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn renaming_writes_pending_edits_before_the_move() {
    let mut h = loaded("/w").await;
    h.controller.update_content("/w/d/a.md", "edited").unwrap();
    assert!(h.controller.rename_entry("/w/d", "docs").await.unwrap().is_found());
    tokio::time::sleep(Duration::from_secs(1)).await;

    let writes = h.backend.writes.lock().unwrap().clone();
    assert_eq!(writes, vec![("/w/d/a.md".to_string(), "edited".to_string())]);
    let calls = h.backend.calls();
    let saved = calls.iter().position(|c| c == "save file: /w/d/a.md").unwrap();
    let renamed = calls.iter().position(|c| c == "rename folder: /w/d").unwrap();
    assert!(saved < renamed, "{calls:?}");
    assert_eq!(h.controller.pending_writes(), 0);
}

#[tokio::test]
async fn local_disk_stays_in_step_with_cache_after_delete_and_rename() {
    let dir = tempdir().unwrap();
    let root_dir = dir.path().join("w");
    std::fs::create_dir_all(&root_dir).unwrap();
    std::fs::write(root_dir.join("a.md"), "old").unwrap();
    std::fs::write(root_dir.join("gone.md"), "old").unwrap();
    let root = root_dir.display().to_string();

    let sync = SyncConfig {
        content_save_delay_ms: 100,
        workspace_list_delay_ms: 100,
    };
    let mut controller = WorkspaceController::new(
        Arc::new(LocalBackend::new(dir.path())),
        Box::new(MemorySessionIndex::default()),
        sync,
    );
    controller.open_workspace(&root).await.unwrap();

    let gone = format!("{root}/gone.md");
    controller.update_content(&gone, "edited").unwrap();
    controller.delete_entry(&gone).await.unwrap();

    let a = format!("{root}/a.md");
    controller.update_content(&a, "edited").unwrap();
    assert!(controller.rename_entry(&a, "b.md").await.unwrap().is_found());

    tokio::time::sleep(Duration::from_millis(400)).await;
    let cache = controller.active().unwrap().tree();
    assert!(!cache.contains(&gone));
    assert!(!root_dir.join("gone.md").exists());
    assert!(!root_dir.join("a.md").exists());
    assert_eq!(std::fs::read_to_string(root_dir.join("b.md")).unwrap(), "edited");
}
