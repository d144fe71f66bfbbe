use std::cmp::Ordering;
use std::fs;
use std::io;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::backend::{Backend, BackendError, BackendOp};
use crate::tree::TreeNode;
use crate::util::{join_path, parent_prefix, write_atomic};

/// File name of the workspace roots list inside the data directory.
pub const ROOTS_FILE: &str = "workspaces.json";

/// Backend operating directly on the local filesystem.
/// 直接操作本機檔案系統的後端實作。
#[derive(Debug, Clone)]
pub struct LocalBackend {
    roots_file: PathBuf,
}

impl LocalBackend {
    /// Creates a backend that keeps its workspace list under `data_dir`.
    /// 建立後端，工作區清單存放於 `data_dir`。
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            roots_file: data_dir.as_ref().join(ROOTS_FILE),
        }
    }

    pub fn roots_file(&self) -> &Path {
        &self.roots_file
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn load_workspace_roots(&self) -> Result<Vec<String>, BackendError> {
        let file = self.roots_file.display().to_string();
        match tokio::fs::read_to_string(&self.roots_file).await {
            Ok(raw) => {
                let roots = serde_json::from_str(&raw).map_err(|source| BackendError::Decode {
                    path: file.clone(),
                    source,
                })?;
                debug!(file = %self.roots_file.display(), "loaded workspaces");
                Ok(roots)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(BackendError::io(BackendOp::LoadRoots, file, err)),
        }
    }

    async fn persist_workspace_roots(&self, roots: Vec<String>) -> Result<(), BackendError> {
        let file = self.roots_file.display().to_string();
        let json = serde_json::to_vec_pretty(&roots).map_err(|source| BackendError::Decode {
            path: file.clone(),
            source,
        })?;
        let path = self.roots_file.clone();
        blocking(move || write_atomic(&path, &json))
            .await
            .map_err(|err| BackendError::io(BackendOp::PersistRoots, file, err))?;
        debug!(file = %self.roots_file.display(), count = roots.len(), "saved workspaces");
        Ok(())
    }

    async fn enumerate_tree(&self, root_path: &str) -> Result<TreeNode, BackendError> {
        let root = PathBuf::from(root_path);
        blocking(move || build_tree(&root))
            .await
            .map_err(|err| BackendError::io(BackendOp::EnumerateTree, root_path, err))
    }

    async fn create_file(&self, parent_dir: &str, name: &str) -> Result<(), BackendError> {
        let path = join_path(parent_dir, name);
        tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map(|_| ())
            .map_err(|err| BackendError::io(BackendOp::CreateFile, path, err))
    }

    async fn create_directory(&self, parent_dir: &str, name: &str) -> Result<(), BackendError> {
        let path = join_path(parent_dir, name);
        tokio::fs::create_dir(&path)
            .await
            .map_err(|err| BackendError::io(BackendOp::CreateDirectory, path, err))
    }

    async fn delete_file(&self, path: &str) -> Result<(), BackendError> {
        tokio::fs::remove_file(path)
            .await
            .map_err(|err| BackendError::io(BackendOp::DeleteFile, path, err))
    }

    async fn delete_directory(&self, path: &str) -> Result<(), BackendError> {
        tokio::fs::remove_dir_all(path)
            .await
            .map_err(|err| BackendError::io(BackendOp::DeleteDirectory, path, err))
    }

    async fn rename_file(&self, old_path: &str, new_name: &str) -> Result<(), BackendError> {
        rename_entry(BackendOp::RenameFile, old_path, new_name).await
    }

    async fn rename_directory(&self, old_path: &str, new_name: &str) -> Result<(), BackendError> {
        rename_entry(BackendOp::RenameDirectory, old_path, new_name).await
    }

    async fn read_file_contents(&self, path: &str) -> Result<String, BackendError> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|err| BackendError::io(BackendOp::ReadFile, path, err))
    }

    async fn write_file_contents(&self, path: &str, content: &str) -> Result<(), BackendError> {
        tokio::fs::write(path, content)
            .await
            .map_err(|err| BackendError::io(BackendOp::WriteFile, path, err))
    }
}

async fn rename_entry(op: BackendOp, old_path: &str, new_name: &str) -> Result<(), BackendError> {
    let new_path = format!("{}{}", parent_prefix(old_path), new_name);
    // Refuse to clobber an existing sibling; `rename` would silently replace files.
    match tokio::fs::try_exists(&new_path).await {
        Ok(false) => {}
        Ok(true) => {
            return Err(BackendError::io(
                op,
                old_path,
                io::Error::new(ErrorKind::AlreadyExists, format!("{new_path} already exists")),
            ))
        }
        Err(err) => return Err(BackendError::io(op, old_path, err)),
    }
    tokio::fs::rename(old_path, &new_path)
        .await
        .map_err(|err| BackendError::io(op, old_path, err))
}

async fn blocking<T, F>(job: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(io::Error::other)?
}

fn directories_first(a: &DirEntry, b: &DirEntry) -> Ordering {
    let a_dir = a.file_type().is_dir();
    let b_dir = b.file_type().is_dir();
    b_dir.cmp(&a_dir).then_with(|| {
        a.file_name()
            .to_string_lossy()
            .to_lowercase()
            .cmp(&b.file_name().to_string_lossy().to_lowercase())
    })
}

/// Walks `root` and folds the flat walk into a nested snapshot.
fn build_tree(root: &Path) -> io::Result<TreeNode> {
    fs::metadata(root)?;

    // Open nodes along the current walk path, indexed by depth.
    let mut stack: Vec<TreeNode> = Vec::new();
    for entry in WalkDir::new(root).sort_by(directories_first) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => return Err(err.into()),
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        close_to_depth(&mut stack, entry.depth());
        let is_dir = entry.file_type().is_dir();
        stack.push(TreeNode {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.path().display().to_string(),
            is_dir,
            children: Vec::new(),
        });
    }
    close_to_depth(&mut stack, 1);
    stack
        .pop()
        .ok_or_else(|| io::Error::new(ErrorKind::NotFound, "empty directory walk"))
}

fn close_to_depth(stack: &mut Vec<TreeNode>, depth: usize) {
    while stack.len() > depth {
        let Some(done) = stack.pop() else { break };
        match stack.last_mut() {
            Some(parent) => parent.children.push(done),
            None => {
                stack.push(done);
                break;
            }
        }
    }
}
