use std::fmt;
use std::io;

use async_trait::async_trait;
use thiserror::Error;

use crate::tree::TreeNode;

/// Names the backend operation that failed, for notices and logs.
/// 標示失敗的後端操作，用於提示訊息與日誌。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendOp {
    LoadRoots,
    PersistRoots,
    EnumerateTree,
    CreateFile,
    CreateDirectory,
    DeleteFile,
    DeleteDirectory,
    RenameFile,
    RenameDirectory,
    ReadFile,
    WriteFile,
}

impl fmt::Display for BackendOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BackendOp::LoadRoots => "load workspaces",
            BackendOp::PersistRoots => "save workspaces",
            BackendOp::EnumerateTree => "read folder hierarchy",
            BackendOp::CreateFile => "create file",
            BackendOp::CreateDirectory => "create folder",
            BackendOp::DeleteFile => "delete file",
            BackendOp::DeleteDirectory => "delete folder",
            BackendOp::RenameFile => "rename file",
            BackendOp::RenameDirectory => "rename folder",
            BackendOp::ReadFile => "read file",
            BackendOp::WriteFile => "save file",
        };
        f.write_str(label)
    }
}

/// Failure reported by a storage backend.
/// 儲存後端回報的錯誤。
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("could not {op} `{path}`: {source}")]
    Io {
        op: BackendOp,
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid data in `{path}`: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not {op} `{path}`: {reason}")]
    Rejected {
        op: BackendOp,
        path: String,
        reason: String,
    },
}

impl BackendError {
    pub fn io(op: BackendOp, path: impl Into<String>, source: io::Error) -> Self {
        BackendError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    pub fn rejected(op: BackendOp, path: impl Into<String>, reason: impl Into<String>) -> Self {
        BackendError::Rejected {
            op,
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Authoritative storage behind the workspace caches.
/// 工作區快取背後的權威儲存服務。
///
/// Every call is awaited to completion before the caller touches its
/// in-memory state, so implementations must apply an operation fully or not
/// at all.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn load_workspace_roots(&self) -> Result<Vec<String>, BackendError>;
    async fn persist_workspace_roots(&self, roots: Vec<String>) -> Result<(), BackendError>;

    /// Full recursive snapshot of the directory at `root_path`.
    async fn enumerate_tree(&self, root_path: &str) -> Result<TreeNode, BackendError>;

    async fn create_file(&self, parent_dir: &str, name: &str) -> Result<(), BackendError>;
    async fn create_directory(&self, parent_dir: &str, name: &str) -> Result<(), BackendError>;
    async fn delete_file(&self, path: &str) -> Result<(), BackendError>;
    async fn delete_directory(&self, path: &str) -> Result<(), BackendError>;
    async fn rename_file(&self, old_path: &str, new_name: &str) -> Result<(), BackendError>;
    async fn rename_directory(&self, old_path: &str, new_name: &str) -> Result<(), BackendError>;

    async fn read_file_contents(&self, path: &str) -> Result<String, BackendError>;
    async fn write_file_contents(&self, path: &str, content: &str) -> Result<(), BackendError>;
}
