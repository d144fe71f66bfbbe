//! Workspace state management for WriteRight: root list, tree cache, tabs and debounced sync.
//! 管理 WriteRight 工作區清單、目錄樹快取、分頁狀態與延遲同步的核心模組。

mod util;

pub mod backend;
pub mod config;
pub mod controller;
pub mod local;
pub mod path_set;
pub mod scheduler;
pub mod session;
pub mod session_index;
pub mod tree;

pub use backend::{Backend, BackendError, BackendOp};
pub use config::{AppConfig, ConfigError, SyncConfig};
pub use controller::{ActiveWorkspace, Notice, WorkspaceController, WorkspaceError, WorkspaceState};
pub use local::LocalBackend;
pub use path_set::{PathSet, PathSetChange};
pub use scheduler::{SyncScheduler, SyncStream};
pub use session::{SavedSession, SessionStore};
pub use session_index::{JsonSessionIndex, MemorySessionIndex, SessionIndex, SessionIndexError};
pub use tree::{Lookup, TreeCache, TreeNode};
pub use util::join_path;
