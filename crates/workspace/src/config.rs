use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application folder name used under the platform config directory.
pub const APP_DIR_NAME: &str = "WriteRight";
/// Optional settings file inside the data directory.
pub const CONFIG_FILE: &str = "config.json";
/// Environment variable that overrides the data directory.
pub const HOME_ENV: &str = "WRITERIGHT_HOME";

const DEFAULT_CONTENT_SAVE_DELAY_MS: u64 = 200;
const DEFAULT_WORKSPACE_LIST_DELAY_MS: u64 = 500;

/// Quiet intervals for the debounced write streams.
/// 延遲寫入串流的靜止間隔設定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub content_save_delay_ms: u64,
    pub workspace_list_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            content_save_delay_ms: DEFAULT_CONTENT_SAVE_DELAY_MS,
            workspace_list_delay_ms: DEFAULT_WORKSPACE_LIST_DELAY_MS,
        }
    }
}

impl SyncConfig {
    pub fn content_save_delay(&self) -> Duration {
        Duration::from_millis(self.content_save_delay_ms)
    }

    pub fn workspace_list_delay(&self) -> Duration {
        Duration::from_millis(self.workspace_list_delay_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    sync: SyncConfig,
}

/// Errors raised while loading configuration.
/// 載入設定時可能出現的錯誤。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no data directory: set WRITERIGHT_HOME or HOME")]
    NoDataDir,
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Resolved runtime configuration.
/// 執行期設定。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub sync: SyncConfig,
}

impl AppConfig {
    /// Resolves the data directory and reads `config.json` from it when present.
    /// 解析資料夾位置，若存在 `config.json` 則一併載入。
    pub fn load(data_dir: Option<PathBuf>) -> Result<Self, ConfigError> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => default_data_dir().ok_or(ConfigError::NoDataDir)?,
        };
        let sync = read_config_file(&data_dir.join(CONFIG_FILE))?.sync;
        Ok(Self { data_dir, sync })
    }

    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            sync: SyncConfig::default(),
        }
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw).map_err(|source| ConfigError::Invalid {
            path: path.to_path_buf(),
            source,
        }),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// `$WRITERIGHT_HOME`, else the platform config dir joined with `WriteRight`.
pub fn default_data_dir() -> Option<PathBuf> {
    let non_empty = |key: &str| std::env::var(key).ok().filter(|value| !value.is_empty());
    if let Some(home) = non_empty(HOME_ENV) {
        return Some(PathBuf::from(home));
    }
    if let Some(xdg) = non_empty("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg).join(APP_DIR_NAME));
    }
    if let Some(appdata) = non_empty("APPDATA") {
        return Some(PathBuf::from(appdata).join(APP_DIR_NAME));
    }
    non_empty("HOME").map(|home| PathBuf::from(home).join(".config").join(APP_DIR_NAME))
}
