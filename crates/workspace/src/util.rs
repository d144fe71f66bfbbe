use std::fs;
use std::io;
use std::path::Path;

/// Writes data atomically by using a temporary sibling file followed by rename.
/// 以臨時檔案搭配 rename 實現原子寫入。
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, data)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Returns `true` for either flavour of path separator.
/// 判斷字元是否為路徑分隔符號（`/` 或 `\`）。
pub fn is_separator(ch: char) -> bool {
    ch == '/' || ch == '\\'
}

/// Joins a directory path and an entry name, reusing a trailing separator when present.
/// 串接資料夾路徑與項目名稱；若已有結尾分隔符號則沿用。
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.ends_with(is_separator) {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Everything up to and including the last separator (empty when there is none).
/// 取得最後一個分隔符號（含）之前的字串。
pub fn parent_prefix(path: &str) -> &str {
    match path.rfind(is_separator) {
        Some(idx) => &path[..=idx],
        None => "",
    }
}

/// Returns `true` when `path` equals `ancestor` or lives underneath it.
/// 若 `path` 等於 `ancestor` 或位於其下則回傳 `true`。
pub fn is_same_or_descendant(path: &str, ancestor: &str) -> bool {
    match path.strip_prefix(ancestor) {
        Some("") => true,
        Some(rest) => rest.starts_with(is_separator) || ancestor.ends_with(is_separator),
        None => false,
    }
}

/// Rewrites `path` from under `old` to under `new`, keeping the relative suffix.
/// 將位於 `old` 之下的路徑改寫為 `new` 之下，保留相對部分。
pub fn rebase_path(path: &str, old: &str, new: &str) -> Option<String> {
    if !is_same_or_descendant(path, old) {
        return None;
    }
    Some(format!("{new}{}", &path[old.len()..]))
}
