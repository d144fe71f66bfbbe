use serde::{Deserialize, Serialize};

/// Outcome of [`PathSet::add`].
/// [`PathSet::add`] 的結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSetChange {
    /// The path was already tracked.
    Unchanged,
    /// An existing ancestor root was narrowed to the new path.
    Replaced { previous: String },
    /// The new path absorbed every root underneath it.
    Absorbed { removed: Vec<String> },
    /// The path was unrelated to every existing root.
    Appended,
}

impl PathSetChange {
    pub fn is_changed(&self) -> bool {
        !matches!(self, PathSetChange::Unchanged)
    }
}

/// Ordered set of workspace root paths that never holds an ancestor/descendant pair.
/// 工作區根路徑的有序集合，保證任兩者之間不存在前綴（祖先）關係。
///
/// Ancestry is decided on the raw strings, the same way the roots are compared
/// everywhere else in the application: `/notes` is considered an ancestor of
/// both `/notes/daily` and `/notes-archive`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathSet {
    roots: Vec<String>,
}

impl PathSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a set from persisted entries, normalising any overlap on the way in.
    /// 由持久化資料重建集合，並順便消除重疊的項目。
    pub fn from_persisted(entries: impl IntoIterator<Item = String>) -> Self {
        let mut set = Self::new();
        for entry in entries {
            set.add(entry);
        }
        set
    }

    /// Adds a root, merging it against the existing ones.
    /// 新增根路徑，並與既有項目合併。
    pub fn add(&mut self, path: impl Into<String>) -> PathSetChange {
        let path = path.into();
        if self.roots.iter().any(|root| *root == path) {
            return PathSetChange::Unchanged;
        }

        debug_assert!(
            self.roots
                .iter()
                .filter(|root| path.starts_with(root.as_str()))
                .count()
                <= 1,
            "workspace roots overlap: {:?}",
            self.roots
        );
        if let Some(slot) = self
            .roots
            .iter_mut()
            .find(|root| path.starts_with(root.as_str()))
        {
            let previous = std::mem::replace(slot, path);
            return PathSetChange::Replaced { previous };
        }

        let (removed, kept): (Vec<String>, Vec<String>) = std::mem::take(&mut self.roots)
            .into_iter()
            .partition(|root| root.starts_with(path.as_str()));
        self.roots = kept;
        self.roots.push(path);
        if removed.is_empty() {
            PathSetChange::Appended
        } else {
            PathSetChange::Absorbed { removed }
        }
    }

    /// Removes an exact match; descendants and ancestors are left alone.
    /// 僅移除完全相符的項目。
    pub fn remove(&mut self, path: &str) -> bool {
        let before = self.roots.len();
        self.roots.retain(|root| root != path);
        self.roots.len() != before
    }

    pub fn contains(&self, path: &str) -> bool {
        self.roots.iter().any(|root| root == path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.roots.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.roots.clone()
    }
}
