use serde::{Deserialize, Serialize};

use crate::util::{is_separator, parent_prefix, rebase_path};

/// One entry of a workspace directory snapshot.
/// 工作區目錄快照中的單一節點。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn file(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_dir: false,
            children: Vec::new(),
        }
    }

    pub fn directory(
        name: impl Into<String>,
        path: impl Into<String>,
        children: Vec<TreeNode>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_dir: true,
            children,
        }
    }
}

/// Tagged result of a path-addressed lookup or mutation.
/// 以路徑定位的操作結果。
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Found,
    NotFound,
}

impl Lookup {
    pub fn is_found(self) -> bool {
        matches!(self, Lookup::Found)
    }
}

impl From<bool> for Lookup {
    fn from(found: bool) -> Self {
        if found {
            Lookup::Found
        } else {
            Lookup::NotFound
        }
    }
}

/// In-memory mirror of one workspace directory.
/// 單一工作區目錄結構的記憶體鏡像。
///
/// The cache never talks to the backend: callers apply a mutation here only
/// after the matching filesystem operation has succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeCache {
    root: TreeNode,
}

impl TreeCache {
    pub fn new(root: TreeNode) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    pub fn root_path(&self) -> &str {
        &self.root.path
    }

    /// Finds a node by exact path.
    /// 依完整路徑尋找節點。
    pub fn find(&self, path: &str) -> Option<&TreeNode> {
        find_recursive(&self.root, path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.find(path).is_some()
    }

    /// Depth-first list of every file path in the tree.
    /// 以深度優先順序列出所有檔案路徑。
    pub fn file_paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        collect_files(&self.root, &mut out);
        out
    }

    /// Appends `node` to the directory whose path is `parent_path`.
    /// 將節點加入路徑為 `parent_path` 的資料夾。
    pub fn insert(&mut self, parent_path: &str, node: TreeNode) -> Lookup {
        insert_recursive(&mut self.root, parent_path, node)
    }

    /// Detaches the node at `target_path` together with its subtree.
    /// 移除 `target_path` 所指節點及其整個子樹；根節點不會被移除。
    pub fn delete(&mut self, target_path: &str) -> Lookup {
        delete_recursive(&mut self.root, target_path)
    }

    /// Renames the node at `old_path` and rebases every descendant path.
    /// 重新命名節點，並一次改寫所有子孫節點的路徑。
    pub fn rename(&mut self, old_path: &str, new_name: &str) -> Lookup {
        match find_recursive_mut(&mut self.root, old_path) {
            Some(node) => {
                if node.name != new_name {
                    let new_path = format!("{}{}", parent_prefix(old_path), new_name);
                    node.name = new_name.to_string();
                    node.path = new_path.clone();
                    rebase_descendants(node, old_path, &new_path);
                }
                Lookup::Found
            }
            None => Lookup::NotFound,
        }
    }
}

fn find_recursive<'a>(node: &'a TreeNode, path: &str) -> Option<&'a TreeNode> {
    if node.path == path {
        return Some(node);
    }
    node.children
        .iter()
        .find_map(|child| find_recursive(child, path))
}

fn find_recursive_mut<'a>(node: &'a mut TreeNode, path: &str) -> Option<&'a mut TreeNode> {
    if node.path == path {
        return Some(node);
    }
    node.children
        .iter_mut()
        .find_map(|child| find_recursive_mut(child, path))
}

fn collect_files<'a>(node: &'a TreeNode, out: &mut Vec<&'a str>) {
    if !node.is_dir {
        out.push(&node.path);
    }
    for child in &node.children {
        collect_files(child, out);
    }
}

fn insert_recursive(current: &mut TreeNode, parent_path: &str, node: TreeNode) -> Lookup {
    if current.is_dir && current.path == parent_path {
        if !current.children.iter().any(|child| child.path == node.path) {
            current.children.push(node);
        }
        return Lookup::Found;
    }
    // Only descend where the parent could actually live.
    match current
        .children
        .iter_mut()
        .find(|child| child.is_dir && may_contain(&child.path, parent_path))
    {
        Some(child) => insert_recursive(child, parent_path, node),
        None => Lookup::NotFound,
    }
}

fn delete_recursive(current: &mut TreeNode, target_path: &str) -> Lookup {
    if let Some(idx) = current
        .children
        .iter()
        .position(|child| child.path == target_path)
    {
        current.children.remove(idx);
        return Lookup::Found;
    }
    for child in current.children.iter_mut().filter(|child| child.is_dir) {
        if delete_recursive(child, target_path).is_found() {
            return Lookup::Found;
        }
    }
    Lookup::NotFound
}

fn rebase_descendants(node: &mut TreeNode, old_prefix: &str, new_prefix: &str) {
    for child in &mut node.children {
        if let Some(rebased) = rebase_path(&child.path, old_prefix, new_prefix) {
            child.path = rebased;
        }
        rebase_descendants(child, old_prefix, new_prefix);
    }
}

fn may_contain(dir_path: &str, target: &str) -> bool {
    match target.strip_prefix(dir_path) {
        Some("") => true,
        Some(rest) => rest.starts_with(is_separator) || dir_path.ends_with(is_separator),
        None => false,
    }
}
