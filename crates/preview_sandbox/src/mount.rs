use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use site_builder::{FileNode, FileTree, NodeKind};

/// One mount entry: `{"file": {"contents": ..}}` or `{"directory": {..}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountEntry {
    File { contents: String },
    Directory(MountTree),
}

/// Name-keyed mount structure handed to a sandbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MountTree {
    entries: BTreeMap<String, MountEntry>,
}

impl MountTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Converts the project tree. Files that were never written mount empty.
    #[must_use]
    pub fn from_file_tree(tree: &FileTree) -> Self {
        from_nodes(tree.roots())
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: MountEntry) {
        self.entries.insert(name.into(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&MountEntry> {
        self.entries.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Depth-first list of `(path, entry)` pairs, parents before children.
    pub fn walk(&self) -> Vec<(String, &MountEntry)> {
        let mut out = Vec::new();
        let mut stack: Vec<(String, &MountTree)> = vec![(String::new(), self)];

        while let Some((prefix, tree)) = stack.pop() {
            for (name, entry) in &tree.entries {
                let path = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{prefix}/{name}")
                };
                if let MountEntry::Directory(children) = entry {
                    stack.push((path.clone(), children));
                }
                out.push((path, entry));
            }
        }

        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn from_nodes(nodes: &[FileNode]) -> MountTree {
    let mut mount = MountTree::new();
    for node in nodes {
        let entry = match node.kind {
            NodeKind::File => MountEntry::File {
                contents: node.content.clone().unwrap_or_default(),
            },
            NodeKind::Folder => MountEntry::Directory(from_nodes(&node.children)),
        };
        mount.insert(node.name.clone(), entry);
    }
    mount
}
