//! Virtual project file tree.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    File,
    Folder,
}

/// One file or folder in the project.
///
/// `path` is the full slash-delimited path from the project root and is unique
/// within its container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FileNode>,
}

impl FileNode {
    #[must_use]
    pub fn file(name: impl Into<String>, path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: NodeKind::File,
            content: Some(content.into()),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn folder(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: NodeKind::Folder,
            content: None,
            children: Vec::new(),
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }
}

/// Root-level list of project nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileTree {
    roots: Vec<FileNode>,
}

impl FileTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roots(&self) -> &[FileNode] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Looks up a node by path. The path is normalized first.
    pub fn find(&self, path: &str) -> Option<&FileNode> {
        let path = normalize_path(path);
        let mut container = &self.roots;
        let mut prefix = String::new();

        for segment in path.split('/').filter(|segment| !segment.is_empty()) {
            push_segment(&mut prefix, segment);
            let node = container.iter().find(|node| node.path == prefix)?;
            if prefix == path {
                return Some(node);
            }
            container = &node.children;
        }

        None
    }

    /// Returns the content of the file at `path`, if it exists and was written.
    pub fn file_content(&self, path: &str) -> Option<&str> {
        self.find(path)
            .filter(|node| node.is_file())
            .and_then(|node| node.content.as_deref())
    }

    /// Depth-first list of every file node in container order.
    pub fn files(&self) -> Vec<&FileNode> {
        let mut out = Vec::new();
        collect_files(&self.roots, &mut out);
        out
    }

    pub fn file_count(&self) -> usize {
        self.files().len()
    }

    /// Creates or overwrites the file at `path`, creating missing folders.
    ///
    /// Returns `false` without touching the tree when the path has no
    /// segments, when a parent segment is an existing file, or when `path`
    /// itself is an existing folder.
    pub fn write_file(&mut self, path: &str, content: &str) -> bool {
        let path = normalize_path(path);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((file_name, parents)) = segments.split_last() else {
            return false;
        };

        let mut container = &mut self.roots;
        let mut prefix = String::new();
        for segment in parents {
            push_segment(&mut prefix, segment);
            let Some(index) = folder_index(container, &prefix, segment) else {
                return false;
            };
            container = &mut container[index].children;
        }

        push_segment(&mut prefix, file_name);
        match container.iter_mut().find(|node| node.path == prefix) {
            Some(node) if node.is_folder() => {
                tracing::warn!(path = %prefix, "file write targets an existing folder; skipping");
                return false;
            }
            Some(node) => node.content = Some(content.to_string()),
            None => container.push(FileNode::file(*file_name, prefix, content)),
        }

        true
    }

    /// Creates the folder at `path` and any missing parents.
    ///
    /// Returns `false` when the path has no segments or crosses an existing
    /// file. Folders created before the blocking segment are kept.
    pub fn create_folder(&mut self, path: &str) -> bool {
        let path = normalize_path(path);
        let mut container = &mut self.roots;
        let mut prefix = String::new();
        let mut created_any = false;

        for segment in path.split('/').filter(|segment| !segment.is_empty()) {
            push_segment(&mut prefix, segment);
            let Some(index) = folder_index(container, &prefix, segment) else {
                return false;
            };
            container = &mut container[index].children;
            created_any = true;
        }

        created_any
    }
}

/// Canonical project path: no leading `/` or `./`, no empty or `.` segments.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Editor language hint derived from the file extension.
pub fn language_for_path(path: &str) -> &'static str {
    let extension = path
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("ts" | "tsx") => "typescript",
        Some("js" | "jsx" | "mjs" | "cjs") => "javascript",
        Some("css") => "css",
        Some("html") => "html",
        Some("json") => "json",
        Some("md") => "markdown",
        Some("py") => "python",
        Some("java") => "java",
        Some("c" | "cpp") => "cpp",
        _ => "plaintext",
    }
}

fn push_segment(prefix: &mut String, segment: &str) {
    if !prefix.is_empty() {
        prefix.push('/');
    }
    prefix.push_str(segment);
}

/// Index of the folder at `path`, creating it when missing.
///
/// `None` when a file already occupies the path; the file is left as is.
fn folder_index(container: &mut Vec<FileNode>, path: &str, name: &str) -> Option<usize> {
    match container.iter().position(|node| node.path == path) {
        Some(index) if container[index].is_file() => {
            tracing::warn!(path, "existing file is in the way of a folder; skipping");
            None
        }
        Some(index) => Some(index),
        None => {
            container.push(FileNode::folder(name, path));
            Some(container.len() - 1)
        }
    }
}

fn collect_files<'a>(nodes: &'a [FileNode], out: &mut Vec<&'a FileNode>) {
    for node in nodes {
        match node.kind {
            NodeKind::File => out.push(node),
            NodeKind::Folder => collect_files(&node.children, out),
        }
    }
}
