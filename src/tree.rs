//! Directory hierarchy over a flat path set
//!
//! Packages store only file paths. [`PathTree`] rebuilds the directory
//! structure from them in one pass: nodes live in an arena addressed by
//! index, each node stores its parent's index, and the root sits at index 0
//! without a parent. Sibling order is first-insertion order.

use crate::error::{JpkgError, Result};
use std::collections::HashMap;
use tracing::trace;

/// Separator used by every canonical path
pub const SEPARATOR: char = '/';

/// Path of the tree root
pub const ROOT: &str = "/";

/// Arena index of the root directory
pub const ROOT_INDEX: usize = 0;

/// Normalize a caller path into its canonical absolute form.
///
/// Backslashes become `/`, a leading `./` is dropped, `.` and empty segments
/// are removed, and `..` pops the previous segment (never above the root).
/// The result always starts with exactly one `/`; the root is `/`.
pub fn canonicalize(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split(SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            name => segments.push(name),
        }
    }

    let mut out = String::with_capacity(unified.len() + 1);
    for segment in &segments {
        out.push(SEPARATOR);
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push(SEPARATOR);
    }
    out
}

/// Kind of a tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    File,
}

/// One arena node
#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    parent: Option<usize>,
    kind: NodeKind,
    children: Vec<usize>,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Child indices in insertion order; always empty for files
    pub fn children(&self) -> &[usize] {
        &self.children
    }
}

/// Arena-backed directory tree
#[derive(Debug, Clone)]
pub struct PathTree {
    nodes: Vec<Node>,
    by_path: HashMap<String, usize>,
}

impl Default for PathTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PathTree {
    pub fn new() -> Self {
        let root = Node {
            name: String::new(),
            parent: None,
            kind: NodeKind::Directory,
            children: Vec::new(),
        };
        let mut by_path = HashMap::new();
        by_path.insert(ROOT.to_string(), ROOT_INDEX);
        Self {
            nodes: vec![root],
            by_path,
        }
    }

    /// Build a tree from canonical file paths, in order
    pub fn build<'a, I>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut tree = Self::new();
        for path in paths {
            tree.insert(path)?;
        }
        trace!(nodes = tree.nodes.len(), "built path tree");
        Ok(tree)
    }

    /// Insert a file leaf, creating intermediate directories as needed
    pub fn insert(&mut self, path: &str) -> Result<usize> {
        let canonical = canonicalize(path);
        let segments: Vec<&str> = canonical
            .split(SEPARATOR)
            .filter(|s| !s.is_empty())
            .collect();
        let Some((leaf, dirs)) = segments.split_last() else {
            return Err(JpkgError::TreeConflict {
                path: canonical.clone(),
                reason: "the root cannot be a file",
            });
        };

        let mut current = ROOT_INDEX;
        let mut prefix = String::with_capacity(canonical.len());
        for dir in dirs {
            prefix.push(SEPARATOR);
            prefix.push_str(dir);
            current = match self.by_path.get(&prefix) {
                Some(&existing) if self.nodes[existing].is_dir() => existing,
                Some(_) => {
                    return Err(JpkgError::TreeConflict {
                        path: canonical.clone(),
                        reason: "an intermediate segment is already a file",
                    })
                }
                None => self.push_node(current, dir, NodeKind::Directory, prefix.clone()),
            };
        }

        if self.by_path.contains_key(&canonical) {
            return Err(JpkgError::TreeConflict {
                path: canonical.clone(),
                reason: "an entry with this name already exists",
            });
        }
        Ok(self.push_node(current, leaf, NodeKind::File, canonical.clone()))
    }

    fn push_node(&mut self, parent: usize, name: &str, kind: NodeKind, path: String) -> usize {
        let index = self.nodes.len();
        self.nodes.push(Node {
            name: name.to_string(),
            parent: Some(parent),
            kind,
            children: Vec::new(),
        });
        self.nodes[parent].children.push(index);
        self.by_path.insert(path, index);
        index
    }

    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the tree holds nothing but the root
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Full canonical path of a node, derived by walking parent links
    pub fn full_path(&self, index: usize) -> String {
        let mut names = Vec::new();
        let mut cursor = Some(index);
        while let Some(i) = cursor {
            let node = &self.nodes[i];
            if node.parent.is_some() {
                names.push(node.name.as_str());
            }
            cursor = node.parent;
        }
        if names.is_empty() {
            return ROOT.to_string();
        }
        names.reverse();
        let mut out = String::new();
        for name in names {
            out.push(SEPARATOR);
            out.push_str(name);
        }
        out
    }

    /// Node index for a path, canonicalized first
    pub fn lookup(&self, path: &str) -> Option<usize> {
        self.by_path.get(&canonicalize(path)).copied()
    }

    /// Full paths of a directory's immediate children, in insertion order
    pub fn child_paths(&self, index: usize) -> Vec<String> {
        self.nodes
            .get(index)
            .map(|node| node.children.iter().map(|&c| self.full_path(c)).collect())
            .unwrap_or_default()
    }

    /// Map every directory path to its ordered immediate-child paths
    pub fn directory_index(&self) -> HashMap<String, Vec<String>> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.is_dir())
            .map(|(i, _)| (self.full_path(i), self.child_paths(i)))
            .collect()
    }
}
