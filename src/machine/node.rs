use std::{collections::BTreeMap, sync::Arc};

use super::perms::{Permissions, Role};

/// The two kinds of filesystem entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    File,
    Directory,
}

/// What a node holds. Only files have content and only directories have children, and the type says so.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Entry {
    File { content: String },
    Directory(BTreeMap<String, Arc<FileNode>>),
}

/// One node of a host's filesystem tree.
///
/// Nodes are never mutated in place. Updates build a new node (see [`Self::with_child`] and [`Self::with_content`])
/// and the unchanged subtrees are shared through their `Arc`s.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileNode {
    pub name: String,
    pub owner: Role,
    pub permissions: Permissions,
    pub entry: Entry,
}

impl FileNode {
    pub fn file(name: &str, owner: Role, permissions: Permissions, content: &str) -> Self {
        Self {
            name: name.into(),
            owner,
            permissions,
            entry: Entry::File {
                content: content.into(),
            },
        }
    }

    pub fn dir(name: &str, owner: Role, permissions: Permissions) -> Self {
        Self {
            name: name.into(),
            owner,
            permissions,
            entry: Entry::Directory(BTreeMap::new()),
        }
    }

    pub fn kind(&self) -> Kind {
        match self.entry {
            Entry::File { .. } => Kind::File,
            Entry::Directory(_) => Kind::Directory,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind() == Kind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind() == Kind::File
    }

    pub fn content(&self) -> Option<&str> {
        match &self.entry {
            Entry::File { content } => Some(content),
            Entry::Directory(_) => None,
        }
    }

    pub fn children(&self) -> Option<&BTreeMap<String, Arc<FileNode>>> {
        match &self.entry {
            Entry::Directory(children) => Some(children),
            Entry::File { .. } => None,
        }
    }

    pub fn child(&self, name: &str) -> Option<&Arc<FileNode>> {
        self.children().and_then(|c| c.get(name))
    }

    /// Bytes of content for files, number of children for directories.
    pub fn size(&self) -> usize {
        match &self.entry {
            Entry::File { content } => content.len(),
            Entry::Directory(children) => children.len(),
        }
    }

    /// A copy of this directory with `child` inserted, replacing any existing child of the same name.
    ///
    /// Returns `None` if this node is a file.
    pub fn with_child(&self, child: Arc<FileNode>) -> Option<FileNode> {
        let mut children = self.children()?.clone();
        children.insert(child.name.clone(), child);
        Some(FileNode {
            entry: Entry::Directory(children),
            ..self.clone_shallow()
        })
    }

    /// A copy of this file with its content replaced.
    ///
    /// Returns `None` if this node is a directory.
    pub fn with_content(&self, content: String) -> Option<FileNode> {
        if !self.is_file() {
            return None;
        }
        Some(FileNode {
            entry: Entry::File { content },
            ..self.clone_shallow()
        })
    }

    /// Clone everything but the entry, which is left as an empty file for the caller to overwrite.
    fn clone_shallow(&self) -> FileNode {
        FileNode {
            name: self.name.clone(),
            owner: self.owner,
            permissions: self.permissions.clone(),
            entry: Entry::File {
                content: String::new(),
            },
        }
    }
}
