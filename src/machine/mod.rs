//! The simulated filesystems: one independently rooted tree per host, plus the permission checks guarding them.
//!
//! Every role-taking operation re-checks permissions on each call. Reaching a node requires `execute` on every
//! directory above it; what's needed on the node itself depends on the operation.

mod node;
pub mod path;
pub mod perms;

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use crate::network::HostId;

pub use node::{Entry, FileNode, Kind};
pub use path::resolve_path;
pub use perms::{can_execute, can_read, can_write, Permissions, Role};

use path::{components, split_parent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("No such file or directory")]
    NotFound,
    #[error("Not a directory")]
    NotADirectory,
    #[error("Is a directory")]
    IsADirectory,
    #[error("Permission denied")]
    PermissionDenied,
    #[error("File exists")]
    AlreadyExists,
    #[error("Invalid path")]
    InvalidPath,
}

/// Rebuild the path from `dir` down to the directory at `comps`, with `child` inserted there.
fn insert_at(dir: &FileNode, comps: &[&str], child: Arc<FileNode>) -> Option<FileNode> {
    match comps.split_first() {
        None => dir.with_child(child),
        Some((first, rest)) => {
            let next = dir.child(first)?;
            let rebuilt = insert_at(next, rest, child)?;
            dir.with_child(Arc::new(rebuilt))
        }
    }
}

/// The filesystems of every host in the simulation.
#[derive(Default, Debug)]
pub struct Vfs {
    roots: DashMap<HostId, Arc<FileNode>>,
}

impl Vfs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `root` as the root directory of `host`, replacing whatever was there.
    pub fn mount(&self, host: HostId, root: FileNode) {
        self.roots.insert(host, Arc::new(root));
    }

    /// The current root of a host's tree. Later writes don't affect the returned tree.
    pub fn root(&self, host: &HostId) -> Option<Arc<FileNode>> {
        self.roots.get(host).map(|r| r.value().clone())
    }

    /// Look up a node by absolute path, without any permission checks.
    pub fn node(&self, host: &HostId, path: &str) -> Option<Arc<FileNode>> {
        let mut node = self.root(host)?;
        for comp in components(path) {
            let next = node.child(comp)?.clone();
            node = next;
        }
        Some(node)
    }

    /// Reach the node at `path` as `role`, checking traversal rights on every directory on the way.
    fn walk(&self, host: &HostId, path: &str, role: Role) -> Result<Arc<FileNode>, FsError> {
        let mut node = self.root(host).ok_or(FsError::NotFound)?;
        for comp in components(path) {
            if !node.is_dir() {
                return Err(FsError::NotADirectory);
            }
            if !can_execute(&node, role) {
                return Err(FsError::PermissionDenied);
            }
            let next = node.child(comp).ok_or(FsError::NotFound)?.clone();
            node = next;
        }
        Ok(node)
    }

    /// Look up a node as `role`. Only the directories above it are checked, so this works on things `role` can't
    /// read, the way `ls` on an unreadable file still shows it.
    pub fn stat(&self, host: &HostId, path: &str, role: Role) -> Result<Arc<FileNode>, FsError> {
        self.walk(host, path, role)
    }

    /// Children of the directory at `path`, in name order.
    pub fn list_children(&self, host: &HostId, path: &str, role: Role) -> Result<Vec<Arc<FileNode>>, FsError> {
        let dir = self.walk(host, path, role)?;
        let children = dir.children().ok_or(FsError::NotADirectory)?;
        if !can_read(&dir, role) {
            return Err(FsError::PermissionDenied);
        }
        Ok(children.values().cloned().collect())
    }

    /// Check that `role` could make `path` its working directory.
    pub fn enter_dir(&self, host: &HostId, path: &str, role: Role) -> Result<(), FsError> {
        let dir = self.walk(host, path, role)?;
        if !dir.is_dir() {
            return Err(FsError::NotADirectory);
        }
        if !can_execute(&dir, role) {
            return Err(FsError::PermissionDenied);
        }
        Ok(())
    }

    pub fn read_file(&self, host: &HostId, path: &str, role: Role) -> Result<String, FsError> {
        let file = self.walk(host, path, role)?;
        let content = file.content().ok_or(FsError::IsADirectory)?;
        if !can_read(&file, role) {
            return Err(FsError::PermissionDenied);
        }
        Ok(content.to_owned())
    }

    /// Replace the content of an existing file.
    pub fn write_file(&self, host: &HostId, path: &str, role: Role, content: &str) -> Result<(), FsError> {
        let file = self.walk(host, path, role)?;
        if !file.is_file() {
            return Err(FsError::IsADirectory);
        }
        if !can_write(&file, role) {
            return Err(FsError::PermissionDenied);
        }
        let updated = file.with_content(content.into()).ok_or(FsError::IsADirectory)?;
        let (parent, _) = split_parent(path).ok_or(FsError::InvalidPath)?;
        self.insert(host, &parent, updated)
    }

    /// Create a new file, owned by `role`.
    pub fn create_file(&self, host: &HostId, path: &str, role: Role, content: &str) -> Result<(), FsError> {
        let (parent, name) = self.creatable(host, path, role)?;
        let file = FileNode::file(name, role, Permissions::private_file(role), content);
        self.insert(host, &parent, file)
    }

    /// Create a new, empty directory, owned by `role`.
    pub fn create_dir(&self, host: &HostId, path: &str, role: Role) -> Result<(), FsError> {
        let (parent, name) = self.creatable(host, path, role)?;
        let dir = FileNode::dir(name, role, Permissions::shared_dir(role));
        self.insert(host, &parent, dir)
    }

    /// Check that `role` can create something new at `path`, returning the parent path and new name.
    fn creatable<'p>(&self, host: &HostId, path: &'p str, role: Role) -> Result<(String, &'p str), FsError> {
        let (parent, name) = split_parent(path).ok_or(FsError::InvalidPath)?;
        let dir = self.walk(host, &parent, role)?;
        if !dir.is_dir() {
            return Err(FsError::NotADirectory);
        }
        if !can_execute(&dir, role) {
            return Err(FsError::PermissionDenied);
        }
        if dir.child(name).is_some() {
            return Err(FsError::AlreadyExists);
        }
        if !can_write(&dir, role) {
            return Err(FsError::PermissionDenied);
        }
        Ok((parent, name))
    }

    /// Swap in a new root with `node` placed in the directory at `parent`.
    fn insert(&self, host: &HostId, parent: &str, node: FileNode) -> Result<(), FsError> {
        let root = self.root(host).ok_or(FsError::NotFound)?;
        let comps: Vec<_> = components(parent).collect();
        let updated = insert_at(&root, &comps, Arc::new(node)).ok_or(FsError::NotFound)?;
        self.roots.insert(host.clone(), Arc::new(updated));
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn host() -> HostId {
        HostId::from("box")
    }

    fn all() -> Permissions {
        Permissions::new(&Role::ALL, &Role::ALL, &Role::ALL)
    }

    /// `/`, `/etc/passwd` (no guest read), `/root` (root only), `/tmp` (open to all)
    fn vfs() -> Vfs {
        let vfs = Vfs::new();
        let passwd = FileNode::file(
            "passwd",
            Role::Root,
            Permissions::new(&[Role::Root, Role::User], &[Role::Root], &[]),
            "root:x:0:0",
        );
        let secret = FileNode::file("secret", Role::Root, Permissions::private_file(Role::Root), "shh");
        let etc = FileNode::dir("etc", Role::Root, all())
            .with_child(Arc::new(passwd))
            .expect("dir");
        let root_home = FileNode::dir("root", Role::Root, Permissions::new(&[Role::Root], &[Role::Root], &[Role::Root]))
            .with_child(Arc::new(secret))
            .expect("dir");
        let tmp = FileNode::dir("tmp", Role::Root, all());
        let root = FileNode::dir("", Role::Root, all())
            .with_child(Arc::new(etc))
            .and_then(|r| r.with_child(Arc::new(root_home)))
            .and_then(|r| r.with_child(Arc::new(tmp)))
            .expect("dir");
        vfs.mount(host(), root);
        vfs
    }

    #[test]
    fn reads_permitted_file() {
        let vfs = vfs();
        assert_eq!(vfs.read_file(&host(), "/etc/passwd", Role::User), Ok("root:x:0:0".into()));
    }

    #[test]
    fn guest_denied_unlisted_file() {
        let vfs = vfs();
        assert_eq!(vfs.read_file(&host(), "/etc/passwd", Role::Guest), Err(FsError::PermissionDenied));
    }

    #[test]
    fn traversal_needs_execute() {
        let vfs = vfs();
        assert_eq!(vfs.read_file(&host(), "/root/secret", Role::User), Err(FsError::PermissionDenied));
        assert_eq!(vfs.read_file(&host(), "/root/secret", Role::Root), Ok("shh".into()));
    }

    #[test]
    fn root_denied_without_grant() {
        let vfs = vfs();
        vfs.create_file(&host(), "/tmp/mine", Role::User, "x").expect("create");
        vfs.mount(
            host(),
            FileNode::dir("", Role::User, Permissions::new(&[Role::User], &[Role::User], &[Role::User])),
        );
        assert_eq!(vfs.list_children(&host(), "/", Role::Root), Err(FsError::PermissionDenied));
    }

    #[test]
    fn kind_mismatches() {
        let vfs = vfs();
        assert_eq!(vfs.read_file(&host(), "/etc", Role::User), Err(FsError::IsADirectory));
        assert_eq!(vfs.list_children(&host(), "/etc/passwd", Role::User).err(), Some(FsError::NotADirectory));
        assert_eq!(vfs.enter_dir(&host(), "/etc/passwd", Role::User), Err(FsError::NotADirectory));
        assert_eq!(vfs.read_file(&host(), "/etc/passwd/x", Role::User), Err(FsError::NotADirectory));
    }

    #[test]
    fn missing_things_not_found() {
        let vfs = vfs();
        assert_eq!(vfs.read_file(&host(), "/nope", Role::Root), Err(FsError::NotFound));
        assert_eq!(vfs.read_file(&HostId::from("elsewhere"), "/etc/passwd", Role::Root), Err(FsError::NotFound));
        assert!(vfs.node(&host(), "/etc/nope").is_none());
    }

    #[test]
    fn write_then_read_round_trips() {
        let vfs = vfs();
        vfs.create_file(&host(), "/tmp/notes", Role::User, "").expect("create");
        vfs.write_file(&host(), "/tmp/notes", Role::User, "remember the milk\n")
            .expect("write");
        assert_eq!(
            vfs.read_file(&host(), "/tmp/notes", Role::User),
            Ok("remember the milk\n".into())
        );
    }

    #[test]
    fn write_needs_grant() {
        let vfs = vfs();
        assert_eq!(
            vfs.write_file(&host(), "/etc/passwd", Role::User, "pwned"),
            Err(FsError::PermissionDenied)
        );
        assert_eq!(vfs.read_file(&host(), "/etc/passwd", Role::Root), Ok("root:x:0:0".into()));
    }

    #[test]
    fn create_refuses_existing() {
        let vfs = vfs();
        assert_eq!(
            vfs.create_file(&host(), "/etc/passwd", Role::Root, ""),
            Err(FsError::AlreadyExists)
        );
        assert_eq!(vfs.create_dir(&host(), "/", Role::Root), Err(FsError::InvalidPath));
    }

    #[test]
    fn existing_reported_before_write_denial() {
        let vfs = vfs();
        let tmp = FileNode::dir("tmp", Role::Root, all());
        let locked = Permissions::new(&Role::ALL, &[Role::Root], &Role::ALL);
        let root = FileNode::dir("", Role::Root, locked)
            .with_child(Arc::new(tmp))
            .expect("dir");
        vfs.mount(host(), root);
        assert_eq!(vfs.create_dir(&host(), "/tmp", Role::User), Err(FsError::AlreadyExists));
        assert_eq!(vfs.create_dir(&host(), "/new", Role::User), Err(FsError::PermissionDenied));
    }

    #[test]
    fn created_nodes_belong_to_creator() {
        let vfs = vfs();
        vfs.create_dir(&host(), "/tmp/stuff", Role::Guest).expect("mkdir");
        vfs.create_file(&host(), "/tmp/stuff/a", Role::Guest, "a").expect("create");
        let node = vfs.node(&host(), "/tmp/stuff/a").expect("exists");
        assert_eq!(node.owner, Role::Guest);
        assert_eq!(vfs.read_file(&host(), "/tmp/stuff/a", Role::User), Err(FsError::PermissionDenied));
    }

    #[test]
    fn old_roots_are_untouched_by_writes() {
        let vfs = vfs();
        let before = vfs.root(&host()).expect("mounted");
        vfs.create_file(&host(), "/tmp/new", Role::User, "").expect("create");
        assert!(before.child("tmp").and_then(|t| t.child("new")).is_none());
        let after = vfs.root(&host()).expect("mounted");
        assert!(Arc::ptr_eq(
            before.child("etc").expect("etc"),
            after.child("etc").expect("etc")
        ));
    }

    #[test]
    fn stat_only_checks_ancestors() {
        let vfs = vfs();
        assert!(vfs.stat(&host(), "/etc/passwd", Role::Guest).is_ok());
        assert_eq!(vfs.stat(&host(), "/root/secret", Role::Guest).err(), Some(FsError::PermissionDenied));
    }

    #[test]
    fn listing_is_per_call() {
        let vfs = vfs();
        assert!(vfs.list_children(&host(), "/tmp", Role::Guest).expect("ls").is_empty());
        vfs.create_file(&host(), "/tmp/b", Role::Guest, "").expect("create");
        vfs.create_file(&host(), "/tmp/a", Role::Guest, "").expect("create");
        let names: Vec<_> = vfs
            .list_children(&host(), "/tmp", Role::Guest)
            .expect("ls")
            .iter()
            .map(|n| n.name.clone())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
