//! Who may do what to a filesystem entry.
//!
//! Access is a plain membership test against the entry's grant lists. `root` gets no special treatment: if a list
//! doesn't name `root`, root is refused like anyone else.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::node::FileNode;

/// The identity classes that filesystem grants and services are written against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Root,
    User,
    Guest,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Root, Role::User, Role::Guest];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Root => "root",
            Role::User => "user",
            Role::Guest => "guest",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "root" => Ok(Role::Root),
            "user" => Ok(Role::User),
            "guest" => Ok(Role::Guest),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// The grant lists of a single entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub read: Vec<Role>,
    #[serde(default)]
    pub write: Vec<Role>,
    #[serde(default)]
    pub execute: Vec<Role>,
}

impl Permissions {
    pub fn new(read: &[Role], write: &[Role], execute: &[Role]) -> Self {
        Self {
            read: read.to_vec(),
            write: write.to_vec(),
            execute: execute.to_vec(),
        }
    }

    /// Grants for a freshly created file: only its creator and root can touch it.
    pub fn private_file(owner: Role) -> Self {
        let rw = Self::with_root(owner);
        Self::new(&rw, &rw, &[])
    }

    /// Grants for a freshly created directory: anyone can look, only the creator and root can change it.
    pub fn shared_dir(owner: Role) -> Self {
        Self::new(&Role::ALL, &Self::with_root(owner), &Role::ALL)
    }

    fn with_root(owner: Role) -> Vec<Role> {
        if owner == Role::Root {
            vec![Role::Root]
        } else {
            vec![Role::Root, owner]
        }
    }

    /// Render as three `rwx` triplets, one per role in [`Role::ALL`] order, e.g. `rwxr-x---`.
    pub fn triplets(&self) -> String {
        let mut res = String::with_capacity(9);
        for role in Role::ALL {
            res.push(if self.read.contains(&role) { 'r' } else { '-' });
            res.push(if self.write.contains(&role) { 'w' } else { '-' });
            res.push(if self.execute.contains(&role) { 'x' } else { '-' });
        }
        res
    }
}

pub fn can_read(node: &FileNode, role: Role) -> bool {
    node.permissions.read.contains(&role)
}

pub fn can_write(node: &FileNode, role: Role) -> bool {
    node.permissions.write.contains(&role)
}

/// For directories, whether the role may traverse into it.
pub fn can_execute(node: &FileNode, role: Role) -> bool {
    node.permissions.execute.contains(&role)
}
