//! Building the simulation out of a TOML description: the hosts, their filesystems, DNS, and where the player starts.

use std::{
    collections::HashSet,
    fs,
    net::Ipv4Addr,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::{
    machine::{path::components, FileNode, Permissions, Role, Vfs},
    network::{DnsRecord, Host, HostId, HostRegistry, HttpConfig, LocalInterface, Port, RemoteUser},
};

/// The world shipped with the binary.
const BUILTIN: &str = include_str!("../assets/world.toml");

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("failed to read world file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid world file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("host id {0} is used more than once")]
    DuplicateHost(String),
    #[error("IP address {0} is used by more than one host")]
    DuplicateIp(Ipv4Addr),
    #[error("{host}: path {path} must be absolute")]
    RelativePath { host: String, path: String },
    #[error("{host}: {path} is both a file and a directory")]
    PathConflict { host: String, path: String },
    #[error("{0} refers to unknown host {1}")]
    UnknownHost(&'static str, String),
}

fn all_roles() -> Vec<Role> {
    Role::ALL.to_vec()
}

fn root_only() -> Vec<Role> {
    vec![Role::Root]
}

fn root_role() -> Role {
    Role::Root
}

#[derive(Deserialize)]
struct DirEntry {
    path: String,
    #[serde(default = "root_role")]
    owner: Role,
    #[serde(default = "all_roles")]
    read: Vec<Role>,
    #[serde(default = "root_only")]
    write: Vec<Role>,
    #[serde(default = "all_roles")]
    execute: Vec<Role>,
}

#[derive(Deserialize)]
struct FileEntry {
    path: String,
    #[serde(default = "root_role")]
    owner: Role,
    #[serde(default = "all_roles")]
    read: Vec<Role>,
    #[serde(default = "root_only")]
    write: Vec<Role>,
    #[serde(default)]
    execute: Vec<Role>,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct HostEntry {
    id: HostId,
    ip: Ipv4Addr,
    hostname: String,
    #[serde(default)]
    ports: Vec<Port>,
    #[serde(default)]
    users: Vec<RemoteUser>,
    #[serde(default)]
    http: HttpConfig,
    #[serde(default)]
    dirs: Vec<DirEntry>,
    #[serde(default)]
    files: Vec<FileEntry>,
}

#[derive(Deserialize)]
struct LocalEntry {
    host: HostId,
    gateway: Ipv4Addr,
    netmask: Ipv4Addr,
    mac: String,
}

/// Who the player is when there's no saved session to restore.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct StartPoint {
    pub host: HostId,
    pub username: String,
    pub role: Role,
}

#[derive(Deserialize)]
struct WorldFile {
    start: StartPoint,
    local: LocalEntry,
    #[serde(default)]
    dns: Vec<DnsRecord>,
    #[serde(default)]
    hosts: Vec<HostEntry>,
}

/// Everything that exists in the simulation, ready to be shared by every command.
#[derive(Debug)]
pub struct World {
    pub registry: HostRegistry,
    pub vfs: Vfs,
    pub start: StartPoint,
}

/// Put `leaf` at `comps` under `dir`, creating missing intermediate directories with default grants.
///
/// Re-declaring a directory replaces its metadata but keeps its children.
fn place(dir: &FileNode, comps: &[&str], mut leaf: FileNode) -> Option<FileNode> {
    match comps {
        [] => None,
        [name] => {
            if let Some(existing) = dir.child(name) {
                if existing.is_dir() != leaf.is_dir() {
                    return None;
                }
                if leaf.is_dir() {
                    leaf.entry = existing.entry.clone();
                }
            }
            dir.with_child(Arc::new(leaf))
        }
        [first, rest @ ..] => {
            let sub = match dir.child(first) {
                Some(existing) => (**existing).clone(),
                None => FileNode::dir(first, Role::Root, default_dir()),
            };
            let sub = place(&sub, rest, leaf)?;
            dir.with_child(Arc::new(sub))
        }
    }
}

fn default_dir() -> Permissions {
    Permissions::new(&Role::ALL, &[Role::Root], &Role::ALL)
}

fn absolute<'p>(host: &HostId, path: &'p str) -> Result<Vec<&'p str>, WorldError> {
    if path.starts_with('/') {
        Ok(components(path).collect())
    } else {
        Err(WorldError::RelativePath {
            host: host.to_string(),
            path: path.into(),
        })
    }
}

fn build_tree(host: &HostEntry) -> Result<FileNode, WorldError> {
    let mut root = FileNode::dir("", Role::Root, default_dir());
    let conflict = |path: &str| WorldError::PathConflict {
        host: host.id.to_string(),
        path: path.into(),
    };

    let mut dirs: Vec<_> = host.dirs.iter().collect();
    dirs.sort_by_key(|d| components(&d.path).count());
    for d in dirs {
        let comps = absolute(&host.id, &d.path)?;
        let Some(name) = comps.last() else {
            // re-declaring `/` just changes its grants
            root.permissions = Permissions::new(&d.read, &d.write, &d.execute);
            root.owner = d.owner;
            continue;
        };
        let node = FileNode::dir(name, d.owner, Permissions::new(&d.read, &d.write, &d.execute));
        root = place(&root, &comps, node).ok_or_else(|| conflict(&d.path))?;
    }
    for f in &host.files {
        let comps = absolute(&host.id, &f.path)?;
        let name = comps.last().ok_or_else(|| conflict(&f.path))?;
        let node = FileNode::file(name, f.owner, Permissions::new(&f.read, &f.write, &f.execute), &f.content);
        root = place(&root, &comps, node).ok_or_else(|| conflict(&f.path))?;
    }
    Ok(root)
}

impl World {
    pub fn from_toml(text: &str) -> Result<Self, WorldError> {
        let file: WorldFile = toml::from_str(text)?;

        let mut ids = HashSet::new();
        let mut ips = HashSet::new();
        let vfs = Vfs::new();
        let mut hosts = Vec::with_capacity(file.hosts.len());
        for entry in file.hosts {
            if !ids.insert(entry.id.clone()) {
                return Err(WorldError::DuplicateHost(entry.id.to_string()));
            }
            if !ips.insert(entry.ip) {
                return Err(WorldError::DuplicateIp(entry.ip));
            }
            vfs.mount(entry.id.clone(), build_tree(&entry)?);
            hosts.push(Host {
                id: entry.id,
                ip: entry.ip,
                hostname: entry.hostname,
                ports: entry.ports,
                users: entry.users,
                http: entry.http,
            });
        }

        let local_ip = hosts
            .iter()
            .find(|h| h.id == file.local.host)
            .map(|h| h.ip)
            .ok_or_else(|| WorldError::UnknownHost("local interface", file.local.host.to_string()))?;
        if !ids.contains(&file.start.host) {
            return Err(WorldError::UnknownHost("start", file.start.host.to_string()));
        }
        if let Some(record) = file.dns.iter().find(|r| !ips.contains(&r.ip)) {
            return Err(WorldError::UnknownHost("dns", format!("{} ({})", record.ip, record.domain)));
        }
        let local = LocalInterface {
            ip: local_ip,
            gateway: file.local.gateway,
            netmask: file.local.netmask,
            mac: file.local.mac,
        };

        info!(hosts = hosts.len(), dns = file.dns.len(), "world loaded");
        Ok(Self {
            registry: HostRegistry::new(hosts, file.dns, local),
            vfs,
            start: file.start,
        })
    }

    /// The world embedded in the binary.
    pub fn builtin() -> Result<Self, WorldError> {
        Self::from_toml(BUILTIN)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, WorldError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| WorldError::Io {
            path: path.into(),
            source,
        })?;
        Self::from_toml(&text)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SMALL: &str = r#"
        [start]
        host = "a"
        username = "user"
        role = "user"

        [local]
        host = "a"
        gateway = "10.0.0.1"
        netmask = "255.0.0.0"
        mac = "00:00:00:00:00:01"

        [[hosts]]
        id = "a"
        ip = "10.0.0.2"
        hostname = "alpha"

        [[hosts.files]]
        path = "/home/user/hello.txt"
        owner = "user"
        content = "hi"

        [[hosts.dirs]]
        path = "/home/user"
        owner = "user"
        read = ["user"]
        execute = ["user"]
    "#;

    #[test]
    fn builtin_world_loads() {
        let world = World::builtin().expect("built-in world is valid");
        assert_eq!(world.registry.hosts().len(), 5);
        assert_eq!(world.start.host, HostId::from("local"));
        for host in world.registry.hosts() {
            assert!(world.vfs.root(&host.id).is_some(), "{} has no filesystem", host.id);
        }
        assert_eq!(world.registry.local_interface().ip, Ipv4Addr::new(192, 168, 1, 100));
    }

    #[test]
    fn builtin_passwd_hidden_from_guests() {
        let world = World::builtin().expect("built-in world is valid");
        let passwd = world.vfs.node(&"webserver".into(), "/etc/passwd").expect("exists");
        assert!(!passwd.permissions.read.contains(&Role::Guest));
    }

    #[test]
    fn missing_parents_are_created() {
        let world = World::from_toml(SMALL).expect("valid");
        let host = HostId::from("a");
        assert_eq!(world.vfs.read_file(&host, "/home/user/hello.txt", Role::User), Ok("hi".into()));
        let home = world.vfs.node(&host, "/home").expect("created");
        assert!(home.is_dir());
        assert_eq!(home.owner, Role::Root);
    }

    #[test]
    fn declared_dirs_keep_children_and_grants() {
        let world = World::from_toml(SMALL).expect("valid");
        let dir = world.vfs.node(&"a".into(), "/home/user").expect("exists");
        assert_eq!(dir.owner, Role::User);
        assert_eq!(dir.permissions.read, vec![Role::User]);
        assert!(dir.child("hello.txt").is_some());
    }

    #[test]
    fn rejects_duplicate_ips() {
        let text = format!("{}\n[[hosts]]\nid = \"b\"\nip = \"10.0.0.2\"\nhostname = \"beta\"\n", SMALL);
        assert!(matches!(World::from_toml(&text), Err(WorldError::DuplicateIp(_))));
    }

    #[test]
    fn rejects_unknown_start_host() {
        let text = SMALL.replacen("host = \"a\"", "host = \"zz\"", 1);
        assert!(matches!(World::from_toml(&text), Err(WorldError::UnknownHost("start", _))));
    }

    #[test]
    fn rejects_dns_for_unknown_ip() {
        let ok = format!("{}\n[[dns]]\ndomain = \"alpha.lan\"\nip = \"10.0.0.2\"\n", SMALL);
        assert!(World::from_toml(&ok).is_ok());
        let text = format!("{}\n[[dns]]\ndomain = \"ghost.lan\"\nip = \"10.9.9.9\"\n", SMALL);
        assert!(matches!(World::from_toml(&text), Err(WorldError::UnknownHost("dns", _))));
    }

    #[test]
    fn rejects_relative_paths() {
        let text = SMALL.replace("/home/user/hello.txt", "home/hello.txt");
        assert!(matches!(World::from_toml(&text), Err(WorldError::RelativePath { .. })));
    }
}
