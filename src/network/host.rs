use std::{collections::BTreeMap, fmt, net::Ipv4Addr};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::machine::Role;

/// Stable identifier of a simulated host, shared by the registry, the filesystems and the sessions.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(String);

impl HostId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for HostId {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

impl From<String> for HostId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase hex SHA-256 of a password, the only form passwords are ever stored in.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Who you become when you connect to an interactive service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortOwner {
    pub username: String,
    pub role: Role,
    pub home: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub number: u16,
    pub service: String,
    #[serde(default = "default_open")]
    pub open: bool,
    /// What the service says when something connects to it.
    #[serde(default)]
    pub banner: Option<String>,
    /// If present, connecting drops you into a shell as this user instead of just reading a banner.
    #[serde(default)]
    pub owner: Option<PortOwner>,
}

fn default_open() -> bool {
    true
}

impl Port {
    pub fn is_interactive(&self) -> bool {
        self.owner.is_some()
    }

    /// The configured banner, or what a stock server for this service would greet you with.
    pub fn greeting(&self) -> Option<String> {
        if let Some(banner) = &self.banner {
            return Some(banner.clone());
        }
        let stock = match self.service.as_str() {
            "ftp" => "220 FTP server ready.",
            "ssh" => "SSH-2.0-OpenSSH_8.2p1 Ubuntu-4ubuntu0.5",
            "smtp" => "220 mail.local ESMTP Postfix",
            "http" | "https" => "HTTP/1.1 400 Bad Request",
            _ => return None,
        };
        Some(stock.into())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUser {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

impl RemoteUser {
    pub fn verify(&self, password: &str) -> bool {
        hash_password(password).eq_ignore_ascii_case(&self.password_hash)
    }
}

/// How a host's web server answers, for the ones which have one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Value of the `Server` header
    pub server: String,
    /// Directory the URL paths are resolved under
    pub root: String,
    /// Extra headers added to every response
    pub headers: BTreeMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            server: "Apache/2.4.41 (Ubuntu)".into(),
            root: "/var/www".into(),
            headers: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: HostId,
    pub ip: Ipv4Addr,
    pub hostname: String,
    #[serde(default)]
    pub ports: Vec<Port>,
    #[serde(default)]
    pub users: Vec<RemoteUser>,
    #[serde(default)]
    pub http: HttpConfig,
}

impl Host {
    pub fn port(&self, number: u16) -> Option<&Port> {
        self.ports.iter().find(|p| p.number == number)
    }

    /// The port if it exists and is open.
    pub fn open_port(&self, number: u16) -> Option<&Port> {
        self.port(number).filter(|p| p.open)
    }

    pub fn user(&self, username: &str) -> Option<&RemoteUser> {
        self.users.iter().find(|u| u.username == username)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub domain: String,
    pub ip: Ipv4Addr,
}

/// The machine the shell itself runs on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalInterface {
    pub ip: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub mac: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn password_hashes_are_sha256_hex() {
        assert_eq!(
            hash_password("password"),
            "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8"
        );
    }

    #[test]
    fn user_verifies_only_matching_password() {
        let user = RemoteUser {
            username: "admin".into(),
            password_hash: hash_password("hunter2"),
            role: Role::User,
        };
        assert!(user.verify("hunter2"));
        assert!(!user.verify("hunter3"));
        assert!(!user.verify(""));
    }

    #[test]
    fn closed_ports_arent_open() {
        let host = Host {
            id: "h".into(),
            ip: Ipv4Addr::new(10, 0, 0, 1),
            hostname: "h".into(),
            ports: vec![Port {
                number: 23,
                service: "telnet".into(),
                open: false,
                banner: None,
                owner: None,
            }],
            users: vec![],
            http: Default::default(),
        };
        assert!(host.port(23).is_some());
        assert!(host.open_port(23).is_none());
        assert!(host.port(22).is_none());
    }
}
