//! The simulated network: which machines exist, what they listen on, who can log in, and what names point where.
//!
//! Everything here is fixed once the world is loaded.

mod host;

use std::{collections::HashMap, net::Ipv4Addr};

pub use host::{hash_password, DnsRecord, Host, HostId, HttpConfig, LocalInterface, Port, PortOwner, RemoteUser};

#[derive(Debug)]
pub struct HostRegistry {
    hosts: Vec<Host>,
    by_ip: HashMap<Ipv4Addr, usize>,
    by_id: HashMap<HostId, usize>,
    dns: Vec<DnsRecord>,
    local: LocalInterface,
}

impl HostRegistry {
    /// Build the registry. Callers are expected to have checked for duplicate IPs and IDs; later duplicates shadow
    /// earlier ones.
    pub fn new(hosts: Vec<Host>, dns: Vec<DnsRecord>, local: LocalInterface) -> Self {
        let by_ip = hosts.iter().enumerate().map(|(i, h)| (h.ip, i)).collect();
        let by_id = hosts.iter().enumerate().map(|(i, h)| (h.id.clone(), i)).collect();
        Self {
            hosts,
            by_ip,
            by_id,
            dns,
            local,
        }
    }

    pub fn get_host(&self, ip: Ipv4Addr) -> Option<&Host> {
        self.by_ip.get(&ip).map(|&i| &self.hosts[i])
    }

    pub fn host(&self, id: &HostId) -> Option<&Host> {
        self.by_id.get(id).map(|&i| &self.hosts[i])
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    /// Case-insensitive; a trailing `.` (fully-qualified form) is ignored.
    pub fn resolve_domain(&self, name: &str) -> Option<&DnsRecord> {
        let name = name.strip_suffix('.').unwrap_or(name);
        self.dns.iter().find(|r| r.domain.eq_ignore_ascii_case(name))
    }

    pub fn local_interface(&self) -> &LocalInterface {
        &self.local
    }

    /// Turn whatever the user typed as a destination into an address: an IPv4 literal, a DNS name, or a hostname.
    ///
    /// Addresses are returned even if nothing lives there, so commands can time out on them realistically.
    pub fn lookup(&self, target: &str) -> Option<Ipv4Addr> {
        if let Ok(ip) = target.parse() {
            return Some(ip);
        }
        if let Some(record) = self.resolve_domain(target) {
            return Some(record.ip);
        }
        self.hosts
            .iter()
            .find(|h| h.hostname.eq_ignore_ascii_case(target))
            .map(|h| h.ip)
    }
}
