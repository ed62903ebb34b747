use std::{net::Ipv4Addr, sync::Arc, time::Duration};

use chrono::Utc;

use crate::{
    agents::{Agent, ControlFlow, Replies},
    app::CliState,
    error::ShellError,
    network::Host,
    world::World,
};

use super::{required, Args, Outcome, Tool};

/// What to scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scope {
    Single(Ipv4Addr),
    /// Every address sharing the first `prefix` bits.
    Subnet(Ipv4Addr, u32),
}

impl Scope {
    fn size(&self) -> u64 {
        match self {
            Self::Single(_) => 1,
            Self::Subnet(_, prefix) => 1u64 << (32 - prefix),
        }
    }

    fn contains(&self, ip: Ipv4Addr) -> bool {
        match *self {
            Self::Single(addr) => addr == ip,
            Self::Subnet(base, prefix) => {
                let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
                u32::from(base) & mask == u32::from(ip) & mask
            }
        }
    }
}

fn parse_scope(target: &str, state: &CliState) -> Result<Scope, ShellError> {
    let bad = || ShellError::invalid("nmap", format!("Failed to resolve \"{}\".", target));
    if let Some((addr, prefix)) = target.split_once('/') {
        let addr = addr.parse().map_err(|_| bad())?;
        let prefix: u32 = prefix.parse().map_err(|_| bad())?;
        // anything bigger than a /16 would take real nmap hours
        if !(16..=32).contains(&prefix) {
            return Err(ShellError::invalid("nmap", format!("Illegal netmask in \"{}\".", target)));
        }
        return Ok(if prefix == 32 {
            Scope::Single(addr)
        } else {
            Scope::Subnet(addr, prefix)
        });
    }
    state.registry().lookup(target).map(Scope::Single).ok_or_else(bad)
}

fn parse_ports(list: &str) -> Result<Vec<u16>, ShellError> {
    let mut ports = vec![];
    for part in list.split(',') {
        let bad = || ShellError::invalid("nmap", format!("Error #485: Your port specifications are illegal: {}", list));
        match part.split_once('-') {
            Some((lo, hi)) => {
                let (lo, hi): (u16, u16) = (lo.parse().map_err(|_| bad())?, hi.parse().map_err(|_| bad())?);
                if lo > hi {
                    return Err(bad());
                }
                ports.extend(lo..=hi);
            }
            None => ports.push(part.parse().map_err(|_| bad())?),
        }
    }
    ports.sort_unstable();
    ports.dedup();
    Ok(ports)
}

struct Scanner {
    world: Arc<World>,
    scope: Scope,
    ports: Option<Vec<u16>>,
    duration: Duration,
}

impl Scanner {
    fn report(&self, host: &Host, replies: &mut Replies) {
        replies.output(format!("Nmap scan report for {} ({})", host.hostname, host.ip));
        replies.output("Host is up (0.00042s latency).");
        let mut rows: Vec<(u16, &str, &str)> = match &self.ports {
            Some(wanted) => wanted
                .iter()
                .map(|&n| match host.port(n) {
                    Some(p) => (n, if p.open { "open" } else { "closed" }, p.service.as_str()),
                    None => (n, "closed", "unknown"),
                })
                .collect(),
            None => host
                .ports
                .iter()
                .map(|p| (p.number, if p.open { "open" } else { "closed" }, p.service.as_str()))
                .collect(),
        };
        rows.sort_by_key(|r| r.0);
        if rows.iter().all(|r| r.1 == "closed") && self.ports.is_none() {
            replies.output(format!("All 1000 scanned ports on {} are closed", host.ip));
        } else {
            replies.output("PORT      STATE  SERVICE");
            for (n, st, service) in rows {
                replies.output(format!("{:<9} {:<6} {}", format!("{}/tcp", n), st, service));
            }
        }
        replies.output("");
    }
}

impl Agent for Scanner {
    fn start(&mut self, replies: &mut Replies) -> ControlFlow {
        replies.output(format!(
            "Starting Nmap 7.80 ( https://nmap.org ) at {}",
            Utc::now().format("%Y-%m-%d %H:%M UTC")
        ));
        ControlFlow::sleep_for(self.duration)
    }

    fn react(&mut self, replies: &mut Replies) -> ControlFlow {
        let mut live: Vec<&Host> = self
            .world
            .registry
            .hosts()
            .iter()
            .filter(|h| self.scope.contains(h.ip))
            .collect();
        live.sort_by_key(|h| h.ip);
        for host in &live {
            self.report(host, replies);
        }
        if live.is_empty() && matches!(self.scope, Scope::Single(_)) {
            replies.error("Note: Host seems down. If it is really up, but blocking our ping probes, try -Pn");
        }
        let size = self.scope.size();
        replies.output(format!(
            "Nmap done: {} IP address{} ({} host{} up) scanned in {:.2} seconds",
            size,
            if size == 1 { "" } else { "es" },
            live.len(),
            if live.len() == 1 { "" } else { "s" },
            self.duration.as_secs_f64()
        ));
        ControlFlow::Kill
    }
}

/// `nmap [-p ports] <host|a.b.c.d/prefix>`: a TCP port scan. Results reflect the world as of when the scan finishes.
pub struct Nmap;

impl Tool for Nmap {
    fn name(&self) -> &'static str {
        "nmap"
    }

    fn usage(&self) -> &'static str {
        "nmap [-p ports] <host|subnet/prefix>"
    }

    fn run(&self, raw: &[String], state: &CliState) -> Result<Outcome, ShellError> {
        let args = Args::parse("nmap", raw, "", "p")?;
        let target = required(&args, self)?;
        let scope = parse_scope(target, state)?;
        let ports = args.value('p').map(parse_ports).transpose()?;
        Ok(state.spawn(Scanner {
            world: state.world.clone(),
            scope,
            ports,
            duration: state.latency.scan(),
        }))
    }
}

#[cfg(test)]
mod test {
    use crate::{
        machine::Role,
        tools::testing::{args, drive, error, local},
    };

    use super::*;

    const TICK: Duration = Duration::from_millis(500);

    #[test]
    fn cancelled_mid_scan() {
        let state = local(Role::User);
        let out = match Nmap.run(&args(&["192.168.1.1"]), &state) {
            Ok(Outcome::Async(out)) => out,
            _ => panic!("nmap should be async"),
        };
        let (tx, rx) = crossbeam::channel::unbounded();
        let tx2 = tx.clone();
        let running = out.start(
            move |l| tx.send(Some(l.text)).expect("open"),
            move |_| tx2.send(None).expect("open"),
        );
        running.cancel();
        assert_eq!(state.sched.pending(), 0);
        mock_instant::MockClock::advance(Duration::from_secs(10));
        state.sched.run_due();
        let seen: Vec<_> = rx.try_iter().collect();
        assert_eq!(seen.len(), 1);
        assert!(matches!(&seen[0], Some(t) if t.starts_with("Starting Nmap 7.80")));
    }

    #[test]
    fn scans_single_host() {
        let state = local(Role::User);
        let done = drive(&Nmap, &["192.168.1.1"], &state, TICK);
        let texts = done.texts();
        assert!(texts[0].starts_with("Starting Nmap 7.80 ( https://nmap.org ) at "));
        assert_eq!(texts[1], "Nmap scan report for router (192.168.1.1)");
        assert!(texts.contains(&"PORT      STATE  SERVICE"));
        assert!(texts.iter().any(|t| t.starts_with("23/tcp") && t.contains("closed")));
        assert!(texts.iter().any(|t| t.starts_with("80/tcp") && t.contains("open")));
        assert_eq!(
            texts.last().copied(),
            Some("Nmap done: 1 IP address (1 host up) scanned in 2.00 seconds")
        );
        assert_eq!(done.steps, 4);
    }

    #[test]
    fn absent_host_is_down() {
        let state = local(Role::User);
        let done = drive(&Nmap, &["192.168.1.99"], &state, TICK);
        assert!(done.lines.iter().any(|l| l.is_error()));
        assert!(done.texts().last().map_or(false, |l| l.contains("(0 hosts up)")));
    }

    #[test]
    fn subnet_finds_every_host() {
        let state = local(Role::User);
        let done = drive(&Nmap, &["192.168.1.0/24"], &state, TICK);
        let reports = done.texts().iter().filter(|t| t.starts_with("Nmap scan report")).count();
        assert_eq!(reports, 4);
        assert!(done.texts().last().map_or(false, |l| l.contains("256 IP addresses (4 hosts up)")));
    }

    #[test]
    fn port_list_limits_rows() {
        let state = local(Role::User);
        let done = drive(&Nmap, &["-p", "22,25", "192.168.1.50"], &state, TICK);
        let texts = done.texts();
        assert!(texts.iter().any(|t| t.starts_with("22/tcp") && t.contains("open") && t.ends_with("ssh")));
        assert!(texts.iter().any(|t| t.starts_with("25/tcp") && t.contains("closed")));
        assert!(!texts.iter().any(|t| t.starts_with("80/tcp")));
    }

    #[test]
    fn bad_targets() {
        let state = local(Role::User);
        assert_eq!(error(&Nmap, &["nowhere"], &state), "nmap: Failed to resolve \"nowhere\".");
        assert!(error(&Nmap, &["10.0.0.0/8"], &state).contains("Illegal netmask"));
        assert!(error(&Nmap, &["-p", "x", "10.0.0.5"], &state).contains("port specifications"));
    }
}
