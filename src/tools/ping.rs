use std::{net::Ipv4Addr, sync::Arc, time::Duration};

use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::{
    agents::{Agent, ControlFlow, Replies},
    app::CliState,
    error::ShellError,
    world::World,
};

use super::{required, Args, Outcome, Tool};

const DEFAULT_COUNT: u32 = 4;
const MAX_COUNT: u32 = 100;

struct Pinger {
    world: Arc<World>,
    target: String,
    ip: Ipv4Addr,
    count: u32,
    interval: Duration,
    seq: u32,
    times: Vec<f64>,
    rng: SmallRng,
}

impl Pinger {
    fn alive(&self) -> bool {
        self.ip.is_loopback() || self.world.registry.get_host(self.ip).is_some()
    }

    /// Round-trip time in ms; anything off the local subnet takes a hop through the gateway.
    fn rtt(&mut self) -> f64 {
        let local = self.world.registry.local_interface();
        let mask = u32::from(local.netmask);
        let base = if self.ip.is_loopback() {
            0.02
        } else if u32::from(self.ip) & mask == u32::from(local.ip) & mask {
            0.3
        } else {
            12.0
        };
        base + self.rng.gen_range(0.0..base * 2.0)
    }

    fn summary(&self, replies: &mut Replies) {
        let received = self.times.len() as u32;
        let loss = (self.count - received) * 100 / self.count;
        let elapsed = self.interval.as_millis() * u128::from(self.count - 1);
        replies.output("");
        replies.output(format!("--- {} ping statistics ---", self.target));
        replies.output(format!(
            "{} packets transmitted, {} received, {}% packet loss, time {}ms",
            self.count, received, loss, elapsed
        ));
        if self.times.is_empty() {
            return;
        }
        let min = self.times.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.times.iter().copied().fold(0.0, f64::max);
        let avg = self.times.iter().sum::<f64>() / self.times.len() as f64;
        let var = self.times.iter().map(|t| (t - avg).powi(2)).sum::<f64>() / self.times.len() as f64;
        replies.output(format!(
            "rtt min/avg/max/mdev = {:.3}/{:.3}/{:.3}/{:.3} ms",
            min,
            avg,
            max,
            var.sqrt()
        ));
    }
}

impl Agent for Pinger {
    fn start(&mut self, replies: &mut Replies) -> ControlFlow {
        replies.output(format!("PING {} ({}) 56(84) bytes of data.", self.target, self.ip));
        ControlFlow::sleep_for(self.interval)
    }

    fn react(&mut self, replies: &mut Replies) -> ControlFlow {
        self.seq += 1;
        if self.alive() {
            let time = self.rtt();
            self.times.push(time);
            replies.output(format!(
                "64 bytes from {}: icmp_seq={} ttl=64 time={:.3} ms",
                self.ip, self.seq, time
            ));
        } else {
            let local = self.world.registry.local_interface().ip;
            replies.error(format!("From {} icmp_seq={} Destination Host Unreachable", local, self.seq));
        }
        if self.seq < self.count {
            return ControlFlow::sleep_for(self.interval);
        }
        self.summary(replies);
        ControlFlow::Kill
    }
}

/// `ping <host> [count]`, or `ping -c <count> <host>`.
pub struct Ping;

impl Tool for Ping {
    fn name(&self) -> &'static str {
        "ping"
    }

    fn usage(&self) -> &'static str {
        "ping [-c count] <host> [count]"
    }

    fn run(&self, raw: &[String], state: &CliState) -> Result<Outcome, ShellError> {
        let args = Args::parse("ping", raw, "", "c")?;
        let target = required(&args, self)?;
        let count = match args.value('c').or_else(|| args.positional().get(1).map(|s| s.as_str())) {
            None => DEFAULT_COUNT,
            Some(c) => c
                .parse::<u32>()
                .ok()
                .filter(|c| (1..=MAX_COUNT).contains(c))
                .ok_or_else(|| ShellError::invalid("ping", format!("invalid count of packets to transmit: '{}'", c)))?,
        };
        let ip = state.registry().lookup(target).ok_or_else(|| ShellError::NameResolution {
            cmd: "ping",
            name: target.into(),
        })?;
        Ok(state.spawn(Pinger {
            world: state.world.clone(),
            target: target.into(),
            ip,
            count,
            interval: state.latency.ping_interval(),
            seq: 0,
            times: vec![],
            rng: SmallRng::from_entropy(),
        }))
    }
}

#[cfg(test)]
mod test {
    use crate::{
        machine::Role,
        tools::testing::{drive, error, local},
    };

    use super::*;

    const TICK: Duration = Duration::from_millis(1000);

    #[test]
    fn pings_live_host() {
        let state = local(Role::User);
        let done = drive(&Ping, &["192.168.1.50", "2"], &state, TICK);
        assert_eq!(done.followup, Some(None));
        let texts = done.texts();
        assert_eq!(texts[0], "PING 192.168.1.50 (192.168.1.50) 56(84) bytes of data.");
        assert!(texts[1].starts_with("64 bytes from 192.168.1.50: icmp_seq=1 ttl=64 time="));
        assert!(texts[2].starts_with("64 bytes from 192.168.1.50: icmp_seq=2 ttl=64 time="));
        assert!(texts.contains(&"2 packets transmitted, 2 received, 0% packet loss, time 1000ms"));
        assert!(texts.last().map_or(false, |l| l.starts_with("rtt min/avg/max/mdev = ")));
        assert_eq!(done.steps, 2);
    }

    #[test]
    fn unreachable_host_loses_everything() {
        let state = local(Role::User);
        let done = drive(&Ping, &["-c", "3", "192.168.1.99"], &state, TICK);
        let unreachable = done.lines.iter().filter(|l| l.is_error()).count();
        assert_eq!(unreachable, 3);
        assert_eq!(done.lines[1].text, "From 192.168.1.100 icmp_seq=1 Destination Host Unreachable");
        assert!(done
            .texts()
            .contains(&"3 packets transmitted, 0 received, 100% packet loss, time 2000ms"));
    }

    #[test]
    fn resolves_names_before_starting() {
        let state = local(Role::User);
        let done = drive(&Ping, &["-c1", "www.megacorp.local"], &state, TICK);
        assert_eq!(done.texts()[0], "PING www.megacorp.local (192.168.1.50) 56(84) bytes of data.");
        assert_eq!(
            error(&Ping, &["nowhere.example"], &state),
            "ping: nowhere.example: Name or service not known"
        );
        assert_eq!(
            error(&Ping, &["-c", "0", "10.0.0.5"], &state),
            "ping: invalid count of packets to transmit: '0'"
        );
    }
}
