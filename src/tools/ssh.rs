use std::{net::Ipv4Addr, sync::Arc};

use crate::{
    agents::{Agent, ControlFlow, Followup, Replies},
    app::CliState,
    config::Latency,
    error::ShellError,
    world::World,
};

use super::{connect, Args, Outcome, Tool};

enum Stage {
    Connecting,
    Handshake,
}

/// Opens the connection and exchanges keys. The password is asked for by the shell once this resolves.
struct SshConnect {
    world: Arc<World>,
    user: String,
    ip: Ipv4Addr,
    port: u16,
    latency: Latency,
    stage: Stage,
}

impl Agent for SshConnect {
    fn start(&mut self, _replies: &mut Replies) -> ControlFlow {
        ControlFlow::sleep_for(self.latency.connect())
    }

    fn react(&mut self, replies: &mut Replies) -> ControlFlow {
        match self.stage {
            Stage::Connecting => match connect(&self.world, "ssh", self.ip, self.port) {
                Err(e) => {
                    replies.error(e.to_string());
                    ControlFlow::Kill
                }
                Ok((_, port)) if port.service != "ssh" => {
                    replies.error("kex_exchange_identification: Connection closed by remote host");
                    ControlFlow::Kill
                }
                Ok(_) => {
                    self.stage = Stage::Handshake;
                    ControlFlow::sleep_for(self.latency.handshake())
                }
            },
            Stage::Handshake => ControlFlow::Resolve(Followup::Ssh {
                target_user: self.user.clone(),
                target_ip: self.ip,
            }),
        }
    }
}

/// `ssh [user@]host`, `ssh user host`, or `ssh -l user host`. Defaults to logging in under your current name.
pub struct Ssh;

impl Tool for Ssh {
    fn name(&self) -> &'static str {
        "ssh"
    }

    fn usage(&self) -> &'static str {
        "ssh [-p port] [-l user] [user@]host"
    }

    fn run(&self, raw: &[String], state: &CliState) -> Result<Outcome, ShellError> {
        let args = Args::parse("ssh", raw, "", "lp")?;
        let (user, target) = match args.positional() {
            [dest] => match dest.split_once('@') {
                Some((user, host)) => (user, host),
                None => (args.value('l').unwrap_or(state.identity.username.as_str()), dest.as_str()),
            },
            [user, host] => (user.as_str(), host.as_str()),
            _ => return Err(ShellError::usage("ssh", self.usage())),
        };
        if user.is_empty() || target.is_empty() {
            return Err(ShellError::usage("ssh", self.usage()));
        }
        let port = match args.value('p') {
            None => 22,
            Some(p) => p
                .parse()
                .map_err(|_| ShellError::invalid("ssh", format!("Bad port '{}'", p)))?,
        };
        let ip = state.registry().lookup(target).ok_or_else(|| ShellError::NameResolution {
            cmd: "ssh",
            name: target.into(),
        })?;
        Ok(state.spawn(SshConnect {
            world: state.world.clone(),
            user: user.into(),
            ip,
            port,
            latency: state.latency,
            stage: Stage::Connecting,
        }))
    }
}
