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
    Banner,
}

/// A raw TCP connection. Services with an owner hand out a shell; anything else just says hello and hangs up.
struct NetCat {
    world: Arc<World>,
    ip: Ipv4Addr,
    port: u16,
    latency: Latency,
    stage: Stage,
}

impl Agent for NetCat {
    fn start(&mut self, replies: &mut Replies) -> ControlFlow {
        replies.output(format!("Connecting to {} port {}...", self.ip, self.port));
        ControlFlow::sleep_for(self.latency.connect())
    }

    fn react(&mut self, replies: &mut Replies) -> ControlFlow {
        let (host, port) = match connect(&self.world, "nc", self.ip, self.port) {
            Ok(conn) => conn,
            Err(e) => {
                replies.error(e.to_string());
                return ControlFlow::Kill;
            }
        };
        if let Stage::Connecting = self.stage {
            replies.output(format!("Connected to {} port {}.", self.ip, self.port));
            self.stage = Stage::Banner;
            return ControlFlow::sleep_for(self.latency.handshake());
        }
        if let Some(owner) = &port.owner {
            if let Some(banner) = &port.banner {
                replies.block(banner);
            }
            return ControlFlow::Resolve(Followup::Backdoor {
                host: host.id.clone(),
                owner: owner.clone(),
            });
        }
        if let Some(greeting) = port.greeting() {
            replies.block(&greeting);
        }
        replies.output("Connection closed.");
        ControlFlow::Kill
    }
}

/// `nc [-v] <host> <port>`
pub struct Nc;

impl Tool for Nc {
    fn name(&self) -> &'static str {
        "nc"
    }

    fn usage(&self) -> &'static str {
        "nc [-v] <host> <port>"
    }

    fn run(&self, raw: &[String], state: &CliState) -> Result<Outcome, ShellError> {
        let args = Args::parse("nc", raw, "vn", "")?;
        let [target, port] = args.positional() else {
            return Err(ShellError::usage("nc", self.usage()));
        };
        let port = port
            .parse::<u16>()
            .ok()
            .filter(|&p| p != 0)
            .ok_or_else(|| ShellError::invalid("nc", format!("port number invalid: {}", port)))?;
        let ip = state.registry().lookup(target).ok_or_else(|| ShellError::NameResolution {
            cmd: "nc",
            name: target.clone(),
        })?;
        Ok(state.spawn(NetCat {
            world: state.world.clone(),
            ip,
            port,
            latency: state.latency,
            stage: Stage::Connecting,
        }))
    }
}
