use std::net::Ipv4Addr;

use crate::{app::CliState, error::ShellError};

use super::{Args, Outcome, Tool};

fn eth0(state: &CliState) -> String {
    let local = state.registry().local_interface();
    let broadcast = Ipv4Addr::from(u32::from(local.ip) | !u32::from(local.netmask));
    format!(
        "eth0: flags=4163<UP,BROADCAST,RUNNING,MULTICAST>  mtu 1500\n\
         \x20       inet {}  netmask {}  broadcast {}\n\
         \x20       ether {}  txqueuelen 1000  (Ethernet)\n\
         \x20       gateway {}\n",
        local.ip, local.netmask, broadcast, local.mac, local.gateway
    )
}

const LO: &str = "lo: flags=73<UP,LOOPBACK,RUNNING>  mtu 65536
        inet 127.0.0.1  netmask 255.0.0.0
        loop  txqueuelen 1000  (Local Loopback)
";

pub struct Ifconfig;

impl Tool for Ifconfig {
    fn name(&self) -> &'static str {
        "ifconfig"
    }

    fn usage(&self) -> &'static str {
        "ifconfig [interface]"
    }

    fn run(&self, raw: &[String], state: &CliState) -> Result<Outcome, ShellError> {
        let args = Args::parse("ifconfig", raw, "a", "")?;
        let text = match args.positional().first().map(|s| s.as_str()) {
            None => format!("{}\n{}", eth0(state), LO),
            Some("eth0") => eth0(state),
            Some("lo") => LO.to_string(),
            Some(other) => {
                return Err(ShellError::invalid(
                    "ifconfig",
                    format!("{}: error fetching interface information: Device not found", other),
                ))
            }
        };
        Ok(Outcome::Text(text))
    }
}
