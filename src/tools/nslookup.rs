use std::net::Ipv4Addr;

use crate::{app::CliState, error::ShellError};

use super::{required, Args, Outcome, Tool};

/// `in-addr.arpa` name for a reverse lookup.
fn arpa(ip: Ipv4Addr) -> String {
    let [a, b, c, d] = ip.octets();
    format!("{}.{}.{}.{}.in-addr.arpa", d, c, b, a)
}

/// DNS queries against the gateway's resolver. Answers come straight from the world's records, with no delay.
pub struct Nslookup;

impl Tool for Nslookup {
    fn name(&self) -> &'static str {
        "nslookup"
    }

    fn usage(&self) -> &'static str {
        "nslookup <name|address>"
    }

    fn run(&self, raw: &[String], state: &CliState) -> Result<Outcome, ShellError> {
        let args = Args::parse("nslookup", raw, "", "")?;
        let name = required(&args, self)?;
        let registry = state.registry();
        let server = registry.local_interface().gateway;
        let mut out = format!("Server:\t\t{}\nAddress:\t{}#53\n\n", server, server);
        let miss = || ShellError::NameResolution {
            cmd: "nslookup",
            name: name.into(),
        };
        if let Ok(ip) = name.parse::<Ipv4Addr>() {
            let record = registry.hosts().iter().find(|h| h.ip == ip).ok_or_else(miss)?;
            out.push_str(&format!("{}\tname = {}.\n", arpa(ip), record.hostname));
        } else {
            let record = registry.resolve_domain(name).ok_or_else(miss)?;
            out.push_str(&format!(
                "Non-authoritative answer:\nName:\t{}\nAddress: {}\n",
                record.domain, record.ip
            ));
        }
        Ok(Outcome::Text(out))
    }
}
