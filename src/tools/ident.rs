//! Commands that say who and where you are.

use crate::{app::CliState, error::ShellError, machine::Role};

use super::{Outcome, Tool};

pub struct Whoami;

impl Tool for Whoami {
    fn name(&self) -> &'static str {
        "whoami"
    }

    fn usage(&self) -> &'static str {
        "whoami"
    }

    fn run(&self, _args: &[String], state: &CliState) -> Result<Outcome, ShellError> {
        Ok(Outcome::Text(state.identity.username.clone()))
    }
}

fn uid(role: Role) -> u32 {
    match role {
        Role::Root => 0,
        Role::User => 1000,
        Role::Guest => 65534,
    }
}

pub struct Id;

impl Tool for Id {
    fn name(&self) -> &'static str {
        "id"
    }

    fn usage(&self) -> &'static str {
        "id"
    }

    fn run(&self, _args: &[String], state: &CliState) -> Result<Outcome, ShellError> {
        let id = &state.identity;
        let n = uid(id.role);
        Ok(Outcome::Text(format!(
            "uid={n}({user}) gid={n}({user}) groups={n}({role})",
            n = n,
            user = id.username,
            role = id.role,
        )))
    }
}

pub struct Hostname;

impl Tool for Hostname {
    fn name(&self) -> &'static str {
        "hostname"
    }

    fn usage(&self) -> &'static str {
        "hostname"
    }

    fn run(&self, _args: &[String], state: &CliState) -> Result<Outcome, ShellError> {
        let host = &state.identity.host;
        let name = state
            .registry()
            .host(host)
            .map(|h| h.hostname.clone())
            .unwrap_or_else(|| host.to_string());
        Ok(Outcome::Text(name))
    }
}
