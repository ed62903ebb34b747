use std::{net::Ipv4Addr, time::Duration};

use crate::network::{HostId, PortOwner};

/// Structured result of an async command, which the dispatcher turns into a session change or extra output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Followup {
    /// The SSH handshake finished; the user should be asked for `target_user`'s password.
    Ssh { target_user: String, target_ip: Ipv4Addr },
    /// Anonymous FTP login succeeded.
    Ftp { host: HostId },
    /// Connected to an interactive service, which hands out a shell as `owner`.
    Backdoor { host: HostId, owner: PortOwner },
    /// An HTTP exchange finished. The body has already been printed.
    Http { status: u16, body: String },
}

/// What should happen to an [`Agent`][super::Agent] after it's started or reacted.
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum ControlFlow {
    /// Call [`Agent::react`][super::Agent::react] again after this long.
    Sleep(Duration),
    /// Finish without any follow-up.
    Kill,
    /// Finish, handing this to whoever started the command.
    Resolve(Followup),
}

impl ControlFlow {
    pub fn sleep_for(amt: Duration) -> Self {
        Self::Sleep(amt)
    }

    pub fn sleep_ms(ms: u64) -> Self {
        Self::Sleep(Duration::from_millis(ms))
    }

    /// Whether an agent returning this is done.
    pub fn is_done(&self) -> bool {
        !matches!(self, Self::Sleep(_))
    }
}
