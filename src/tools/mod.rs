//! Contains all of the CLI tools, plus the common code and abstractions they share.

use std::{collections::BTreeMap, net::Ipv4Addr};

use lazy_static::lazy_static;

use crate::{
    agents::{AsyncOutput, Followup},
    app::CliState,
    error::ShellError,
    machine::Role,
    network::{Host, Port},
    session::{InteractiveKind, InteractivePrompt, Mode, PromptPurpose, Session, SubSession},
    world::World,
};

mod args;
pub use args::Args;

mod cat;
mod cd;
mod curl;
mod echo;
mod ftp;
mod ident;
mod ifconfig;
mod ls;
mod mkdir;
mod nc;
mod nmap;
mod nslookup;
mod ping;
mod shell;
mod ssh;
mod touch;

pub use shell::login;

/// Common interface for all CLI tools.
pub trait Tool: Send + Sync {
    /// The name of the tool, as used in its error messages.
    fn name(&self) -> &'static str;
    /// One-line synopsis for `help`.
    fn usage(&self) -> &'static str;
    /// Run the command. Errors are rendered by the caller; nothing here prints directly.
    fn run(&self, args: &[String], state: &CliState) -> Result<Outcome, ShellError>;
}

/// Something the shell itself has to do on a command's behalf.
#[derive(Debug)]
pub enum Signal {
    Clear,
    /// Change the working directory of the active identity.
    ChangeDir(String),
    /// Change the working directory on the local side of an FTP connection.
    ChangeLocalDir(String),
    /// Ask for `user`'s password before switching to them.
    PasswordPrompt { user: String },
    /// Suspend the current session and continue as this one.
    SwitchUser(Session),
    /// Open a shell on a remote machine.
    EnterShell(InteractivePrompt),
    /// Leave whatever's innermost: a remote connection, or the current suspended-on-top session.
    Exit,
}

/// What running a command produced.
pub enum Outcome {
    Text(String),
    Nothing,
    Signal(Signal),
    /// Show the text, then act on the signal.
    TextThen(String, Signal),
    Async(AsyncOutput),
}

/// The commands available in one mode, by the name they're invoked as.
pub struct Toolbox(BTreeMap<&'static str, Box<dyn Tool>>);

impl Toolbox {
    fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Register under the tool's own name.
    fn tool(self, tool: impl Tool + 'static) -> Self {
        let name = tool.name();
        self.alias(name, tool)
    }

    /// Register under some other name.
    fn alias(mut self, name: &'static str, tool: impl Tool + 'static) -> Self {
        self.0.insert(name, Box::new(tool));
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.0.get(name).map(|t| t.as_ref())
    }

    /// Every available command, alphabetically.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &dyn Tool)> + '_ {
        self.0.iter().map(|(&n, t)| (n, t.as_ref()))
    }
}

/// The filesystem and identity commands, shared by the local shell and SSH sessions.
fn basics() -> Toolbox {
    Toolbox::new()
        .tool(ls::Ls)
        .tool(cd::Cd)
        .tool(cd::Pwd)
        .tool(cat::Cat)
        .tool(cat::Strings)
        .tool(touch::Touch)
        .tool(mkdir::Mkdir)
        .tool(echo::Echo)
        .tool(ident::Whoami)
        .tool(ident::Id)
        .tool(ident::Hostname)
        .tool(shell::Help)
        .tool(shell::Clear)
        .tool(shell::Exit)
        .alias("logout", shell::Exit)
}

lazy_static! {
    static ref LOCAL: Toolbox = basics()
        .tool(shell::Su)
        .tool(ifconfig::Ifconfig)
        .tool(ping::Ping)
        .tool(nmap::Nmap)
        .tool(nslookup::Nslookup)
        .tool(ssh::Ssh)
        .tool(ftp::Ftp)
        .tool(nc::Nc)
        .tool(curl::Curl);
    static ref SSH: Toolbox = basics();
    static ref BACKDOOR: Toolbox = Toolbox::new()
        .tool(cat::Cat)
        .tool(cd::Cd)
        .tool(ls::Ls)
        .tool(shell::Exit);
    static ref FTP: Toolbox = Toolbox::new()
        .tool(ls::Ls)
        .alias("dir", ls::Ls)
        .tool(cd::Cd)
        .tool(ftp::Get)
        .tool(ftp::Put)
        .tool(ftp::Lls)
        .tool(ftp::Lcd)
        .tool(ftp::Lpwd)
        .alias("pwd", ftp::RemotePwd)
        .tool(shell::Help)
        .tool(ftp::Quit)
        .alias("bye", ftp::Quit);
    static ref NONE: Toolbox = Toolbox::new();
}

/// The commands on offer in `mode`. The password prompt doesn't take commands at all.
pub fn toolbox(mode: Mode) -> &'static Toolbox {
    match mode {
        Mode::Local => &LOCAL,
        Mode::Ssh => &SSH,
        Mode::Backdoor => &BACKDOOR,
        Mode::Ftp => &FTP,
        Mode::Password => &NONE,
    }
}

/// Turn the result of a finished async command into the sub-session it leads to, if any.
pub fn followup_session(followup: Followup, state: &CliState) -> Option<SubSession> {
    match followup {
        Followup::Ssh { target_user, target_ip } => {
            let host = state.registry().get_host(target_ip)?;
            Some(SubSession::PasswordPrompt {
                target_username: target_user,
                purpose: PromptPurpose::Ssh { host: host.id.clone() },
            })
        }
        Followup::Ftp { host } => Some(SubSession::Ftp(crate::session::FtpSession {
            remote_host: host,
            remote_cwd: "/".into(),
            remote_role: Role::Guest,
            origin_host: state.identity.host.clone(),
            origin_cwd: state.identity.cwd.clone(),
            origin_role: state.identity.role,
        })),
        Followup::Backdoor { host, owner } => Some(SubSession::Interactive(InteractivePrompt {
            kind: InteractiveKind::Backdoor,
            host,
            user: owner.username,
            role: owner.role,
            cwd: owner.home.clone(),
            home: owner.home,
        })),
        Followup::Http { .. } => None,
    }
}

/// Open a simulated TCP connection: nobody home times out, a missing or closed port is refused.
fn connect<'w>(
    world: &'w World,
    cmd: &'static str,
    ip: Ipv4Addr,
    port: u16,
) -> Result<(&'w Host, &'w Port), ShellError> {
    let host = world.registry.get_host(ip).ok_or_else(|| ShellError::ConnectionTimedOut {
        cmd,
        host: ip.to_string(),
        port,
    })?;
    let open = host.open_port(port).ok_or_else(|| ShellError::ConnectionRefused {
        cmd,
        host: ip.to_string(),
        port,
    })?;
    Ok((host, open))
}

/// The first positional argument, or a usage error.
fn required<'a>(args: &'a Args, tool: &dyn Tool) -> Result<&'a str, ShellError> {
    args.positional()
        .first()
        .map(|s| s.as_str())
        .ok_or_else(|| ShellError::usage(tool.name(), tool.usage()))
}
