//! The FTP client: connecting, and the commands available once logged in.
//!
//! While connected there are two working contexts. Plain commands (`ls`, `cd`, `pwd`) act on the server as the
//! anonymous user; the `l`-prefixed ones act on the machine the connection was made from, as whoever made it.

use std::{net::Ipv4Addr, sync::Arc};

use crate::{
    agents::{Agent, ControlFlow, Followup, Replies},
    app::CliState,
    config::Latency,
    error::ShellError,
    machine::{FsError, Role},
    network::HostId,
    session::FtpSession,
    world::World,
};

use super::{connect, required, Args, Outcome, Signal, Tool};

const FTP_PORT: u16 = 21;

enum Stage {
    Connecting,
    Login(HostId),
}

struct FtpConnect {
    world: Arc<World>,
    ip: Ipv4Addr,
    user: String,
    latency: Latency,
    stage: Stage,
}

impl Agent for FtpConnect {
    fn start(&mut self, _replies: &mut Replies) -> ControlFlow {
        ControlFlow::sleep_for(self.latency.connect())
    }

    fn react(&mut self, replies: &mut Replies) -> ControlFlow {
        match &self.stage {
            Stage::Connecting => match connect(&self.world, "ftp", self.ip, FTP_PORT) {
                Err(e) => {
                    replies.error(e.to_string());
                    ControlFlow::Kill
                }
                Ok((host, port)) => {
                    replies.output(format!("Connected to {}.", self.ip));
                    if let Some(greeting) = port.greeting() {
                        replies.block(&greeting);
                    }
                    self.stage = Stage::Login(host.id.clone());
                    ControlFlow::sleep_for(self.latency.login())
                }
            },
            Stage::Login(host) => {
                replies.output(format!("Name ({}:{}): anonymous", self.ip, self.user));
                replies.output("331 Please specify the password.");
                replies.output("230 Login successful.");
                replies.output("Remote system type is UNIX.");
                replies.output("Using binary mode to transfer files.");
                ControlFlow::Resolve(Followup::Ftp { host: host.clone() })
            }
        }
    }
}

/// `ftp <host>`: log in anonymously and switch to the FTP command set.
pub struct Ftp;

impl Tool for Ftp {
    fn name(&self) -> &'static str {
        "ftp"
    }

    fn usage(&self) -> &'static str {
        "ftp <host>"
    }

    fn run(&self, raw: &[String], state: &CliState) -> Result<Outcome, ShellError> {
        let args = Args::parse("ftp", raw, "", "")?;
        let target = required(&args, self)?;
        let ip = state.registry().lookup(target).ok_or_else(|| ShellError::NameResolution {
            cmd: "ftp",
            name: target.into(),
        })?;
        Ok(state.spawn(FtpConnect {
            world: state.world.clone(),
            ip,
            user: state.identity.username.clone(),
            latency: state.latency,
            stage: Stage::Connecting,
        }))
    }
}

fn session<'s>(cmd: &'static str, state: &'s CliState) -> Result<&'s FtpSession, ShellError> {
    state.ftp.as_ref().ok_or_else(|| ShellError::invalid(cmd, "not connected."))
}

fn basename(path: &str) -> &str {
    path.rsplit('/').find(|p| !p.is_empty()).unwrap_or(path)
}

/// Write `content` to `path`, creating it if need be.
fn store(state: &CliState, host: &HostId, path: &str, role: Role, content: &str) -> Result<(), FsError> {
    match state.vfs().write_file(host, path, role, content) {
        Err(FsError::NotFound) => state.vfs().create_file(host, path, role, content),
        res => res,
    }
}

/// `get <remote> [local]`: copy a file from the server into the local directory.
pub struct Get;

impl Tool for Get {
    fn name(&self) -> &'static str {
        "get"
    }

    fn usage(&self) -> &'static str {
        "get <remote-file> [local-file]"
    }

    fn run(&self, raw: &[String], state: &CliState) -> Result<Outcome, ShellError> {
        let ftp = session("get", state)?;
        let args = Args::parse("get", raw, "", "")?;
        let remote = required(&args, self)?;
        let local = args.positional().get(1).map(|s| s.as_str()).unwrap_or_else(|| basename(remote));
        let id = &state.identity;
        let content = state
            .vfs()
            .read_file(&id.host, &state.resolve(remote), id.role)
            .map_err(|_| ShellError::invalid("get", "550 Failed to open file."))?;
        let dest = state.resolve_local(local).ok_or_else(|| ShellError::invalid("get", "not connected."))?;
        store(state, &ftp.origin_host, &dest, ftp.origin_role, &content)
            .map_err(|e| ShellError::fs("local", local, e))?;
        Ok(Outcome::Text(format!(
            "local: {} remote: {}\n\
             200 PORT command successful. Consider using PASV.\n\
             150 Opening BINARY mode data connection for {} ({} bytes).\n\
             226 Transfer complete.\n\
             {} bytes received in 0.00 secs",
            local,
            remote,
            remote,
            content.len(),
            content.len()
        )))
    }
}

/// `put <local> [remote]`: upload a file from the local directory.
pub struct Put;

impl Tool for Put {
    fn name(&self) -> &'static str {
        "put"
    }

    fn usage(&self) -> &'static str {
        "put <local-file> [remote-file]"
    }

    fn run(&self, raw: &[String], state: &CliState) -> Result<Outcome, ShellError> {
        let ftp = session("put", state)?;
        let args = Args::parse("put", raw, "", "")?;
        let local = required(&args, self)?;
        let remote = args.positional().get(1).map(|s| s.as_str()).unwrap_or_else(|| basename(local));
        let src = state.resolve_local(local).ok_or_else(|| ShellError::invalid("put", "not connected."))?;
        let content = state
            .vfs()
            .read_file(&ftp.origin_host, &src, ftp.origin_role)
            .map_err(|e| ShellError::fs("local", local, e))?;
        let id = &state.identity;
        store(state, &id.host, &state.resolve(remote), id.role, &content)
            .map_err(|_| ShellError::invalid("put", "553 Could not create file."))?;
        Ok(Outcome::Text(format!(
            "local: {} remote: {}\n\
             200 PORT command successful. Consider using PASV.\n\
             150 Ok to send data.\n\
             226 Transfer complete.\n\
             {} bytes sent in 0.00 secs",
            local,
            remote,
            content.len()
        )))
    }
}

/// `lls [path]`: list a directory on the local side.
pub struct Lls;

impl Tool for Lls {
    fn name(&self) -> &'static str {
        "lls"
    }

    fn usage(&self) -> &'static str {
        "lls [path]"
    }

    fn run(&self, raw: &[String], state: &CliState) -> Result<Outcome, ShellError> {
        let ftp = session("lls", state)?;
        let args = Args::parse("lls", raw, "a", "")?;
        let target = args.positional().first().map(|s| s.as_str()).unwrap_or(".");
        let path = state.resolve_local(target).ok_or_else(|| ShellError::invalid("lls", "not connected."))?;
        let mut names: Vec<String> = state
            .vfs()
            .list_children(&ftp.origin_host, &path, ftp.origin_role)
            .map_err(|e| ShellError::fs("lls", target, e))?
            .into_iter()
            .filter(|c| args.flag('a') || !c.name.starts_with('.'))
            .map(|c| if c.is_dir() { format!("{}/", c.name) } else { c.name.clone() })
            .collect();
        names.sort_by_key(|n| n.to_lowercase());
        Ok(Outcome::Text(names.join("  ")))
    }
}

/// `lcd <path>`: change directory on the local side.
pub struct Lcd;

impl Tool for Lcd {
    fn name(&self) -> &'static str {
        "lcd"
    }

    fn usage(&self) -> &'static str {
        "lcd <path>"
    }

    fn run(&self, raw: &[String], state: &CliState) -> Result<Outcome, ShellError> {
        let ftp = session("lcd", state)?;
        let args = Args::parse("lcd", raw, "", "")?;
        let target = required(&args, self)?;
        let path = state.resolve_local(target).ok_or_else(|| ShellError::invalid("lcd", "not connected."))?;
        state
            .vfs()
            .enter_dir(&ftp.origin_host, &path, ftp.origin_role)
            .map_err(|e| ShellError::fs("lcd", target, e))?;
        Ok(Outcome::TextThen(
            format!("Local directory now {}", path),
            Signal::ChangeLocalDir(path),
        ))
    }
}

pub struct Lpwd;

impl Tool for Lpwd {
    fn name(&self) -> &'static str {
        "lpwd"
    }

    fn usage(&self) -> &'static str {
        "lpwd"
    }

    fn run(&self, _args: &[String], state: &CliState) -> Result<Outcome, ShellError> {
        let ftp = session("lpwd", state)?;
        Ok(Outcome::Text(format!("Local directory: {}", ftp.origin_cwd)))
    }
}

/// `pwd` while connected: the server's working directory, in FTP reply form.
pub struct RemotePwd;

impl Tool for RemotePwd {
    fn name(&self) -> &'static str {
        "pwd"
    }

    fn usage(&self) -> &'static str {
        "pwd"
    }

    fn run(&self, _args: &[String], state: &CliState) -> Result<Outcome, ShellError> {
        session("pwd", state)?;
        Ok(Outcome::Text(format!("257 \"{}\" is the current directory", state.identity.cwd)))
    }
}

/// `quit` and `bye`.
pub struct Quit;

impl Tool for Quit {
    fn name(&self) -> &'static str {
        "quit"
    }

    fn usage(&self) -> &'static str {
        "quit"
    }

    fn run(&self, _args: &[String], _state: &CliState) -> Result<Outcome, ShellError> {
        Ok(Outcome::TextThen("221 Goodbye.".into(), Signal::Exit))
    }
}
