//! Commands about the shell itself: help, clearing, switching users, and leaving.

use chrono::Local;

use crate::{
    app::CliState,
    error::ShellError,
    session::{home_path, InteractiveKind, InteractivePrompt, Mode, PromptPurpose, Session},
};

use super::{Args, Outcome, Signal, Tool};

pub struct Help;

impl Tool for Help {
    fn name(&self) -> &'static str {
        "help"
    }

    fn usage(&self) -> &'static str {
        "help"
    }

    fn run(&self, _args: &[String], state: &CliState) -> Result<Outcome, ShellError> {
        let mut out = String::from("Available commands:\n");
        for (name, tool) in state.tools.entries() {
            out.push_str(&format!("  {:<10} {}\n", name, tool.usage()));
        }
        Ok(Outcome::Text(out))
    }
}

pub struct Clear;

impl Tool for Clear {
    fn name(&self) -> &'static str {
        "clear"
    }

    fn usage(&self) -> &'static str {
        "clear"
    }

    fn run(&self, _args: &[String], _state: &CliState) -> Result<Outcome, ShellError> {
        Ok(Outcome::Signal(Signal::Clear))
    }
}

/// `exit` and `logout`: close the remote shell, or go back to the previous user.
pub struct Exit;

impl Tool for Exit {
    fn name(&self) -> &'static str {
        "exit"
    }

    fn usage(&self) -> &'static str {
        "exit"
    }

    fn run(&self, _args: &[String], state: &CliState) -> Result<Outcome, ShellError> {
        Ok(match state.mode {
            Mode::Ssh => {
                let addr = state
                    .registry()
                    .host(&state.identity.host)
                    .map(|h| h.ip.to_string())
                    .unwrap_or_else(|| state.identity.host.to_string());
                Outcome::TextThen(format!("logout\nConnection to {} closed.", addr), Signal::Exit)
            }
            Mode::Backdoor => Outcome::TextThen("Connection closed.".into(), Signal::Exit),
            _ => Outcome::Signal(Signal::Exit),
        })
    }
}

/// `su [user]`: become another user on this machine, after giving their password.
pub struct Su;

impl Tool for Su {
    fn name(&self) -> &'static str {
        "su"
    }

    fn usage(&self) -> &'static str {
        "su [user]"
    }

    fn run(&self, raw: &[String], state: &CliState) -> Result<Outcome, ShellError> {
        let args = Args::parse("su", raw, "", "")?;
        let user = args.positional().first().map(|s| s.as_str()).unwrap_or("root");
        let known = state
            .registry()
            .host(&state.identity.host)
            .and_then(|h| h.user(user))
            .is_some();
        if !known {
            return Err(ShellError::UnknownUser {
                cmd: "su",
                user: user.into(),
            });
        }
        Ok(Outcome::Signal(Signal::PasswordPrompt { user: user.into() }))
    }
}

/// Check a password typed at the password prompt, and produce the switch it was guarding.
pub fn login(state: &CliState, username: &str, purpose: &PromptPurpose, password: &str) -> Result<Outcome, ShellError> {
    match purpose {
        PromptPurpose::Su => {
            let host = &state.identity.host;
            let user = state
                .registry()
                .host(host)
                .and_then(|h| h.user(username))
                .ok_or_else(|| ShellError::UnknownUser {
                    cmd: "su",
                    user: username.into(),
                })?;
            if !user.verify(password) {
                return Err(ShellError::Authentication { cmd: "su" });
            }
            Ok(Outcome::Signal(Signal::SwitchUser(Session {
                username: user.username.clone(),
                role: user.role,
                host: host.clone(),
                cwd: home_path(host, &user.username, user.role),
            })))
        }
        PromptPurpose::Ssh { host } => {
            let target = state
                .registry()
                .host(host)
                .ok_or(ShellError::Authentication { cmd: "ssh" })?;
            let user = target
                .user(username)
                .filter(|u| u.verify(password))
                .ok_or(ShellError::Authentication { cmd: "ssh" })?;
            let home = home_path(host, &user.username, user.role);
            let motd = format!(
                "Welcome to {} ({})\nLast login: {} from {}",
                target.hostname,
                target.ip,
                Local::now().format("%a %b %e %H:%M:%S %Y"),
                state.registry().local_interface().ip,
            );
            Ok(Outcome::TextThen(
                motd,
                Signal::EnterShell(InteractivePrompt {
                    kind: InteractiveKind::Ssh,
                    host: host.clone(),
                    user: user.username.clone(),
                    role: user.role,
                    cwd: home.clone(),
                    home,
                }),
            ))
        }
    }
}
