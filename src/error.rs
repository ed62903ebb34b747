//! Errors that commands report back to the shell.
//!
//! Every variant renders with the command name first, the way conventional shell tools do, e.g.
//! `cat: /etc/shadow: Permission denied`. None of them are fatal: the dispatcher turns them into an error line and
//! moves on.

use thiserror::Error;

use crate::machine::FsError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShellError {
    #[error("{0}: command not found")]
    CommandNotFound(String),
    #[error("{cmd}: {what}: No such file or directory")]
    NotFound { cmd: &'static str, what: String },
    #[error("{cmd}: {path}: Not a directory")]
    NotADirectory { cmd: &'static str, path: String },
    #[error("{cmd}: {path}: Is a directory")]
    IsADirectory { cmd: &'static str, path: String },
    #[error("{cmd}: {path}: File exists")]
    AlreadyExists { cmd: &'static str, path: String },
    #[error("{cmd}: {path}: Permission denied")]
    PermissionDenied { cmd: &'static str, path: String },
    #[error("{cmd}: connect to host {host} port {port}: Connection refused")]
    ConnectionRefused {
        cmd: &'static str,
        host: String,
        port: u16,
    },
    #[error("{cmd}: connect to host {host} port {port}: Connection timed out")]
    ConnectionTimedOut {
        cmd: &'static str,
        host: String,
        port: u16,
    },
    #[error("{cmd}: {name}: Name or service not known")]
    NameResolution { cmd: &'static str, name: String },
    #[error("{cmd}: {msg}")]
    InvalidArgument { cmd: &'static str, msg: String },
    #[error("{cmd}: user {user} does not exist")]
    UnknownUser { cmd: &'static str, user: String },
    #[error("{cmd}: Authentication failure")]
    Authentication { cmd: &'static str },
}

impl ShellError {
    /// Attach a command name and the path the user typed to a filesystem error.
    pub fn fs(cmd: &'static str, path: impl Into<String>, err: FsError) -> Self {
        let path = path.into();
        match err {
            FsError::NotFound => Self::NotFound { cmd, what: path },
            FsError::NotADirectory => Self::NotADirectory { cmd, path },
            FsError::IsADirectory => Self::IsADirectory { cmd, path },
            FsError::PermissionDenied => Self::PermissionDenied { cmd, path },
            FsError::AlreadyExists => Self::AlreadyExists { cmd, path },
            FsError::InvalidPath => Self::InvalidArgument {
                cmd,
                msg: format!("{}: invalid path", path),
            },
        }
    }

    pub fn invalid(cmd: &'static str, msg: impl Into<String>) -> Self {
        Self::InvalidArgument {
            cmd,
            msg: msg.into(),
        }
    }

    /// Shorthand for the usual "you forgot an argument" complaint.
    pub fn usage(cmd: &'static str, usage: &str) -> Self {
        Self::invalid(cmd, format!("usage: {}", usage))
    }
}
