//! Who the user currently is, where, and what nested connection (if any) they're inside.
//!
//! This only stores the outcome of transitions. Whether a transition is allowed (right password, port open, etc.) is
//! decided by the command that asks for it.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    machine::Role,
    network::{HostId, HostRegistry},
};

/// The local, foreground identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub role: Role,
    pub host: HostId,
    pub cwd: String,
}

/// Where a user's home directory is.
pub fn home_path(_host: &HostId, username: &str, role: Role) -> String {
    match role {
        Role::Root => "/root".into(),
        _ => format!("/home/{}", username),
    }
}

/// What a password, once entered, will be used for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromptPurpose {
    /// Switch the local session to another user on the same host.
    Su,
    /// Finish logging in to a remote host.
    Ssh { host: HostId },
}

/// Both ends of an FTP connection: the server being browsed and the machine files are fetched to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FtpSession {
    pub remote_host: HostId,
    pub remote_cwd: String,
    pub remote_role: Role,
    pub origin_host: HostId,
    pub origin_cwd: String,
    pub origin_role: Role,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractiveKind {
    Ssh,
    Backdoor,
}

/// A shell on another machine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractivePrompt {
    pub kind: InteractiveKind,
    pub host: HostId,
    pub user: String,
    pub role: Role,
    pub home: String,
    pub cwd: String,
}

/// A nested mode layered on top of the local session. At most one is ever active.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubSession {
    PasswordPrompt {
        target_username: String,
        purpose: PromptPurpose,
    },
    Ftp(FtpSession),
    Interactive(InteractivePrompt),
}

/// Which command set applies, following from the active sub-session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    Local,
    Password,
    Ftp,
    Ssh,
    Backdoor,
}

/// The identity commands currently act as, wherever that is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub host: HostId,
    pub username: String,
    pub role: Role,
    pub cwd: String,
    pub home: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionState {
    current: Session,
    stack: Vec<Session>,
    sub: Option<SubSession>,
}

impl SessionState {
    pub fn new(current: Session) -> Self {
        Self {
            current,
            stack: vec![],
            sub: None,
        }
    }

    /// Rebuild from persisted parts.
    pub fn restore(current: Session, stack: Vec<Session>, sub: Option<SubSession>) -> Self {
        Self { current, stack, sub }
    }

    pub fn current(&self) -> &Session {
        &self.current
    }

    pub fn stack(&self) -> &[Session] {
        &self.stack
    }

    pub fn sub(&self) -> Option<&SubSession> {
        self.sub.as_ref()
    }

    pub fn mode(&self) -> Mode {
        match &self.sub {
            None => Mode::Local,
            Some(SubSession::PasswordPrompt { .. }) => Mode::Password,
            Some(SubSession::Ftp(_)) => Mode::Ftp,
            Some(SubSession::Interactive(p)) => match p.kind {
                InteractiveKind::Ssh => Mode::Ssh,
                InteractiveKind::Backdoor => Mode::Backdoor,
            },
        }
    }

    pub fn ftp(&self) -> Option<&FtpSession> {
        match &self.sub {
            Some(SubSession::Ftp(ftp)) => Some(ftp),
            _ => None,
        }
    }

    /// Suspend the current session and make `next` the foreground one.
    pub fn push(&mut self, next: Session) {
        info!(from = %self.current.username, to = %next.username, host = %next.host, "session pushed");
        let prev = std::mem::replace(&mut self.current, next);
        self.stack.push(prev);
    }

    /// Return to the most recently suspended session, giving back the one that was left. `None` if there's nothing
    /// to return to.
    pub fn pop(&mut self) -> Option<Session> {
        let prev = self.stack.pop()?;
        info!(from = %self.current.username, to = %prev.username, "session popped");
        Some(std::mem::replace(&mut self.current, prev))
    }

    /// Enter a nested mode, replacing any that was already active.
    pub fn enter(&mut self, sub: SubSession) {
        debug!(?sub, "entering sub-session");
        self.sub = Some(sub);
    }

    /// Leave the nested mode, if any.
    pub fn leave(&mut self) -> Option<SubSession> {
        let left = self.sub.take();
        if let Some(sub) = &left {
            debug!(?sub, "left sub-session");
        }
        left
    }

    /// The identity commands run as: the remote shell's, the FTP server's, or the local session's.
    pub fn identity(&self) -> Identity {
        match &self.sub {
            Some(SubSession::Interactive(p)) => Identity {
                host: p.host.clone(),
                username: p.user.clone(),
                role: p.role,
                cwd: p.cwd.clone(),
                home: p.home.clone(),
            },
            Some(SubSession::Ftp(ftp)) => Identity {
                host: ftp.remote_host.clone(),
                username: "anonymous".into(),
                role: ftp.remote_role,
                cwd: ftp.remote_cwd.clone(),
                home: "/".into(),
            },
            _ => Identity {
                host: self.current.host.clone(),
                username: self.current.username.clone(),
                role: self.current.role,
                cwd: self.current.cwd.clone(),
                home: home_path(&self.current.host, &self.current.username, self.current.role),
            },
        }
    }

    /// Change the working directory of whatever [`Self::identity`] refers to.
    pub fn change_dir(&mut self, path: String) {
        match &mut self.sub {
            Some(SubSession::Interactive(p)) => p.cwd = path,
            Some(SubSession::Ftp(ftp)) => ftp.remote_cwd = path,
            _ => self.current.cwd = path,
        }
    }

    /// Change the working directory on the initiating side of an FTP connection. Outside FTP this is the same as
    /// [`Self::change_dir`].
    pub fn change_local_dir(&mut self, path: String) {
        match &mut self.sub {
            Some(SubSession::Ftp(ftp)) => ftp.origin_cwd = path,
            _ => self.change_dir(path),
        }
    }

    /// The prompt shown before the next line of input.
    pub fn prompt(&self, registry: &HostRegistry) -> String {
        let hostname = |id: &HostId| {
            registry
                .host(id)
                .map(|h| h.hostname.clone())
                .unwrap_or_else(|| id.to_string())
        };
        match &self.sub {
            Some(SubSession::PasswordPrompt {
                target_username,
                purpose: PromptPurpose::Ssh { host },
            }) => {
                let addr = registry.host(host).map(|h| h.ip.to_string()).unwrap_or_else(|| host.to_string());
                format!("{}@{}'s password: ", target_username, addr)
            }
            Some(SubSession::PasswordPrompt { .. }) => "Password: ".into(),
            Some(SubSession::Ftp(_)) => "ftp> ".into(),
            Some(SubSession::Interactive(p)) if p.kind == InteractiveKind::Backdoor => "$ ".into(),
            Some(SubSession::Interactive(p)) => shell_prompt(&p.user, &hostname(&p.host), &p.cwd, &p.home, p.role),
            None => {
                let s = &self.current;
                let home = home_path(&s.host, &s.username, s.role);
                shell_prompt(&s.username, &hostname(&s.host), &s.cwd, &home, s.role)
            }
        }
    }
}

fn shell_prompt(user: &str, hostname: &str, cwd: &str, home: &str, role: Role) -> String {
    let shown = if cwd == home {
        "~".to_owned()
    } else if let Some(rest) = cwd.strip_prefix(home).filter(|r| r.starts_with('/')) {
        format!("~{}", rest)
    } else {
        cwd.to_owned()
    };
    let sigil = if role == Role::Root { '#' } else { '$' };
    format!("{}@{}:{}{} ", user, hostname, shown, sigil)
}

#[cfg(test)]
mod test {
    use crate::network::LocalInterface;

    use super::*;

    fn session(user: &str, role: Role, cwd: &str) -> Session {
        Session {
            username: user.into(),
            role,
            host: "local".into(),
            cwd: cwd.into(),
        }
    }

    fn registry() -> HostRegistry {
        HostRegistry::new(
            vec![crate::network::Host {
                id: "local".into(),
                ip: [192, 168, 1, 100].into(),
                hostname: "workstation".into(),
                ports: vec![],
                users: vec![],
                http: Default::default(),
            }],
            vec![],
            LocalInterface {
                ip: [192, 168, 1, 100].into(),
                gateway: [192, 168, 1, 1].into(),
                netmask: [255, 255, 255, 0].into(),
                mac: "00:00:00:00:00:00".into(),
            },
        )
    }

    #[test]
    fn push_then_pop_restores_exactly() {
        let before = session("user", Role::User, "/tmp/somewhere");
        let mut state = SessionState::new(before.clone());
        state.push(session("root", Role::Root, "/root"));
        assert_eq!(state.current().username, "root");
        assert_eq!(state.stack().len(), 1);
        let left = state.pop().expect("something to pop");
        assert_eq!(left.username, "root");
        assert_eq!(state.current(), &before);
        assert!(state.stack().is_empty());
    }

    #[test]
    fn pop_on_empty_stack_does_nothing() {
        let mut state = SessionState::new(session("user", Role::User, "/"));
        assert_eq!(state.pop(), None);
        assert_eq!(state.current().username, "user");
    }

    #[test]
    fn home_depends_on_role() {
        let host = HostId::from("local");
        assert_eq!(home_path(&host, "root", Role::Root), "/root");
        assert_eq!(home_path(&host, "alice", Role::User), "/home/alice");
        assert_eq!(home_path(&host, "admin", Role::Root), "/root");
    }

    #[test]
    fn cd_goes_to_active_context() {
        let mut state = SessionState::new(session("user", Role::User, "/home/user"));
        state.enter(SubSession::Ftp(FtpSession {
            remote_host: "files".into(),
            remote_cwd: "/".into(),
            remote_role: Role::Guest,
            origin_host: "local".into(),
            origin_cwd: "/home/user".into(),
            origin_role: Role::User,
        }));
        state.change_dir("/pub".into());
        state.change_local_dir("/tmp".into());
        let ftp = state.ftp().expect("in ftp");
        assert_eq!(ftp.remote_cwd, "/pub");
        assert_eq!(ftp.origin_cwd, "/tmp");
        assert_eq!(state.identity().cwd, "/pub");
        assert_eq!(state.identity().role, Role::Guest);
        state.leave();
        assert_eq!(state.current().cwd, "/home/user");
    }

    #[test]
    fn only_one_sub_session_at_a_time() {
        let mut state = SessionState::new(session("user", Role::User, "/"));
        state.enter(SubSession::PasswordPrompt {
            target_username: "root".into(),
            purpose: PromptPurpose::Su,
        });
        state.enter(SubSession::Interactive(InteractivePrompt {
            kind: InteractiveKind::Backdoor,
            host: "legacy".into(),
            user: "ghost".into(),
            role: Role::User,
            home: "/home/ghost".into(),
            cwd: "/home/ghost".into(),
        }));
        assert!(matches!(state.sub(), Some(SubSession::Interactive(_))));
        assert_eq!(state.mode(), Mode::Backdoor);
        assert!(state.leave().is_some());
        assert!(state.leave().is_none());
    }

    #[test]
    fn prompts_follow_mode() {
        let reg = registry();
        let mut state = SessionState::new(session("user", Role::User, "/home/user/docs"));
        assert_eq!(state.prompt(&reg), "user@workstation:~/docs$ ");
        state.push(session("root", Role::Root, "/etc"));
        assert_eq!(state.prompt(&reg), "root@workstation:/etc# ");
        state.enter(SubSession::PasswordPrompt {
            target_username: "admin".into(),
            purpose: PromptPurpose::Ssh { host: "local".into() },
        });
        assert_eq!(state.prompt(&reg), "admin@192.168.1.100's password: ");
        state.enter(SubSession::PasswordPrompt {
            target_username: "root".into(),
            purpose: PromptPurpose::Su,
        });
        assert_eq!(state.prompt(&reg), "Password: ");
    }

    #[test]
    fn home_prefix_needs_whole_component() {
        assert_eq!(shell_prompt("u", "h", "/home/user2", "/home/user", Role::User), "u@h:/home/user2$ ");
        assert_eq!(shell_prompt("u", "h", "/home/user", "/home/user", Role::User), "u@h:~$ ");
    }
}
