//! Persisting the session between runs.
//!
//! State goes into a small key-value [`Store`] as separate records (the session, the suspended stack, and any FTP
//! connection), each one `bincode` behind a magic header. Saving is best-effort: a failure is logged and play goes
//! on. Loading is forgiving: anything that doesn't decode or doesn't fit the current world is thrown away in favor of
//! a fresh session.

pub mod fs;

use std::{io, sync::Arc};

use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    network::{HostId, HostRegistry},
    session::{home_path, FtpSession, Session, SessionState, SubSession},
    world::StartPoint,
};

pub use fs::FileStore;

const MAGIC: &[u8] = b"NSHSTATE";

pub const SESSION: &str = "session";
pub const SESSION_STACK: &str = "session_stack";
pub const FTP_SESSION: &str = "ftp_session";

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("storage error: {0}")]
    Io(#[from] io::Error),
    #[error("missing magic bytes")]
    BadMagic,
    #[error("invalid saved data: {0}")]
    Decode(String),
    #[error("saved state doesn't fit this world: {0}")]
    Invalid(String),
}

impl From<bincode::Error> for SaveError {
    fn from(e: bincode::Error) -> Self {
        match *e {
            bincode::ErrorKind::Io(e) => Self::Io(e),
            other => Self::Decode(other.to_string()),
        }
    }
}

/// A place to put named blobs.
pub trait Store: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SaveError>;
    fn set(&self, key: &str, value: &[u8]) -> Result<(), SaveError>;
    fn remove(&self, key: &str) -> Result<(), SaveError>;
}

/// Keeps everything in memory, for `--no-save` and tests. Clones share contents.
#[derive(Clone, Default, Debug)]
pub struct MemoryStore(Arc<DashMap<String, Vec<u8>>>);

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SaveError> {
        Ok(self.0.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), SaveError> {
        self.0.insert(key.into(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SaveError> {
        self.0.remove(key);
        Ok(())
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, SaveError> {
    let mut data = Vec::with_capacity(64);
    data.extend_from_slice(MAGIC);
    bincode::serialize_into(&mut data, value)?;
    Ok(data)
}

fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, SaveError> {
    let body = data.strip_prefix(MAGIC).ok_or(SaveError::BadMagic)?;
    Ok(bincode::deserialize(body)?)
}

/// Write the whole session state out.
pub fn save_state(store: &dyn Store, state: &SessionState) -> Result<(), SaveError> {
    store.set(SESSION, &encode(state.current())?)?;
    store.set(SESSION_STACK, &encode(&state.stack().to_vec())?)?;
    match state.ftp() {
        Some(ftp) => store.set(FTP_SESSION, &encode(ftp)?)?,
        None => store.remove(FTP_SESSION)?,
    }
    debug!(stack = state.stack().len(), ftp = state.ftp().is_some(), "session saved");
    Ok(())
}

/// The session a new player starts in.
pub fn default_state(start: &StartPoint) -> SessionState {
    SessionState::new(Session {
        username: start.username.clone(),
        role: start.role,
        host: start.host.clone(),
        cwd: home_path(&start.host, &start.username, start.role),
    })
}

fn check(registry: &HostRegistry, host: &HostId, path: &str) -> Result<(), SaveError> {
    if registry.host(host).is_none() {
        return Err(SaveError::Invalid(format!("unknown host {}", host)));
    }
    if !path.starts_with('/') {
        return Err(SaveError::Invalid(format!("relative path {}", path)));
    }
    Ok(())
}

fn try_load(store: &dyn Store, registry: &HostRegistry) -> Result<Option<SessionState>, SaveError> {
    let Some(current) = store.get(SESSION)? else {
        return Ok(None);
    };
    let current: Session = decode(&current)?;
    let stack: Vec<Session> = match store.get(SESSION_STACK)? {
        Some(data) => decode(&data)?,
        None => vec![],
    };
    let ftp: Option<FtpSession> = match store.get(FTP_SESSION)? {
        Some(data) => Some(decode(&data)?),
        None => None,
    };
    for s in stack.iter().chain([&current]) {
        check(registry, &s.host, &s.cwd)?;
    }
    if let Some(ftp) = &ftp {
        check(registry, &ftp.remote_host, &ftp.remote_cwd)?;
        check(registry, &ftp.origin_host, &ftp.origin_cwd)?;
    }
    Ok(Some(SessionState::restore(current, stack, ftp.map(SubSession::Ftp))))
}

/// Restore the saved session, or start fresh if there isn't a usable one.
pub fn load_state(store: &dyn Store, registry: &HostRegistry, start: &StartPoint) -> SessionState {
    match try_load(store, registry) {
        Ok(Some(state)) => {
            debug!("session restored");
            state
        }
        Ok(None) => default_state(start),
        Err(e) => {
            warn!(error = %e, "discarding saved session");
            default_state(start)
        }
    }
}

#[cfg(test)]
mod test {
    use crate::{machine::Role, world::World};

    use super::*;

    fn world() -> World {
        World::builtin().expect("built-in world is valid")
    }

    #[test]
    fn empty_store_gives_default() {
        let world = world();
        let state = load_state(&MemoryStore::new(), &world.registry, &world.start);
        assert_eq!(state, default_state(&world.start));
        assert_eq!(state.current().cwd, "/home/user");
    }

    #[test]
    fn saved_state_comes_back() {
        let world = world();
        let store = MemoryStore::new();
        let mut state = default_state(&world.start);
        state.push(Session {
            username: "root".into(),
            role: Role::Root,
            host: "local".into(),
            cwd: "/etc".into(),
        });
        state.enter(SubSession::Ftp(FtpSession {
            remote_host: "fileserver".into(),
            remote_cwd: "/pub".into(),
            remote_role: Role::Guest,
            origin_host: "local".into(),
            origin_cwd: "/etc".into(),
            origin_role: Role::Root,
        }));
        save_state(&store, &state).expect("memory store can't fail");
        assert_eq!(load_state(&store, &world.registry, &world.start), state);

        state.leave();
        save_state(&store, &state).expect("memory store can't fail");
        assert!(store.get(FTP_SESSION).expect("ok").is_none());
    }

    #[test]
    fn garbage_is_discarded() {
        let world = world();
        let store = MemoryStore::new();
        store.set(SESSION, b"definitely not a session").expect("ok");
        assert_eq!(load_state(&store, &world.registry, &world.start), default_state(&world.start));

        let mut truncated = MAGIC.to_vec();
        truncated.extend_from_slice(&[1, 2, 3]);
        store.set(SESSION, &truncated).expect("ok");
        assert_eq!(load_state(&store, &world.registry, &world.start), default_state(&world.start));
    }

    #[test]
    fn state_from_another_world_is_discarded() {
        let world = world();
        let store = MemoryStore::new();
        let bogus = SessionState::new(Session {
            username: "user".into(),
            role: Role::User,
            host: "atlantis".into(),
            cwd: "/".into(),
        });
        save_state(&store, &bogus).expect("ok");
        assert_eq!(load_state(&store, &world.registry, &world.start), default_state(&world.start));

        let relative = SessionState::new(Session {
            username: "user".into(),
            role: Role::User,
            host: "local".into(),
            cwd: "home".into(),
        });
        save_state(&store, &relative).expect("ok");
        assert_eq!(load_state(&store, &world.registry, &world.start), default_state(&world.start));
    }
}
