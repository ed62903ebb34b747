//! Runtime configuration, loaded from `~/.netshell/config.toml`.
//!
//! Every field is optional; anything left out takes its default.
//!
//! ```toml
//! # a world file to use instead of the built-in network
//! world = "/path/to/world.toml"
//! save_dir = "/home/me/.netshell/state"
//! log_file = "/home/me/.netshell/netshell.log"
//! log_level = "debug"
//!
//! # simulated latencies, in milliseconds
//! [latency]
//! connect = 800
//! handshake = 600
//! login = 700
//! ping_interval = 1000
//! scan = 2000
//! http = 500
//! ```

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// How long each simulated network operation takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Latency {
    /// TCP connection setup
    pub connect: u64,
    /// Protocol handshake after connecting (SSH key exchange, banner exchange)
    pub handshake: u64,
    /// FTP login
    pub login: u64,
    /// Time between pings
    pub ping_interval: u64,
    /// A whole port scan
    pub scan: u64,
    /// An HTTP request/response
    pub http: u64,
}

impl Default for Latency {
    fn default() -> Self {
        Self {
            connect: 800,
            handshake: 600,
            login: 700,
            ping_interval: 1000,
            scan: 2000,
            http: 500,
        }
    }
}

impl Latency {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect)
    }

    pub fn handshake(&self) -> Duration {
        Duration::from_millis(self.handshake)
    }

    pub fn login(&self) -> Duration {
        Duration::from_millis(self.login)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval)
    }

    pub fn scan(&self) -> Duration {
        Duration::from_millis(self.scan)
    }

    pub fn http(&self) -> Duration {
        Duration::from_millis(self.http)
    }
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// World file; the built-in world is used if unset
    pub world: Option<PathBuf>,
    /// Where the session is persisted
    pub save_dir: PathBuf,
    pub log_file: PathBuf,
    /// Default log level, overridden by `RUST_LOG`
    pub log_level: String,
    pub latency: Latency,
}

impl Default for Config {
    fn default() -> Self {
        let dir = app_dir();
        Self {
            world: None,
            save_dir: dir.join("state"),
            log_file: dir.join("netshell.log"),
            log_level: "info".to_string(),
            latency: Latency::default(),
        }
    }
}

impl Config {
    /// Load from the default location. A missing file means defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(app_dir().join("config.toml"))
    }

    /// Load from `path`. A missing file means defaults; an unreadable or invalid one is an error.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.into(),
                    source,
                })
            }
        };
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.into(),
            source,
        })
    }
}

/// `~/.netshell`, or `.netshell` in the working directory if there's no home to be found.
pub fn app_dir() -> PathBuf {
    home_dir()
        .map(|h| h.join(".netshell"))
        .unwrap_or_else(|| PathBuf::from(".netshell"))
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}
