//! A simulated network, explored through a shell.
//!
//! The pieces, from the bottom up:
//!
//! - [`machine`]: each host's filesystem, with per-role read/write/execute grants checked on every access.
//! - [`network`]: the hosts themselves, their services and users, and the DNS records pointing at them.
//! - [`world`]: loads both of the above from a TOML description.
//! - [`agents`]: time-delayed commands, driven by a virtual-clock [`agents::Scheduler`] and cancellable mid-flight.
//! - [`session`]: who the user is right now, what they've `su`'d out of, and what connection they're inside.
//! - [`tools`] and [`app`]: the commands and the dispatcher which runs them and applies their results.
//! - [`saves`]: persisting the session between runs.

pub mod agents;
pub mod app;
pub mod config;
pub mod error;
pub mod machine;
pub mod network;
pub mod output;
pub mod saves;
pub mod session;
pub mod tools;
pub mod world;
