//! Command dispatch: from a line of input to a handler, and from the handler's result to output and session changes.

mod cli;
pub mod parse;

pub use cli::{CliApp, CliState};
