use crate::{app::CliState, error::ShellError};

use super::{required, Args, Outcome, Tool};

pub struct Mkdir;

impl Tool for Mkdir {
    fn name(&self) -> &'static str {
        "mkdir"
    }

    fn usage(&self) -> &'static str {
        "mkdir <dir...>"
    }

    fn run(&self, raw: &[String], state: &CliState) -> Result<Outcome, ShellError> {
        let args = Args::parse("mkdir", raw, "", "")?;
        required(&args, self)?;
        let id = &state.identity;
        for target in args.positional() {
            state
                .vfs()
                .create_dir(&id.host, &state.resolve(target), id.role)
                .map_err(|e| ShellError::fs("mkdir", target.as_str(), e))?;
        }
        Ok(Outcome::Nothing)
    }
}
