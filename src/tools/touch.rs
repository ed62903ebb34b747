use crate::{app::CliState, error::ShellError, machine::FsError};

use super::{required, Args, Outcome, Tool};

/// Implementation of [`Tool`] for `touch`, which creates empty files. Existing files are left as they are.
pub struct Touch;

impl Tool for Touch {
    fn name(&self) -> &'static str {
        "touch"
    }

    fn usage(&self) -> &'static str {
        "touch <file...>"
    }

    fn run(&self, raw: &[String], state: &CliState) -> Result<Outcome, ShellError> {
        let args = Args::parse("touch", raw, "", "")?;
        required(&args, self)?;
        let id = &state.identity;
        for target in args.positional() {
            let path = state.resolve(target);
            let res = match state.vfs().stat(&id.host, &path, id.role) {
                Ok(_) => Ok(()),
                Err(FsError::NotFound) => state.vfs().create_file(&id.host, &path, id.role, ""),
                Err(e) => Err(e),
            };
            res.map_err(|e| ShellError::fs("touch", target.as_str(), e))?;
        }
        Ok(Outcome::Nothing)
    }
}
