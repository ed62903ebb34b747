use crate::{app::CliState, error::ShellError};

use super::{Outcome, Signal, Tool};

/// Implementation of [`Tool`] for the `cd` command, to change the current working directory
pub struct Cd;

impl Tool for Cd {
    fn name(&self) -> &'static str {
        "cd"
    }

    fn usage(&self) -> &'static str {
        "cd [path]"
    }

    fn run(&self, args: &[String], state: &CliState) -> Result<Outcome, ShellError> {
        let (target, path) = match args.first() {
            Some(t) => (t.as_str(), state.resolve(t)),
            None => ("~", state.identity.home.clone()),
        };
        let id = &state.identity;
        state
            .vfs()
            .enter_dir(&id.host, &path, id.role)
            .map_err(|e| ShellError::fs("cd", target, e))?;
        Ok(Outcome::Signal(Signal::ChangeDir(path)))
    }
}

pub struct Pwd;

impl Tool for Pwd {
    fn name(&self) -> &'static str {
        "pwd"
    }

    fn usage(&self) -> &'static str {
        "pwd"
    }

    fn run(&self, _args: &[String], state: &CliState) -> Result<Outcome, ShellError> {
        Ok(Outcome::Text(state.identity.cwd.clone()))
    }
}

#[cfg(test)]
mod test {
    use crate::{
        machine::Role,
        tools::testing::{args, error, local, text},
    };

    use super::*;

    fn cd_to(raw: &[&str], state: &CliState) -> String {
        match Cd.run(&args(raw), state) {
            Ok(Outcome::Signal(Signal::ChangeDir(p))) => p,
            Ok(_) => panic!("cd should only change directory"),
            Err(e) => panic!("cd failed: {}", e),
        }
    }

    #[test]
    fn relative_and_absolute() {
        let state = local(Role::User);
        assert_eq!(cd_to(&[".."], &state), "/home");
        assert_eq!(cd_to(&["/etc"], &state), "/etc");
        assert_eq!(cd_to(&["../../tmp/."], &state), "/tmp");
    }

    #[test]
    fn no_argument_goes_home() {
        let state = local(Role::Root);
        assert_eq!(cd_to(&[], &state), "/root");
        assert_eq!(cd_to(&["~"], &state), "/root");
    }

    #[test]
    fn refuses_files_and_forbidden_dirs() {
        let state = local(Role::User);
        assert_eq!(error(&Cd, &["/etc/passwd"], &state), "cd: /etc/passwd: Not a directory");
        assert_eq!(error(&Cd, &["/root"], &state), "cd: /root: Permission denied");
        assert_eq!(error(&Cd, &["nowhere"], &state), "cd: nowhere: No such file or directory");
    }

    #[test]
    fn pwd_prints_cwd() {
        assert_eq!(text(&Pwd, &[], &local(Role::User)), "/home/user");
    }
}
