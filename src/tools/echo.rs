use crate::{app::CliState, error::ShellError, machine::FsError};

use super::{Outcome, Tool};

/// Where `echo`'s output goes.
enum Redirect<'a> {
    Overwrite(&'a str),
    Append(&'a str),
}

/// Implementation of [`Tool`] for `echo`, including `>` and `>>` redirection into files.
pub struct Echo;

fn split_redirect(args: &[String]) -> Result<(Vec<&str>, Option<Redirect<'_>>), ShellError> {
    let mut words = vec![];
    let mut redirect = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let (append, target) = if let Some(rest) = arg.strip_prefix(">>") {
            (true, rest)
        } else if let Some(rest) = arg.strip_prefix('>') {
            (false, rest)
        } else {
            words.push(arg.as_str());
            continue;
        };
        let target = if target.is_empty() {
            iter.next()
                .map(|s| s.as_str())
                .ok_or_else(|| ShellError::invalid("echo", "syntax error near unexpected token `newline'"))?
        } else {
            target
        };
        redirect = Some(if append {
            Redirect::Append(target)
        } else {
            Redirect::Overwrite(target)
        });
    }
    Ok((words, redirect))
}

impl Tool for Echo {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn usage(&self) -> &'static str {
        "echo [text...] [> file | >> file]"
    }

    fn run(&self, args: &[String], state: &CliState) -> Result<Outcome, ShellError> {
        let (words, redirect) = split_redirect(args)?;
        let line = format!("{}\n", words.join(" "));
        let Some(redirect) = redirect else {
            return Ok(Outcome::Text(line));
        };

        let id = &state.identity;
        let vfs = state.vfs();
        let (target, res) = match redirect {
            Redirect::Overwrite(target) => {
                let path = state.resolve(target);
                let res = match vfs.stat(&id.host, &path, id.role) {
                    Ok(_) => vfs.write_file(&id.host, &path, id.role, &line),
                    Err(FsError::NotFound) => vfs.create_file(&id.host, &path, id.role, &line),
                    Err(e) => Err(e),
                };
                (target, res)
            }
            Redirect::Append(target) => {
                let path = state.resolve(target);
                let res = match vfs.read_file(&id.host, &path, id.role) {
                    Ok(old) => vfs.write_file(&id.host, &path, id.role, &(old + &line)),
                    Err(FsError::NotFound) => vfs.create_file(&id.host, &path, id.role, &line),
                    Err(e) => Err(e),
                };
                (target, res)
            }
        };
        res.map_err(|e| ShellError::fs("echo", target, e))?;
        Ok(Outcome::Nothing)
    }
}
