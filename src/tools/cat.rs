use crate::{app::CliState, error::ShellError};

use super::{required, Args, Outcome, Tool};

/// How much of a file is sniffed to decide whether it's binary.
const SNIFF_LEN: usize = 512;
/// Shortest run of printable characters `strings` reports.
const MIN_RUN: usize = 4;

fn is_binary(content: &str) -> bool {
    content
        .chars()
        .take(SNIFF_LEN)
        .any(|c| c == '\0' || (c.is_control() && !matches!(c, '\t' | '\n' | '\r')))
}

fn printable_runs(content: &str) -> Vec<&str> {
    content
        .split(|c: char| c.is_control() && c != '\t')
        .filter(|run| run.chars().count() >= MIN_RUN)
        .collect()
}

fn read(cmd: &'static str, target: &str, state: &CliState) -> Result<String, ShellError> {
    let id = &state.identity;
    state
        .vfs()
        .read_file(&id.host, &state.resolve(target), id.role)
        .map_err(|e| ShellError::fs(cmd, target, e))
}

/// Implementation of [`Tool`] for `cat`, which prints files (unless they look binary).
pub struct Cat;

impl Tool for Cat {
    fn name(&self) -> &'static str {
        "cat"
    }

    fn usage(&self) -> &'static str {
        "cat <file...>"
    }

    fn run(&self, raw: &[String], state: &CliState) -> Result<Outcome, ShellError> {
        let args = Args::parse("cat", raw, "", "")?;
        required(&args, self)?;
        let mut out = String::new();
        for target in args.positional() {
            let content = read("cat", target, state)?;
            if is_binary(&content) {
                out.push_str("Binary file (use strings() to extract text)\n");
            } else {
                out.push_str(&content);
                if !content.is_empty() && !content.ends_with('\n') {
                    out.push('\n');
                }
            }
        }
        Ok(if out.is_empty() {
            Outcome::Nothing
        } else {
            Outcome::Text(out)
        })
    }
}

/// Implementation of [`Tool`] for `strings`, which digs the text out of binary files.
pub struct Strings;

impl Tool for Strings {
    fn name(&self) -> &'static str {
        "strings"
    }

    fn usage(&self) -> &'static str {
        "strings <file>"
    }

    fn run(&self, raw: &[String], state: &CliState) -> Result<Outcome, ShellError> {
        let args = Args::parse("strings", raw, "", "")?;
        let target = required(&args, self)?;
        let content = read("strings", target, state)?;
        Ok(Outcome::Text(printable_runs(&content).join("\n")))
    }
}
