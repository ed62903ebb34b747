use std::sync::Arc;

use crate::{app::CliState, error::ShellError, machine::FileNode};

use super::{Args, Outcome, Tool};

/// Implementation of [`Tool`] for the `ls` command (and `dir` over FTP).
pub struct Ls;

fn display_name(node: &FileNode, name: &str) -> String {
    if node.is_dir() {
        format!("{}/", name)
    } else {
        name.to_owned()
    }
}

fn long_line(node: &FileNode, name: &str) -> String {
    format!(
        "{}{} {:<5} {:>6} {}",
        if node.is_dir() { 'd' } else { '-' },
        node.permissions.triplets(),
        node.owner.as_str(),
        node.size(),
        display_name(node, name),
    )
}

impl Ls {
    fn listing(&self, target: &str, args: &Args, state: &CliState) -> Result<String, ShellError> {
        let path = state.resolve(target);
        let id = &state.identity;
        let node = state
            .vfs()
            .stat(&id.host, &path, id.role)
            .map_err(|e| ShellError::fs("ls", target, e))?;
        let entries: Vec<(Arc<FileNode>, String)> = if node.is_dir() {
            let mut children: Vec<_> = state
                .vfs()
                .list_children(&id.host, &path, id.role)
                .map_err(|e| ShellError::fs("ls", target, e))?
                .into_iter()
                .filter(|c| args.flag('a') || !c.name.starts_with('.'))
                .map(|c| {
                    let name = c.name.clone();
                    (c, name)
                })
                .collect();
            children.sort_by(|(_, a), (_, b)| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));
            children
        } else {
            vec![(node, target.to_owned())]
        };

        Ok(if args.flag('l') {
            entries
                .iter()
                .map(|(n, name)| long_line(n, name))
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            entries
                .iter()
                .map(|(n, name)| display_name(n, name))
                .collect::<Vec<_>>()
                .join("  ")
        })
    }
}

impl Tool for Ls {
    fn name(&self) -> &'static str {
        "ls"
    }

    fn usage(&self) -> &'static str {
        "ls [-al] [path...]"
    }

    fn run(&self, raw: &[String], state: &CliState) -> Result<Outcome, ShellError> {
        let args = Args::parse("ls", raw, "al", "")?;
        let targets = match args.positional() {
            [] => return self.listing(".", &args, state).map(Outcome::Text),
            [one] => return self.listing(one, &args, state).map(Outcome::Text),
            many => many,
        };
        let mut sections = Vec::with_capacity(targets.len());
        for target in targets {
            let listing = self.listing(target, &args, state)?;
            sections.push(if listing.is_empty() {
                format!("{}:", target)
            } else {
                format!("{}:\n{}", target, listing)
            });
        }
        Ok(Outcome::Text(sections.join("\n\n")))
    }
}
