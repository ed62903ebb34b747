//! Path resolution. Purely textual: nothing here looks at the filesystem.

/// Resolve `input` against the absolute directory `cwd`, producing a normalized absolute path.
///
/// A leading `/` makes `input` absolute. `..` pops one component (never above `/`), `.` and empty components are
/// skipped, and anything else is appended. The result never has a trailing slash, except for `/` itself.
pub fn resolve_path(input: &str, cwd: &str) -> String {
    let mut comps: Vec<&str> = if input.starts_with('/') {
        vec![]
    } else {
        components(cwd).collect()
    };
    for comp in input.split('/') {
        match comp {
            "" | "." => continue,
            ".." => {
                comps.pop();
            }
            other => comps.push(other),
        }
    }
    join(&comps)
}

/// The components of an absolute path, ignoring consecutive slashes.
pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}

/// Split a normalized absolute path into its parent directory and final component.
///
/// Returns `None` for `/`, which has neither.
pub fn split_parent(path: &str) -> Option<(String, &str)> {
    let comps: Vec<_> = components(path).collect();
    let (name, parent) = comps.split_last()?;
    Some((join(parent), *name))
}

fn join(comps: &[&str]) -> String {
    if comps.is_empty() {
        "/".into()
    } else {
        comps.iter().map(|c| format!("/{}", c)).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn relative_appends_to_cwd() {
        assert_eq!(resolve_path("notes.txt", "/home/user"), "/home/user/notes.txt");
        assert_eq!(resolve_path("a/b", "/"), "/a/b");
    }

    #[test]
    fn absolute_ignores_cwd() {
        assert_eq!(resolve_path("/etc/passwd", "/home/user"), "/etc/passwd");
    }

    #[test]
    fn dotdot_strips_one_component() {
        assert_eq!(resolve_path("..", "/home/user"), "/home");
        assert_eq!(resolve_path("../..", "/home/user"), "/");
        assert_eq!(resolve_path("../guest/x", "/home/user"), "/home/guest/x");
    }

    #[test]
    fn dotdot_clamps_at_root() {
        assert_eq!(resolve_path("..", "/"), "/");
        assert_eq!(resolve_path("../../../etc", "/home"), "/etc");
    }

    #[test]
    fn dot_and_empty_are_noops() {
        assert_eq!(resolve_path("./a//./b/", "/x"), "/x/a/b");
        assert_eq!(resolve_path(".", "/x"), "/x");
        assert_eq!(resolve_path("", "/x"), "/x");
    }

    #[test]
    fn relative_matches_concatenation() {
        let cwds = ["/", "/home", "/home/user", "/var/www/api"];
        let inputs = ["a", "a/b", "file.txt", "x/y/z"];
        for cwd in cwds {
            for input in inputs {
                let expected = if cwd == "/" {
                    format!("/{}", input)
                } else {
                    format!("{}/{}", cwd, input)
                };
                assert_eq!(resolve_path(input, cwd), expected);
            }
        }
    }

    #[test]
    fn split_parent_of_nested_path() {
        assert_eq!(split_parent("/a/b/c"), Some(("/a/b".to_owned(), "c")));
        assert_eq!(split_parent("/a"), Some(("/".to_owned(), "a")));
        assert_eq!(split_parent("/"), None);
    }
}
