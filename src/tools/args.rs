//! getopt-style option parsing: `-a -l`, `-la`, `-c 3`, `-c3`, and `--` to end the options.

use std::collections::HashMap;

use crate::error::ShellError;

#[derive(Debug, Default)]
pub struct Args {
    flags: Vec<char>,
    values: HashMap<char, String>,
    positional: Vec<String>,
}

impl Args {
    /// Split `raw` into options and positional arguments. `flags` lists the options which stand alone, `valued` the
    /// ones which take a value.
    pub fn parse(cmd: &'static str, raw: &[String], flags: &str, valued: &str) -> Result<Self, ShellError> {
        let mut res = Self::default();
        let mut iter = raw.iter();
        while let Some(arg) = iter.next() {
            if arg == "--" {
                res.positional.extend(iter.cloned());
                break;
            }
            let Some(opts) = arg.strip_prefix('-').filter(|o| !o.is_empty()) else {
                res.positional.push(arg.clone());
                continue;
            };
            for (i, ch) in opts.char_indices() {
                if flags.contains(ch) {
                    res.flags.push(ch);
                } else if valued.contains(ch) {
                    let rest = &opts[i + ch.len_utf8()..];
                    let value = if rest.is_empty() {
                        iter.next().cloned().ok_or_else(|| {
                            ShellError::invalid(cmd, format!("option requires an argument -- '{}'", ch))
                        })?
                    } else {
                        rest.to_owned()
                    };
                    res.values.insert(ch, value);
                    break;
                } else {
                    return Err(ShellError::invalid(cmd, format!("invalid option -- '{}'", ch)));
                }
            }
        }
        Ok(res)
    }

    pub fn flag(&self, ch: char) -> bool {
        self.flags.contains(&ch)
    }

    pub fn value(&self, ch: char) -> Option<&str> {
        self.values.get(&ch).map(|s| s.as_str())
    }

    pub fn positional(&self) -> &[String] {
        &self.positional
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn raw(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn combined_flags_split() {
        let args = Args::parse("ls", &raw(&["-la", "/home"]), "al", "").expect("valid");
        assert!(args.flag('l'));
        assert!(args.flag('a'));
        assert_eq!(args.positional(), &["/home".to_string()]);
    }

    #[test]
    fn values_attached_or_separate() {
        let args = Args::parse("ping", &raw(&["-c", "3", "host"]), "", "c").expect("valid");
        assert_eq!(args.value('c'), Some("3"));
        let args = Args::parse("ping", &raw(&["-c3", "host"]), "", "c").expect("valid");
        assert_eq!(args.value('c'), Some("3"));
        assert_eq!(args.positional(), &["host".to_string()]);
    }

    #[test]
    fn flags_can_precede_value() {
        let args = Args::parse("curl", &raw(&["-iX", "POST", "url"]), "i", "X").expect("valid");
        assert!(args.flag('i'));
        assert_eq!(args.value('X'), Some("POST"));
    }

    #[test]
    fn double_dash_ends_options() {
        let args = Args::parse("cat", &raw(&["--", "-weird"]), "", "").expect("valid");
        assert_eq!(args.positional(), &["-weird".to_string()]);
        let args = Args::parse("cat", &raw(&["-"]), "", "").expect("valid");
        assert_eq!(args.positional(), &["-".to_string()]);
    }

    #[test]
    fn unknown_and_incomplete_options_rejected() {
        let e = Args::parse("ls", &raw(&["-z"]), "al", "").expect_err("invalid");
        assert_eq!(e.to_string(), "ls: invalid option -- 'z'");
        let e = Args::parse("ping", &raw(&["host", "-c"]), "", "c").expect_err("invalid");
        assert_eq!(e.to_string(), "ping: option requires an argument -- 'c'");
    }
}
