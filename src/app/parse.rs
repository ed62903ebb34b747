//! Turning a line of input into a command name and its arguments.
//!
//! Two forms are accepted:
//!
//! - shell words: `ls -la "/home/my dir"`, with single quotes (literal), double quotes (backslash escapes `"`, `\`),
//!   and bare backslash escapes
//! - call form: `ls("/home", "-a")`, arguments separated by commas and optionally quoted

use std::mem;

use crate::error::ShellError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub name: String,
    pub args: Vec<String>,
}

fn syntax(msg: &str) -> ShellError {
    ShellError::invalid("sh", format!("syntax error: {}", msg))
}

/// Parse one line. Blank lines give `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Invocation>, ShellError> {
    let line = line.trim();
    if let Some(open) = line.find('(') {
        let name = &line[..open];
        if is_name(name) {
            let inner = line[open + 1..]
                .strip_suffix(')')
                .ok_or_else(|| syntax("missing ')'"))?;
            let args = split_commas(inner)?
                .into_iter()
                .map(|a| words(a).map(|w| w.join(" ")))
                .collect::<Result<_, _>>()?;
            return Ok(Some(Invocation {
                name: name.into(),
                args,
            }));
        }
    }
    let mut words = words(line)?.into_iter();
    Ok(words.next().map(|name| Invocation {
        name,
        args: words.collect(),
    }))
}

fn is_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Split the inside of a call on top-level commas, leaving quoting for [`words`] to handle.
fn split_commas(inner: &str) -> Result<Vec<&str>, ShellError> {
    if inner.trim().is_empty() {
        return Ok(vec![]);
    }
    let mut parts = vec![];
    let mut start = 0;
    let mut quote = None;
    let mut escaped = false;
    for (i, c) in inner.char_indices() {
        match (quote, c) {
            _ if escaped => escaped = false,
            (Some('\''), '\'') => quote = None,
            (Some('\''), _) => (),
            (_, '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => (),
            (None, '"' | '\'') => quote = Some(c),
            (None, ',') => {
                parts.push(&inner[start..i]);
                start = i + 1;
            }
            (None, _) => (),
        }
    }
    if quote.is_some() {
        return Err(syntax("unterminated quote"));
    }
    parts.push(&inner[start..]);
    if parts.iter().any(|p| p.trim().is_empty()) {
        return Err(syntax("empty argument"));
    }
    Ok(parts)
}

/// Split into shell words, resolving quotes and escapes.
pub fn words(line: &str) -> Result<Vec<String>, ShellError> {
    let mut words = vec![];
    let mut cur = String::new();
    let mut in_word = false;
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => cur.push(c),
                        None => return Err(syntax("unterminated quote")),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c @ ('"' | '\\')) => cur.push(c),
                            Some(c) => {
                                cur.push('\\');
                                cur.push(c);
                            }
                            None => return Err(syntax("unterminated quote")),
                        },
                        Some(c) => cur.push(c),
                        None => return Err(syntax("unterminated quote")),
                    }
                }
            }
            '\\' => {
                in_word = true;
                if let Some(c) = chars.next() {
                    cur.push(c);
                }
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(mem::take(&mut cur));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                cur.push(c);
            }
        }
    }
    if in_word {
        words.push(cur);
    }
    Ok(words)
}
