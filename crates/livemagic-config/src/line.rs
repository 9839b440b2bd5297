//! Entry lines of a live-helper config file.
//!
//! Files are shell fragments sourced by live-helper, one `KEY="value"` per
//! line. A quoted value may run over several lines. Anything that is not an
//! assignment (comments, blank lines) is not an entry and is kept verbatim by
//! the caller.

/// Split an assignment line into its key and unquoted value.
///
/// Returns `None` for comments, blank lines and anything else that is not
/// `NAME=...` with a shell variable name.
pub fn parse_entry(line: &str) -> Option<(&str, String)> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    let (key, rest) = trimmed.split_once('=')?;
    if !is_variable_name(key) {
        return None;
    }

    Some((key, unquote(rest)))
}

/// True when `line` is an assignment whose quoted value is still open at
/// the end of the text, so the next physical line belongs to it.
pub fn has_open_quote(line: &str) -> bool {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        return false;
    }
    let Some((key, rest)) = trimmed.split_once('=') else {
        return false;
    };
    if !is_variable_name(key) {
        return false;
    }

    let mut chars = rest.chars();
    match chars.next() {
        Some('"') => {
            while let Some(c) = chars.next() {
                match c {
                    '"' => return false,
                    '\\' => {
                        chars.next();
                    }
                    _ => {}
                }
            }
            true
        }
        Some('\'') => !chars.any(|c| c == '\''),
        _ => false,
    }
}

fn is_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Strip shell quoting from the right-hand side of an assignment.
///
/// Unterminated quotes run to the end of the text. Text after the closing
/// quote (usually a trailing comment) is dropped. A backslash before a line
/// break joins the two lines, as in the shell.
fn unquote(rest: &str) -> String {
    let mut chars = rest.chars();
    match chars.next() {
        Some('"') => {
            let mut out = String::new();
            while let Some(c) = chars.next() {
                match c {
                    '"' => break,
                    '\\' => match chars.next() {
                        Some(next @ ('"' | '\\' | '$' | '`')) => out.push(next),
                        Some('\n') => {}
                        Some(next) => {
                            out.push('\\');
                            out.push(next);
                        }
                        None => out.push('\\'),
                    },
                    _ => out.push(c),
                }
            }
            out
        }
        Some('\'') => chars.take_while(|&c| c != '\'').collect(),
        Some(_) => rest
            .split(|c: char| c.is_whitespace())
            .next()
            .unwrap_or_default()
            .to_string(),
        None => String::new(),
    }
}

/// Render an assignment line with the value double-quoted.
///
/// Line breaks cannot live inside a one-line entry and are written as spaces.
pub fn format_entry(key: &str, raw: &str) -> String {
    let mut line = String::with_capacity(key.len() + raw.len() + 3);
    line.push_str(key);
    line.push_str("=\"");
    for c in raw.chars() {
        match c {
            '"' | '\\' | '$' | '`' => {
                line.push('\\');
                line.push(c);
            }
            '\n' | '\r' => line.push(' '),
            _ => line.push(c),
        }
    }
    line.push('"');
    line
}
