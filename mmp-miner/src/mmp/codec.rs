//! MMP line tokenization.
//!
//! MMP uses IRC-style argument passing: a line is space-separated tokens,
//! with an optional final argument introduced by `" :"` which is the only
//! argument that may itself contain spaces. Lines are CRLF-delimited on the
//! wire; the transport strips the delimiter before parsing.

/// A tokenized protocol line: the command name and its ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub command: String,
    pub args: Vec<String>,
}

/// Tokenize one line.
///
/// The line is split on the first occurrence of `" :"`; everything before it
/// is split on single spaces (consecutive spaces yield empty tokens, as in
/// the wire grammar), and everything after it becomes one final argument.
/// The first space-split token is the command name; an empty line yields an
/// empty command with no arguments, which the dispatcher ignores.
pub fn parse(line: &str) -> Line {
    let (head, trailing) = match line.split_once(" :") {
        Some((head, trailing)) => (head, Some(trailing)),
        None => (line, None),
    };

    let mut tokens = head.split(' ');
    let command = tokens.next().unwrap_or_default().to_string();
    let mut args: Vec<String> = tokens.map(str::to_string).collect();

    if let Some(trailing) = trailing {
        args.push(trailing.to_string());
    }

    Line { command, args }
}

/// Format a trailing free-text argument for transmission.
///
/// The `:` marker lets the argument contain spaces; it must be the last
/// token on the line.
pub fn trailing(text: &str) -> String {
    format!(":{}", text)
}
