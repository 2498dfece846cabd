//! Inbound command dispatch.
//!
//! A static signature table maps each recognized command name to its
//! expected argument kinds. Dispatch coerces the tokenized arguments to
//! those kinds and produces a typed [`ServerCommand`], so handlers never
//! re-validate primitive parsing. Unknown commands are ignored for forward
//! protocol compatibility; known commands with the wrong arity or a
//! non-integer token in an integer slot are flagged as illegal and dropped
//! before any handler runs.

use super::codec::Line;

/// Argument kinds a command signature may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArgKind {
    Str,
    Int,
}

/// Signature table for recognized inbound commands.
const COMMANDS: &[(&str, &[ArgKind])] = &[
    ("MSG", &[ArgKind::Str]),
    ("TARGET", &[ArgKind::Str]),
    ("WORK", &[ArgKind::Str, ArgKind::Int]),
    ("BLOCK", &[ArgKind::Int]),
    ("ACCEPTED", &[ArgKind::Str]),
    ("REJECTED", &[ArgKind::Str]),
];

/// A fully typed inbound command, ready for its handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerCommand {
    /// Operator-facing message
    Msg(String),

    /// New difficulty target, hex-encoded
    Target(String),

    /// New work assignment: hex-encoded header prefix and search-space mask
    Work { data: String, mask: u32 },

    /// Informational block-height notice
    Block(u64),

    /// A pending submission was accepted; carries the hex payload
    Accepted(String),

    /// A pending submission was rejected; carries the hex payload
    Rejected(String),
}

/// Dispatch outcome.
///
/// `Illegal` is the malformed-command hook: the caller decides what to do
/// with it (the client logs it and drops the line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Recognized and well-formed
    Command(ServerCommand),

    /// Unknown command name; ignored silently
    Ignored,

    /// Known command with wrong arity or a failed integer coercion
    Illegal(String),
}

/// Look up a line in the signature table and coerce its arguments.
pub fn dispatch(line: &Line) -> Dispatch {
    let kinds = match COMMANDS.iter().find(|(name, _)| *name == line.command) {
        Some((_, kinds)) => *kinds,
        None => return Dispatch::Ignored,
    };

    if kinds.len() != line.args.len() {
        return Dispatch::Illegal(line.command.clone());
    }

    // Every integer slot must coerce before any handler sees the command.
    for (kind, arg) in kinds.iter().zip(&line.args) {
        if *kind == ArgKind::Int && arg.parse::<i64>().is_err() {
            return Dispatch::Illegal(line.command.clone());
        }
    }

    let args = &line.args;
    let command = match line.command.as_str() {
        "MSG" => ServerCommand::Msg(args[0].clone()),
        "TARGET" => ServerCommand::Target(args[0].clone()),
        "WORK" => match parse_uint(&args[1]) {
            Some(mask) => ServerCommand::Work {
                data: args[0].clone(),
                mask: mask as u32,
            },
            None => return Dispatch::Illegal(line.command.clone()),
        },
        "BLOCK" => match parse_uint(&args[0]) {
            Some(height) => ServerCommand::Block(height),
            None => return Dispatch::Illegal(line.command.clone()),
        },
        "ACCEPTED" => ServerCommand::Accepted(args[0].clone()),
        "REJECTED" => ServerCommand::Rejected(args[0].clone()),
        _ => return Dispatch::Ignored,
    };

    Dispatch::Command(command)
}

// Integer slots coerce through i64; fields that are counts additionally
// reject negatives.
fn parse_uint(token: &str) -> Option<u64> {
    token.parse::<i64>().ok().and_then(|v| u64::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmp::codec::parse;

    #[test]
    fn unknown_command_is_ignored() {
        assert_eq!(dispatch(&parse("FROBNICATE a b c")), Dispatch::Ignored);
    }

    #[test]
    fn empty_line_is_ignored() {
        assert_eq!(dispatch(&parse("")), Dispatch::Ignored);
    }

    #[test]
    fn msg_carries_trailing_text() {
        let d = dispatch(&parse("MSG :welcome to the pool"));
        assert_eq!(
            d,
            Dispatch::Command(ServerCommand::Msg("welcome to the pool".to_string()))
        );
    }

    #[test]
    fn work_coerces_mask_to_integer() {
        let d = dispatch(&parse("WORK deadbeef 32"));
        assert_eq!(
            d,
            Dispatch::Command(ServerCommand::Work {
                data: "deadbeef".to_string(),
                mask: 32,
            })
        );
    }

    #[test]
    fn non_numeric_integer_slot_is_illegal() {
        assert_eq!(
            dispatch(&parse("WORK deadbeef lots")),
            Dispatch::Illegal("WORK".to_string())
        );
        assert_eq!(
            dispatch(&parse("BLOCK soon")),
            Dispatch::Illegal("BLOCK".to_string())
        );
    }

    #[test]
    fn arity_mismatch_is_illegal() {
        assert_eq!(
            dispatch(&parse("WORK deadbeef")),
            Dispatch::Illegal("WORK".to_string())
        );
        assert_eq!(
            dispatch(&parse("BLOCK 1 2")),
            Dispatch::Illegal("BLOCK".to_string())
        );
    }

    #[test]
    fn negative_count_is_illegal() {
        assert_eq!(
            dispatch(&parse("BLOCK -5")),
            Dispatch::Illegal("BLOCK".to_string())
        );
        assert_eq!(
            dispatch(&parse("WORK deadbeef -1")),
            Dispatch::Illegal("WORK".to_string())
        );
    }

    #[test]
    fn accepted_and_rejected_carry_hex() {
        assert_eq!(
            dispatch(&parse("ACCEPTED abcd")),
            Dispatch::Command(ServerCommand::Accepted("abcd".to_string()))
        );
        assert_eq!(
            dispatch(&parse("REJECTED abcd")),
            Dispatch::Command(ServerCommand::Rejected("abcd".to_string()))
        );
    }

    #[test]
    fn block_height_parses() {
        assert_eq!(
            dispatch(&parse("BLOCK 840000")),
            Dispatch::Command(ServerCommand::Block(840000))
        );
    }
}
