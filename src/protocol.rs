//! Protocol parser, command definitions and reply rendering for TxVault
//!
//! Requests are single text lines: `COMMAND arg1 arg2 ...`, split on ASCII
//! whitespace with the command name matched case-insensitively. Replies are
//! one text line each, terminated by `\n`.

use crate::error::CommandError;
use nom::{
    bytes::complete::{take_till1, take_while, take_while1},
    multi::separated_list0,
    sequence::delimited,
    IResult,
};
use std::str::FromStr;

/// Recognized command names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Set,
    Get,
    Delete,
    Incr,
    IncrBy,
    Multi,
    Exec,
    Disconnect,
}

impl Verb {
    /// Data commands touch the store and are deferred while a transaction is open.
    pub fn is_data(self) -> bool {
        matches!(
            self,
            Verb::Set | Verb::Get | Verb::Delete | Verb::Incr | Verb::IncrBy
        )
    }
}

impl FromStr for Verb {
    type Err = CommandError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_uppercase().as_str() {
            "SET" => Ok(Verb::Set),
            "GET" => Ok(Verb::Get),
            "DELETE" => Ok(Verb::Delete),
            "INCR" => Ok(Verb::Incr),
            "INCRBY" => Ok(Verb::IncrBy),
            "MULTI" => Ok(Verb::Multi),
            "EXEC" => Ok(Verb::Exec),
            "DISCONNECT" => Ok(Verb::Disconnect),
            other => Err(CommandError::UnknownCommand(other.to_string())),
        }
    }
}

/// Data commands with their arguments resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set { key: String, value: String },
    Get { key: String },
    Delete { key: String },
    Incr { key: String },
    IncrBy { key: String, amount: i64 },
}

/// One tokenized request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request<'a> {
    /// Upper-cased command name as sent
    pub name: String,
    /// `None` when the name is not a known command
    pub verb: Option<Verb>,
    pub args: Vec<&'a str>,
}

impl<'a> Request<'a> {
    /// Resolve the arguments of a data command.
    ///
    /// Control verbs and unknown names come back as `UnknownCommand`.
    pub fn into_command(self) -> Result<Command, CommandError> {
        let args = self.args;
        match self.verb {
            Some(Verb::Set) => {
                if args.len() < 2 {
                    return Err(CommandError::Usage("Usage: SET <key> <value>"));
                }
                Ok(Command::Set {
                    key: args[0].to_string(),
                    value: args[1..].join(" "),
                })
            }
            Some(Verb::Get) => match args.first() {
                Some(key) => Ok(Command::Get { key: key.to_string() }),
                None => Err(CommandError::Usage("Usage: GET <key>")),
            },
            Some(Verb::Delete) => match args.first() {
                Some(key) => Ok(Command::Delete { key: key.to_string() }),
                None => Err(CommandError::Usage("Usage: DELETE <key>")),
            },
            Some(Verb::Incr) => match args.first() {
                Some(key) => Ok(Command::Incr { key: key.to_string() }),
                None => Err(CommandError::Usage("Usage: INCR <key>")),
            },
            Some(Verb::IncrBy) => {
                if args.len() < 2 {
                    return Err(CommandError::Usage("Usage: INCRBY <key> <increment>"));
                }
                let amount = args[1]
                    .parse::<i64>()
                    .map_err(|_| CommandError::InvalidIncrement)?;
                Ok(Command::IncrBy {
                    key: args[0].to_string(),
                    amount,
                })
            }
            _ => Err(CommandError::UnknownCommand(self.name)),
        }
    }
}

/// Split a line into whitespace-separated tokens
pub fn tokenize(line: &str) -> Vec<&str> {
    tokens(line).map(|(_, parts)| parts).unwrap_or_default()
}

fn tokens(input: &str) -> IResult<&str, Vec<&str>> {
    delimited(
        take_while(is_separator),
        separated_list0(take_while1(is_separator), take_till1(is_separator)),
        take_while(is_separator),
    )(input)
}

fn is_separator(c: char) -> bool {
    c.is_ascii_whitespace()
}

/// Tokenize a line into a request; blank lines yield `None`.
pub fn parse_request(line: &str) -> Option<Request<'_>> {
    let mut parts = tokenize(line).into_iter();
    let first = parts.next()?;

    Some(Request {
        name: first.to_ascii_uppercase(),
        verb: first.parse().ok(),
        args: parts.collect(),
    })
}

/// Replies written back to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Queued,
    Nil,
    Integer(i64),
    Value(String),
    Error(String),
}

impl From<CommandError> for Reply {
    fn from(err: CommandError) -> Self {
        Reply::Error(err.to_string())
    }
}

impl Reply {
    /// Render the reply as a single line without the terminator
    pub fn to_line(&self) -> String {
        match self {
            Reply::Ok => "OK".to_string(),
            Reply::Queued => "QUEUED".to_string(),
            Reply::Nil => "(nil)".to_string(),
            Reply::Integer(n) => format!("(integer) {}", n),
            Reply::Value(v) => quote_value(v),
            Reply::Error(e) => e.clone(),
        }
    }

    /// Serialize reply to bytes for network transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut line = self.to_line();
        line.push('\n');
        line.into_bytes()
    }

    /// Parse a reply line as rendered by [`Reply::to_line`]
    pub fn parse(line: &str) -> Reply {
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        match line {
            "OK" => Reply::Ok,
            "QUEUED" => Reply::Queued,
            "(nil)" => Reply::Nil,
            _ => {
                if let Some(n) = line
                    .strip_prefix("(integer) ")
                    .and_then(|n| n.parse::<i64>().ok())
                {
                    return Reply::Integer(n);
                }
                if line.len() >= 2 && line.starts_with('"') && line.ends_with('"') {
                    return Reply::Value(unquote(&line[1..line.len() - 1]));
                }
                Reply::Error(line.to_string())
            }
        }
    }
}

/// Values that already carry their quotes go out verbatim; everything else
/// is wrapped and escaped.
fn quote_value(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        value.to_string()
    } else {
        format!("{:?}", value)
    }
}

fn unquote(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(escaped @ ('"' | '\\')) => out.push(escaped),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}
