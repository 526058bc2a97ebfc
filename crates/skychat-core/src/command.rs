//! Client command grammar.
//!
//! Every input line is split on single spaces. The first token selects the
//! command, case-sensitively; the remaining tokens are kept verbatim as
//! arguments and validated by the dispatcher when the command is applied.
//!
//! ```text
//! /name <displayName>        register or rename
//! /join <displayName>        select routing peer
//! /list                      list other registered users
//! /msg <word>...             send text to the current peer
//! /quit                      leave
//! /help                      command summary
//! get-last <n>               last n messages sent by me
//! get-contains <word>        messages sent by me containing word
//! get-m-from-me [filter]     all messages sent by me
//! get-m-to-me [filter]       all messages sent to me
//!   filter: ||contains <word> | ||last <n>
//! ```

use std::fmt;

use thiserror::Error;

/// Stable identifier of one accepted connection.
///
/// Commands carry this instead of a reference to the session so the
/// dispatcher always resolves it against its current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which history query a line asked for. Arguments are parsed later by
/// [`HistoryQuery::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKind {
    Last,
    Contains,
    FromMe,
    ToMe,
}

impl HistoryKind {
    fn usage(self) -> &'static str {
        match self {
            HistoryKind::Last => "usage: get-last <n>",
            HistoryKind::Contains => "usage: get-contains <word>",
            HistoryKind::FromMe => "usage: get-m-from-me [||contains <word> | ||last <n>]",
            HistoryKind::ToMe => "usage: get-m-to-me [||contains <word> | ||last <n>]",
        }
    }
}

/// Command kind tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    SetName,
    JoinPeer,
    ListPeers,
    SendMessage,
    Quit,
    Help,
    History(HistoryKind),
    /// First token matched no command word. Carries that token.
    Unrecognized(String),
    /// The line could not be accepted at all (e.g. it was too long).
    Rejected(ParseError),
}

impl CommandKind {
    fn usage(&self) -> &'static str {
        match self {
            CommandKind::SetName => "usage: /name <name>",
            CommandKind::JoinPeer => "usage: /join <name>",
            CommandKind::SendMessage => "usage: /msg <text>",
            CommandKind::History(kind) => kind.usage(),
            _ => "usage: /help",
        }
    }
}

/// One parsed client action, consumed exactly once by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub session: SessionId,
    pub kind: CommandKind,
    /// Tokens after the command word, split on single spaces.
    pub args: Vec<String>,
}

impl Command {
    pub fn new(session: SessionId, kind: CommandKind) -> Self {
        Self {
            session,
            kind,
            args: Vec::new(),
        }
    }

    /// Parse one input line from `session`.
    pub fn parse(session: SessionId, line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut tokens = line.split(' ');
        let word = tokens.next().unwrap_or_default();

        let kind = match word {
            "/name" => CommandKind::SetName,
            "/join" => CommandKind::JoinPeer,
            "/list" => CommandKind::ListPeers,
            "/msg" => CommandKind::SendMessage,
            "/quit" => CommandKind::Quit,
            "/help" => CommandKind::Help,
            "get-last" => CommandKind::History(HistoryKind::Last),
            "get-contains" => CommandKind::History(HistoryKind::Contains),
            "get-m-from-me" => CommandKind::History(HistoryKind::FromMe),
            "get-m-to-me" => CommandKind::History(HistoryKind::ToMe),
            other => CommandKind::Unrecognized(other.to_string()),
        };

        Self {
            session,
            kind,
            args: tokens.map(str::to_string).collect(),
        }
    }

    /// The single non-empty argument of `/name` and `/join`.
    pub fn single_arg(&self) -> Result<&str, ParseError> {
        match self.args.as_slice() {
            [arg] if !arg.is_empty() => Ok(arg.as_str()),
            _ => Err(ParseError::Usage(self.kind.usage())),
        }
    }

    /// The `/msg` body: all argument tokens joined by single spaces.
    pub fn body(&self) -> Result<String, ParseError> {
        let body = self.args.join(" ");
        if body.trim().is_empty() {
            return Err(ParseError::Usage(self.kind.usage()));
        }
        Ok(body)
    }
}

/// Narrowing applied to a `get-m-*` result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostFilter {
    Contains(String),
    Last(usize),
}

/// A fully validated history query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryQuery {
    /// Most recent `n` messages sent by the caller, newest first.
    Last(usize),
    /// Messages sent by the caller whose body contains the word.
    Contains(String),
    /// Messages sent by the caller.
    FromMe(Option<PostFilter>),
    /// Messages addressed to the caller.
    ToMe(Option<PostFilter>),
}

impl HistoryQuery {
    /// Validate the arguments for `kind`. Arity is exact: one argument for
    /// `get-last` / `get-contains`, and zero or two for the `get-m-*` forms.
    pub fn parse(kind: HistoryKind, args: &[String]) -> Result<Self, ParseError> {
        let usage = || ParseError::Usage(kind.usage());
        match kind {
            HistoryKind::Last => match args {
                [n] => Ok(HistoryQuery::Last(parse_count(n)?)),
                _ => Err(usage()),
            },
            HistoryKind::Contains => match args {
                [word] if !word.is_empty() => Ok(HistoryQuery::Contains(word.clone())),
                _ => Err(usage()),
            },
            HistoryKind::FromMe | HistoryKind::ToMe => {
                let filter = match args {
                    [] => None,
                    [name, value] => Some(parse_filter(name, value)?),
                    _ => return Err(usage()),
                };
                Ok(if kind == HistoryKind::FromMe {
                    HistoryQuery::FromMe(filter)
                } else {
                    HistoryQuery::ToMe(filter)
                })
            }
        }
    }
}

fn parse_filter(name: &str, value: &str) -> Result<PostFilter, ParseError> {
    match name {
        "||contains" if !value.is_empty() => Ok(PostFilter::Contains(value.to_string())),
        "||contains" => Err(ParseError::Usage("usage: ||contains <word>")),
        "||last" => Ok(PostFilter::Last(parse_count(value)?)),
        other => Err(ParseError::UnknownFilter(other.to_string())),
    }
}

fn parse_count(raw: &str) -> Result<usize, ParseError> {
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ParseError::InvalidCount(raw.to_string())),
    }
}

/// Malformed command arguments. Shown to the issuing client only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("{0}")]
    Usage(&'static str),

    #[error("expected a positive number, got '{0}'")]
    InvalidCount(String),

    #[error("unknown filter: {0}")]
    UnknownFilter(String),

    #[error("line longer than {0} bytes")]
    LineTooLong(usize),
}
