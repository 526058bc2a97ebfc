//! Server → client line format.
//!
//! Every reply is newline-terminated UTF-8. Normal output is prefixed with
//! `"> "`, errors with `"err: "`. Multi-line output becomes one prefixed
//! line per line of text, so clients can always read line by line.

/// Prefix for normal output lines.
pub const INFO_PREFIX: &str = "> ";
/// Prefix for error lines.
pub const ERROR_PREFIX: &str = "err: ";

pub const NAME_TAKEN: &str =
    "There is a user which is used for this name. Please choose another name";
pub const UNKNOWN_PEER: &str = "No such user exists. check available users again.";
pub const NO_PEER: &str =
    "no one hears you. use '/list' to see users and '/join' to pick one";
pub const FAREWELL: &str = "skychat will miss you...";
pub const HELP_HINT: &str = "use '/help' to list commands";
pub const NAME_REQUIRED: &str = "you need to set a name first";
pub const NO_MESSAGES: &str = "no messages found";
pub const HISTORY_DISABLED: &str = "history is disabled";

/// Display name of a session that has not registered yet.
pub const ANONYMOUS: &str = "anonymous";

pub const HELP: &str = "\
Skychat : Chat Platform
Usage : /<command> [arguments]
/name <name>   : specify your name
/list          : list connected users
/join <name>   : pick who receives your messages
/msg <text>    : send text to that user
/quit          : leave skychat
/help          : show this summary
get-last <n> | get-contains <word> | get-m-from-me | get-m-to-me : message history
  get-m-* accept ||contains <word> or ||last <n>";

pub fn registered(name: &str) -> String {
    format!("you will be known as {name}")
}

pub fn talking_to(name: &str) -> String {
    format!("You are now talking to :{name}")
}

pub fn available_users(names: &[String]) -> String {
    format!("available users: {}", names.join(", "))
}

pub fn unknown_command(token: &str) -> String {
    format!("unknown command: {token}")
}

/// Chat line as the recipient sees it before encryption.
pub fn chat_line(sender: &str, body: &str) -> String {
    format!("{sender} : {body}")
}

/// One unit of output for a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Info(String),
    Error(String),
}

impl Reply {
    pub fn info(text: impl Into<String>) -> Self {
        Reply::Info(text.into())
    }

    pub fn error(text: impl Into<String>) -> Self {
        Reply::Error(text.into())
    }

    /// Render as newline-terminated wire lines.
    pub fn encode(&self) -> String {
        let (prefix, text) = match self {
            Reply::Info(text) => (INFO_PREFIX, text),
            Reply::Error(text) => (ERROR_PREFIX, text),
        };
        let mut out = String::with_capacity(text.len() + prefix.len() + 1);
        for line in text.split('\n') {
            out.push_str(prefix);
            out.push_str(line.trim_end_matches('\r'));
            out.push('\n');
        }
        out
    }

    /// Parse one received line (without its terminator) back into a reply.
    /// Returns `None` for lines that carry neither prefix.
    pub fn decode(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if let Some(text) = line.strip_prefix(INFO_PREFIX) {
            Some(Reply::Info(text.to_string()))
        } else {
            line.strip_prefix(ERROR_PREFIX)
                .map(|text| Reply::Error(text.to_string()))
        }
    }
}
