//! Parsing of terminal input lines into session operations.

use std::path::PathBuf;

/// One line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    /// Plain text to send
    Send(String),
    Older,
    Newer,
    Leave,
    Delete,
    Ban { user_id: String, nickname: String },
    Image(PathBuf),
    Reconnect,
    Members,
    Help,
    Quit,
    /// Slash command that could not be understood
    Invalid(String),
}

pub const HELP: &str = "\
/older                   load earlier messages
/newer                   load messages missed since the last one
/members                 show participants
/image <path>            send a JPEG image
/reconnect               reconnect and catch up
/leave                   leave the group buy
/delete                  delete the post (owner only)
/ban <user-id> <name>    remove a participant (owner only)
/quit                    close the chat";

impl InputCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Self::Send(line.to_string());
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        match (name, args.as_slice()) {
            ("older", []) => Self::Older,
            ("newer", []) => Self::Newer,
            ("leave", []) => Self::Leave,
            ("delete", []) => Self::Delete,
            ("members", []) => Self::Members,
            ("reconnect", []) => Self::Reconnect,
            ("help", []) => Self::Help,
            ("quit" | "exit", []) => Self::Quit,
            ("ban", [user_id, nickname @ ..]) if !nickname.is_empty() => Self::Ban {
                user_id: user_id.to_string(),
                nickname: nickname.join(" "),
            },
            ("image", [_, ..]) => {
                let path = rest.strip_prefix("image").unwrap_or(rest).trim();
                Self::Image(PathBuf::from(path))
            }
            _ => Self::Invalid(line.to_string()),
        }
    }
}
