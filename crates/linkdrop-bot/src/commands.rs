//! Inbound text classification.

use linkdrop_core::{TaskId, TaskSource};

/// What an incoming text message asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// `/start` or `/help`.
    Help,
    /// `/update` (owner only).
    Update,
    /// `/cancel <id>`; `None` when the argument is missing or not a task id.
    Cancel(Option<TaskId>),
    /// `/queue`.
    Queue,
    /// Any other slash command.
    UnknownCommand(String),
    /// A downloadable link.
    Link(TaskSource),
    /// Anything else.
    Other,
    /// A command addressed to another bot; gets no reply.
    Ignored,
}

/// Classify a message text.
///
/// Commands addressed to another bot (`/cmd@other_bot`) are ignored.
pub fn parse_inbound(text: &str, bot_username: &str) -> Inbound {
    let text = text.trim();
    let Some(command_line) = text.strip_prefix('/') else {
        return TaskSource::parse(text).map_or(Inbound::Other, Inbound::Link);
    };

    let (head, rest) = command_line
        .split_once(char::is_whitespace)
        .map_or((command_line, ""), |(h, r)| (h, r.trim()));
    let name = match head.split_once('@') {
        Some((name, target)) if target.eq_ignore_ascii_case(bot_username) => name,
        Some(_) => return Inbound::Ignored,
        None => head,
    };

    match name.to_ascii_lowercase().as_str() {
        "start" | "help" => Inbound::Help,
        "update" => Inbound::Update,
        "queue" | "status" => Inbound::Queue,
        "cancel" => Inbound::Cancel(rest.split_whitespace().next().and_then(|a| a.parse().ok())),
        other => Inbound::UnknownCommand(other.to_string()),
    }
}

pub const HELP_TEXT: &str = "Send me a link and I will download it and upload the file here.\n\
\n\
Formats:\n\
  <url>\n\
  <url> | <file name>\n\
\n\
Files larger than the upload limit are split into numbered parts.\n\
\n\
Commands:\n\
  /queue - running and waiting tasks\n\
  /cancel <id> - cancel one of your tasks\n\
  /update - update the download tools (owner only)\n\
  /help - this message";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands() {
        assert_eq!(parse_inbound("/start", "dropbot"), Inbound::Help);
        assert_eq!(parse_inbound("/help@DropBot", "dropbot"), Inbound::Help);
        assert_eq!(parse_inbound("/queue", "dropbot"), Inbound::Queue);
        assert_eq!(parse_inbound("/update", "dropbot"), Inbound::Update);
        assert_eq!(
            parse_inbound("/cancel #4", "dropbot"),
            Inbound::Cancel(Some(TaskId::new(4)))
        );
        assert_eq!(parse_inbound("/cancel", "dropbot"), Inbound::Cancel(None));
        assert_eq!(parse_inbound("/cancel abc", "dropbot"), Inbound::Cancel(None));
        assert_eq!(
            parse_inbound("/frobnicate", "dropbot"),
            Inbound::UnknownCommand("frobnicate".into())
        );
    }

    #[test]
    fn test_command_for_other_bot_is_ignored() {
        assert_eq!(parse_inbound("/start@otherbot", "dropbot"), Inbound::Ignored);
        assert_eq!(parse_inbound("/cancel@otherbot 3", "dropbot"), Inbound::Ignored);
    }

    #[test]
    fn test_links() {
        match parse_inbound("https://example.com/a.mp4 | clip", "dropbot") {
            Inbound::Link(source) => {
                assert_eq!(source.url, "https://example.com/a.mp4");
                assert_eq!(source.display_name.as_deref(), Some("clip"));
            }
            other => panic!("expected link, got {other:?}"),
        }
        assert_eq!(parse_inbound("hello", "dropbot"), Inbound::Other);
    }
}
