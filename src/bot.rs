use std::sync::Arc;

use anyhow::Result;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::html;
use tracing::{info, warn};

use crate::broadcast::Event;
use crate::matcher::{ChatKind, IncomingMessage};
use crate::notifier;
use crate::state::AppState;
use crate::store::{parse_chat_id, StoreError};

/// A recognized monitoring command. Anything else flows to the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    AddKeyword(String),
    DelKeyword(String),
    Keywords,
    AddChat(String),
    DelChat(String),
    Chats,
}

impl Command {
    /// Parse a message text into a command. The argument is the rest of the
    /// line, trimmed (may be empty). A `@botname` suffix on the command is
    /// tolerated so commands work in groups.
    pub fn parse(text: &str) -> Option<Command> {
        let mut parts = text.trim().splitn(2, char::is_whitespace);
        let head = parts.next()?;
        let head = head.split('@').next().unwrap_or(head);
        let arg = parts.next().map(str::trim).unwrap_or("").to_string();

        match head {
            "/start" => Some(Command::Start),
            "/add_keyword" => Some(Command::AddKeyword(arg)),
            "/del_keyword" => Some(Command::DelKeyword(arg)),
            "/keywords" => Some(Command::Keywords),
            "/add_chat" => Some(Command::AddChat(arg)),
            "/del_chat" => Some(Command::DelChat(arg)),
            "/chats" => Some(Command::Chats),
            _ => None,
        }
    }
}

/// Start the Telegram bot: command interface plus message ingestion.
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let bot = Bot::new(&state.config.telegram.bot_token);

    info!("Starting Telegram bot...");

    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("bot"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    if let Some(command) = msg.text().and_then(Command::parse) {
        return handle_command(bot, &msg, command, state).await;
    }
    scan_message(bot, &msg, state).await
}

async fn handle_command(
    bot: Bot,
    msg: &Message,
    command: Command,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let reply = match command {
        Command::Start => welcome_text(),
        Command::AddKeyword(raw) => match state.add_keyword(&raw).await {
            Ok(keyword) => format!("Keyword '<code>{}</code>' added.", html::escape(&keyword)),
            Err(StoreError::EmptyKeyword) => {
                "Please provide a keyword after the command.".to_string()
            }
            Err(e) => e.to_string(),
        },
        Command::DelKeyword(raw) => match state.remove_keyword(&raw).await {
            Ok(keyword) => format!("Keyword '<code>{}</code>' removed.", html::escape(&keyword)),
            Err(StoreError::EmptyKeyword) => {
                "Please provide a keyword after the command.".to_string()
            }
            Err(StoreError::KeywordNotFound) => "That keyword is not in the list.".to_string(),
            Err(e) => e.to_string(),
        },
        Command::Keywords => {
            let keywords = state.keywords().await;
            if keywords.is_empty() {
                "The keyword list is empty.".to_string()
            } else {
                format!("Monitored keywords:\n{}", code_list(keywords.iter()))
            }
        }
        Command::AddChat(raw) => match parse_chat_id(&raw) {
            Ok(chat_id) => {
                let chat_id = state.add_chat(chat_id).await;
                format!("Chat <code>{chat_id}</code> added to monitoring.")
            }
            Err(_) => "Please provide a numeric chat ID after the command.".to_string(),
        },
        Command::DelChat(raw) => match parse_chat_id(&raw) {
            Ok(chat_id) => match state.remove_chat(chat_id).await {
                Ok(chat_id) => format!("Chat <code>{chat_id}</code> removed from monitoring."),
                Err(_) => "That chat is not monitored.".to_string(),
            },
            Err(_) => "Please provide a numeric chat ID after the command.".to_string(),
        },
        Command::Chats => {
            let chats = state.chats().await;
            if chats.is_empty() {
                "No chats are being monitored.".to_string()
            } else {
                format!("Monitored chats:\n{}", code_list(chats.iter()))
            }
        }
    };

    bot.send_message(msg.chat.id, reply)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Scan a non-command message and, on a keyword hit, alert the admin and
/// push the match to live subscribers. The two deliveries are independent:
/// a failed admin alert never suppresses the broadcast.
async fn scan_message(bot: Bot, msg: &Message, state: Arc<AppState>) -> ResponseResult<()> {
    let incoming = incoming_from_telegram(msg);
    if let Some(event) = state.scan(&incoming).await {
        info!(
            "Keyword '{}' matched in chat '{}'",
            event.keyword, event.chat_name
        );
        notifier::notify_admin(&bot, state.config.telegram.admin_chat_id, &event).await;
        state.events.broadcast(&Event::NewMatch(event)).await;
    }
    Ok(())
}

fn incoming_from_telegram(msg: &Message) -> IncomingMessage {
    IncomingMessage {
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
        author: msg
            .from
            .as_ref()
            .map(|user| user.full_name())
            .unwrap_or_else(|| "Unknown".to_string()),
        chat_title: msg
            .chat
            .title()
            .map(str::to_string)
            .unwrap_or_else(|| "Unknown Chat".to_string()),
        chat_kind: if msg.chat.is_private() {
            ChatKind::Private
        } else {
            ChatKind::Group
        },
        chat_username: msg.chat.username().map(str::to_string),
        text: msg.text().map(str::to_string),
        caption: msg.caption().map(str::to_string),
    }
}

fn welcome_text() -> String {
    "<b>Hi! I watch your chats for keywords.</b>\n\n\
     Available commands:\n\
     /add_keyword <code>word</code> - add a keyword\n\
     /del_keyword <code>word</code> - remove a keyword\n\
     /keywords - list all keywords\n\
     /add_chat <code>ID</code> - add a chat to monitoring\n\
     /del_chat <code>ID</code> - remove a chat from monitoring\n\
     /chats - list all monitored chats"
        .to_string()
}

fn code_list<T: std::fmt::Display>(items: impl Iterator<Item = T>) -> String {
    items
        .map(|item| format!("- <code>{item}</code>"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/keywords"), Some(Command::Keywords));
        assert_eq!(Command::parse("/chats"), Some(Command::Chats));
    }

    #[test]
    fn test_parse_commands_with_arguments() {
        assert_eq!(
            Command::parse("/add_keyword rust"),
            Some(Command::AddKeyword("rust".to_string()))
        );
        assert_eq!(
            Command::parse("/del_keyword  rust  "),
            Some(Command::DelKeyword("rust".to_string()))
        );
        assert_eq!(
            Command::parse("/add_chat -1001234"),
            Some(Command::AddChat("-1001234".to_string()))
        );
    }

    #[test]
    fn test_parse_missing_argument_yields_empty_string() {
        assert_eq!(
            Command::parse("/add_keyword"),
            Some(Command::AddKeyword(String::new()))
        );
    }

    #[test]
    fn test_parse_tolerates_bot_name_suffix() {
        assert_eq!(
            Command::parse("/keywords@chatwatch_bot"),
            Some(Command::Keywords)
        );
        assert_eq!(
            Command::parse("/add_keyword@chatwatch_bot job"),
            Some(Command::AddKeyword("job".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_non_commands() {
        assert_eq!(Command::parse("hello there"), None);
        assert_eq!(Command::parse("/unknown"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn test_multi_word_keyword_argument_kept_whole() {
        assert_eq!(
            Command::parse("/add_keyword remote job"),
            Some(Command::AddKeyword("remote job".to_string()))
        );
    }
}
