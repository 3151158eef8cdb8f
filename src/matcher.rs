use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Whether a chat is a private conversation or a group-like room.
/// Deep links can only be built for group-like chats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
}

/// A message received from the chat platform, reduced to the fields the
/// match pipeline needs.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub message_id: i32,
    /// Display name of the sender
    pub author: String,
    /// Title of the chat the message arrived in
    pub chat_title: String,
    pub chat_kind: ChatKind,
    /// Public username of the chat, if it has one
    pub chat_username: Option<String>,
    /// The message body
    pub text: Option<String>,
    /// Caption of an attached media item, used when the body is absent
    pub caption: Option<String>,
}

impl IncomingMessage {
    /// Scannable text: the message body, falling back to the caption.
    pub fn body(&self) -> Option<&str> {
        self.text.as_deref().or(self.caption.as_deref())
    }
}

/// A detected keyword hit. Built once per matching message, handed to the
/// notifier and the broadcaster, then discarded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEvent {
    pub id: Uuid,
    pub author: String,
    pub chat_name: String,
    /// Deep link to the source message; empty when one cannot be built
    pub chat_link: String,
    /// Full message text, untruncated
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub keyword: String,
}

/// Deep link to the source message.
///
/// Chats with a public username get a `t.me/<username>` link; other
/// group-like chats get the `t.me/c/` form. Private chats have no
/// linkable form, so the link stays empty.
pub fn message_link(msg: &IncomingMessage) -> String {
    if let Some(username) = msg.chat_username.as_deref() {
        format!("https://t.me/{}/{}", username, msg.message_id)
    } else if msg.chat_kind != ChatKind::Private {
        format!("https://t.me/c/{}/{}", msg.chat_id.unsigned_abs(), msg.message_id)
    } else {
        String::new()
    }
}

/// Scan one message against the keyword set.
///
/// The text is lowercased once and each keyword is tested for substring
/// containment; the scan stops on the first hit, so a message produces at
/// most one event even when several keywords would match. Which keyword is
/// reported in that case depends on set iteration order and is unspecified.
/// A message with neither body nor caption never matches.
pub fn find_match(msg: &IncomingMessage, keywords: &HashSet<String>) -> Option<MatchEvent> {
    let text = msg.body()?;
    let lowered = text.to_lowercase();
    let keyword = keywords.iter().find(|keyword| lowered.contains(keyword.as_str()))?;

    Some(MatchEvent {
        id: Uuid::new_v4(),
        author: msg.author.clone(),
        chat_name: msg.chat_title.clone(),
        chat_link: message_link(msg),
        message: text.to_string(),
        timestamp: Utc::now(),
        keyword: keyword.clone(),
    })
}
