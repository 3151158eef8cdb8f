use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::html;
use tracing::error;

use crate::matcher::MatchEvent;

/// Cap on the message excerpt shown in the admin alert. The broadcast
/// payload carries the full text; only the alert is truncated.
const ALERT_EXCERPT_CHARS: usize = 1000;

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Render the HTML alert for one match. User-controlled fields are escaped.
pub fn format_alert(event: &MatchEvent) -> String {
    let excerpt = truncate_chars(&event.message, ALERT_EXCERPT_CHARS);
    let mut alert = format!(
        "\u{1F525} <b>Keyword match!</b>\n\n\
         <b>Keyword:</b> <code>{}</code>\n\
         <b>Chat:</b> {}\n\
         <b>Author:</b> {}\n\n\
         <b>Message:</b>\n<i>{}</i>",
        html::escape(&event.keyword),
        html::escape(&event.chat_name),
        html::escape(&event.author),
        html::escape(excerpt),
    );
    if !event.chat_link.is_empty() {
        alert.push_str(&format!(
            "\n\n<a href=\"{}\"><b>Open message</b></a>",
            event.chat_link
        ));
    }
    alert
}

/// Send the alert for one match to the administrator chat.
///
/// Best-effort, at-most-once: delivery failures are logged and swallowed so
/// a broken admin destination never stalls the rest of the match pipeline.
pub async fn notify_admin(bot: &Bot, admin_chat_id: i64, event: &MatchEvent) {
    let alert = format_alert(event);
    if let Err(e) = bot
        .send_message(ChatId(admin_chat_id), alert)
        .parse_mode(ParseMode::Html)
        .await
    {
        error!("Failed to send notification to admin: {e}");
    }
}
