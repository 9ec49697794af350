//! Conversion from teloxide updates into core message types.

use teloxide::types::{Chat, Message};

use tgfwd_core::{
    domain::{ChatId, MessageId},
    messaging::types::{IncomingMessage, MediaKind, Sender},
};

pub fn incoming(msg: &Message) -> IncomingMessage {
    IncomingMessage {
        chat_id: ChatId(msg.chat.id.0),
        message_id: MessageId(msg.id.0),
        text: msg.text().or_else(|| msg.caption()).map(str::to_string),
        media: media_kind(msg),
        sender: sender(msg),
        timestamp: msg.date,
    }
}

fn media_kind(msg: &Message) -> Option<MediaKind> {
    if msg.photo().is_some() {
        Some(MediaKind::Photo)
    } else if msg.video().is_some() {
        Some(MediaKind::Video)
    } else if msg.voice().is_some() {
        Some(MediaKind::Voice)
    } else if msg.audio().is_some() {
        Some(MediaKind::Audio)
    } else if msg.animation().is_some() {
        // Animations also carry a document; check them first.
        Some(MediaKind::Animation)
    } else if msg.document().is_some() {
        Some(MediaKind::Document)
    } else if msg.sticker().is_some() {
        Some(MediaKind::Sticker)
    } else if msg.video_note().is_some() {
        Some(MediaKind::VideoNote)
    } else if msg.text().is_none() {
        Some(MediaKind::Other)
    } else {
        None
    }
}

fn sender(msg: &Message) -> Option<Sender> {
    if let Some(user) = msg.from() {
        return Some(Sender {
            id: user.id.0 as i64,
            display_name: user.full_name(),
        });
    }
    msg.sender_chat().map(|chat| Sender {
        id: chat.id.0,
        display_name: chat_title(chat),
    })
}

/// Human-readable name of a chat: title, then personal name, then @username.
pub fn chat_title(chat: &Chat) -> String {
    if let Some(title) = chat.title() {
        return title.to_string();
    }
    let name = [chat.first_name(), chat.last_name()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    if !name.is_empty() {
        return name;
    }
    chat.username()
        .map(|u| format!("@{u}"))
        .unwrap_or_else(|| chat.id.0.to_string())
}
