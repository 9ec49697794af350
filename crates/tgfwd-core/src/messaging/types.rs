use chrono::{DateTime, Utc};

use crate::domain::{ChatId, MessageId};

/// Kind of media payload attached to an incoming message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Voice,
    Audio,
    Document,
    Animation,
    Sticker,
    VideoNote,
    Other,
}

/// Who posted a message: a user, or a chat posting as itself (channels, anonymous admins).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sender {
    pub id: i64,
    pub display_name: String,
}

/// Narrow read-only view of a platform message.
///
/// The filter and the runner only ever see a message through this trait, so
/// neither depends on the adapter's full object model.
pub trait MessageView {
    fn chat_id(&self) -> ChatId;
    /// Text body, or the caption for media messages.
    fn text(&self) -> Option<&str>;
    fn has_media(&self) -> bool;
    fn sender(&self) -> Option<&Sender>;
    fn timestamp(&self) -> DateTime<Utc>;
}

/// A new message delivered by the platform.
///
/// Not owned by the forwarder: it is a transient event that is dropped once
/// every subscriber has seen it.
#[derive(Clone, Debug)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub text: Option<String>,
    pub media: Option<MediaKind>,
    pub sender: Option<Sender>,
    pub timestamp: DateTime<Utc>,
}

impl MessageView for IncomingMessage {
    fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    fn has_media(&self) -> bool {
        self.media.is_some()
    }

    fn sender(&self) -> Option<&Sender> {
        self.sender.as_ref()
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// A chat visible to the authenticated session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dialog {
    pub chat_id: ChatId,
    pub title: String,
}

/// Capabilities / feature flags of a platform implementation.
#[derive(Clone, Copy, Debug)]
pub struct PlatformCapabilities {
    /// Whether `list_dialogs` enumerates every chat, or only chats seen since connect.
    pub full_dialog_listing: bool,
    /// Whether `forward` keeps the original sender and date. Runners require it.
    pub native_forward: bool,
}
