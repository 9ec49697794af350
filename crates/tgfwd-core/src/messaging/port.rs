use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::{
        hub::Subscription,
        types::{Dialog, IncomingMessage, PlatformCapabilities},
    },
    Result,
};

/// Platform port used by the job runners and the shell.
///
/// The session behind an implementation is shared read-mostly by every
/// runner. Nothing on this trait closes the session; only the adapter's owner
/// does that at process shutdown.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    fn capabilities(&self) -> PlatformCapabilities;

    /// Human-readable name of the authenticated account (used in export file names).
    fn account_name(&self) -> String;

    /// Check that `chat_id` is reachable by this session.
    async fn resolve_chat(&self, chat_id: ChatId) -> Result<Dialog>;

    /// Live subscription to new messages posted in any of `chats`.
    async fn subscribe(&self, chats: &[ChatId]) -> Result<Subscription>;

    /// Native forward: the copy in `destination` keeps the original sender,
    /// timestamp and forwarded header, for every message type.
    async fn forward(&self, message: &IncomingMessage, destination: ChatId) -> Result<MessageRef>;

    /// One-shot snapshot of chats visible to the session.
    async fn list_dialogs(&self) -> Result<Vec<Dialog>>;
}
