//! In-memory platform used by the runner, supervisor and shell tests.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, AtomicI32, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::{
    domain::{ChatId, MessageId, MessageRef},
    messaging::{
        hub::{Subscription, UpdateHub},
        port::ChatPlatform,
        types::{Dialog, IncomingMessage, MediaKind, PlatformCapabilities, Sender},
    },
    Error, Result,
};

pub(crate) fn text_message(chat: i64, id: i32, text: &str) -> IncomingMessage {
    IncomingMessage {
        chat_id: ChatId(chat),
        message_id: MessageId(id),
        text: Some(text.to_string()),
        media: None,
        sender: Some(Sender {
            id: 42,
            display_name: "Alice".to_string(),
        }),
        timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    }
}

pub(crate) fn media_message(chat: i64, id: i32, caption: Option<&str>) -> IncomingMessage {
    IncomingMessage {
        text: caption.map(str::to_string),
        media: Some(MediaKind::Photo),
        ..text_message(chat, id, "")
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Forwarded {
    pub original: IncomingMessage,
    pub destination: ChatId,
}

/// Fake platform backed by an [`UpdateHub`].
pub(crate) struct FakePlatform {
    hub: UpdateHub,
    forwarded: Mutex<Vec<Forwarded>>,
    unresolvable: Mutex<HashSet<ChatId>>,
    failing: Mutex<HashSet<(ChatId, MessageId)>>,
    forward_delay: Mutex<Option<Duration>>,
    dialogs: Mutex<Vec<Dialog>>,
    native_forward: AtomicBool,
    next_id: AtomicI32,
}

impl FakePlatform {
    pub const HUB_CAPACITY: usize = 64;

    pub fn new() -> Self {
        Self {
            hub: UpdateHub::new(Self::HUB_CAPACITY),
            forwarded: Mutex::new(Vec::new()),
            unresolvable: Mutex::new(HashSet::new()),
            failing: Mutex::new(HashSet::new()),
            forward_delay: Mutex::new(None),
            dialogs: Mutex::new(Vec::new()),
            native_forward: AtomicBool::new(true),
            next_id: AtomicI32::new(1000),
        }
    }

    pub fn publish(&self, msg: IncomingMessage) -> usize {
        self.hub.publish(msg)
    }

    pub fn close_stream(&self) {
        self.hub.close();
    }

    pub fn forwarded(&self) -> Vec<Forwarded> {
        self.forwarded.lock().unwrap().clone()
    }

    pub fn forwarded_to(&self, destination: i64) -> Vec<Forwarded> {
        self.forwarded()
            .into_iter()
            .filter(|f| f.destination == ChatId(destination))
            .collect()
    }

    pub fn make_unresolvable(&self, chat: i64) {
        self.unresolvable.lock().unwrap().insert(ChatId(chat));
    }

    pub fn fail_forward_of(&self, chat: i64, message: i32) {
        self.failing
            .lock()
            .unwrap()
            .insert((ChatId(chat), MessageId(message)));
    }

    pub fn disable_native_forward(&self) {
        self.native_forward.store(false, Ordering::SeqCst);
    }

    pub fn set_forward_delay(&self, delay: Duration) {
        *self.forward_delay.lock().unwrap() = Some(delay);
    }

    pub fn add_dialog(&self, chat: i64, title: &str) {
        self.dialogs.lock().unwrap().push(Dialog {
            chat_id: ChatId(chat),
            title: title.to_string(),
        });
    }

    /// Poll until `cond` holds, failing the test after two seconds.
    pub async fn wait_until(&self, mut cond: impl FnMut(&Self) -> bool) {
        for _ in 0..200 {
            if cond(self) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    fn capabilities(&self) -> PlatformCapabilities {
        PlatformCapabilities {
            full_dialog_listing: true,
            native_forward: self.native_forward.load(Ordering::SeqCst),
        }
    }

    fn account_name(&self) -> String {
        "fake_bot".to_string()
    }

    async fn resolve_chat(&self, chat_id: ChatId) -> Result<Dialog> {
        if self.unresolvable.lock().unwrap().contains(&chat_id) {
            return Err(Error::Resolve {
                chat_id,
                reason: "chat not found".to_string(),
            });
        }
        Ok(Dialog {
            chat_id,
            title: format!("chat {chat_id}"),
        })
    }

    async fn subscribe(&self, chats: &[ChatId]) -> Result<Subscription> {
        self.hub.subscribe(chats)
    }

    async fn forward(&self, message: &IncomingMessage, destination: ChatId) -> Result<MessageRef> {
        let delay = *self.forward_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self
            .failing
            .lock()
            .unwrap()
            .contains(&(message.chat_id, message.message_id))
        {
            return Err(Error::Forward("flood wait".to_string()));
        }
        self.forwarded.lock().unwrap().push(Forwarded {
            original: message.clone(),
            destination,
        });
        Ok(MessageRef {
            chat_id: destination,
            message_id: MessageId(self.next_id.fetch_add(1, Ordering::SeqCst)),
        })
    }

    async fn list_dialogs(&self) -> Result<Vec<Dialog>> {
        Ok(self.dialogs.lock().unwrap().clone())
    }
}
