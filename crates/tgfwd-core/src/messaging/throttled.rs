//! Forward pacing in front of a [`ChatPlatform`].

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

use crate::{
    domain::{ChatId, MessageRef},
    messaging::{
        hub::Subscription,
        port::ChatPlatform,
        types::{Dialog, IncomingMessage, PlatformCapabilities},
    },
    Result,
};

/// Minimum gaps between forwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ForwardPacing {
    /// Between any two forwards.
    pub global_gap: Duration,
    /// Between two forwards into the same destination.
    pub per_destination_gap: Duration,
}

impl Default for ForwardPacing {
    fn default() -> Self {
        Self {
            global_gap: Duration::from_millis(40),
            per_destination_gap: Duration::from_millis(1050),
        }
    }
}

/// Earliest start of the next forward, globally and per destination.
#[derive(Debug, Default)]
struct Slots {
    global: Option<Instant>,
    destinations: HashMap<ChatId, Instant>,
}

impl Slots {
    /// Book the first slot free for both the global and the destination gap.
    fn book(&mut self, destination: ChatId, pacing: ForwardPacing, now: Instant) -> Instant {
        let at = [self.global, self.destinations.get(&destination).copied()]
            .into_iter()
            .flatten()
            .fold(now, Instant::max);
        self.global = Some(at + pacing.global_gap);
        self.destinations
            .insert(destination, at + pacing.per_destination_gap);
        at
    }
}

/// Platform wrapper that spaces out `forward` calls to stay under flood limits.
///
/// Only forwards wait. A forward that fails after waiting is returned as is.
pub struct ThrottledPlatform {
    inner: Arc<dyn ChatPlatform>,
    pacing: ForwardPacing,
    slots: Mutex<Slots>,
}

impl ThrottledPlatform {
    pub fn new(inner: Arc<dyn ChatPlatform>, pacing: ForwardPacing) -> Self {
        Self {
            inner,
            pacing,
            slots: Mutex::new(Slots::default()),
        }
    }

    async fn wait_turn(&self, destination: ChatId) {
        let now = Instant::now();
        let at = self.slots.lock().await.book(destination, self.pacing, now);
        if at > now {
            tracing::debug!(
                chat = %destination,
                wait_ms = (at - now).as_millis() as u64,
                "pacing forward"
            );
            sleep_until(at).await;
        }
    }
}

#[async_trait::async_trait]
impl ChatPlatform for ThrottledPlatform {
    fn capabilities(&self) -> PlatformCapabilities {
        self.inner.capabilities()
    }

    fn account_name(&self) -> String {
        self.inner.account_name()
    }

    async fn resolve_chat(&self, chat_id: ChatId) -> Result<Dialog> {
        self.inner.resolve_chat(chat_id).await
    }

    async fn subscribe(&self, chats: &[ChatId]) -> Result<Subscription> {
        self.inner.subscribe(chats).await
    }

    async fn forward(&self, message: &IncomingMessage, destination: ChatId) -> Result<MessageRef> {
        self.wait_turn(destination).await;
        self.inner.forward(message, destination).await
    }

    async fn list_dialogs(&self) -> Result<Vec<Dialog>> {
        self.inner.list_dialogs().await
    }
}
