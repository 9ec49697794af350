use std::{collections::HashSet, sync::Mutex};

use tokio::sync::broadcast::{self, error::RecvError};

use crate::{domain::ChatId, messaging::types::IncomingMessage, Error, Result};

/// Fan-out point between the platform's single update stream and the runners.
///
/// The adapter publishes every new message once; each runner holds a
/// [`Subscription`] that sees only the chats it asked for. Closing the hub
/// ends every subscription with a terminal error.
pub struct UpdateHub {
    tx: Mutex<Option<broadcast::Sender<IncomingMessage>>>,
}

impl UpdateHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }

    /// Publish one event. Returns how many subscriptions received it.
    pub fn publish(&self, message: IncomingMessage) -> usize {
        let guard = self.tx.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match guard.as_ref() {
            // No receivers is not an error: nothing is running right now.
            Some(tx) => tx.send(message).unwrap_or(0),
            None => 0,
        }
    }

    pub fn subscribe(&self, chats: &[ChatId]) -> Result<Subscription> {
        let guard = self.tx.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(tx) = guard.as_ref() else {
            return Err(Error::Subscription("update stream is closed".to_string()));
        };
        Ok(Subscription {
            chats: chats.iter().copied().collect(),
            rx: tx.subscribe(),
            dropped: 0,
        })
    }

    /// Drop the sender. Subscribers drain what is buffered, then fail.
    pub fn close(&self) {
        let mut guard = self.tx.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.take();
    }
}

/// A runner's view of the update stream, restricted to its source chats.
pub struct Subscription {
    chats: HashSet<ChatId>,
    rx: broadcast::Receiver<IncomingMessage>,
    dropped: u64,
}

impl Subscription {
    /// Next event from one of the subscribed chats, in delivery order.
    ///
    /// Cancel-safe: dropping the future loses no event.
    pub async fn recv(&mut self) -> Result<IncomingMessage> {
        loop {
            match self.rx.recv().await {
                Ok(msg) if self.chats.contains(&msg.chat_id) => return Ok(msg),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscriber fell behind, events dropped");
                    self.dropped += skipped;
                    continue;
                }
                Err(RecvError::Closed) => {
                    return Err(Error::Subscription("update stream closed".to_string()))
                }
            }
        }
    }

    /// Events lost to lag since the last call. Resets the count.
    ///
    /// Lagged events are counted before the chat filter, so this may include
    /// events from chats the subscription does not cover.
    pub fn take_dropped(&mut self) -> u64 {
        std::mem::take(&mut self.dropped)
    }
}
