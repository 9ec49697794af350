//! Telegram adapter (teloxide).
//!
//! This crate implements the `tgfwd-core` ChatPlatform over the Telegram Bot API.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use teloxide::{prelude::*, ApiError, RequestError};

use tokio::{sync::Mutex, task::JoinHandle, time::sleep};

pub mod convert;
pub mod router;

use tgfwd_core::{
    config::Config,
    credentials::Credentials,
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{
        hub::{Subscription, UpdateHub},
        port::ChatPlatform,
        types::{Dialog, IncomingMessage, PlatformCapabilities},
    },
    Result,
};

use crate::router::{KnownChats, RouterHandle};

const SHUTDOWN_WAIT: Duration = Duration::from_secs(5);

pub struct TelegramPlatform {
    bot: Bot,
    username: String,
    hub: Arc<UpdateHub>,
    known: Arc<KnownChats>,
    router: Mutex<Option<RouterHandle>>,
}

/// Validate the token with `getMe` and start receiving updates.
pub async fn connect(creds: Credentials, config: &Config) -> Result<TelegramPlatform> {
    let bot = Bot::new(creds.bot_token);
    let me = bot.get_me().await.map_err(map_err)?;
    let username = me.username().to_string();
    tracing::info!(bot = %username, "telegram session opened");

    let hub = Arc::new(UpdateHub::new(config.update_buffer));
    let known = Arc::new(KnownChats::default());
    let router = router::spawn(bot.clone(), hub.clone(), known.clone());

    Ok(TelegramPlatform {
        bot,
        username,
        hub,
        known,
        router: Mutex::new(Some(router)),
    })
}

impl TelegramPlatform {
    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    /// Stop polling and close the update stream. Idempotent.
    pub async fn shutdown(&self) {
        let Some(router) = self.router.lock().await.take() else {
            return;
        };
        match router.token.shutdown() {
            Ok(done) => done.await,
            Err(_) => tracing::debug!("dispatcher was not running"),
        }
        if tokio::time::timeout(SHUTDOWN_WAIT, router.task).await.is_err() {
            tracing::warn!("dispatcher did not finish in time");
        }
        self.hub.close();
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        tracing::warn!(wait_ms = d.as_millis() as u64, "rate limited, retrying once");
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(map_err(other)),
                },
            }
        }
    }
}

pub(crate) fn map_err(e: RequestError) -> Error {
    match e {
        // "Unauthorized" from the Bot API decodes as `NotFound` in teloxide 0.12.
        RequestError::Api(ApiError::NotFound) => Error::Auth("bot token rejected".to_string()),
        other => Error::External(format!("telegram error: {other}")),
    }
}

/// Keep auth failures as they are and classify everything else as `wrap`.
fn reclassify(e: Error, wrap: impl FnOnce(String) -> Error) -> Error {
    match e {
        Error::External(reason) => wrap(reason),
        other => other,
    }
}

#[async_trait]
impl ChatPlatform for TelegramPlatform {
    fn capabilities(&self) -> PlatformCapabilities {
        PlatformCapabilities {
            full_dialog_listing: false,
            native_forward: true,
        }
    }

    fn account_name(&self) -> String {
        self.username.clone()
    }

    async fn resolve_chat(&self, chat_id: ChatId) -> Result<Dialog> {
        let chat = self
            .with_retry(|| self.bot.get_chat(Self::tg_chat(chat_id)))
            .await
            .map_err(|e| reclassify(e, |reason| Error::Resolve { chat_id, reason }))?;
        let title = convert::chat_title(&chat);
        self.known.record(chat_id, &title);
        Ok(Dialog { chat_id, title })
    }

    async fn subscribe(&self, chats: &[ChatId]) -> Result<Subscription> {
        self.hub.subscribe(chats)
    }

    async fn forward(&self, message: &IncomingMessage, destination: ChatId) -> Result<MessageRef> {
        let sent = self
            .with_retry(|| {
                self.bot.forward_message(
                    Self::tg_chat(destination),
                    Self::tg_chat(message.chat_id),
                    Self::tg_msg_id(message.message_id),
                )
            })
            .await
            .map_err(|e| reclassify(e, Error::Forward))?;

        Ok(MessageRef {
            chat_id: destination,
            message_id: MessageId(sent.id.0),
        })
    }

    async fn list_dialogs(&self) -> Result<Vec<Dialog>> {
        Ok(self.known.snapshot())
    }
}
