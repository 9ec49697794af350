use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use teloxide::{
    dispatching::{Dispatcher, ShutdownToken},
    dptree,
    prelude::*,
};

use tokio::task::JoinHandle;

use tgfwd_core::{
    domain::ChatId,
    messaging::{hub::UpdateHub, types::Dialog},
};

use crate::convert;

/// Chats the bot has seen, newest title wins.
///
/// The Bot API has no dialog listing, so this is what "list chats" shows.
#[derive(Default)]
pub struct KnownChats {
    inner: Mutex<BTreeMap<ChatId, String>>,
}

impl KnownChats {
    pub fn record(&self, chat_id: ChatId, title: &str) {
        if let Ok(mut map) = self.inner.lock() {
            map.insert(chat_id, title.to_string());
        }
    }

    pub fn snapshot(&self) -> Vec<Dialog> {
        let Ok(map) = self.inner.lock() else {
            return Vec::new();
        };
        map.iter()
            .map(|(chat_id, title)| Dialog {
                chat_id: *chat_id,
                title: title.clone(),
            })
            .collect()
    }
}

pub(crate) struct RouterHandle {
    pub token: ShutdownToken,
    pub task: JoinHandle<()>,
}

/// Start long polling in the background.
///
/// Every message and channel post is published to `hub`. When polling ends
/// the hub is closed so runners see the stream as lost.
pub(crate) fn spawn(bot: Bot, hub: Arc<UpdateHub>, known: Arc<KnownChats>) -> RouterHandle {
    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_channel_post().endpoint(on_message));

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![hub.clone(), known])
        .default_handler(|_| async {})
        .build();
    let token = dispatcher.shutdown_token();

    let task = tokio::spawn(async move {
        tracing::info!("update polling started");
        dispatcher.dispatch().await;
        tracing::info!("update polling ended");
        hub.close();
    });

    RouterHandle { token, task }
}

async fn on_message(
    msg: Message,
    hub: Arc<UpdateHub>,
    known: Arc<KnownChats>,
) -> ResponseResult<()> {
    let incoming = convert::incoming(&msg);
    known.record(incoming.chat_id, &convert::chat_title(&msg.chat));

    let receivers = hub.publish(incoming);
    tracing::trace!(chat = msg.chat.id.0, message = msg.id.0, receivers, "update published");
    Ok(())
}
