//! Messenger that queues replies for the HTTP caller to collect

use async_trait::async_trait;
use band_core::{Body, ChatId, Keyboard, MessageId, Messenger, OutboundMessage, TransportError};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Keyboard in wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeyboardView {
    Reply { rows: Vec<Vec<String>> },
    Inline { rows: Vec<Vec<ButtonView>> },
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ButtonView {
    pub label: String,
    pub token: String,
}

/// Message body in wire form. Documents carry their content as text; the
/// library holds plain-text chord sheets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BodyView {
    Text {
        text: String,
    },
    Document {
        name: String,
        size: usize,
        content: String,
    },
    Voice {
        file_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
}

/// One thing the bot did in a chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Delivery {
    Send {
        message_id: MessageId,
        body: BodyView,
        #[serde(skip_serializing_if = "Option::is_none")]
        keyboard: Option<KeyboardView>,
    },
    Retract {
        message_id: MessageId,
    },
}

impl Delivery {
    fn send(message_id: MessageId, message: OutboundMessage) -> Self {
        let body = match message.body {
            Body::Text(text) => BodyView::Text { text },
            Body::Document { name, content } => BodyView::Document {
                name,
                size: content.len(),
                content: String::from_utf8_lossy(&content).into_owned(),
            },
            Body::Voice { media, caption } => BodyView::Voice {
                file_id: media.file_id,
                caption,
            },
        };
        let keyboard = match message.keyboard {
            Keyboard::Keep => None,
            Keyboard::Reply(rows) => Some(KeyboardView::Reply { rows }),
            Keyboard::Inline(rows) => Some(KeyboardView::Inline {
                rows: rows
                    .into_iter()
                    .map(|row| {
                        row.into_iter()
                            .map(|button| ButtonView {
                                label: button.label,
                                token: button.token,
                            })
                            .collect()
                    })
                    .collect(),
            }),
            Keyboard::Remove => Some(KeyboardView::Remove),
        };
        Delivery::Send {
            message_id,
            body,
            keyboard,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Delivery::Send {
                body: BodyView::Text { text },
                ..
            } => Some(text),
            _ => None,
        }
    }
}

const DEFAULT_CAPACITY: usize = 256;

type Scopes = DashMap<ChatId, Arc<Mutex<()>>>;

/// Exclusive hold on one chat's queue, so the deliveries drained under it
/// are exactly the ones produced while it was held.
pub struct ChatScope {
    chat: ChatId,
    scopes: Arc<Scopes>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ChatScope {
    fn drop(&mut self) {
        // Map + this guard are the only holders when nobody is queued.
        self.scopes
            .remove_if(&self.chat, |_, scope| Arc::strong_count(scope) <= 2);
        self.guard.take();
    }
}

/// Per-chat queues of deliveries. Message ids are allocated process-wide.
///
/// A queue keeps at most `capacity` deliveries and drops the oldest beyond
/// that, so chats nobody collects from stay bounded.
pub struct OutboxMessenger {
    queues: DashMap<ChatId, VecDeque<Delivery>>,
    scopes: Arc<Scopes>,
    capacity: usize,
    next_id: AtomicI32,
}

impl Default for OutboxMessenger {
    fn default() -> Self {
        Self {
            queues: DashMap::new(),
            scopes: Arc::new(DashMap::new()),
            capacity: DEFAULT_CAPACITY,
            next_id: AtomicI32::new(0),
        }
    }
}

impl OutboxMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Wait until no one else is collecting from `chat`.
    pub async fn scope(&self, chat: ChatId) -> ChatScope {
        let mutex = self
            .scopes
            .entry(chat)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;
        ChatScope {
            chat,
            scopes: self.scopes.clone(),
            guard: Some(guard),
        }
    }

    /// Run `work` under the chat's scope and collect what it queued there.
    pub async fn exchange<F: Future>(&self, chat: ChatId, work: F) -> (F::Output, Vec<Delivery>) {
        let _scope = self.scope(chat).await;
        let output = work.await;
        (output, self.drain(chat))
    }

    /// Take everything queued for `chat`.
    pub fn drain(&self, chat: ChatId) -> Vec<Delivery> {
        self.queues
            .remove(&chat)
            .map(|(_, deliveries)| deliveries.into())
            .unwrap_or_default()
    }

    pub fn pending(&self, chat: ChatId) -> usize {
        self.queues.get(&chat).map_or(0, |queue| queue.len())
    }

    /// Chats with a collector running or waiting.
    pub fn active_scopes(&self) -> usize {
        self.scopes.len()
    }

    fn push(&self, chat: ChatId, delivery: Delivery) {
        let mut queue = self.queues.entry(chat).or_default();
        if queue.len() >= self.capacity {
            queue.pop_front();
            tracing::warn!(
                chat_id = %chat,
                capacity = self.capacity,
                "outbox full, dropping oldest delivery"
            );
        }
        queue.push_back(delivery);
    }
}

#[async_trait]
impl Messenger for OutboxMessenger {
    async fn send(&self, chat: ChatId, message: OutboundMessage) -> Result<MessageId, TransportError> {
        let id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.push(chat, Delivery::send(id, message));
        Ok(id)
    }

    async fn retract(&self, chat: ChatId, message: MessageId) -> Result<(), TransportError> {
        self.push(chat, Delivery::Retract { message_id: message });
        Ok(())
    }
}
