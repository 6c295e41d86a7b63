//! Messaging transport contract

use async_trait::async_trait;
use thiserror::Error;

use crate::ids::{ChatId, MessageId};
use crate::message::OutboundMessage;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("message rejected by transport: {0}")]
    Rejected(String),

    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// Outbound side of the chat transport.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Deliver a reply and return the id the transport assigned to it.
    async fn send(&self, chat: ChatId, message: OutboundMessage) -> Result<MessageId, TransportError>;

    /// Remove a previously sent message, e.g. an inline keyboard gone stale.
    async fn retract(&self, chat: ChatId, message: MessageId) -> Result<(), TransportError>;
}
