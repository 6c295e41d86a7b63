//! Inbound events and outbound replies
//!
//! The transport delivers one [`InboundEvent`] per call. Flows answer with
//! zero or more [`OutboundMessage`]s through the [`Messenger`](crate::Messenger).

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::ids::{ChatId, MessageId, UserId};

/// Reference to a media file held by the transport (voice notes, audio).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub file_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl MediaRef {
    pub fn new(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            duration_secs: None,
            mime_type: None,
        }
    }
}

/// What the user sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// Typed text or a reply-keyboard button label.
    Text { text: String },
    /// Inline button press. `data` is the opaque token of the button.
    Callback { data: String, message_id: MessageId },
    Voice { media: MediaRef },
    Audio { media: MediaRef },
}

/// One inbound message from the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub user_id: UserId,
    pub chat_id: ChatId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    pub payload: Payload,
}

impl InboundEvent {
    pub fn new(user_id: UserId, payload: Payload) -> Self {
        Self {
            user_id,
            chat_id: user_id.into(),
            message_id: None,
            user_name: None,
            payload,
        }
    }

    pub fn text(user_id: UserId, text: impl Into<String>) -> Self {
        Self::new(user_id, Payload::Text { text: text.into() })
    }

    pub fn callback(user_id: UserId, data: impl Into<String>, message_id: MessageId) -> Self {
        Self::new(
            user_id,
            Payload::Callback {
                data: data.into(),
                message_id,
            },
        )
    }

    pub fn voice(user_id: UserId, media: MediaRef) -> Self {
        Self::new(user_id, Payload::Voice { media })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }

    /// Trimmed text payload, if any.
    pub fn text_payload(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text { text } => Some(text.trim()),
            _ => None,
        }
    }

    pub fn callback_data(&self) -> Option<&str> {
        match &self.payload {
            Payload::Callback { data, .. } => Some(data),
            _ => None,
        }
    }

    /// The message whose button was pressed.
    pub fn callback_message(&self) -> Option<MessageId> {
        match &self.payload {
            Payload::Callback { message_id, .. } => Some(*message_id),
            _ => None,
        }
    }

    /// Attached voice note or audio clip.
    pub fn media(&self) -> Option<&MediaRef> {
        match &self.payload {
            Payload::Voice { media } | Payload::Audio { media } => Some(media),
            _ => None,
        }
    }
}

/// Inline keyboard button: a label and the token that comes back when pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub token: String,
}

impl Button {
    pub fn new(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            token: token.into(),
        }
    }
}

/// Keyboard attached to an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Keyboard {
    /// Leave whatever keyboard the client shows.
    #[default]
    Keep,
    /// Reply keyboard: pressing a button sends its label as text.
    Reply(Vec<Vec<String>>),
    /// Buttons under the message: pressing sends a callback token.
    Inline(Vec<Vec<Button>>),
    /// Hide the reply keyboard.
    Remove,
}

impl Keyboard {
    /// One button per row.
    pub fn column<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Keyboard::Reply(labels.into_iter().map(|l| vec![l.into()]).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Text(String),
    Document { name: String, content: Bytes },
    Voice { media: MediaRef, caption: Option<String> },
}

/// One reply emitted by a flow step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub body: Body,
    pub keyboard: Keyboard,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            body: Body::Text(text.into()),
            keyboard: Keyboard::Keep,
        }
    }

    pub fn document(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            body: Body::Document {
                name: name.into(),
                content: content.into(),
            },
            keyboard: Keyboard::Keep,
        }
    }

    pub fn voice(media: MediaRef, caption: Option<String>) -> Self {
        Self {
            body: Body::Voice { media, caption },
            keyboard: Keyboard::Keep,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = keyboard;
        self
    }

    pub fn text_body(&self) -> Option<&str> {
        match &self.body {
            Body::Text(text) => Some(text),
            _ => None,
        }
    }
}
