//! band_core - Core types and collaborator contracts for the band assistant
//!
//! This crate provides the foundational types shared by the conversation engine:
//! - `ids` - user, chat, message and record identifiers
//! - `records` - songs, bands, members, events and voice parts
//! - `message` - inbound events and outbound replies
//! - `callback` - opaque button tokens
//! - `store`, `hosting`, `messenger` - the external collaborators
//! - `chords` - chord-sheet transposition

pub mod callback;
pub mod chords;
pub mod hosting;
pub mod ids;
pub mod message;
pub mod messenger;
pub mod records;
pub mod services;
pub mod store;

// Re-export commonly used types
pub use callback::{Callback, PageDirection, TokenError, MAX_TOKEN_LEN};
pub use chords::{transpose_text, ChordError, Key};
pub use hosting::{FileHosting, FileRef, HostingError, SearchPage};
pub use ids::{ChatId, MessageId, RecordId, UserId};
pub use message::{Body, Button, InboundEvent, Keyboard, MediaRef, OutboundMessage, Payload};
pub use messenger::{Messenger, TransportError};
pub use records::{Band, Event, Member, Query, Record, Song, Voice};
pub use services::Services;
pub use store::{Collection, MemoryCollection, StoreError};
