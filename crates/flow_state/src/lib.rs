//! flow_state - Conversation state for the band assistant
//!
//! This crate provides the data side of the conversation state machine:
//! which step of which flow a user is in, the back-chain of interrupted
//! flows, and the scratch context each step accumulates.

pub mod chain;
pub mod context;
pub mod flow;
pub mod session;

// Re-export commonly used types
pub use chain::{ChainError, StateChain, StateId, StateNode};
pub use context::{Context, ContextValue, Listing, PageToken};
pub use flow::FlowName;
pub use session::Session;
