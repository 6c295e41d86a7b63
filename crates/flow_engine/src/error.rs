//! Engine error types

use band_core::{ChordError, HostingError, StoreError, TokenError, TransportError};
use flow_state::FlowName;
use session_store::SessionError;
use thiserror::Error;

/// Why a step could not finish. The dispatcher turns every variant into a
/// generic notice for the user and an audit report for operators.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("content store failed: {0}")]
    Store(#[from] StoreError),

    #[error("file hosting failed: {0}")]
    Hosting(#[from] HostingError),

    #[error("transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error("bad callback token: {0}")]
    Token(#[from] TokenError),

    #[error("transposition failed: {0}")]
    Chord(#[from] ChordError),

    #[error("session store failed: {0}")]
    Session(#[from] SessionError),

    #[error("turn exceeded {0} step hops")]
    TooManyHops(u32),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("flow registered twice: {0}")]
    DuplicateFlow(FlowName),

    #[error("flow has no steps: {0}")]
    EmptyFlow(FlowName),

    #[error("default flow {} is not registered", FlowName::MAIN_MENU)]
    MissingDefault,
}
