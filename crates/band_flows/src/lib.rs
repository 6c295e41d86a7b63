//! band_flows - The conversation flows of the band assistant
//!
//! Every flow registers itself with `register_flow!`; [`registry`] collects
//! them into the immutable [`FlowRegistry`] the dispatcher runs on.
//!
//! Flows never share context. Data a child flow needs travels as an explicit
//! field at push time (see [`fields`]).

pub mod flows;
pub mod labels;
pub mod names;
pub mod ui;

use flow_engine::{CancelInterceptor, CaptureInterceptor, FlowRegistry, RegistryError};

pub use names::fields;

/// Registry of every flow in this crate.
pub fn registry() -> Result<FlowRegistry, RegistryError> {
    FlowRegistry::from_inventory()
}

/// Cancel on the cancel button or `/cancel`.
pub fn cancel_interceptor() -> CancelInterceptor {
    CancelInterceptor::new(labels::CANCEL)
}

/// Voice notes sent anywhere start `upload_voice`, carrying the song the
/// user was looking at.
pub fn capture_interceptor() -> CaptureInterceptor {
    CaptureInterceptor::new(names::UPLOAD_VOICE).carry(fields::SONG_ID)
}
