//! Flow definitions
//!
//! Convention: step 0 of a flow renders its prompt when the turn carries no
//! input, so every flow can be entered with [`Turn::enter`](flow_engine::Turn::enter).

pub mod band;
pub mod event;
pub mod menu;
pub mod search;
pub mod song;
pub mod transpose;
pub mod voice;
