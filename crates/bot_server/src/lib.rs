//! bot_server - HTTP front of the band assistant
//!
//! Accepts inbound chat events as JSON, runs them through the flow
//! dispatcher and hands back whatever the flows sent for that chat.

pub mod config;
pub mod handlers;
pub mod library;
pub mod logging;
pub mod outbox;
pub mod server;
pub mod state;

pub use config::{BotConfig, Cli, ConfigError, SessionBackend};
pub use library::LocalFileHosting;
pub use outbox::{Delivery, OutboxMessenger};
pub use server::{app_config, run};
pub use state::AppState;
