//! Telegram integration: bot bootstrap, menu definitions, the conversation
//! engine and outbound delivery

pub mod admin;
pub mod bot;
pub mod checks;
pub mod dispatch;
pub mod keyboards;
pub mod send;

// Re-exports for convenience
pub use bot::{create_bot, setup_bot_commands, Command};
pub use dispatch::{classify, run_update_loop, Classification, Engine, Inbound};
pub use send::{MessageSink, Outbound, TelegramSink};
