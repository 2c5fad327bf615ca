//! Outbound message delivery.
//!
//! The engine hands every outgoing message to a [`MessageSink`]; the
//! production sink wraps the Telegram transport in a retry loop that never
//! gives up. A failed send therefore blocks the current update (and any
//! fan-out it is part of) instead of dropping the message — in-order
//! delivery is the contract, throughput is not.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode, ReplyParameters};
use tokio::time::sleep;

use crate::core::config;
use crate::telegram::keyboards::Keyboard;

/// One outbound chat message, transport-agnostic.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub chat_id: i64,
    pub text: String,
    /// Render with HTML formatting
    pub html: bool,
    /// Inbound message ID to thread this message under, if any
    pub reply_to: Option<i32>,
    /// Reply keyboard to attach, if any
    pub keyboard: Option<Keyboard>,
}

impl Outbound {
    /// A bare message: no formatting, no threading, no keyboard.
    pub fn new(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            html: false,
            reply_to: None,
            keyboard: None,
        }
    }
}

/// Delivery seam between the engine and the chat transport.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Deliver one message. Implementations own their failure handling; by
    /// the time this returns, the message is sent.
    async fn send(&self, outbound: Outbound);
}

/// Production sink: sends via the Bot API, retrying any failure with a fixed
/// backoff until the message goes through.
pub struct TelegramSink {
    bot: Bot,
}

impl TelegramSink {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MessageSink for TelegramSink {
    async fn send(&self, outbound: Outbound) {
        loop {
            let mut request = self.bot.send_message(ChatId(outbound.chat_id), outbound.text.clone());
            if outbound.html {
                request = request.parse_mode(ParseMode::Html);
            }
            if let Some(message_id) = outbound.reply_to {
                request = request.reply_parameters(ReplyParameters::new(MessageId(message_id)));
            }
            if let Some(keyboard) = outbound.keyboard {
                request = request.reply_markup(keyboard.markup());
            }

            match request.await {
                Ok(_) => return,
                Err(e) => {
                    log::error!(
                        "Failed to send message to chat {}: {}. Retrying in {}s",
                        outbound.chat_id,
                        e,
                        config::retry::SEND_RETRY_DELAY_SECS
                    );
                    sleep(config::retry::send_delay()).await;
                }
            }
        }
    }
}
