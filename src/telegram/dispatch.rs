//! Conversation engine.
//!
//! Turns the stream of inbound chat messages into role-aware interactions
//! without storing any conversation state. Which question a reply answers is
//! reconstructed from the message being replied to: if the replied-to sender
//! is the bot, the first line of that message's text is the menu caption the
//! reply belongs to. Role is re-read from storage on every update, so a
//! demotion takes effect on the demoted admin's very next message.
//!
//! Updates are processed strictly one at a time; nothing about update n+1
//! starts until every send for update n (retries and fan-outs included) has
//! completed. Replies therefore leave in arrival order, at the cost of
//! head-of-line blocking on a slow send.

use std::sync::Arc;

use futures_util::StreamExt;
use teloxide::prelude::*;
use teloxide::types::{Message, UpdateKind, UserId};
use teloxide::update_listeners::{Polling, UpdateListener};

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::error_logger::ErrorSink;
use crate::geo::GeoProvider;
use crate::storage::db::DbPool;
use crate::storage::users::{self, Profile, User};
use crate::storage::get_connection;
use crate::telegram::keyboards::{AdminAction, Keyboard, UserAction};
use crate::telegram::send::{MessageSink, Outbound};

/// Identity and profile of the sender of an inbound message.
#[derive(Debug, Clone, Default)]
pub struct Sender {
    pub tg_id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub language_code: Option<String>,
}

/// The message an inbound update replies to, reduced to what classification
/// needs: who authored it (bot or not) and its text.
#[derive(Debug, Clone)]
pub struct ReplyTo {
    pub from_bot: bool,
    pub text: String,
}

/// One inbound chat update, decoupled from the transport types.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub chat_id: i64,
    pub message_id: i32,
    pub sender: Sender,
    pub text: String,
    pub reply_to: Option<ReplyTo>,
}

impl Inbound {
    /// Map a Telegram message to the engine's inbound form.
    ///
    /// Returns `None` for messages without a sender (channel posts and the
    /// like), which the engine ignores entirely.
    pub fn from_message(msg: &Message, bot_id: UserId) -> Option<Self> {
        let from = msg.from.as_ref()?;
        let sender = Sender {
            tg_id: from.id.0 as i64,
            username: from.username.clone(),
            first_name: from.first_name.clone(),
            last_name: from.last_name.clone(),
            language_code: from.language_code.clone(),
        };
        let reply_to = msg.reply_to_message().map(|reply| ReplyTo {
            from_bot: reply.from.as_ref().is_some_and(|u| u.id == bot_id),
            text: reply.text().unwrap_or_default().to_string(),
        });

        Some(Self {
            chat_id: msg.chat.id.0,
            message_id: msg.id.0,
            sender,
            text: msg.text().unwrap_or_default().to_string(),
            reply_to,
        })
    }
}

/// First non-empty line of a message text; the reply-classification key.
pub fn first_line(text: &str) -> &str {
    text.lines().find(|line| !line.is_empty()).unwrap_or("")
}

/// What kind of interaction an inbound update is.
///
/// Tie-break order: command, then reply-to-bot, then fresh menu selection.
/// A reply to anything the bot did not author is never classified as a menu
/// reply — and not as anything else either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification<'a> {
    /// Slash command; carries the command token without the leading slash
    Command(&'a str),
    /// Reply to a bot-authored message; `key` is that message's first line,
    /// `arg` the reply text the action executes on
    MenuReply { key: &'a str, arg: &'a str },
    /// Fresh message whose text may match a menu caption
    MenuSelect(&'a str),
    /// Nothing to do, nothing to say
    Silent,
}

/// Classify one inbound update. Pure; role-specific caption matching happens
/// at the handler, so the same reply text classifies identically no matter
/// who sent it.
pub fn classify(inbound: &Inbound) -> Classification<'_> {
    if let Some(rest) = inbound.text.strip_prefix('/') {
        let token = rest.split_whitespace().next().unwrap_or("");
        // "/start@my_bot" addresses this command to a specific bot; the
        // mention is not part of the command token.
        let token = token.split('@').next().unwrap_or("");
        return Classification::Command(token);
    }

    match &inbound.reply_to {
        Some(reply) if reply.from_bot => Classification::MenuReply {
            key: first_line(&reply.text),
            arg: &inbound.text,
        },
        Some(_) => Classification::Silent,
        None => Classification::MenuSelect(&inbound.text),
    }
}

/// A reply the engine wants threaded under the inbound message, with the
/// sender's role keyboard attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Reply {
    pub text: String,
    pub html: bool,
}

impl Reply {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            html: false,
        }
    }

    pub fn html(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            html: true,
        }
    }
}

/// The conversation engine: stores, lookup provider, delivery sink.
pub struct Engine {
    pub(crate) db: Arc<DbPool>,
    pub(crate) sink: Arc<dyn MessageSink>,
    pub(crate) geo: Arc<dyn GeoProvider>,
    pub(crate) errors: Arc<dyn ErrorSink>,
}

impl Engine {
    pub fn new(
        db: Arc<DbPool>,
        sink: Arc<dyn MessageSink>,
        geo: Arc<dyn GeoProvider>,
        errors: Arc<dyn ErrorSink>,
    ) -> Self {
        Self { db, sink, geo, errors }
    }

    /// Process one inbound update to completion: resolve the sender, run the
    /// classified action, deliver the reply (if the action produced one).
    pub async fn handle_update(&self, inbound: &Inbound) {
        let user = match self.resolve_participant(&inbound.sender) {
            Ok(user) => user,
            Err(e) => {
                self.errors.record("resolve participant", &e);
                self.send_bare(inbound.chat_id, "Something goes wrong").await;
                return;
            }
        };

        let keyboard = if user.is_admin { Keyboard::Admin } else { Keyboard::User };
        let reply = if user.is_admin {
            self.handle_admin_update(inbound).await
        } else {
            self.handle_user_update(inbound, &user).await
        };

        if let Some(reply) = reply {
            self.sink
                .send(Outbound {
                    chat_id: inbound.chat_id,
                    text: reply.text,
                    html: reply.html,
                    reply_to: Some(inbound.message_id),
                    keyboard: Some(keyboard),
                })
                .await;
        }
    }

    /// Upsert-on-sight: create the sender on first contact, refresh the
    /// mutable profile fields on every one thereafter. The role flag is never
    /// written by this path.
    fn resolve_participant(&self, sender: &Sender) -> AppResult<User> {
        let conn = get_connection(&self.db)?;
        let profile = Profile {
            username: sender.username.clone(),
            first_name: sender.first_name.clone(),
            last_name: sender.last_name.clone(),
            language_code: sender.language_code.clone(),
        };

        match users::get_user(&conn, sender.tg_id)? {
            Some(mut user) => {
                users::update_profile(&conn, sender.tg_id, &profile)?;
                user.username = profile.username;
                user.first_name = profile.first_name;
                user.last_name = profile.last_name;
                user.language_code = profile.language_code;
                Ok(user)
            }
            None => {
                users::insert_user(&conn, sender.tg_id, &profile)?;
                users::get_user(&conn, sender.tg_id)?
                    .ok_or_else(|| AppError::Database(rusqlite::Error::QueryReturnedNoRows))
            }
        }
    }

    async fn handle_user_update(&self, inbound: &Inbound, user: &User) -> Option<Reply> {
        match classify(inbound) {
            Classification::Command(command) => Some(command_reply(command)),
            Classification::MenuSelect(text) => match UserAction::from_caption(text)? {
                UserAction::CheckIp => UserAction::CheckIp.prompt().map(Reply::html),
                UserAction::ListCheckedIps => Some(self.list_checked_ips(user).await),
                UserAction::ListCheckedIpResults => {
                    self.send_check_results(inbound.chat_id, user).await;
                    None
                }
            },
            Classification::MenuReply { key, arg } => match UserAction::from_caption(key)? {
                UserAction::CheckIp => self.check_ip(user, arg).await,
                // The listing captions never prompt, so a "reply" to them is
                // someone answering an old listing message: ignore it.
                UserAction::ListCheckedIps | UserAction::ListCheckedIpResults => None,
            },
            Classification::Silent => None,
        }
    }

    async fn handle_admin_update(&self, inbound: &Inbound) -> Option<Reply> {
        match classify(inbound) {
            Classification::Command(command) => Some(command_reply(command)),
            Classification::MenuSelect(text) => {
                AdminAction::from_caption(text).map(|action| Reply::html(action.prompt()))
            }
            Classification::MenuReply { key, arg } => {
                let action = AdminAction::from_caption(key)?;
                self.run_admin_action(inbound, action, arg).await
            }
            Classification::Silent => None,
        }
    }

    /// Send an error message outside the normal reply path: unthreaded, no
    /// keyboard, plain text. Counts as the update's one outbound message.
    pub(crate) async fn send_bare(&self, chat_id: i64, text: impl Into<String>) {
        self.sink.send(Outbound::new(chat_id, text)).await;
    }
}

fn command_reply(command: &str) -> Reply {
    match command {
        "start" => Reply::plain("Hi. Use the keyboard for actions."),
        _ => Reply::plain("I don't know that command"),
    }
}

/// Drain the long-poll update stream, one update at a time.
///
/// Deliberately a single sequential consumer rather than a dispatcher worker
/// pool: in-order replies are part of the contract. The pending backlog is
/// dropped at startup so a restart doesn't replay stale conversations.
pub async fn run_update_loop(bot: Bot, bot_id: UserId, engine: Engine) -> anyhow::Result<()> {
    let mut listener = Polling::builder(bot)
        .timeout(config::network::poll_timeout())
        .drop_pending_updates()
        .build();

    let stream = listener.as_stream();
    tokio::pin!(stream);

    while let Some(update) = stream.next().await {
        match update {
            Ok(update) => {
                if let UpdateKind::Message(msg) = update.kind {
                    if let Some(inbound) = Inbound::from_message(&msg, bot_id) {
                        engine.handle_update(&inbound).await;
                    }
                }
            }
            Err(e) => log::error!("Update stream error: {}", e),
        }
    }

    Ok(())
}
