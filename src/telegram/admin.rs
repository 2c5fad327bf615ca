//! Admin-side actions: broadcast, another user's lookup history, promotion
//! and demotion.
//!
//! The ID-based actions share one shape: validate the reply as a
//! non-negative integer, distinguish unknown users from storage trouble, and
//! never emit more than one message for the update. Error messages go out
//! bare (unthreaded, no keyboard) and end the action.

use crate::storage::users::{self, User};
use crate::storage::{get_connection, ip_checks, DbConnection};
use crate::telegram::dispatch::{Engine, Inbound, Reply};
use crate::telegram::keyboards::AdminAction;
use crate::telegram::send::Outbound;

const TRY_AGAIN_LATER: &str = "Something goes wrong\nTry again later";

fn invalid_id_message(raw: &str) -> String {
    format!("{} is invalid Telegram ID value\nShould be unsigned integer", raw)
}

fn not_found_message(raw: &str) -> String {
    format!("User with Telegram ID {} not found", raw)
}

/// Parse an admin-supplied Telegram ID: a base-10 non-negative integer.
fn parse_tg_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().filter(|id| *id >= 0)
}

impl Engine {
    pub(crate) async fn run_admin_action(
        &self,
        inbound: &Inbound,
        action: AdminAction,
        arg: &str,
    ) -> Option<Reply> {
        match action {
            AdminAction::Broadcast => {
                self.broadcast(arg).await;
                None
            }
            AdminAction::ListUserCheckedIps => self.list_user_checks(inbound, arg).await,
            AdminAction::AddAdmin => self.set_admin(inbound, arg, true).await,
            AdminAction::RemoveAdmin => self.set_admin(inbound, arg, false).await,
        }
    }

    /// Send the reply text to every known user, in user-list order.
    ///
    /// No confirmation message — the broadcast itself is the output. A
    /// failed user listing is recorded and broadcasts to nobody.
    async fn broadcast(&self, text: &str) {
        let recipients = match self.list_recipients() {
            Ok(recipients) => recipients,
            Err(e) => {
                self.errors.record("broadcast recipients", &e);
                return;
            }
        };

        for recipient in recipients {
            let mut outbound = Outbound::new(recipient.tg_id, text);
            outbound.html = true;
            self.sink.send(outbound).await;
        }
    }

    fn list_recipients(&self) -> crate::core::AppResult<Vec<User>> {
        let conn = get_connection(&self.db)?;
        Ok(users::list_users(&conn)?)
    }

    /// List another user's distinct checked IPs by Telegram ID.
    async fn list_user_checks(&self, inbound: &Inbound, arg: &str) -> Option<Reply> {
        let tg_id = match parse_tg_id(arg) {
            Some(tg_id) => tg_id,
            None => {
                self.send_bare(inbound.chat_id, invalid_id_message(arg)).await;
                return None;
            }
        };

        let conn = match self.admin_connection(inbound).await {
            Some(conn) => conn,
            None => return None,
        };

        match users::get_user(&conn, tg_id) {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.send_bare(inbound.chat_id, not_found_message(arg)).await;
                return None;
            }
            Err(e) => {
                self.errors.record("look up user for history", &e);
                self.send_bare(inbound.chat_id, TRY_AGAIN_LATER).await;
                return None;
            }
        }

        let mut text = String::from("Checked IPs:");
        match ip_checks::list_by_tg_id(&conn, tg_id, true) {
            Ok(checks) => {
                for check in checks {
                    text.push('\n');
                    text.push_str(&check.ip);
                }
            }
            Err(e) => {
                self.errors.record("list user's checked ips", &e);
                self.send_bare(inbound.chat_id, TRY_AGAIN_LATER).await;
                return None;
            }
        }

        Some(Reply::html(text))
    }

    /// Promote or demote a user by Telegram ID. Re-applying the current role
    /// is a success, not an error.
    async fn set_admin(&self, inbound: &Inbound, arg: &str, is_admin: bool) -> Option<Reply> {
        let tg_id = match parse_tg_id(arg) {
            Some(tg_id) => tg_id,
            None => {
                self.send_bare(inbound.chat_id, invalid_id_message(arg)).await;
                return None;
            }
        };

        let conn = match self.admin_connection(inbound).await {
            Some(conn) => conn,
            None => return None,
        };

        match users::set_admin_status(&conn, tg_id, is_admin) {
            Ok(true) => Some(Reply::html("Success")),
            Ok(false) => {
                self.send_bare(inbound.chat_id, not_found_message(arg)).await;
                None
            }
            Err(e) => {
                self.errors.record("set admin status", &e);
                self.send_bare(inbound.chat_id, TRY_AGAIN_LATER).await;
                None
            }
        }
    }

    /// Get a pooled connection, or report the transient failure and tell the
    /// admin to retry.
    async fn admin_connection(&self, inbound: &Inbound) -> Option<DbConnection> {
        match get_connection(&self.db) {
            Ok(conn) => Some(conn),
            Err(e) => {
                self.errors.record("get db connection", &e);
                self.send_bare(inbound.chat_id, TRY_AGAIN_LATER).await;
                None
            }
        }
    }
}
