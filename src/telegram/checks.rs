//! User-side actions: submit an IP for lookup, list prior lookups.

use crate::geo::IpInfo;
use crate::storage::users::User;
use crate::storage::{get_connection, ip_checks};
use crate::telegram::dispatch::{Engine, Reply};
use crate::telegram::send::Outbound;

impl Engine {
    /// Handle a reply to the "Check IP" prompt.
    ///
    /// A malformed address gets an explanatory reply echoing the input. A
    /// failed lookup is recorded and produces no message at all — the one
    /// deliberately silent failure branch. A successful lookup is persisted
    /// (persistence failure is recorded but does not suppress the answer)
    /// and summarised back to the user.
    pub(crate) async fn check_ip(&self, user: &User, arg: &str) -> Option<Reply> {
        let ip: std::net::IpAddr = match arg.parse() {
            Ok(ip) => ip,
            Err(_) => {
                return Some(Reply::html(format!(
                    "Check IP\n\n<code>{}</code> is not a valid textual representation of an IP address!\nTry again",
                    arg
                )));
            }
        };

        let info = match self.geo.lookup(ip).await {
            Ok(info) => info,
            Err(e) => {
                self.errors.record("ip lookup", &e);
                return None;
            }
        };

        self.persist_check(&ip.to_string(), &info, user.tg_id);

        Some(Reply::html(info.message_string()))
    }

    fn persist_check(&self, ip: &str, info: &IpInfo, user_tg_id: i64) {
        let payload = match info.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                self.errors.record("serialize ip info", &e);
                return;
            }
        };
        let result: crate::core::AppResult<()> = (|| {
            let conn = get_connection(&self.db)?;
            ip_checks::insert_check(&conn, ip, &payload, user_tg_id)?;
            Ok(())
        })();
        if let Err(e) = result {
            self.errors.record("persist ip check", &e);
        }
    }

    /// "Get list of checked IPs": one line per distinct prior lookup.
    ///
    /// A storage failure is recorded and the header still goes out — an
    /// empty list and an unreadable one look the same to the user.
    pub(crate) async fn list_checked_ips(&self, user: &User) -> Reply {
        let mut text = String::from("Checked IPs:");
        match self.fetch_distinct_checks(user.tg_id) {
            Ok(checks) => {
                for check in checks {
                    text.push('\n');
                    text.push_str(&check.ip);
                }
            }
            Err(e) => self.errors.record("list checked ips", &e),
        }
        Reply::html(text)
    }

    /// "Get list of checked IPs results": one message per distinct prior
    /// lookup, each re-rendered from the stored payload. No summary message;
    /// the fan-out is the whole answer. Records whose stored payload no
    /// longer decodes are recorded and skipped.
    pub(crate) async fn send_check_results(&self, chat_id: i64, user: &User) {
        let checks = match self.fetch_distinct_checks(user.tg_id) {
            Ok(checks) => checks,
            Err(e) => {
                self.errors.record("list checked ip results", &e);
                return;
            }
        };

        for check in checks {
            let info: IpInfo = match serde_json::from_str(&check.ip_info) {
                Ok(info) => info,
                Err(e) => {
                    self.errors.record("decode stored ip info", &e);
                    continue;
                }
            };
            let mut outbound = Outbound::new(chat_id, info.message_string());
            outbound.html = true;
            self.sink.send(outbound).await;
        }
    }

    fn fetch_distinct_checks(&self, tg_id: i64) -> crate::core::AppResult<Vec<ip_checks::IpCheck>> {
        let conn = get_connection(&self.db)?;
        Ok(ip_checks::list_by_tg_id(&conn, tg_id, true)?)
    }
}
