use rusqlite::Result;
use serde::Serialize;

use crate::storage::db::DbConnection;

/// One recorded geolocation lookup.
///
/// `ip_info` is the provider payload exactly as serialized at lookup time;
/// its schema belongs to the geolocation client, not to this store.
#[derive(Debug, Clone, Serialize)]
pub struct IpCheck {
    pub id: i64,
    pub ip: String,
    pub ip_info: String,
    pub user_tg_id: i64,
    pub created_at: String,
}

fn row_to_check(row: &rusqlite::Row<'_>) -> Result<IpCheck> {
    Ok(IpCheck {
        id: row.get(0)?,
        ip: row.get(1)?,
        ip_info: row.get(2)?,
        user_tg_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Record one successful lookup for a user.
pub fn insert_check(conn: &DbConnection, ip: &str, ip_info: &str, user_tg_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO ip_checks (ip, ip_info, user_tg_id) VALUES (?1, ?2, ?3)",
        rusqlite::params![ip, ip_info, user_tg_id],
    )?;
    Ok(())
}

/// List a user's live lookups, oldest first.
///
/// With `distinct`, repeated (ip, payload) pairs collapse to their earliest
/// record — the chat views show each answer once, while the full history
/// keeps every submission.
pub fn list_by_tg_id(conn: &DbConnection, tg_id: i64, distinct: bool) -> Result<Vec<IpCheck>> {
    let sql = if distinct {
        "SELECT MIN(id), ip, ip_info, user_tg_id, MIN(created_at) FROM ip_checks \
         WHERE user_tg_id = ?1 AND deleted_at IS NULL GROUP BY ip, ip_info ORDER BY MIN(id)"
    } else {
        "SELECT id, ip, ip_info, user_tg_id, created_at FROM ip_checks \
         WHERE user_tg_id = ?1 AND deleted_at IS NULL ORDER BY id"
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(rusqlite::params![tg_id], row_to_check)?;

    let mut checks = Vec::new();
    for row in rows {
        checks.push(row?);
    }
    Ok(checks)
}

/// Soft-delete one lookup record by ID.
///
/// No ownership check — any caller may delete any record by numeric ID — and
/// safe to repeat: deleting a missing or already-deleted ID does nothing.
pub fn soft_delete_check(conn: &DbConnection, check_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE ip_checks SET deleted_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP \
         WHERE id = ?1 AND deleted_at IS NULL",
        rusqlite::params![check_id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::users::{insert_user, Profile};
    use crate::storage::get_connection;
    use crate::testing::memory_pool;
    use pretty_assertions::assert_eq;

    fn seeded_conn() -> (crate::storage::DbPool, crate::storage::DbConnection) {
        let pool = memory_pool();
        let conn = get_connection(&pool).expect("get connection");
        insert_user(&conn, 42, &Profile::default()).expect("insert user");
        (pool, conn)
    }

    #[test]
    fn insert_then_list_round_trips() {
        let (_pool, conn) = seeded_conn();

        insert_check(&conn, "8.8.8.8", r#"{"ip":"8.8.8.8"}"#, 42).expect("insert");
        let checks = list_by_tg_id(&conn, 42, false).expect("list");

        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].ip, "8.8.8.8");
        assert_eq!(checks[0].ip_info, r#"{"ip":"8.8.8.8"}"#);
        assert_eq!(checks[0].user_tg_id, 42);
    }

    #[test]
    fn distinct_listing_collapses_repeated_lookups() {
        let (_pool, conn) = seeded_conn();

        insert_check(&conn, "8.8.8.8", r#"{"city":"Mountain View"}"#, 42).expect("insert");
        insert_check(&conn, "8.8.8.8", r#"{"city":"Mountain View"}"#, 42).expect("insert");
        insert_check(&conn, "1.1.1.1", r#"{"city":"Sydney"}"#, 42).expect("insert");
        // Same IP, different payload: a distinct answer, kept separately.
        insert_check(&conn, "8.8.8.8", r#"{"city":"Dublin"}"#, 42).expect("insert");

        let full = list_by_tg_id(&conn, 42, false).expect("list");
        let distinct = list_by_tg_id(&conn, 42, true).expect("list distinct");

        assert_eq!(full.len(), 4);
        assert_eq!(distinct.len(), 3);

        let ips: Vec<&str> = distinct.iter().map(|c| c.ip.as_str()).collect();
        assert_eq!(ips, vec!["8.8.8.8", "1.1.1.1", "8.8.8.8"]);
    }

    #[test]
    fn listing_is_scoped_to_the_requesting_user() {
        let (_pool, conn) = seeded_conn();
        insert_user(&conn, 43, &Profile::default()).expect("insert other user");

        insert_check(&conn, "8.8.8.8", "{}", 42).expect("insert");
        insert_check(&conn, "9.9.9.9", "{}", 43).expect("insert");

        let checks = list_by_tg_id(&conn, 42, false).expect("list");
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].ip, "8.8.8.8");
    }

    #[test]
    fn soft_delete_hides_record_and_is_idempotent() {
        let (_pool, conn) = seeded_conn();

        insert_check(&conn, "8.8.8.8", "{}", 42).expect("insert");
        let id = list_by_tg_id(&conn, 42, false).expect("list")[0].id;

        soft_delete_check(&conn, id).expect("delete");
        assert!(list_by_tg_id(&conn, 42, false).expect("list").is_empty());

        // Repeating the delete (or deleting an unknown ID) is not an error.
        soft_delete_check(&conn, id).expect("delete again");
        soft_delete_check(&conn, 12345).expect("delete unknown");
    }
}
