use rusqlite::Result;
use serde::Serialize;

use crate::storage::db::DbConnection;

/// A chat participant known to the bot.
///
/// One row per Telegram ID; created lazily on first contact and refreshed on
/// every subsequent one. Rows are only ever soft-deleted.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Telegram ID, assigned by the platform and never reused
    pub tg_id: i64,
    /// Telegram username, if set
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    /// IETF language tag reported by the client
    pub language_code: Option<String>,
    /// Role flag; grants the admin menu tree
    pub is_admin: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Mutable profile fields supplied with every inbound update.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub language_code: Option<String>,
}

const USER_COLUMNS: &str = "tg_id, username, first_name, last_name, language_code, is_admin, created_at, updated_at";

fn row_to_user(row: &rusqlite::Row<'_>) -> Result<User> {
    Ok(User {
        tg_id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        language_code: row.get(4)?,
        is_admin: row.get::<_, i64>(5)? != 0,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// Fetch a user by Telegram ID.
///
/// Returns `Ok(None)` when no live row exists for the ID.
pub fn get_user(conn: &DbConnection, tg_id: i64) -> Result<Option<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE tg_id = ?1 AND deleted_at IS NULL"
    ))?;
    let mut rows = stmt.query(rusqlite::params![tg_id])?;

    if let Some(row) = rows.next()? {
        Ok(Some(row_to_user(row)?))
    } else {
        Ok(None)
    }
}

/// List all live users, in Telegram-ID order.
pub fn list_users(conn: &DbConnection) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL ORDER BY tg_id"
    ))?;
    let rows = stmt.query_map([], row_to_user)?;

    let mut users = Vec::new();
    for row in rows {
        users.push(row?);
    }
    Ok(users)
}

/// Insert a new user with the supplied profile. New users are never admins.
pub fn insert_user(conn: &DbConnection, tg_id: i64, profile: &Profile) -> Result<()> {
    conn.execute(
        "INSERT INTO users (tg_id, username, first_name, last_name, language_code, is_admin) \
         VALUES (?1, ?2, ?3, ?4, ?5, 0)",
        rusqlite::params![
            tg_id,
            profile.username,
            profile.first_name,
            profile.last_name,
            profile.language_code
        ],
    )?;
    Ok(())
}

/// Refresh the mutable profile fields of an existing user.
///
/// `is_admin` is deliberately not touched here; role changes go through
/// [`set_admin_status`] only.
pub fn update_profile(conn: &DbConnection, tg_id: i64, profile: &Profile) -> Result<()> {
    conn.execute(
        "UPDATE users SET username = ?1, first_name = ?2, last_name = ?3, language_code = ?4, \
         updated_at = CURRENT_TIMESTAMP WHERE tg_id = ?5 AND deleted_at IS NULL",
        rusqlite::params![
            profile.username,
            profile.first_name,
            profile.last_name,
            profile.language_code,
            tg_id
        ],
    )?;
    Ok(())
}

/// Set or clear a user's admin flag.
///
/// Returns `Ok(false)` when no live row exists for the ID. Setting a flag to
/// its current value is a successful no-op.
pub fn set_admin_status(conn: &DbConnection, tg_id: i64, is_admin: bool) -> Result<bool> {
    let value = if is_admin { 1 } else { 0 };
    let rows_affected = conn.execute(
        "UPDATE users SET is_admin = ?1, updated_at = CURRENT_TIMESTAMP \
         WHERE tg_id = ?2 AND deleted_at IS NULL",
        rusqlite::params![value, tg_id],
    )?;
    Ok(rows_affected > 0)
}

/// Seed the initial admin at startup.
///
/// Idempotent: an existing row (admin or not, any profile) is left untouched,
/// so a restart never demotes or overwrites anyone.
pub fn seed_admin(conn: &DbConnection, tg_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO users (tg_id, is_admin) VALUES (?1, 1) ON CONFLICT (tg_id) DO NOTHING",
        rusqlite::params![tg_id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::get_connection;
    use crate::testing::memory_pool;
    use pretty_assertions::assert_eq;

    fn profile(username: &str, first_name: &str) -> Profile {
        Profile {
            username: Some(username.to_string()),
            first_name: first_name.to_string(),
            last_name: None,
            language_code: Some("en".to_string()),
        }
    }

    #[test]
    fn insert_then_get_round_trips() {
        let pool = memory_pool();
        let conn = get_connection(&pool).expect("get connection");

        insert_user(&conn, 42, &profile("alice", "Alice")).expect("insert");
        let user = get_user(&conn, 42).expect("get").expect("user exists");

        assert_eq!(user.tg_id, 42);
        assert_eq!(user.username.as_deref(), Some("alice"));
        assert_eq!(user.first_name, "Alice");
        assert!(!user.is_admin);
        assert!(!user.created_at.is_empty());
    }

    #[test]
    fn get_missing_user_is_none() {
        let pool = memory_pool();
        let conn = get_connection(&pool).expect("get connection");

        assert!(get_user(&conn, 7).expect("get").is_none());
    }

    #[test]
    fn update_profile_refreshes_fields_but_not_role() {
        let pool = memory_pool();
        let conn = get_connection(&pool).expect("get connection");

        insert_user(&conn, 42, &profile("alice", "Alice")).expect("insert");
        set_admin_status(&conn, 42, true).expect("promote");

        update_profile(&conn, 42, &profile("alice_renamed", "Alicia")).expect("update");
        let user = get_user(&conn, 42).expect("get").expect("user exists");

        assert_eq!(user.username.as_deref(), Some("alice_renamed"));
        assert_eq!(user.first_name, "Alicia");
        assert!(user.is_admin, "profile refresh must not clear the admin flag");
    }

    #[test]
    fn set_admin_status_is_idempotent_and_reports_missing_users() {
        let pool = memory_pool();
        let conn = get_connection(&pool).expect("get connection");

        insert_user(&conn, 42, &profile("alice", "Alice")).expect("insert");

        assert!(set_admin_status(&conn, 42, true).expect("promote"));
        assert!(set_admin_status(&conn, 42, true).expect("promote again"));
        assert!(get_user(&conn, 42).expect("get").expect("user").is_admin);

        assert!(set_admin_status(&conn, 42, false).expect("demote"));
        assert!(!get_user(&conn, 42).expect("get").expect("user").is_admin);

        assert!(!set_admin_status(&conn, 99999, true).expect("unknown id"));
    }

    #[test]
    fn seed_admin_creates_once_and_never_overwrites() {
        let pool = memory_pool();
        let conn = get_connection(&pool).expect("get connection");

        seed_admin(&conn, 1).expect("seed");
        assert!(get_user(&conn, 1).expect("get").expect("admin").is_admin);

        // Re-seeding is a no-op.
        seed_admin(&conn, 1).expect("seed again");

        // Seeding an ID that already exists as a regular user leaves them alone.
        insert_user(&conn, 2, &profile("bob", "Bob")).expect("insert");
        seed_admin(&conn, 2).expect("seed existing");
        assert!(!get_user(&conn, 2).expect("get").expect("user").is_admin);
    }

    #[test]
    fn list_users_is_ordered_by_tg_id() {
        let pool = memory_pool();
        let conn = get_connection(&pool).expect("get connection");

        insert_user(&conn, 30, &profile("c", "C")).expect("insert");
        insert_user(&conn, 10, &profile("a", "A")).expect("insert");
        insert_user(&conn, 20, &profile("b", "B")).expect("insert");

        let ids: Vec<i64> = list_users(&conn).expect("list").iter().map(|u| u.tg_id).collect();
        assert_eq!(ids, vec![10, 20, 30]);
    }
}
