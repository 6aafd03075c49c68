use anyhow::Result;
use rusqlite::{Connection, params};

use super::OptionalExt;
use crate::models::SessionRow;
use crate::{Database, SQL_NOW};

impl Database {
    /// `expires_at` must be in [`crate::TIMESTAMP_FORMAT`]. The user's
    /// expired sessions are dropped on the way.
    pub fn create_session(&self, id: &str, user_id: &str, expires_at: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                &format!("DELETE FROM sessions WHERE user_id = ?1 AND expires_at <= {SQL_NOW}"),
                [user_id],
            )?;
            conn.execute(
                "INSERT INTO sessions (id, user_id, expires_at) VALUES (?1, ?2, ?3)",
                params![id, user_id, expires_at],
            )?;
            Ok(())
        })
    }

    /// Session joined with its user, only while unexpired.
    pub fn get_active_session(&self, id: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT s.id, s.user_id, u.username, s.expires_at
                     FROM sessions s
                     JOIN users u ON u.id = s.user_id
                     WHERE s.id = ?1 AND s.expires_at > {SQL_NOW}"
                ),
                [id],
                |row| {
                    Ok(SessionRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        username: row.get(2)?,
                        expires_at: row.get(3)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn delete_session(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM sessions WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }
}

/// Sign a user out everywhere. Takes a connection so it can join the
/// password reset transaction.
pub(crate) fn revoke_user_sessions(conn: &Connection, user_id: &str) -> Result<usize> {
    let changed = conn.execute("DELETE FROM sessions WHERE user_id = ?1", [user_id])?;
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::format_timestamp;
    use crate::queries::test_support;

    #[test]
    fn expired_sessions_are_not_active() {
        let db = test_support::db();
        let user = test_support::user(&db, "anna");

        let future = format_timestamp(Utc::now() + Duration::days(1));
        let past = format_timestamp(Utc::now() - Duration::minutes(1));
        db.create_session("live", &user, &future).unwrap();
        db.create_session("stale", &user, &past).unwrap();

        let live = db.get_active_session("live").unwrap().unwrap();
        assert_eq!(live.user_id, user);
        assert_eq!(live.username, "anna");
        assert!(db.get_active_session("stale").unwrap().is_none());
    }

    #[test]
    fn sessions_can_be_revoked() {
        let db = test_support::db();
        let user = test_support::user(&db, "anna");
        let future = format_timestamp(Utc::now() + Duration::days(1));
        db.create_session("a", &user, &future).unwrap();
        db.create_session("b", &user, &future).unwrap();
        db.create_session("c", &user, &future).unwrap();

        assert!(db.delete_session("a").unwrap());
        assert!(!db.delete_session("a").unwrap());
        assert_eq!(db.with_conn(|conn| revoke_user_sessions(conn, &user)).unwrap(), 2);
        assert!(db.get_active_session("b").unwrap().is_none());
    }

    #[test]
    fn new_sessions_sweep_expired_ones() {
        let db = test_support::db();
        let anna = test_support::user(&db, "anna");
        let boris = test_support::user(&db, "boris");
        let past = format_timestamp(Utc::now() - Duration::minutes(1));
        let future = format_timestamp(Utc::now() + Duration::days(1));
        db.create_session("anna-old", &anna, &past).unwrap();
        db.create_session("boris-old", &boris, &past).unwrap();

        db.create_session("anna-new", &anna, &future).unwrap();

        let remaining: Vec<String> = db
            .with_conn(|conn| {
                let mut stmt = conn.prepare("SELECT id FROM sessions ORDER BY id")?;
                let ids = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<String>, _>>()?;
                Ok(ids)
            })
            .unwrap();
        assert_eq!(remaining, ["anna-new", "boris-old"]);
    }
}
