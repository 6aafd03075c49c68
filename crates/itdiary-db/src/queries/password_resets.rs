use anyhow::Result;
use rusqlite::params;

use super::OptionalExt;
use super::sessions::revoke_user_sessions;
use super::users::write_password;
use crate::models::PasswordResetRow;
use crate::{Database, SQL_NOW};

/// Outstanding links kept per user; older ones are dropped on insert.
pub const MAX_PENDING_RESETS: usize = 5;

impl Database {
    /// Only the digest of the emailed token is stored. Used and expired rows
    /// of the user are swept, and only the newest [`MAX_PENDING_RESETS`]
    /// links stay valid.
    pub fn insert_password_reset(
        &self,
        id: &str,
        user_id: &str,
        token_hash: &str,
        expires_at: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO password_resets (id, user_id, token_hash, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, user_id, token_hash, expires_at],
            )?;
            conn.execute(
                &format!(
                    "DELETE FROM password_resets
                     WHERE user_id = ?1 AND (used_at IS NOT NULL OR expires_at <= {SQL_NOW})"
                ),
                [user_id],
            )?;
            conn.execute(
                "DELETE FROM password_resets
                 WHERE user_id = ?1 AND id NOT IN (
                     SELECT id FROM password_resets WHERE user_id = ?1
                     ORDER BY created_at DESC, rowid DESC LIMIT ?2
                 )",
                params![user_id, MAX_PENDING_RESETS as i64],
            )?;
            Ok(())
        })
    }

    /// Unused, unexpired reset of `user_id` whose digest matches.
    pub fn find_valid_password_reset(&self, user_id: &str, token_hash: &str) -> Result<Option<PasswordResetRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT id, user_id, expires_at FROM password_resets
                     WHERE user_id = ?1 AND token_hash = ?2
                       AND used_at IS NULL AND expires_at > {SQL_NOW}"
                ),
                params![user_id, token_hash],
                |row| {
                    Ok(PasswordResetRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        expires_at: row.get(2)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Swap the password hash, burn every outstanding link of the user and
    /// sign them out everywhere, all in one transaction. Returns `false` if
    /// the presented token was consumed in the meantime.
    pub fn complete_password_reset(&self, reset_id: &str, user_id: &str, password_hash: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let burned = tx.execute(
                &format!(
                    "UPDATE password_resets SET used_at = {SQL_NOW}
                     WHERE id = ?1 AND user_id = ?2 AND used_at IS NULL"
                ),
                params![reset_id, user_id],
            )?;
            if burned == 0 {
                return Ok(false);
            }
            tx.execute(
                &format!("UPDATE password_resets SET used_at = {SQL_NOW} WHERE user_id = ?1 AND used_at IS NULL"),
                [user_id],
            )?;

            write_password(&tx, user_id, password_hash)?;
            revoke_user_sessions(&tx, user_id)?;
            tx.commit()?;
            Ok(true)
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::format_timestamp;
    use crate::queries::test_support;

    #[test]
    fn tokens_are_single_use() {
        let db = test_support::db();
        let user = test_support::user(&db, "anna");
        let expires = format_timestamp(Utc::now() + Duration::hours(1));
        db.insert_password_reset("r1", &user, "digest", &expires).unwrap();
        db.create_session("s1", &user, &expires).unwrap();

        let reset = db.find_valid_password_reset(&user, "digest").unwrap().unwrap();
        assert!(db.complete_password_reset(&reset.id, &user, "new-hash").unwrap());

        assert_eq!(db.get_user_by_id(&user).unwrap().unwrap().password, "new-hash");
        assert!(db.get_active_session("s1").unwrap().is_none());
        assert!(db.find_valid_password_reset(&user, "digest").unwrap().is_none());
        assert!(!db.complete_password_reset(&reset.id, &user, "again").unwrap());
    }

    #[test]
    fn expired_or_mismatched_tokens_are_invalid() {
        let db = test_support::db();
        let user = test_support::user(&db, "anna");
        let past = format_timestamp(Utc::now() - Duration::minutes(5));
        let future = format_timestamp(Utc::now() + Duration::hours(1));
        db.insert_password_reset("old", &user, "old-digest", &past).unwrap();
        db.insert_password_reset("new", &user, "new-digest", &future).unwrap();

        assert!(db.find_valid_password_reset(&user, "old-digest").unwrap().is_none());
        assert!(db.find_valid_password_reset(&user, "other").unwrap().is_none());
        assert!(db.find_valid_password_reset("someone-else", "new-digest").unwrap().is_none());
    }

    #[test]
    fn completing_a_reset_burns_every_outstanding_link() {
        let db = test_support::db();
        let user = test_support::user(&db, "anna");
        let expires = format_timestamp(Utc::now() + Duration::hours(1));
        db.insert_password_reset("first", &user, "first-digest", &expires).unwrap();
        db.insert_password_reset("second", &user, "second-digest", &expires).unwrap();

        let reset = db.find_valid_password_reset(&user, "first-digest").unwrap().unwrap();
        assert!(db.complete_password_reset(&reset.id, &user, "new-hash").unwrap());

        assert!(db.find_valid_password_reset(&user, "second-digest").unwrap().is_none());
        assert!(!db.complete_password_reset("second", &user, "other-hash").unwrap());
        assert_eq!(db.get_user_by_id(&user).unwrap().unwrap().password, "new-hash");
    }

    #[test]
    fn inserting_sweeps_stale_rows_and_caps_pending_links() {
        let db = test_support::db();
        let user = test_support::user(&db, "anna");
        let past = format_timestamp(Utc::now() - Duration::minutes(5));
        let future = format_timestamp(Utc::now() + Duration::hours(1));
        db.insert_password_reset("expired", &user, "expired-digest", &past).unwrap();

        for n in 0..MAX_PENDING_RESETS + 2 {
            db.insert_password_reset(&format!("r{n}"), &user, &format!("digest-{n}"), &future).unwrap();
        }

        let count: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM password_resets WHERE user_id = ?1",
                    [&user],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(count, MAX_PENDING_RESETS as i64);
        assert!(db.find_valid_password_reset(&user, "digest-0").unwrap().is_none());
        let newest = format!("digest-{}", MAX_PENDING_RESETS + 1);
        assert!(db.find_valid_password_reset(&user, &newest).unwrap().is_some());
    }
}
