use anyhow::Result;
use itdiary_types::Role;
use rusqlite::{Connection, ErrorCode, Row, params};

use super::OptionalExt;
use crate::Database;
use crate::models::{NewUser, UserRow};

const USER_COLUMNS: &str = "id, username, email, password, role, bio, avatar, created_at";

impl Database {
    /// Insert a user. Returns `false` when the username is already taken
    /// (usernames compare case-insensitively).
    pub fn create_user(&self, user: &NewUser<'_>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let result = conn.execute(
                "INSERT INTO users (id, username, email, password, role, bio, avatar)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user.id,
                    user.username,
                    user.email,
                    user.password_hash,
                    user.role.as_str(),
                    user.bio,
                    user.avatar,
                ],
            );

            match result {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::ConstraintViolation => {
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username = ?1", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", id))
    }

    /// Emails are not unique; every account registered with the address is returned.
    pub fn get_users_by_email(&self, email: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE email = ?1 COLLATE NOCASE ORDER BY created_at"
            ))?;
            let rows = stmt
                .query_map([email], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_profile(
        &self,
        id: &str,
        email: Option<&str>,
        bio: &str,
        role: Role,
        avatar: Option<&str>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET email = ?2, bio = ?3, role = ?4, avatar = ?5 WHERE id = ?1",
                params![id, email, bio, role.as_str(), avatar],
            )?;
            Ok(changed > 0)
        })
    }
}

/// Swap the stored hash. Takes a connection so it can run inside the
/// password reset transaction.
pub(crate) fn write_password(conn: &Connection, id: &str, password_hash: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET password = ?2 WHERE id = ?1",
        params![id, password_hash],
    )?;
    Ok(changed > 0)
}

fn query_user(conn: &Connection, predicate: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE {predicate}"))?;
    stmt.query_row([value], map_user).optional()
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        role: row.get(4)?,
        bio: row.get(5)?,
        avatar: row.get(6)?,
        created_at: row.get(7)?,
    })
}
