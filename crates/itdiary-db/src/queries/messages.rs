use anyhow::Result;
use rusqlite::{Connection, Row, params};

use super::OptionalExt;
use crate::Database;
use crate::models::MessageRow;

const MESSAGE_SELECT: &str = "
    SELECT m.id, m.project_id, m.sender_id, s.username, m.receiver_id, r.username,
           m.text, m.created_at
    FROM messages m
    JOIN users s ON s.id = m.sender_id
    JOIN users r ON r.id = m.receiver_id";

impl Database {
    pub fn insert_message(
        &self,
        id: &str,
        project_id: &str,
        sender_id: &str,
        receiver_id: &str,
        text: &str,
    ) -> Result<MessageRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (id, project_id, sender_id, receiver_id, text)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, project_id, sender_id, receiver_id, text],
            )?;
            query_message(conn, id)?.ok_or_else(|| anyhow::anyhow!("Message vanished after insert: {}", id))
        })
    }

    /// Whole thread of one project, oldest first. Messages posted within the
    /// same millisecond keep their insertion order.
    pub fn get_thread(&self, project_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{MESSAGE_SELECT} WHERE m.project_id = ?1 ORDER BY m.created_at ASC, m.rowid ASC"
            ))?;
            let rows = stmt
                .query_map([project_id], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_message(conn: &Connection, id: &str) -> Result<Option<MessageRow>> {
    let mut stmt = conn.prepare(&format!("{MESSAGE_SELECT} WHERE m.id = ?1"))?;
    stmt.query_row([id], map_message).optional()
}

fn map_message(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        project_id: row.get(1)?,
        sender_id: row.get(2)?,
        sender_username: row.get(3)?,
        receiver_id: row.get(4)?,
        receiver_username: row.get(5)?,
        text: row.get(6)?,
        created_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support;

    #[test]
    fn threads_are_scoped_to_their_project() {
        let db = test_support::db();
        let client = test_support::user(&db, "client");
        let freelancer = test_support::user(&db, "freelancer");
        let first = test_support::project(&db, &client, "First", "10");
        let second = test_support::project(&db, &client, "Second", "10");
        db.set_project_executor(&first, &freelancer).unwrap();
        db.set_project_executor(&second, &freelancer).unwrap();

        db.insert_message("m1", &first, &client, &freelancer, "hello").unwrap();
        db.insert_message("m2", &first, &freelancer, &client, "hi").unwrap();
        let other = db
            .insert_message("m3", &second, &client, &freelancer, "other project")
            .unwrap();
        assert_eq!(other.sender_username, "client");
        assert_eq!(other.receiver_username, "freelancer");

        let thread = db.get_thread(&first).unwrap();
        let texts: Vec<&str> = thread.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["hello", "hi"]);
        assert_eq!(db.get_thread(&second).unwrap().len(), 1);
    }
}
