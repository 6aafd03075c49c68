use anyhow::Result;
use rusqlite::{Connection, Row, params};

use super::OptionalExt;
use crate::Database;
use crate::models::ReviewRow;

const REVIEW_SELECT: &str = "
    SELECT rv.id, rv.project_id, p.title, rv.reviewer_id, a.username,
           rv.reviewed_id, b.username, rv.rating, rv.comment, rv.created_at
    FROM reviews rv
    JOIN projects p ON p.id = rv.project_id
    JOIN users a ON a.id = rv.reviewer_id
    JOIN users b ON b.id = rv.reviewed_id";

impl Database {
    pub fn insert_review(
        &self,
        id: &str,
        project_id: &str,
        reviewer_id: &str,
        reviewed_id: &str,
        rating: u8,
        comment: &str,
    ) -> Result<ReviewRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO reviews (id, project_id, reviewer_id, reviewed_id, rating, comment)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, project_id, reviewer_id, reviewed_id, rating, comment],
            )?;
            query_review(conn, id)?.ok_or_else(|| anyhow::anyhow!("Review vanished after insert: {}", id))
        })
    }

    /// Reviews received by a user, newest first.
    pub fn list_reviews_for_user(&self, reviewed_id: &str) -> Result<Vec<ReviewRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{REVIEW_SELECT} WHERE rv.reviewed_id = ?1 ORDER BY rv.created_at DESC, rv.rowid DESC"
            ))?;
            let rows = stmt
                .query_map([reviewed_id], map_review)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Unrounded mean of received ratings, `None` without reviews.
    pub fn average_rating(&self, reviewed_id: &str) -> Result<Option<f64>> {
        self.with_conn(|conn| {
            let avg = conn.query_row(
                "SELECT AVG(rating) FROM reviews WHERE reviewed_id = ?1",
                [reviewed_id],
                |row| row.get::<_, Option<f64>>(0),
            )?;
            Ok(avg)
        })
    }
}

fn query_review(conn: &Connection, id: &str) -> Result<Option<ReviewRow>> {
    let mut stmt = conn.prepare(&format!("{REVIEW_SELECT} WHERE rv.id = ?1"))?;
    stmt.query_row([id], map_review).optional()
}

fn map_review(row: &Row<'_>) -> rusqlite::Result<ReviewRow> {
    Ok(ReviewRow {
        id: row.get(0)?,
        project_id: row.get(1)?,
        project_title: row.get(2)?,
        reviewer_id: row.get(3)?,
        reviewer_username: row.get(4)?,
        reviewed_id: row.get(5)?,
        reviewed_username: row.get(6)?,
        rating: row.get(7)?,
        comment: row.get(8)?,
        created_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support;

    #[test]
    fn average_over_received_reviews() {
        let db = test_support::db();
        let client = test_support::user(&db, "client");
        let freelancer = test_support::user(&db, "freelancer");
        let project = test_support::project(&db, &client, "Job", "10");

        assert_eq!(db.average_rating(&freelancer).unwrap(), None);

        db.insert_review("r1", &project, &client, &freelancer, 5, "Great").unwrap();
        db.insert_review("r2", &project, &client, &freelancer, 4, "Good").unwrap();
        db.insert_review("r3", &project, &freelancer, &client, 1, "Slow to pay").unwrap();

        assert_eq!(db.average_rating(&freelancer).unwrap(), Some(4.5));

        let received = db.list_reviews_for_user(&freelancer).unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].id, "r2");
        assert_eq!(received[0].reviewer_username, "client");
        assert_eq!(received[0].project_title, "Job");
    }

    #[test]
    fn out_of_range_ratings_are_rejected_by_the_schema() {
        let db = test_support::db();
        let client = test_support::user(&db, "client");
        let freelancer = test_support::user(&db, "freelancer");
        let project = test_support::project(&db, &client, "Job", "10");

        assert!(db.insert_review("r1", &project, &client, &freelancer, 0, "").is_err());
        assert!(db.insert_review("r2", &project, &client, &freelancer, 6, "").is_err());
    }
}
