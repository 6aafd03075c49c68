use anyhow::Result;
use itdiary_types::Money;
use rusqlite::{Connection, Row, params};

use super::OptionalExt;
use crate::Database;
use crate::models::OfferRow;

const OFFER_SELECT: &str = "
    SELECT o.id, o.project_id, p.title, o.freelancer_id, u.username,
           o.proposal_text, o.proposed_price_cents, o.created_at
    FROM offers o
    JOIN projects p ON p.id = o.project_id
    JOIN users u ON u.id = o.freelancer_id";

impl Database {
    /// No uniqueness: a freelancer may bid on the same project repeatedly.
    pub fn insert_offer(
        &self,
        id: &str,
        project_id: &str,
        freelancer_id: &str,
        proposal_text: &str,
        proposed_price: Money,
    ) -> Result<OfferRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO offers (id, project_id, freelancer_id, proposal_text, proposed_price_cents)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, project_id, freelancer_id, proposal_text, proposed_price.cents()],
            )?;
            query_offer(conn, id)?.ok_or_else(|| anyhow::anyhow!("Offer vanished after insert: {}", id))
        })
    }

    pub fn get_offer(&self, id: &str) -> Result<Option<OfferRow>> {
        self.with_conn(|conn| query_offer(conn, id))
    }

    /// Oldest first, in submission order.
    pub fn list_offers_for_project(&self, project_id: &str) -> Result<Vec<OfferRow>> {
        self.with_conn(|conn| {
            query_offers_where(conn, "o.project_id = ?1 ORDER BY o.created_at, o.rowid", project_id)
        })
    }

    /// Newest first.
    pub fn list_offers_by_freelancer(&self, freelancer_id: &str) -> Result<Vec<OfferRow>> {
        self.with_conn(|conn| {
            query_offers_where(
                conn,
                "o.freelancer_id = ?1 ORDER BY o.created_at DESC, o.rowid DESC",
                freelancer_id,
            )
        })
    }
}

fn query_offer(conn: &Connection, id: &str) -> Result<Option<OfferRow>> {
    let mut stmt = conn.prepare(&format!("{OFFER_SELECT} WHERE o.id = ?1"))?;
    stmt.query_row([id], map_offer).optional()
}

fn query_offers_where(conn: &Connection, clause: &str, value: &str) -> Result<Vec<OfferRow>> {
    let mut stmt = conn.prepare(&format!("{OFFER_SELECT} WHERE {clause}"))?;
    let rows = stmt
        .query_map([value], map_offer)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_offer(row: &Row<'_>) -> rusqlite::Result<OfferRow> {
    Ok(OfferRow {
        id: row.get(0)?,
        project_id: row.get(1)?,
        project_title: row.get(2)?,
        freelancer_id: row.get(3)?,
        freelancer_username: row.get(4)?,
        proposal_text: row.get(5)?,
        proposed_price_cents: row.get(6)?,
        created_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support;

    #[test]
    fn repeated_offers_are_kept_in_order() {
        let db = test_support::db();
        let client = test_support::user(&db, "client");
        let freelancer = test_support::user(&db, "freelancer");
        let project = test_support::project(&db, &client, "Job", "500");

        let first = db
            .insert_offer("o1", &project, &freelancer, "First try", Money::from_cents(45_000))
            .unwrap();
        assert_eq!(first.project_title, "Job");
        assert_eq!(first.freelancer_username, "freelancer");
        db.insert_offer("o2", &project, &freelancer, "Second try", Money::from_cents(40_000))
            .unwrap();

        let offers = db.list_offers_for_project(&project).unwrap();
        let ids: Vec<&str> = offers.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["o1", "o2"]);

        let mine = db.list_offers_by_freelancer(&freelancer).unwrap();
        assert_eq!(mine[0].id, "o2");
        assert_eq!(db.get_offer("o1").unwrap().unwrap().proposed_price_cents, 45_000);
    }

    #[test]
    fn offers_go_away_with_their_project() {
        let db = test_support::db();
        let client = test_support::user(&db, "client");
        let freelancer = test_support::user(&db, "freelancer");
        let project = test_support::project(&db, &client, "Job", "500");
        db.insert_offer("o1", &project, &freelancer, "Bid", Money::from_cents(100))
            .unwrap();

        db.delete_project(&project).unwrap();
        assert!(db.get_offer("o1").unwrap().is_none());
    }

    #[test]
    fn offers_require_an_existing_project() {
        let db = test_support::db();
        let freelancer = test_support::user(&db, "freelancer");
        let result = db.insert_offer("o1", "no-such-project", &freelancer, "Bid", Money::from_cents(100));
        assert!(result.is_err());
    }
}
