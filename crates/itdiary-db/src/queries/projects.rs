use anyhow::Result;
use rusqlite::{Connection, Row, params};

use super::OptionalExt;
use crate::Database;
use crate::models::{ProjectFields, ProjectFilter, ProjectRow};

const PROJECT_SELECT: &str = "
    SELECT p.id, p.client_id, c.username, p.executor_id, e.username,
           p.title, p.description, p.budget_cents, p.deadline, p.created_at
    FROM projects p
    JOIN users c ON c.id = p.client_id
    LEFT JOIN users e ON e.id = p.executor_id";

impl Database {
    /// New projects always start without an executor.
    pub fn insert_project(&self, id: &str, client_id: &str, fields: &ProjectFields<'_>) -> Result<ProjectRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO projects (id, client_id, title, description, budget_cents, deadline)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    client_id,
                    fields.title,
                    fields.description,
                    fields.budget.cents(),
                    fields.deadline,
                ],
            )?;
            query_project(conn, id)?.ok_or_else(|| anyhow::anyhow!("Project vanished after insert: {}", id))
        })
    }

    pub fn get_project(&self, id: &str) -> Result<Option<ProjectRow>> {
        self.with_conn(|conn| query_project(conn, id))
    }

    /// Newest first. Budget bounds are inclusive and applied in SQL; the title
    /// match is done here so that case folding covers non-ASCII titles too.
    pub fn list_projects(&self, filter: &ProjectFilter) -> Result<Vec<ProjectRow>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{PROJECT_SELECT}
                 WHERE (?1 IS NULL OR p.budget_cents >= ?1)
                   AND (?2 IS NULL OR p.budget_cents <= ?2)
                 ORDER BY p.created_at DESC, p.rowid DESC"
            ))?;
            let rows = stmt
                .query_map(
                    params![
                        filter.min_budget.map(|m| m.cents()),
                        filter.max_budget.map(|m| m.cents()),
                    ],
                    map_project,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        let Some(needle) = filter.title_contains.as_deref().map(str::to_lowercase) else {
            return Ok(rows);
        };

        Ok(rows
            .into_iter()
            .filter(|row| row.title.to_lowercase().contains(&needle))
            .collect())
    }

    pub fn list_projects_by_client(&self, client_id: &str) -> Result<Vec<ProjectRow>> {
        self.with_conn(|conn| query_projects_where(conn, "p.client_id = ?1", client_id))
    }

    pub fn list_projects_by_executor(&self, executor_id: &str) -> Result<Vec<ProjectRow>> {
        self.with_conn(|conn| query_projects_where(conn, "p.executor_id = ?1", executor_id))
    }

    /// Projects where the two users sit on opposite sides of the
    /// client/executor pair, in either direction.
    pub fn shared_projects(&self, user_a: &str, user_b: &str) -> Result<Vec<ProjectRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{PROJECT_SELECT}
                 WHERE (p.client_id = ?1 AND p.executor_id = ?2)
                    OR (p.client_id = ?2 AND p.executor_id = ?1)
                 ORDER BY p.created_at DESC, p.rowid DESC"
            ))?;
            let rows = stmt
                .query_map(params![user_a, user_b], map_project)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_project(&self, id: &str, fields: &ProjectFields<'_>) -> Result<Option<ProjectRow>> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE projects
                 SET title = ?2, description = ?3, budget_cents = ?4, deadline = ?5
                 WHERE id = ?1",
                params![id, fields.title, fields.description, fields.budget.cents(), fields.deadline],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_project(conn, id)
        })
    }

    /// Last write wins: concurrent acceptances simply overwrite each other.
    pub fn set_project_executor(&self, id: &str, executor_id: &str) -> Result<Option<ProjectRow>> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE projects SET executor_id = ?2 WHERE id = ?1",
                params![id, executor_id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_project(conn, id)
        })
    }

    /// Offers, messages and reviews of the project go with it.
    pub fn delete_project(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM projects WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }
}

fn query_project(conn: &Connection, id: &str) -> Result<Option<ProjectRow>> {
    let mut stmt = conn.prepare(&format!("{PROJECT_SELECT} WHERE p.id = ?1"))?;
    stmt.query_row([id], map_project).optional()
}

fn query_projects_where(conn: &Connection, predicate: &str, value: &str) -> Result<Vec<ProjectRow>> {
    let mut stmt = conn.prepare(&format!(
        "{PROJECT_SELECT} WHERE {predicate} ORDER BY p.created_at DESC, p.rowid DESC"
    ))?;
    let rows = stmt
        .query_map([value], map_project)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_project(row: &Row<'_>) -> rusqlite::Result<ProjectRow> {
    Ok(ProjectRow {
        id: row.get(0)?,
        client_id: row.get(1)?,
        client_username: row.get(2)?,
        executor_id: row.get(3)?,
        executor_username: row.get(4)?,
        title: row.get(5)?,
        description: row.get(6)?,
        budget_cents: row.get(7)?,
        deadline: row.get(8)?,
        created_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use itdiary_types::Money;

    use super::*;
    use crate::queries::test_support;

    fn titles(rows: &[ProjectRow]) -> Vec<&str> {
        let mut titles: Vec<&str> = rows.iter().map(|r| r.title.as_str()).collect();
        titles.sort_unstable();
        titles
    }

    #[test]
    fn new_projects_have_no_executor() {
        let db = test_support::db();
        let client = test_support::user(&db, "client");
        let id = test_support::project(&db, &client, "Landing page", "500");

        let project = db.get_project(&id).unwrap().unwrap();
        assert_eq!(project.client_id, client);
        assert_eq!(project.client_username, "client");
        assert_eq!(project.executor_id, None);
        assert_eq!(project.budget_cents, 50_000);
        assert_eq!(project.deadline, "2025-01-01");
    }

    #[test]
    fn budget_range_is_inclusive() {
        let db = test_support::db();
        let client = test_support::user(&db, "client");
        test_support::project(&db, &client, "cheap", "99.99");
        test_support::project(&db, &client, "low edge", "100");
        test_support::project(&db, &client, "middle", "150");
        test_support::project(&db, &client, "high edge", "200.00");
        test_support::project(&db, &client, "pricey", "200.01");

        let rows = db
            .list_projects(&ProjectFilter {
                title_contains: None,
                min_budget: Some("100".parse::<Money>().unwrap()),
                max_budget: Some("200".parse::<Money>().unwrap()),
            })
            .unwrap();
        assert_eq!(titles(&rows), vec!["high edge", "low edge", "middle"]);
    }

    #[test]
    fn title_search_is_case_insensitive_and_composes_with_budget() {
        let db = test_support::db();
        let client = test_support::user(&db, "client");
        test_support::project(&db, &client, "Rust CLI tool", "150");
        test_support::project(&db, &client, "rust web backend", "900");
        test_support::project(&db, &client, "Лендинг на Rust", "120");
        test_support::project(&db, &client, "Logo design", "150");

        let rows = db
            .list_projects(&ProjectFilter {
                title_contains: Some("RUST".into()),
                min_budget: None,
                max_budget: Some("200".parse::<Money>().unwrap()),
            })
            .unwrap();
        assert_eq!(titles(&rows), vec!["Rust CLI tool", "Лендинг на Rust"]);

        let cyrillic = db
            .list_projects(&ProjectFilter {
                title_contains: Some("лендинг".into()),
                ..ProjectFilter::default()
            })
            .unwrap();
        assert_eq!(cyrillic.len(), 1);

        assert_eq!(db.list_projects(&ProjectFilter::default()).unwrap().len(), 4);
    }

    #[test]
    fn executor_assignment_overwrites() {
        let db = test_support::db();
        let client = test_support::user(&db, "client");
        let first = test_support::user(&db, "first");
        let second = test_support::user(&db, "second");
        let id = test_support::project(&db, &client, "Job", "10");

        let project = db.set_project_executor(&id, &first).unwrap().unwrap();
        assert_eq!(project.executor_username.as_deref(), Some("first"));

        let project = db.set_project_executor(&id, &second).unwrap().unwrap();
        assert_eq!(project.executor_id.as_deref(), Some(second.as_str()));

        assert_eq!(db.list_projects_by_executor(&second).unwrap().len(), 1);
        assert!(db.list_projects_by_executor(&first).unwrap().is_empty());
        assert!(db.set_project_executor("missing", &first).unwrap().is_none());
    }

    #[test]
    fn shared_projects_match_either_direction() {
        let db = test_support::db();
        let anna = test_support::user(&db, "anna");
        let boris = test_support::user(&db, "boris");
        let carl = test_support::user(&db, "carl");

        let one = test_support::project(&db, &anna, "one", "10");
        let two = test_support::project(&db, &boris, "two", "10");
        test_support::project(&db, &anna, "unassigned", "10");
        db.set_project_executor(&one, &boris).unwrap();
        db.set_project_executor(&two, &anna).unwrap();

        assert_eq!(db.shared_projects(&anna, &boris).unwrap().len(), 2);
        assert_eq!(db.shared_projects(&boris, &anna).unwrap().len(), 2);
        assert!(db.shared_projects(&anna, &carl).unwrap().is_empty());
    }

    #[test]
    fn update_and_delete() {
        let db = test_support::db();
        let client = test_support::user(&db, "client");
        let id = test_support::project(&db, &client, "Old", "10");

        let updated = db
            .update_project(
                &id,
                &ProjectFields {
                    title: "New",
                    description: "Changed",
                    budget: Money::from_cents(1_234),
                    deadline: "2026-03-01",
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "New");
        assert_eq!(updated.budget_cents, 1_234);
        assert_eq!(db.list_projects_by_client(&client).unwrap().len(), 1);

        assert!(db.delete_project(&id).unwrap());
        assert!(!db.delete_project(&id).unwrap());
        assert!(db.get_project(&id).unwrap().is_none());
    }
}
