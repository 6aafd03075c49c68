use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE COLLATE NOCASE,
            email       TEXT,
            password    TEXT NOT NULL,
            role        TEXT NOT NULL DEFAULT 'freelancer'
                            CHECK (role IN ('client', 'freelancer')),
            bio         TEXT NOT NULL DEFAULT '',
            avatar      TEXT,
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_users_email
            ON users(email COLLATE NOCASE);

        CREATE TABLE IF NOT EXISTS projects (
            id              TEXT PRIMARY KEY,
            client_id       TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            executor_id     TEXT REFERENCES users(id) ON DELETE SET NULL,
            title           TEXT NOT NULL,
            description     TEXT NOT NULL,
            budget_cents    INTEGER NOT NULL CHECK (budget_cents >= 0),
            deadline        TEXT NOT NULL,
            created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_projects_client
            ON projects(client_id);
        CREATE INDEX IF NOT EXISTS idx_projects_executor
            ON projects(executor_id);
        CREATE INDEX IF NOT EXISTS idx_projects_budget
            ON projects(budget_cents);

        CREATE TABLE IF NOT EXISTS offers (
            id                      TEXT PRIMARY KEY,
            project_id              TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            freelancer_id           TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            proposal_text           TEXT NOT NULL,
            proposed_price_cents    INTEGER NOT NULL CHECK (proposed_price_cents >= 0),
            created_at              TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_offers_project
            ON offers(project_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_offers_freelancer
            ON offers(freelancer_id);

        CREATE TABLE IF NOT EXISTS messages (
            id          TEXT PRIMARY KEY,
            project_id  TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            sender_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            receiver_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            text        TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_project
            ON messages(project_id, created_at);

        CREATE TABLE IF NOT EXISTS reviews (
            id          TEXT PRIMARY KEY,
            project_id  TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            reviewer_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            reviewed_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            rating      INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
            comment     TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_reviews_reviewed
            ON reviews(reviewed_id, created_at);

        CREATE TABLE IF NOT EXISTS sessions (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
            expires_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_user
            ON sessions(user_id);

        CREATE TABLE IF NOT EXISTS password_resets (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            token_hash  TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
            expires_at  TEXT NOT NULL,
            used_at     TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_password_resets_user
            ON password_resets(user_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('users', 'projects', 'offers', 'messages', 'reviews', 'sessions', 'password_resets')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 7);
    }
}
