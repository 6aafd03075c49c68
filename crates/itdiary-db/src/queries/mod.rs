mod messages;
mod offers;
mod password_resets;
mod projects;
mod reviews;
mod sessions;
mod users;

use anyhow::Result;

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use itdiary_types::{Money, Role};
    use uuid::Uuid;

    use crate::Database;
    use crate::models::{NewUser, ProjectFields};

    pub fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    pub fn user(db: &Database, username: &str) -> String {
        let id = Uuid::new_v4().to_string();
        let created = db
            .create_user(&NewUser {
                id: &id,
                username,
                email: Some(&format!("{username}@example.com")),
                password_hash: "not-a-real-hash",
                role: Role::Freelancer,
                bio: "",
                avatar: None,
            })
            .unwrap();
        assert!(created);
        id
    }

    pub fn project(db: &Database, client_id: &str, title: &str, budget: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.insert_project(
            &id,
            client_id,
            &ProjectFields {
                title,
                description: "Details",
                budget: budget.parse::<Money>().unwrap(),
                deadline: "2025-01-01",
            },
        )
        .unwrap();
        id
    }
}
