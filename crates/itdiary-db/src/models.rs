//! SQLite row types. Kept apart from the itdiary-types API models so the
//! storage layer does not depend on the wire format.

use itdiary_types::{Money, Role};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub password: String,
    pub role: String,
    pub bio: String,
    pub avatar: Option<String>,
    pub created_at: String,
}

pub struct NewUser<'a> {
    pub id: &'a str,
    pub username: &'a str,
    pub email: Option<&'a str>,
    pub password_hash: &'a str,
    pub role: Role,
    pub bio: &'a str,
    pub avatar: Option<&'a str>,
}

/// Project joined with the usernames of its client and executor.
#[derive(Debug, Clone)]
pub struct ProjectRow {
    pub id: String,
    pub client_id: String,
    pub client_username: String,
    pub executor_id: Option<String>,
    pub executor_username: Option<String>,
    pub title: String,
    pub description: String,
    pub budget_cents: i64,
    pub deadline: String,
    pub created_at: String,
}

/// Editable project columns; `deadline` is `YYYY-MM-DD`.
pub struct ProjectFields<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub budget: Money,
    pub deadline: &'a str,
}

/// Conjunctive filter for the public project list. `None` disables a bound.
#[derive(Debug, Default, Clone)]
pub struct ProjectFilter {
    pub title_contains: Option<String>,
    pub min_budget: Option<Money>,
    pub max_budget: Option<Money>,
}

#[derive(Debug, Clone)]
pub struct OfferRow {
    pub id: String,
    pub project_id: String,
    pub project_title: String,
    pub freelancer_id: String,
    pub freelancer_username: String,
    pub proposal_text: String,
    pub proposed_price_cents: i64,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub project_id: String,
    pub sender_id: String,
    pub sender_username: String,
    pub receiver_id: String,
    pub receiver_username: String,
    pub text: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct ReviewRow {
    pub id: String,
    pub project_id: String,
    pub project_title: String,
    pub reviewer_id: String,
    pub reviewer_username: String,
    pub reviewed_id: String,
    pub reviewed_username: String,
    pub rating: i64,
    pub comment: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct SessionRow {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub expires_at: String,
}

#[derive(Debug, Clone)]
pub struct PasswordResetRow {
    pub id: String,
    pub user_id: String,
    pub expires_at: String,
}
