//! DB rows to API responses. Rows that fail to parse are logged and served
//! with defaults rather than failing the whole listing.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;
use uuid::Uuid;

use itdiary_db::models::{MessageRow, OfferRow, ProjectRow, ReviewRow, UserRow};
use itdiary_types::api::{
    MessageResponse, OfferResponse, ProjectRef, ProjectResponse, ReviewResponse, UserResponse,
    UserSummary,
};
use itdiary_types::{Money, ProjectStatus, Role};

use crate::avatars::avatar_url;

fn id(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

fn timestamp(raw: &str, what: &str) -> DateTime<Utc> {
    itdiary_db::parse_timestamp(raw).unwrap_or_else(|| {
        warn!("Corrupt {} timestamp '{}'", what, raw);
        DateTime::default()
    })
}

pub fn user_summary(user_id: &str, username: &str) -> UserSummary {
    UserSummary {
        id: id(user_id, "user id"),
        username: username.to_string(),
    }
}

pub fn project_ref(project_id: &str, title: &str) -> ProjectRef {
    ProjectRef {
        id: id(project_id, "project id"),
        title: title.to_string(),
    }
}

/// `include_email` is only set when the viewer owns the account.
pub fn user_response(row: &UserRow, include_email: bool) -> UserResponse {
    UserResponse {
        id: id(&row.id, "user id"),
        username: row.username.clone(),
        email: row.email.clone().filter(|_| include_email),
        role: row.role.parse().unwrap_or_else(|e| {
            warn!("Unknown role '{}' on user '{}': {}", row.role, row.id, e);
            Role::default()
        }),
        bio: row.bio.clone(),
        avatar_url: row.avatar.as_deref().map(avatar_url),
        date_joined: timestamp(&row.created_at, "user"),
    }
}

pub fn project_response(row: &ProjectRow) -> ProjectResponse {
    let executor = match (&row.executor_id, &row.executor_username) {
        (Some(executor_id), Some(username)) => Some(user_summary(executor_id, username)),
        _ => None,
    };

    ProjectResponse {
        id: id(&row.id, "project id"),
        title: row.title.clone(),
        description: row.description.clone(),
        budget: Money::from_cents(row.budget_cents),
        deadline: NaiveDate::parse_from_str(&row.deadline, "%Y-%m-%d").unwrap_or_else(|e| {
            warn!("Corrupt deadline '{}' on project '{}': {}", row.deadline, row.id, e);
            NaiveDate::default()
        }),
        created_at: timestamp(&row.created_at, "project"),
        status: ProjectStatus::for_executor(executor.as_ref().map(|e| e.id)),
        client: user_summary(&row.client_id, &row.client_username),
        executor,
    }
}

pub fn offer_response(row: &OfferRow) -> OfferResponse {
    OfferResponse {
        id: id(&row.id, "offer id"),
        project: project_ref(&row.project_id, &row.project_title),
        freelancer: user_summary(&row.freelancer_id, &row.freelancer_username),
        proposal_text: row.proposal_text.clone(),
        proposed_price: Money::from_cents(row.proposed_price_cents),
        created_at: timestamp(&row.created_at, "offer"),
    }
}

pub fn message_response(row: &MessageRow) -> MessageResponse {
    MessageResponse {
        id: id(&row.id, "message id"),
        project_id: id(&row.project_id, "project id"),
        sender: user_summary(&row.sender_id, &row.sender_username),
        receiver: user_summary(&row.receiver_id, &row.receiver_username),
        text: row.text.clone(),
        timestamp: timestamp(&row.created_at, "message"),
    }
}

pub fn review_response(row: &ReviewRow) -> ReviewResponse {
    ReviewResponse {
        id: id(&row.id, "review id"),
        project: project_ref(&row.project_id, &row.project_title),
        reviewer: user_summary(&row.reviewer_id, &row.reviewer_username),
        reviewed: user_summary(&row.reviewed_id, &row.reviewed_username),
        rating: u8::try_from(row.rating).unwrap_or_else(|_| {
            warn!("Out of range rating {} on review '{}'", row.rating, row.id);
            0
        }),
        comment: row.comment.clone(),
        created_at: timestamp(&row.created_at, "review"),
    }
}

/// Mean rating to one decimal place; 0 when there are no reviews.
pub fn rounded_average(average: Option<f64>) -> f64 {
    average.map(|avg| (avg * 10.0).round() / 10.0).unwrap_or(0.0)
}
