use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::{Money, ProjectStatus, Role};

/// Form fields arrive as strings or bare JSON scalars; both are kept as text
/// so that parsing failures surface as per-field validation messages instead
/// of a blanket body rejection. `null` reads as an empty field.
fn form_value<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Text(s)) => s,
        Some(Scalar::Int(n)) => n.to_string(),
        Some(Scalar::Float(n)) => n.to_string(),
        Some(Scalar::Bool(b)) => b.to_string(),
        None => String::new(),
    })
}

// -- Auth --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    #[serde(default, deserialize_with = "form_value")]
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "form_value")]
    pub password1: String,
    #[serde(default, deserialize_with = "form_value")]
    pub password2: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    /// Base64-encoded image bytes.
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    #[serde(default, deserialize_with = "form_value")]
    pub username: String,
    #[serde(default, deserialize_with = "form_value")]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PasswordResetRequest {
    #[serde(default, deserialize_with = "form_value")]
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetPasswordRequest {
    #[serde(default, deserialize_with = "form_value")]
    pub new_password1: String,
    #[serde(default, deserialize_with = "form_value")]
    pub new_password2: String,
}

/// Static acknowledgement pages (welcome, reset sent, reset complete).
#[derive(Debug, Serialize)]
pub struct NoticeResponse {
    pub detail: String,
}

// -- Users --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    /// Only disclosed to the account owner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
    pub bio: String,
    pub avatar_url: Option<String>,
    pub date_joined: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileUpdateRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectRef {
    pub id: Uuid,
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: UserResponse,
    pub average_rating: f64,
    pub reviews: Vec<ReviewResponse>,
    pub can_review: bool,
    pub shared_projects: Vec<ProjectRef>,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub user: UserResponse,
    pub client_projects: Vec<ProjectResponse>,
    pub executor_projects: Vec<ProjectResponse>,
    pub offers: Vec<OfferResponse>,
}

// -- Projects --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectForm {
    #[serde(default, deserialize_with = "form_value")]
    pub title: String,
    #[serde(default, deserialize_with = "form_value")]
    pub description: String,
    #[serde(default, deserialize_with = "form_value")]
    pub budget: String,
    #[serde(default, deserialize_with = "form_value")]
    pub deadline: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectListQuery {
    pub q: Option<String>,
    pub min_budget: Option<String>,
    pub max_budget: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub budget: Money,
    pub deadline: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub status: ProjectStatus,
    pub client: UserSummary,
    pub executor: Option<UserSummary>,
}

#[derive(Debug, Serialize)]
pub struct ProjectListResponse {
    pub projects: Vec<ProjectResponse>,
    pub q: Option<String>,
    pub min_budget: Option<String>,
    pub max_budget: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProjectDetailResponse {
    pub project: ProjectResponse,
    pub offers: Vec<OfferResponse>,
}

// -- Offers --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OfferForm {
    #[serde(default, deserialize_with = "form_value")]
    pub proposal_text: String,
    #[serde(default, deserialize_with = "form_value")]
    pub proposed_price: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OfferResponse {
    pub id: Uuid,
    pub project: ProjectRef,
    pub freelancer: UserSummary,
    pub proposal_text: String,
    pub proposed_price: Money,
    pub created_at: DateTime<Utc>,
}

// -- Messages --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageForm {
    #[serde(default, deserialize_with = "form_value")]
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub project_id: Uuid,
    pub sender: UserSummary,
    pub receiver: UserSummary,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub project: ProjectResponse,
    pub messages: Vec<MessageResponse>,
}

// -- Reviews --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReviewForm {
    #[serde(default, deserialize_with = "form_value")]
    pub rating: String,
    #[serde(default, deserialize_with = "form_value")]
    pub comment: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewResponse {
    pub id: Uuid,
    pub project: ProjectRef,
    pub reviewer: UserSummary,
    pub reviewed: UserSummary,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}
