//! Forgotten-password recovery: request a link by email, then set a new
//! password through it. Tokens are single use and only their SHA-256
//! digest is stored.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::{error, info};
use uuid::Uuid;

use itdiary_db::format_timestamp;
use itdiary_db::models::{PasswordResetRow, UserRow};
use itdiary_types::api::{NoticeResponse, PasswordResetRequest, SetPasswordRequest};

use crate::auth::hash_password;
use crate::error::{ApiError, FieldErrors};
use crate::state::{AppState, run_db};
use crate::validation;

const TOKEN_BYTES: usize = 32;
const INVALID_LINK: &str = "The password reset link was invalid, possibly because it has already been used. \
     Please request a new password reset.";

fn notice(detail: &str) -> Json<NoticeResponse> {
    Json(NoticeResponse { detail: detail.to_string() })
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub fn encode_uid(user_id: &str) -> String {
    URL_SAFE_NO_PAD.encode(user_id.as_bytes())
}

fn decode_uid(uidb64: &str) -> Option<Uuid> {
    let bytes = URL_SAFE_NO_PAD.decode(uidb64).ok()?;
    String::from_utf8(bytes).ok()?.parse().ok()
}

/// Always answers 202 so the response does not reveal whether the address
/// belongs to an account.
pub async fn request_reset(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut errors = FieldErrors::new();
    let email = validation::required(&mut errors, "email", &req.email);
    if !email.is_empty() {
        validation::email(&mut errors, Some(&email));
    }
    errors.into_result()?;

    let users = run_db(&state, move |db| db.get_users_by_email(&email)).await?;
    for user in users {
        send_reset_link(&state, user).await?;
    }

    Ok((
        StatusCode::ACCEPTED,
        notice("We've emailed you instructions for setting your password, if an account exists with the email you entered."),
    ))
}

async fn send_reset_link(state: &AppState, user: UserRow) -> Result<(), ApiError> {
    let token = generate_token();
    let digest = token_digest(&token);
    let expires = format_timestamp(Utc::now() + state.settings.reset_token_ttl);
    let reset_id = Uuid::new_v4().to_string();
    let uid = user.id.clone();
    run_db(state, move |db| db.insert_password_reset(&reset_id, &uid, &digest, &expires)).await?;

    let link = format!(
        "{}/reset/{}/{}/",
        state.settings.public_url.trim_end_matches('/'),
        encode_uid(&user.id),
        token
    );

    // Mail delivery may block; a failed send is logged, not surfaced.
    let mailer = state.mailer.clone();
    let sent = tokio::task::spawn_blocking(move || {
        mailer.send_reset_link(&user.username, user.email.as_deref().unwrap_or_default(), &link)
    })
    .await
    .map_err(|e| anyhow::anyhow!("mailer task failed: {}", e))?;
    if let Err(e) = sent {
        error!("Failed to deliver password reset link: {:#}", e);
    }
    Ok(())
}

pub async fn reset_done() -> Json<NoticeResponse> {
    notice("We've emailed you instructions for setting your password. You should receive them shortly.")
}

async fn find_reset(state: &AppState, uidb64: &str, token: &str) -> Result<(UserRow, PasswordResetRow), ApiError> {
    let invalid = || ApiError::Validation(FieldErrors::single("token", INVALID_LINK));

    let user_id = decode_uid(uidb64).ok_or_else(invalid)?.to_string();
    let digest = token_digest(token);
    let found = run_db(state, move |db| {
        let Some(user) = db.get_user_by_id(&user_id)? else {
            return Ok(None);
        };
        let reset = db.find_valid_password_reset(&user.id, &digest)?;
        Ok(reset.map(|reset| (user, reset)))
    })
    .await?;

    found.ok_or_else(invalid)
}

/// Lets a front end check the link before asking for a new password.
pub async fn check_reset_link(
    State(state): State<AppState>,
    Path((uidb64, token)): Path<(String, String)>,
) -> Result<Json<NoticeResponse>, ApiError> {
    find_reset(&state, &uidb64, &token).await?;
    Ok(notice("Enter your new password twice."))
}

pub async fn confirm_reset(
    State(state): State<AppState>,
    Path((uidb64, token)): Path<(String, String)>,
    Json(req): Json<SetPasswordRequest>,
) -> Result<Json<NoticeResponse>, ApiError> {
    let (user, reset) = find_reset(&state, &uidb64, &token).await?;

    let mut errors = FieldErrors::new();
    validation::new_password(
        &mut errors,
        &user.username,
        ("new_password1", &req.new_password1),
        ("new_password2", &req.new_password2),
    );
    errors.into_result()?;

    let password_hash = hash_password(&req.new_password1)?;
    let uid = user.id.clone();
    let completed = run_db(&state, move |db| db.complete_password_reset(&reset.id, &uid, &password_hash)).await?;
    if !completed {
        return Err(ApiError::Validation(FieldErrors::single("token", INVALID_LINK)));
    }

    info!("Password reset completed for {}", user.username);
    Ok(notice("Your password has been set. You may go ahead and log in now."))
}

pub async fn reset_complete() -> Json<NoticeResponse> {
    notice("Your password has been set. You may go ahead and log in now.")
}
