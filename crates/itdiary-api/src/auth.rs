use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use itdiary_db::format_timestamp;
use itdiary_db::models::NewUser;
use itdiary_types::api::{AuthResponse, LoginRequest, NoticeResponse, RegisterRequest};

use crate::convert::user_response;
use crate::error::{ApiError, FieldErrors};
use crate::middleware::{AuthSession, authenticate, issue_token};
use crate::state::{AppState, run_db};
use crate::validation;

const USERNAME_TAKEN: &str = "A user with that username already exists.";
const BAD_CREDENTIALS: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

/// Landing page: signed-in users go straight to their dashboard.
pub async fn index(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    if authenticate(&state, &headers).await?.is_some() {
        return Ok(Redirect::to("/dashboard/").into_response());
    }

    Ok(Json(NoticeResponse {
        detail: "Welcome to ITDiary. Register or log in to post projects and send offers.".into(),
    })
    .into_response())
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut errors = FieldErrors::new();
    let username = validation::username(&mut errors, &req.username);
    let email = validation::email(&mut errors, req.email.as_deref());
    validation::new_password(
        &mut errors,
        &username,
        ("password1", &req.password1),
        ("password2", &req.password2),
    );
    let role = validation::role(&mut errors, req.role.as_deref()).unwrap_or_default();
    let bio = validation::bio(&mut errors, req.bio.as_deref().unwrap_or_default());
    let avatar = req
        .avatar
        .as_deref()
        .filter(|a| !a.trim().is_empty())
        .and_then(|a| validation::avatar(&mut errors, a));

    if errors.get("username").is_none() {
        let name = username.clone();
        if run_db(&state, move |db| db.get_user_by_username(&name)).await?.is_some() {
            errors.add("username", USERNAME_TAKEN);
        }
    }
    errors.into_result()?;

    let password_hash = hash_password(&req.password1)?;
    let avatar_path = match &avatar {
        Some(upload) => Some(state.avatars.save(upload).await?),
        None => None,
    };

    let user_id = Uuid::new_v4();
    let uid = user_id.to_string();
    let name = username.clone();
    let stored_avatar = avatar_path.clone();
    let user = run_db(&state, move |db| {
        let created = db.create_user(&NewUser {
            id: &uid,
            username: &name,
            email: email.as_deref(),
            password_hash: &password_hash,
            role,
            bio: &bio,
            avatar: stored_avatar.as_deref(),
        })?;
        if !created {
            return Ok(None);
        }
        db.get_user_by_id(&uid)
    })
    .await?;

    // Lost a race with a concurrent registration of the same name.
    let Some(user) = user else {
        if let Some(path) = &avatar_path {
            state.avatars.remove(path).await;
        }
        return Err(ApiError::Validation(FieldErrors::single("username", USERNAME_TAKEN)));
    };

    let token = open_session(&state, user_id, &username).await?;
    info!("Registered user {} ({}) as {}", username, user_id, role);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: user_response(&user, true),
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let mut errors = FieldErrors::new();
    let username = validation::required(&mut errors, "username", &req.username);
    if req.password.is_empty() {
        errors.add("password", "This field is required.");
    }
    errors.into_result()?;

    let user = run_db(&state, move |db| db.get_user_by_username(&username))
        .await?
        .ok_or(ApiError::Unauthorized(BAD_CREDENTIALS))?;

    if !verify_password(&req.password, &user.password)? {
        info!("Failed login for {}", user.username);
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS));
    }

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("corrupt user id '{}': {}", user.id, e))?;
    let token = open_session(&state, user_id, &user.username).await?;

    Ok(Json(AuthResponse {
        user: user_response(&user, true),
        token,
    }))
}

/// Ends the current session. Tokens minted for it stop working immediately.
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
) -> Result<StatusCode, ApiError> {
    let sid = session.session_id.to_string();
    run_db(&state, move |db| db.delete_session(&sid)).await?;
    info!("User {} logged out", session.username);
    Ok(StatusCode::NO_CONTENT)
}

/// Create a session row and sign a token for it.
pub(crate) async fn open_session(state: &AppState, user_id: Uuid, username: &str) -> Result<String, ApiError> {
    let session = AuthSession {
        session_id: Uuid::new_v4(),
        user_id,
        username: username.to_string(),
    };
    let expires_at = Utc::now() + state.settings.session_ttl;

    let sid = session.session_id.to_string();
    let uid = user_id.to_string();
    let expires = format_timestamp(expires_at);
    run_db(state, move |db| db.create_session(&sid, &uid, &expires)).await?;

    Ok(issue_token(&state.settings.jwt_secret, &session, expires_at)?)
}

pub(crate) fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

fn verify_password(password: &str, stored: &str) -> Result<bool, ApiError> {
    let parsed = PasswordHash::new(stored).map_err(|e| anyhow::anyhow!("corrupt password hash: {}", e))?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn corrupt_hash_is_an_internal_error() {
        assert!(matches!(verify_password("x", "not-a-hash"), Err(ApiError::Internal(_))));
    }
}
