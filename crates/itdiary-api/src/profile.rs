use axum::{
    Extension, Json,
    extract::{Path, State},
};
use tracing::info;
use uuid::Uuid;

use itdiary_types::api::{ProfileResponse, ProfileUpdateRequest, UserResponse};

use crate::convert::{project_ref, review_response, rounded_average, user_response};
use crate::error::{ApiError, FieldErrors};
use crate::middleware::AuthSession;
use crate::state::{AppState, run_db};
use crate::validation;

pub async fn my_profile(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user_id = session.user_id;
    build_profile(&state, &session, user_id).await.map(Json)
}

pub async fn user_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(session): Extension<AuthSession>,
) -> Result<Json<ProfileResponse>, ApiError> {
    build_profile(&state, &session, user_id).await.map(Json)
}

/// Reviews received plus, for other people's pages, the projects the viewer
/// shares with them. Sharing a project is what allows leaving a review.
async fn build_profile(state: &AppState, viewer: &AuthSession, user_id: Uuid) -> Result<ProfileResponse, ApiError> {
    let own = viewer.user_id == user_id;
    let uid = user_id.to_string();
    let vid = viewer.user_id.to_string();

    let (user, reviews, average, shared) = run_db(state, move |db| {
        let user = db.get_user_by_id(&uid)?;
        let reviews = db.list_reviews_for_user(&uid)?;
        let average = db.average_rating(&uid)?;
        let shared = if own { Vec::new() } else { db.shared_projects(&vid, &uid)? };
        Ok((user, reviews, average, shared))
    })
    .await?;
    let user = user.ok_or(ApiError::NotFound("User"))?;

    Ok(ProfileResponse {
        user: user_response(&user, own),
        average_rating: rounded_average(average),
        reviews: reviews.iter().map(review_response).collect(),
        can_review: !shared.is_empty(),
        shared_projects: shared.iter().map(|p| project_ref(&p.id, &p.title)).collect(),
    })
}

/// Omitted fields keep their value. A blank email or avatar clears it.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Json(req): Json<ProfileUpdateRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let uid = session.user_id.to_string();
    let current = run_db(&state, move |db| db.get_user_by_id(&uid))
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    let mut errors = FieldErrors::new();
    let email = match req.email.as_deref() {
        Some(raw) => validation::email(&mut errors, Some(raw)),
        None => current.email.clone(),
    };
    let bio = match req.bio.as_deref() {
        Some(raw) => validation::bio(&mut errors, raw),
        None => current.bio.clone(),
    };
    let role = match req.role.as_deref() {
        Some(raw) => validation::role(&mut errors, Some(raw)),
        None => current.role.parse().ok(),
    }
    .unwrap_or_default();
    let upload = match req.avatar.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => validation::avatar(&mut errors, raw),
        _ => None,
    };
    errors.into_result()?;

    let avatar = match (&upload, req.avatar.as_deref().map(str::trim)) {
        (Some(upload), _) => Some(state.avatars.save(upload).await?),
        (None, Some("")) => None,
        (None, _) => current.avatar.clone(),
    };

    let uid = current.id.clone();
    let stored_avatar = avatar.clone();
    let saved = run_db(&state, move |db| {
        if !db.update_profile(&uid, email.as_deref(), &bio, role, stored_avatar.as_deref())? {
            return Ok(None);
        }
        db.get_user_by_id(&uid)
    })
    .await
    .and_then(|user| user.ok_or(ApiError::NotFound("User")));

    let updated = match saved {
        Ok(user) => user,
        Err(e) => {
            // The fresh upload never made it into the row.
            if let (Some(_), Some(path)) = (&upload, &avatar) {
                state.avatars.remove(path).await;
            }
            return Err(e);
        }
    };

    if let Some(old) = current.avatar.as_deref() {
        if avatar.as_deref() != Some(old) {
            state.avatars.remove(old).await;
        }
    }

    info!("{} updated their profile", session.username);
    Ok(Json(user_response(&updated, true)))
}
