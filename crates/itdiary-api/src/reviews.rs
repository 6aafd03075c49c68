use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use itdiary_types::api::ReviewForm;

use crate::convert::review_response;
use crate::error::ApiError;
use crate::middleware::AuthSession;
use crate::state::{AppState, run_db};
use crate::validation;

/// Rate a counterpart from a shared project. Reviewer and reviewed must be
/// the project's client and executor, in either order.
pub async fn leave_review(
    State(state): State<AppState>,
    Path((user_id, project_id)): Path<(Uuid, Uuid)>,
    Extension(session): Extension<AuthSession>,
    Json(form): Json<ReviewForm>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = user_id.to_string();
    let pid = project_id.to_string();
    let (reviewed, project) = run_db(&state, move |db| Ok((db.get_user_by_id(&uid)?, db.get_project(&pid)?))).await?;
    let reviewed = reviewed.ok_or(ApiError::NotFound("User"))?;
    let project = project.ok_or(ApiError::NotFound("Project"))?;

    let parties = [Some(project.client_id.as_str()), project.executor_id.as_deref()];
    let reviewer_is_party = parties.iter().flatten().any(|id| session.is(id));
    let reviewed_is_party = parties.iter().flatten().any(|id| *id == reviewed.id);
    if session.is(&reviewed.id) || !reviewer_is_party || !reviewed_is_party {
        return Err(ApiError::forbidden(format!("/profile/{}/", reviewed.id)));
    }

    let (rating, comment) = validation::review_form(&form)?;

    let rid = Uuid::new_v4().to_string();
    let reviewer_id = session.user_id.to_string();
    let reviewed_id = reviewed.id.clone();
    let review = run_db(&state, move |db| {
        db.insert_review(&rid, &project.id, &reviewer_id, &reviewed_id, rating, &comment)
    })
    .await?;

    info!(
        "{} rated {} {}/5 on project {}",
        session.username, reviewed.username, rating, review.project_id
    );
    Ok((StatusCode::CREATED, Json(review_response(&review))))
}
