use axum::{
    Extension, Json,
    extract::{Path, State},
};
use tracing::info;
use uuid::Uuid;

use itdiary_types::api::ProjectResponse;

use crate::convert::project_response;
use crate::error::ApiError;
use crate::middleware::AuthSession;
use crate::state::{AppState, run_db};

/// The project's client picks the offer's freelancer as executor. Accepting
/// again replaces the previous executor.
pub async fn accept_offer(
    State(state): State<AppState>,
    Path(offer_id): Path<Uuid>,
    Extension(session): Extension<AuthSession>,
) -> Result<Json<ProjectResponse>, ApiError> {
    let oid = offer_id.to_string();
    let (offer, project) = run_db(&state, move |db| {
        let Some(offer) = db.get_offer(&oid)? else {
            return Ok(None);
        };
        let project = db.get_project(&offer.project_id)?;
        Ok(project.map(|project| (offer, project)))
    })
    .await?
    .ok_or(ApiError::NotFound("Offer"))?;

    if !session.is(&project.client_id) {
        return Err(ApiError::forbidden(format!("/projects/{}/", project.id)));
    }

    let freelancer_id = offer.freelancer_id.clone();
    let row = run_db(&state, move |db| db.set_project_executor(&project.id, &freelancer_id))
        .await?
        .ok_or(ApiError::NotFound("Project"))?;

    info!(
        "{} accepted offer {} on project {}; executor is now {}",
        session.username, offer.id, row.id, offer.freelancer_username
    );
    Ok(Json(project_response(&row)))
}
