use axum::{
    Extension, Json,
    extract::State,
};

use itdiary_types::api::DashboardResponse;

use crate::convert::{offer_response, project_response, user_response};
use crate::error::ApiError;
use crate::middleware::AuthSession;
use crate::state::{AppState, run_db};

/// Everything the signed-in user is involved in, from both sides.
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let uid = session.user_id.to_string();
    let (user, client_projects, executor_projects, offers) = run_db(&state, move |db| {
        Ok((
            db.get_user_by_id(&uid)?,
            db.list_projects_by_client(&uid)?,
            db.list_projects_by_executor(&uid)?,
            db.list_offers_by_freelancer(&uid)?,
        ))
    })
    .await?;
    let user = user.ok_or(ApiError::NotFound("User"))?;

    Ok(Json(DashboardResponse {
        user: user_response(&user, true),
        client_projects: client_projects.iter().map(project_response).collect(),
        executor_projects: executor_projects.iter().map(project_response).collect(),
        offers: offers.iter().map(offer_response).collect(),
    }))
}
