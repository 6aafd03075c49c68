use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use itdiary_db::models::{ProjectFields, ProjectFilter, ProjectRow};
use itdiary_types::api::{
    OfferForm, ProjectDetailResponse, ProjectForm, ProjectListQuery, ProjectListResponse,
    ProjectResponse,
};

use crate::convert::{offer_response, project_response};
use crate::error::{ApiError, FieldErrors};
use crate::middleware::AuthSession;
use crate::state::{AppState, run_db};
use crate::validation::{self, ValidProject};

pub(crate) async fn load_project(state: &AppState, project_id: Uuid) -> Result<ProjectRow, ApiError> {
    let pid = project_id.to_string();
    run_db(state, move |db| db.get_project(&pid))
        .await?
        .ok_or(ApiError::NotFound("Project"))
}

/// Only the posting client may edit or delete; everyone else is sent back
/// to the project page.
fn ensure_owner(project: &ProjectRow, session: &AuthSession) -> Result<(), ApiError> {
    if session.is(&project.client_id) {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!("/projects/{}/", project.id)))
    }
}

pub async fn create_project(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Json(form): Json<ProjectForm>,
) -> Result<impl IntoResponse, ApiError> {
    let project = validation::project_form(&form)?;

    let pid = Uuid::new_v4().to_string();
    let client_id = session.user_id.to_string();
    let row = run_db(&state, move |db| {
        let deadline = project.deadline.to_string();
        db.insert_project(&pid, &client_id, &fields(&project, &deadline))
    })
    .await?;

    info!("{} posted project {} '{}'", session.username, row.id, row.title);
    Ok((StatusCode::CREATED, Json(project_response(&row))))
}

fn fields<'a>(project: &'a ValidProject, deadline: &'a str) -> ProjectFields<'a> {
    ProjectFields {
        title: &project.title,
        description: &project.description,
        budget: project.budget,
        deadline,
    }
}

pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ProjectListQuery>,
) -> Result<Json<ProjectListResponse>, ApiError> {
    let mut errors = FieldErrors::new();
    let min_budget = validation::optional_money(&mut errors, "min_budget", query.min_budget.as_deref());
    let max_budget = validation::optional_money(&mut errors, "max_budget", query.max_budget.as_deref());
    errors.into_result()?;

    let filter = ProjectFilter {
        title_contains: query.q.clone().filter(|q| !q.is_empty()),
        min_budget,
        max_budget,
    };
    let rows = run_db(&state, move |db| db.list_projects(&filter)).await?;

    Ok(Json(ProjectListResponse {
        projects: rows.iter().map(project_response).collect(),
        q: query.q,
        min_budget: query.min_budget,
        max_budget: query.max_budget,
    }))
}

pub async fn project_detail(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<ProjectDetailResponse>, ApiError> {
    let pid = project_id.to_string();
    let (project, offers) = run_db(&state, move |db| {
        let Some(project) = db.get_project(&pid)? else {
            return Ok(None);
        };
        let offers = db.list_offers_for_project(&pid)?;
        Ok(Some((project, offers)))
    })
    .await?
    .ok_or(ApiError::NotFound("Project"))?;

    Ok(Json(ProjectDetailResponse {
        project: project_response(&project),
        offers: offers.iter().map(offer_response).collect(),
    }))
}

/// Bid on someone else's project. Offers stay open after the project is
/// assigned; the client can still switch executors.
pub async fn submit_offer(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Extension(session): Extension<AuthSession>,
    Json(form): Json<OfferForm>,
) -> Result<impl IntoResponse, ApiError> {
    let project = load_project(&state, project_id).await?;
    if session.is(&project.client_id) {
        return Err(ApiError::forbidden(format!("/projects/{}/", project.id)));
    }

    let (proposal_text, price) = validation::offer_form(&form)?;

    let oid = Uuid::new_v4().to_string();
    let fid = session.user_id.to_string();
    let offer = run_db(&state, move |db| db.insert_offer(&oid, &project.id, &fid, &proposal_text, price)).await?;

    info!("{} offered {} on project {}", session.username, price, offer.project_id);
    Ok((StatusCode::CREATED, Json(offer_response(&offer))))
}

pub async fn edit_form(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Extension(session): Extension<AuthSession>,
) -> Result<Json<ProjectResponse>, ApiError> {
    let project = load_project(&state, project_id).await?;
    ensure_owner(&project, &session)?;
    Ok(Json(project_response(&project)))
}

pub async fn edit_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Extension(session): Extension<AuthSession>,
    Json(form): Json<ProjectForm>,
) -> Result<Json<ProjectResponse>, ApiError> {
    let existing = load_project(&state, project_id).await?;
    ensure_owner(&existing, &session)?;
    let project = validation::project_form(&form)?;

    let row = run_db(&state, move |db| {
        let deadline = project.deadline.to_string();
        db.update_project(&existing.id, &fields(&project, &deadline))
    })
    .await?
    .ok_or(ApiError::NotFound("Project"))?;

    info!("{} edited project {}", session.username, row.id);
    Ok(Json(project_response(&row)))
}

/// Confirmation step before deleting.
pub async fn delete_form(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Extension(session): Extension<AuthSession>,
) -> Result<Json<ProjectResponse>, ApiError> {
    let project = load_project(&state, project_id).await?;
    ensure_owner(&project, &session)?;
    Ok(Json(project_response(&project)))
}

/// Offers, messages and reviews of the project go with it.
pub async fn delete_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Extension(session): Extension<AuthSession>,
) -> Result<StatusCode, ApiError> {
    let project = load_project(&state, project_id).await?;
    ensure_owner(&project, &session)?;

    let pid = project.id.clone();
    if !run_db(&state, move |db| db.delete_project(&pid)).await? {
        return Err(ApiError::NotFound("Project"));
    }

    info!("{} deleted project {} '{}'", session.username, project.id, project.title);
    Ok(StatusCode::NO_CONTENT)
}
