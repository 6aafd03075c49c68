use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;
use uuid::Uuid;

use itdiary_db::models::ProjectRow;
use itdiary_types::api::{ChatResponse, MessageForm};

use crate::convert::{message_response, project_response};
use crate::error::ApiError;
use crate::middleware::AuthSession;
use crate::projects::load_project;
use crate::state::{AppState, run_db};
use crate::validation;

/// Only the client and the executor of a project see its thread.
fn ensure_party(project: &ProjectRow, session: &AuthSession) -> Result<(), ApiError> {
    let is_executor = project.executor_id.as_deref().is_some_and(|id| session.is(id));
    if session.is(&project.client_id) || is_executor {
        Ok(())
    } else {
        Err(ApiError::forbidden("/"))
    }
}

pub async fn get_chat(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Extension(session): Extension<AuthSession>,
) -> Result<Json<ChatResponse>, ApiError> {
    let project = load_project(&state, project_id).await?;
    ensure_party(&project, &session)?;

    let pid = project.id.clone();
    let messages = run_db(&state, move |db| db.get_thread(&pid)).await?;

    Ok(Json(ChatResponse {
        project: project_response(&project),
        messages: messages.iter().map(message_response).collect(),
    }))
}

/// The receiver is whoever sits on the other side of the project.
pub async fn send_message(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Extension(session): Extension<AuthSession>,
    Json(form): Json<MessageForm>,
) -> Result<impl IntoResponse, ApiError> {
    let project = load_project(&state, project_id).await?;
    ensure_party(&project, &session)?;

    let receiver_id = if session.is(&project.client_id) {
        project.executor_id.clone()
    } else {
        Some(project.client_id.clone())
    }
    .ok_or_else(|| ApiError::forbidden(format!("/projects/{}/", project.id)))?;

    let text = validation::message_form(&form)?;

    let mid = Uuid::new_v4().to_string();
    let sender_id = session.user_id.to_string();
    let message = run_db(&state, move |db| {
        db.insert_message(&mid, &project.id, &sender_id, &receiver_id, &text)
    })
    .await?;

    debug!("{} wrote in project {}", session.username, message.project_id);
    Ok((StatusCode::CREATED, Json(message_response(&message))))
}
