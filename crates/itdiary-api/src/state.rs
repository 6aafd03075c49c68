use std::sync::Arc;

use chrono::Duration;
use tracing::error;

use itdiary_db::Database;

use crate::avatars::AvatarStore;
use crate::error::ApiError;
use crate::mailer::ResetMailer;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub avatars: AvatarStore,
    pub mailer: Arc<dyn ResetMailer>,
    pub settings: Settings,
}

/// Knobs the handlers need at request time.
#[derive(Debug, Clone)]
pub struct Settings {
    pub jwt_secret: String,
    pub session_ttl: Duration,
    pub reset_token_ttl: Duration,
    /// Scheme and host used to build links that leave the server (reset mail).
    pub public_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            jwt_secret: "dev-secret-change-me".into(),
            session_ttl: Duration::days(14),
            reset_token_ttl: Duration::minutes(60),
            public_url: "http://localhost:8000".into(),
        }
    }
}

/// Run blocking DB work off the async runtime.
pub async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("blocking task failed"))
        })?
        .map_err(ApiError::from)
}
