pub mod auth;
pub mod avatars;
pub mod chat;
pub mod convert;
pub mod dashboard;
pub mod error;
pub mod mailer;
pub mod middleware;
pub mod offers;
pub mod password_reset;
pub mod profile;
pub mod projects;
pub mod reviews;
pub mod state;
pub mod validation;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use tower_http::services::ServeDir;

pub use error::ApiError;
pub use state::{AppState, AppStateInner, Settings};

/// Room for a base64 avatar at the size cap plus the other form fields.
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// All HTTP routes plus the media file server. Layers such as CORS and
/// tracing are left to the caller.
pub fn router(state: AppState) -> Router {
    let require_session = from_fn_with_state(state.clone(), middleware::require_auth);

    let public = Router::new()
        .route("/", get(auth::index))
        .route("/register/", post(auth::register))
        .route("/login/", post(auth::login))
        .route("/projects/", get(projects::list_projects))
        .route(
            "/projects/{pk}/",
            get(projects::project_detail)
                .merge(post(projects::submit_offer).route_layer(require_session.clone())),
        )
        .route("/password_reset/", post(password_reset::request_reset))
        .route("/password_reset/done/", get(password_reset::reset_done))
        .route(
            "/reset/{uidb64}/{token}/",
            get(password_reset::check_reset_link).post(password_reset::confirm_reset),
        )
        .route("/reset/done/", get(password_reset::reset_complete));

    let protected = Router::new()
        .route("/logout/", post(auth::logout))
        .route("/dashboard/", get(dashboard::dashboard))
        .route("/profile/", get(profile::my_profile).patch(profile::update_profile))
        .route("/profile/{user_id}/", get(profile::user_profile))
        .route("/projects/create/", post(projects::create_project))
        .route(
            "/projects/{pk}/edit/",
            get(projects::edit_form).post(projects::edit_project),
        )
        .route(
            "/projects/{pk}/delete/",
            get(projects::delete_form).post(projects::delete_project),
        )
        .route("/projects/{pk}/chat/", get(chat::get_chat).post(chat::send_message))
        .route("/offers/{pk}/accept/", post(offers::accept_offer))
        .route("/review/{user_id}/{project_id}/", post(reviews::leave_review))
        .route_layer(require_session);

    let media = ServeDir::new(state.avatars.root());

    Router::new()
        .merge(public)
        .merge(protected)
        .nest_service(avatars::MEDIA_URL, media)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
