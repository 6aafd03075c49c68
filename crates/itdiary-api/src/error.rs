use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

/// Per-field validation messages, keyed by form field name.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() { Ok(()) } else { Err(ApiError::Validation(self)) }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(FieldErrors),

    #[error("{0}")]
    Unauthorized(&'static str),

    /// The actor may not touch the resource. `redirect` names the page a
    /// browser front end should fall back to.
    #[error("forbidden")]
    Forbidden { redirect: String },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn forbidden(redirect: impl Into<String>) -> Self {
        Self::Forbidden { redirect: redirect.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Validation(fields) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "validation", "fields": fields }),
            ),
            Self::Unauthorized(detail) => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "unauthorized", "detail": detail }),
            ),
            Self::Forbidden { redirect } => (
                StatusCode::FORBIDDEN,
                json!({ "error": "forbidden", "redirect": redirect }),
            ),
            Self::NotFound(what) => (
                StatusCode::NOT_FOUND,
                json!({ "error": "not_found", "detail": format!("{what} not found") }),
            ),
            Self::Internal(e) => {
                error!("Internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_collect_per_field() {
        let mut errors = FieldErrors::new();
        assert!(errors.clone().into_result().is_ok());

        errors.add("budget", "Enter a number.");
        errors.add("budget", "Second problem.");
        errors.add("title", "This field is required.");
        assert_eq!(errors.get("budget").unwrap().len(), 2);

        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["title"][0], "This field is required.");
        assert!(matches!(errors.into_result(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn status_codes_per_kind() {
        let cases = [
            (ApiError::Validation(FieldErrors::single("x", "bad")), StatusCode::BAD_REQUEST),
            (ApiError::Unauthorized("no session"), StatusCode::UNAUTHORIZED),
            (ApiError::forbidden("/projects/"), StatusCode::FORBIDDEN),
            (ApiError::NotFound("Project"), StatusCode::NOT_FOUND),
            (ApiError::Internal(anyhow::anyhow!("boom")), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
