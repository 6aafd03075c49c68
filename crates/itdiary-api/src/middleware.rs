use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::{AppState, run_db};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    /// Server-side session row backing this token.
    pub sid: Uuid,
    pub username: String,
    pub exp: usize,
}

/// The signed-in user behind a request. Inserted as a request extension by
/// [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
}

impl AuthSession {
    pub fn is(&self, user_id: &str) -> bool {
        self.user_id.to_string() == user_id
    }
}

pub fn issue_token(secret: &str, session: &AuthSession, expires_at: DateTime<Utc>) -> anyhow::Result<String> {
    let claims = Claims {
        sub: session.user_id,
        sid: session.session_id,
        username: session.username.clone(),
        exp: expires_at.timestamp().max(0) as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve the session named by the bearer token, if any. A token that is
/// malformed, expired, or whose session was logged out yields `None`.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Option<AuthSession>, ApiError> {
    let Some(token) = bearer_token(headers) else {
        return Ok(None);
    };

    let claims = match decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.settings.jwt_secret.as_bytes()),
        &Validation::default(),
    ) {
        Ok(data) => data.claims,
        Err(e) => {
            debug!("Rejected bearer token: {}", e);
            return Ok(None);
        }
    };

    let sid = claims.sid.to_string();
    let session = run_db(state, move |db| db.get_active_session(&sid)).await?;

    Ok(session
        .filter(|row| row.user_id == claims.sub.to_string())
        .map(|row| AuthSession {
            session_id: claims.sid,
            user_id: claims.sub,
            username: row.username,
        }))
}

/// Reject requests without a live session.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session = authenticate(&state, req.headers())
        .await?
        .ok_or(ApiError::Unauthorized("Authentication credentials were not provided or have expired."))?;

    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }

    #[test]
    fn issued_tokens_decode_with_the_same_secret() {
        let session = AuthSession {
            session_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            username: "anna".into(),
        };
        let token = issue_token("secret", &session, Utc::now() + chrono::Duration::hours(1)).unwrap();

        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::default(),
        )
        .unwrap();
        assert_eq!(data.claims.sub, session.user_id);
        assert_eq!(data.claims.sid, session.session_id);

        let wrong = decode::<Claims>(&token, &DecodingKey::from_secret(b"other"), &Validation::default());
        assert!(wrong.is_err());
    }
}
