use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::Utc;
use model::entities::user;
use tracing::trace;

use super::session::{load_session_user, session_key_from_headers};
use crate::error::AppError;
use crate::schemas::AppState;

/// The visitor behind a request, anonymous or not.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser {
    pub user: Option<user::Model>,
    /// The key the browser presented, even when it no longer authenticates.
    pub session_key: Option<String>,
}

impl CurrentUser {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(session_key) = session_key_from_headers(&parts.headers) else {
            return Ok(Self::default());
        };
        let user = load_session_user(&state.db, &session_key, Utc::now()).await?;
        trace!("Session resolved to user {:?}", user.as_ref().map(|u| u.id));
        Ok(Self {
            user,
            session_key: Some(session_key),
        })
    }
}

/// A logged-in user. Anonymous requests are sent to the login page.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: user::Model,
    pub session_key: String,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;
        match (current.user, current.session_key) {
            (Some(user), Some(session_key)) => Ok(Self { user, session_key }),
            _ => Err(AppError::LoginRequired {
                next: parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_else(|| parts.uri.path().to_string()),
            }),
        }
    }
}
