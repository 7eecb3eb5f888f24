// src/web/mw_auth.rs
use crate::{error::AppError, services::auth_service, state::AppState};
use axum::{
    extract::{Request, State},
    http::Uri,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

/// Session key holding the logged-in user's id.
pub const SESSION_USER_KEY: &str = "user_id";

pub const LOGIN_PATH: &str = "/accounts/login";

/// `/accounts/login?next=<path and query of uri>`
pub fn login_redirect(uri: &Uri) -> Response {
    let next = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    Redirect::to(&format!("{}?next={}", LOGIN_PATH, urlencoding::encode(next))).into_response()
}

/// Loads the session user into the request extensions as a `CurrentUser`.
/// Anonymous callers are sent to the login page with a `next` parameter.
pub async fn require_auth(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user_id = session.get::<i64>(SESSION_USER_KEY).await.map_err(|e| {
        tracing::error!("Auth MW: error while reading session: {:?}", e);
        AppError::SessionError(format!("Error while checking session: {}", e))
    })?;

    let Some(user_id) = user_id else {
        tracing::debug!("Auth MW: no user in session, redirecting to login");
        return Ok(login_redirect(request.uri()));
    };

    match auth_service::load_current_user(&state.db_pool, user_id).await? {
        Some(user) => {
            tracing::debug!("Auth MW: user '{}' authenticated", user.username);
            request.extensions_mut().insert(user);
            Ok(next.run(request).await)
        }
        None => {
            // The account was deleted while the session was alive
            tracing::warn!("Auth MW: session user {} no longer exists", user_id);
            session
                .flush()
                .await
                .map_err(|e| AppError::SessionError(format!("Failed to clear session: {}", e)))?;
            Ok(login_redirect(request.uri()))
        }
    }
}
