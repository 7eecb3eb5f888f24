// src/web/auth_handlers.rs
use crate::{
    error::{AppError, AppResult},
    forms::PasswordChangeForm,
    models::user::{CurrentUser, LoginForm},
    services::{auth_service, user_service},
    state::AppState,
    templates::{render, LoginPage, PasswordChangePage},
    web::{context::page_context, flash, mw_auth::SESSION_USER_KEY},
};
use axum::{
    extract::{Extension, Form, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

// Only local paths, so `next` cannot bounce the user to another site
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path,
        _ => "/",
    }
}

// GET /accounts/login
pub async fn show_login_form(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<NextQuery>,
) -> AppResult<Response> {
    if session
        .get::<i64>(SESSION_USER_KEY)
        .await
        .ok()
        .flatten()
        .is_some()
    {
        tracing::debug!("GET /accounts/login: already logged in");
        return Ok(Redirect::to(safe_next(query.next.as_deref())).into_response());
    }

    let page = LoginPage {
        ctx: page_context(&state.db_pool, &session, None).await?,
        error: String::new(),
        username: String::new(),
        next: query.next.unwrap_or_default(),
    };
    Ok(render(&page)?.into_response())
}

// POST /accounts/login
pub async fn handle_login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    tracing::info!("Login attempt for: {}", form.username);

    let Some(user) = auth_service::authenticate(&state.db_pool, &form.username, &form.password).await? else {
        let page = LoginPage {
            ctx: page_context(&state.db_pool, &session, None).await?,
            error: "Please enter a correct username and password.".to_string(),
            username: form.username,
            next: form.next.unwrap_or_default(),
        };
        return Ok(render(&page)?.into_response());
    };

    session
        .cycle_id()
        .await
        .map_err(|e| AppError::SessionError(format!("Failed to rotate session id: {}", e)))?;
    session
        .insert(SESSION_USER_KEY, user.id)
        .await
        .map_err(|e| AppError::SessionError(format!("Failed to store user in session: {}", e)))?;

    tracing::info!("✅ Login succeeded for: {}", user.username);
    Ok(Redirect::to(safe_next(form.next.as_deref())).into_response())
}

// GET /accounts/logout
pub async fn handle_logout(session: Session) -> AppResult<Redirect> {
    let user_id: Option<i64> = session.get(SESSION_USER_KEY).await.ok().flatten();

    session
        .delete()
        .await
        .map_err(|e| AppError::SessionError(format!("Failed to delete session: {}", e)))?;

    match user_id {
        Some(id) => tracing::info!("🚪 User {} logged out.", id),
        None => tracing::info!("🚪 Anonymous session logged out."),
    }
    Ok(Redirect::to("/accounts/login"))
}

// GET /accounts/password_change
pub async fn show_password_change(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Response> {
    let page = PasswordChangePage {
        ctx: page_context(&state.db_pool, &session, Some(&user)).await?,
        errors: Vec::new(),
    };
    Ok(render(&page)?.into_response())
}

// POST /accounts/password_change
pub async fn handle_password_change(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<PasswordChangeForm>,
) -> AppResult<Response> {
    let mut errors = match form.clean() {
        Ok(_) => Vec::new(),
        Err(e) => e.messages(),
    };
    let stored = user_service::get_user(&state.db_pool, user.id).await?;
    if !form.old_password.is_empty()
        && !auth_service::verify_password(&form.old_password, &stored.password_hash).await?
    {
        errors.push("old_password: Your old password was entered incorrectly.".to_string());
    }

    if !errors.is_empty() {
        let page = PasswordChangePage {
            ctx: page_context(&state.db_pool, &session, Some(&user)).await?,
            errors,
        };
        return Ok(render(&page)?.into_response());
    }

    user_service::update_user_password(&state.db_pool, user.id, &form.new_password1).await?;
    flash::success(&session, "Your password was changed.").await?;
    Ok(Redirect::to("/").into_response())
}

#[cfg(test)]
mod tests {
    use super::safe_next;

    #[test]
    fn next_must_be_a_local_path() {
        assert_eq!(safe_next(Some("/users/3")), "/users/3");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(Some("")), "/");
        assert_eq!(safe_next(None), "/");
    }
}
