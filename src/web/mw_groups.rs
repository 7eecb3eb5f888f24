// src/web/mw_groups.rs
use crate::{
    error::AppError,
    models::user::{CurrentUser, PRIVILEGED_GROUPS, SIS, TUTORS},
};
use axum::{
    extract::{Extension, Path, Request, State},
    middleware::Next,
    response::Response,
};

pub const PRIVILEGED: &[&str] = PRIVILEGED_GROUPS;
pub const TUTORS_ONLY: &[&str] = &[TUTORS];
pub const SIS_ONLY: &[&str] = &[SIS];

/// Lets superusers and members of any of `groups` through, everyone else gets a 403.
/// Must run after `require_auth`.
pub async fn require_groups(
    State(groups): State<&'static [&'static str]>,
    Extension(user): Extension<CurrentUser>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if user.is_superuser_or_in_groups(groups) {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(
            "Groups MW: '{}' denied {} (needs one of {:?})",
            user.username,
            request.uri().path(),
            groups
        );
        Err(AppError::PermissionDenied)
    }
}

/// Per-user pages: the user named in the path, or a privileged caller.
pub async fn require_self_or_privileged(
    Extension(user): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if user.is_self_or_privileged(user_id) {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(
            "Groups MW: '{}' denied personal page of user {}",
            user.username,
            user_id
        );
        Err(AppError::PermissionDenied)
    }
}
