// src/web/context.rs
use crate::{
    error::AppResult,
    models::user::CurrentUser,
    services::change_request_service::{self, AlertCounts},
    templates::PageContext,
    web::flash,
};
use sqlx::SqlitePool;
use tower_sessions::Session;

/// Collects what the base layout shows. Flash messages are consumed here.
pub async fn page_context(
    db_pool: &SqlitePool,
    session: &Session,
    user: Option<&CurrentUser>,
) -> AppResult<PageContext> {
    let messages = flash::take(session).await?;
    let alerts = match user {
        Some(user) if user.is_privileged() => change_request_service::alert_counts(db_pool).await?,
        _ => AlertCounts::default(),
    };
    Ok(PageContext::new(user, messages, alerts))
}
