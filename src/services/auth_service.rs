// src/services/auth_service.rs
use crate::{
    error::{AppError, AppResult},
    models::user::{CurrentUser, User},
    services::user_service,
};
use sqlx::SqlitePool;

// Tests hash a lot of throwaway passwords, the full cost only matters in production
const BCRYPT_COST: u32 = if cfg!(test) { 4 } else { bcrypt::DEFAULT_COST };

/// Checks a password against the stored bcrypt hash.
pub async fn verify_password(password: &str, stored_hash: &str) -> AppResult<bool> {
    let password = password.to_string();
    let stored_hash = stored_hash.to_string();
    tokio::task::spawn_blocking(move || {
        tracing::debug!("Verifying bcrypt hash...");
        bcrypt::verify(&password, &stored_hash)
    })
    .await
    .map_err(|e| {
        tracing::error!("spawn_blocking task failed (verify_password): {:?}", e);
        AppError::InternalServerError
    })?
    .map_err(|e| {
        tracing::error!("bcrypt error while verifying password: {:?}", e);
        AppError::PasswordHashingError
    })
}

/// Hashes a password with bcrypt.
pub async fn hash_password(password: &str) -> AppResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        tracing::debug!("Generating bcrypt hash...");
        bcrypt::hash(&password, BCRYPT_COST)
    })
    .await
    .map_err(|e| {
        tracing::error!("spawn_blocking task failed (hash_password): {:?}", e);
        AppError::InternalServerError
    })?
    .map_err(|e| {
        tracing::error!("bcrypt error while hashing password: {:?}", e);
        AppError::PasswordHashingError
    })
}

/// Returns the user when the username exists and the password matches.
/// Unknown usernames and wrong passwords both give `None`.
pub async fn authenticate(
    db_pool: &SqlitePool,
    username: &str,
    password: &str,
) -> AppResult<Option<User>> {
    let Some(user) = user_service::find_user_by_username(db_pool, username).await? else {
        tracing::warn!("Login attempt for unknown user: {}", username);
        return Ok(None);
    };
    if verify_password(password, &user.password_hash).await? {
        Ok(Some(user))
    } else {
        tracing::warn!("Wrong password for user: {}", username);
        Ok(None)
    }
}

/// Builds the request-scoped caller (user + group names) for a session user id.
pub async fn load_current_user(db_pool: &SqlitePool, user_id: i64) -> AppResult<Option<CurrentUser>> {
    let Some(user) = user_service::find_user_by_id(db_pool, user_id).await? else {
        return Ok(None);
    };
    let groups = user_service::get_user_groups(db_pool, user.id).await?;
    Ok(Some(CurrentUser {
        id: user.id,
        display_name: user.display_name(),
        username: user.username,
        is_superuser: user.is_superuser,
        groups,
    }))
}
