// src/web/flash.rs
//! One-shot notices kept in the session until the next page renders them.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

const FLASH_KEY: &str = "_messages";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Info,
    Error,
}

impl Level {
    fn css_class(&self) -> &'static str {
        match self {
            Level::Success => "success",
            Level::Info => "info",
            Level::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: String,
    pub text: String,
}

fn session_error(e: tower_sessions::session::Error) -> AppError {
    AppError::SessionError(format!("Flash messages: {}", e))
}

pub async fn push(session: &Session, level: Level, text: impl Into<String>) -> AppResult<()> {
    let mut messages: Vec<FlashMessage> = session
        .get(FLASH_KEY)
        .await
        .map_err(session_error)?
        .unwrap_or_default();
    messages.push(FlashMessage {
        level: level.css_class().to_string(),
        text: text.into(),
    });
    session.insert(FLASH_KEY, messages).await.map_err(session_error)
}

pub async fn success(session: &Session, text: impl Into<String>) -> AppResult<()> {
    push(session, Level::Success, text).await
}

pub async fn error(session: &Session, text: impl Into<String>) -> AppResult<()> {
    push(session, Level::Error, text).await
}

/// Removes and returns every pending message.
pub async fn take(session: &Session) -> AppResult<Vec<FlashMessage>> {
    let messages = session
        .remove::<Vec<FlashMessage>>(FLASH_KEY)
        .await
        .map_err(session_error)?
        .unwrap_or_default();
    Ok(messages)
}
