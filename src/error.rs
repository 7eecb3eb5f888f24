// src/error.rs
use crate::forms::FormErrors;
use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse},
};
use thiserror::Error;

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorPage {
    status_code: u16,
    message: String,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    SqlxMigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Environment variable error: {0}")]
    EnvVarError(#[from] std::env::VarError),

    #[error("Template error: {0}")]
    TemplateError(#[from] askama::Error),

    #[error("Roster error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Error while processing password")]
    PasswordHashingError,

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("Unexpected internal error")]
    InternalServerError,

    // Caller is logged in but lacks the group or the ownership the route needs
    #[error("Permission denied")]
    PermissionDenied,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid form data: {0}")]
    Validation(FormErrors),

    #[error("Cannot move a request from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::PermissionDenied => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// How an AppError becomes an HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();

        // Client errors are expected traffic, only server errors are logged loudly
        if status.is_server_error() {
            tracing::error!("Request failed: {:?}", self);
        } else {
            tracing::debug!("Request rejected ({}): {}", status, self);
        }

        let user_message = match &self {
            AppError::SqlxError(_) | AppError::SqlxMigrateError(_) => {
                "Error while accessing the database.".to_string()
            }
            AppError::EnvVarError(_) => "Configuration error.".to_string(),
            AppError::PasswordHashingError => "Error while processing credentials.".to_string(),
            AppError::SessionError(_) => "Error while managing your session.".to_string(),
            AppError::PermissionDenied => {
                "You do not have permission to access this page.".to_string()
            }
            // These messages are meant for the user
            AppError::NotFound(_)
            | AppError::BadRequest(_)
            | AppError::Validation(_)
            | AppError::InvalidTransition { .. } => self.to_string(),
            _ => "An unexpected error occurred.".to_string(),
        };

        let page = ErrorPage {
            status_code: status.as_u16(),
            message: user_message,
        };
        match page.render() {
            Ok(body) => (status, Html(body)).into_response(),
            Err(e) => {
                tracing::error!("Error page failed to render: {}", e);
                (status, page.message).into_response()
            }
        }
    }
}

// Default Result type for the application
pub type AppResult<T = ()> = Result<T, AppError>;
