use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use hmac::digest::InvalidLength;
use sea_orm::DbErr;
use thiserror::Error;
use tracing::{debug, error};

use crate::handlers::{found, login_url};
use crate::mail::MailError;

/// Everything a page handler can fail with.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error("template error: {0}")]
    Template(#[from] tera::Error),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
    #[error("mail error: {0}")]
    Mail(#[from] MailError),
    #[error("reset token signing failed: {0}")]
    Token(#[from] InvalidLength),
    #[error("login required to access {next}")]
    LoginRequired { next: String },
    #[error("permission denied")]
    PermissionDenied,
    #[error("not found")]
    NotFound,
}

pub type AppResult<T> = Result<T, AppError>;

fn error_page(status: StatusCode, title: &str) -> Response {
    let body = format!(
        "<!DOCTYPE html>\n<html><head><title>{title}</title></head>\
         <body><h1>{title}</h1></body></html>\n"
    );
    (status, Html(body)).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::LoginRequired { next } => {
                debug!("Anonymous request for {}, redirecting to login", next);
                found(&login_url(&next))
            }
            AppError::PermissionDenied => error_page(StatusCode::FORBIDDEN, "403 Forbidden"),
            AppError::NotFound => error_page(StatusCode::NOT_FOUND, "Not Found"),
            other => {
                error!("Request failed: {}", other);
                error_page(StatusCode::INTERNAL_SERVER_ERROR, "Server Error (500)")
            }
        }
    }
}
