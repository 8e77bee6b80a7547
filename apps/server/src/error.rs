use std::io::Error as IoError;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use homewatch_service::config;
use serde::Serialize;
use thiserror::Error;

/// Fatal startup errors of the server binary
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0:#}")]
    Io(#[from] IoError),
    #[error(transparent)]
    Config(#[from] config::Error),
    #[error("failed to start scheduler: {0:#}")]
    Scheduler(anyhow::Error),
}

/// Request errors, rendered as `{"error": "..."}`
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("service not found: {0}")]
    ServiceNotFound(String),
    #[error("hours must be an integer between {min} and {max}, got `{raw}`")]
    InvalidWindow { raw: String, min: u32, max: u32 },
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ServiceNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidWindow { .. } => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody { error: self.to_string() })
    }
}
