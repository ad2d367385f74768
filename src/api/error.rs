use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::net::SocketAddr;
use thiserror::Error;

use super::config::ConfigError;

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}

/// Reasons a simulate request is turned away before the engine runs.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request body: {}", .0.body_text())]
    Payload(#[from] JsonRejection),
    #[error("{field} must be a finite number >= 0")]
    InvalidAmount { field: &'static str },
    #[error("{field} must be a finite number")]
    InvalidRate { field: &'static str },
    #[error("num_simulations must be <= {max}, got {requested}")]
    TooManySimulations { requested: u32, max: u32 },
    #[error("simulation horizon must be <= {max} years, got {requested}")]
    HorizonTooLong { requested: usize, max: u32 },
    #[error("pre-retirement projection must be <= {max} years, got {requested}")]
    ProjectionTooLong { requested: u32, max: u32 },
    #[error("current_age and reference_year are mutually exclusive")]
    ConflictingReference,
    #[error("simulation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Payload(rejection) => rejection.status(),
            ApiError::InvalidAmount { .. }
            | ApiError::InvalidRate { .. }
            | ApiError::TooManySimulations { .. }
            | ApiError::HorizonTooLong { .. }
            | ApiError::ProjectionTooLong { .. }
            | ApiError::ConflictingReference => StatusCode::BAD_REQUEST,
            ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "simulate request failed");
        } else {
            tracing::debug!(error = %self, %status, "simulate request rejected");
        }
        error_response(status, self.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("server stopped: {0}")]
    Serve(#[source] std::io::Error),
}

pub(crate) fn error_response(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: msg.into() })).into_response()
}
