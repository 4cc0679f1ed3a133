use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ledger_normalizer::PipelineError;
use serde_json::json;
use thiserror::Error;

use crate::query::DatasetError;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid date format: {0}")]
    InvalidDateFormat(String),

    #[error("Normalized ledger not available: {0}")]
    DatasetUnavailable(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<DatasetError> for ApiError {
    fn from(err: DatasetError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidDateFormat(_) => StatusCode::BAD_REQUEST,
            ApiError::DatasetUnavailable(_) => StatusCode::NOT_FOUND,
            // An upload that cannot be decoded or mapped is the client's fault
            ApiError::Pipeline(PipelineError::SourceUnreadable { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(PipelineError::NoDateColumn { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
