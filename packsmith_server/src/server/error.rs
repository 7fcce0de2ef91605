use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use packsmith_core::{
    api::ErrorBody, archive::ArchiveError, manifest::ManifestError, models::modpacks::DraftError,
};
use tracing::error;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("format error: {0}")]
    Format(String),
    #[error("database error: {0}")]
    Transaction(#[from] sqlx::Error),
    #[error("timed out waiting for modpack lock")]
    LockTimeout,
    #[error("archive error: {0}")]
    Archive(String),
    #[error("multipart error: {0}")]
    MultipartError(#[from] MultipartError),
    #[error("unauthorized")]
    Unauthorized,
    #[error("bad request")]
    BadRequest,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::Format(_)
            | ApiError::MultipartError(_)
            | ApiError::BadRequest => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Transaction(_)
            | ApiError::LockTimeout
            | ApiError::Archive(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Format(_) => "FORMAT_ERROR",
            ApiError::Transaction(_) | ApiError::LockTimeout => "TRANSACTION_ERROR",
            ApiError::Archive(_) => "ARCHIVE_ERROR",
            ApiError::MultipartError(_) => "MULTIPART_ERROR",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::BadRequest => "BAD_REQUEST",
        }
    }
}

impl From<DraftError> for ApiError {
    fn from(x: DraftError) -> Self {
        match x {
            DraftError::Invalid(reason) => ApiError::Validation(reason),
            duplicate @ DraftError::DuplicateProject(_) => {
                ApiError::Conflict(duplicate.to_string())
            }
        }
    }
}

impl From<ManifestError> for ApiError {
    fn from(x: ManifestError) -> Self {
        match x {
            ManifestError::Format(reason) => ApiError::Format(reason),
            ManifestError::Validation(reason) => ApiError::Validation(reason),
        }
    }
}

impl From<ArchiveError> for ApiError {
    fn from(x: ArchiveError) -> Self {
        if x.is_input_error() {
            ApiError::Format(x.to_string())
        } else {
            ApiError::Archive(x.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{:#?}", self);
        }
        let message = if cfg!(debug_assertions) {
            Some(self.to_string())
        } else {
            None
        };
        (
            status,
            Json(ErrorBody {
                error: self.code().to_string(),
                message,
            }),
        )
            .into_response()
    }
}
