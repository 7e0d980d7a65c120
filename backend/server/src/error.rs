use axum::{
    Json,
    extract::{multipart::MultipartRejection, rejection::FormRejection},
    http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE},
    response::{IntoResponse, Response},
};
use bank::lightlist::LightListError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::database::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid authentication credentials")]
    Unauthorized,

    #[error("Inactive user")]
    InactiveUser,

    #[error("Incorrect username or password")]
    BadCredentials,

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    LightList(#[from] LightListError),

    #[error("No file provided")]
    MissingFile,

    #[error("File must be an MP3")]
    UnsupportedMediaType,

    #[error("user not found: '{0}'")]
    SnapshotNotFound(String),

    #[error("Invalid player index: {0}")]
    InvalidPlayer(usize),

    #[error("file not found: {0}")]
    MusicNotFound(String),

    #[error("snapshot {update_time} already exists for '{user}', retry")]
    Conflict { user: String, update_time: String },

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Internal error: {0}")]
    InternalError(#[from] std::io::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { user, update_time } => AppError::Conflict { user, update_time },
            other => AppError::Store(other),
        }
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        AppError::MalformedPayload(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::MalformedPayload(rejection.body_text())
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::InactiveUser
            | AppError::BadCredentials
            | AppError::MalformedPayload(_)
            | AppError::InvalidParameter(_)
            | AppError::LightList(_)
            | AppError::MissingFile => StatusCode::BAD_REQUEST,
            AppError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::SnapshotNotFound(_)
            | AppError::InvalidPlayer(_)
            | AppError::MusicNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Store(_) | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let detail = match &self {
            AppError::Store(_) | AppError::InternalError(_) => {
                error!("{self}");
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        let mut response = (status, Json(json!({ "detail": detail }))).into_response();

        if let AppError::Unauthorized = self {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        response
    }
}
