use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("index not found: {}", .0.display())]
    IndexNotFound(PathBuf),

    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("corrupt BGZF data: {0}")]
    CorruptBgzf(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("file closed: {}", .0.display())]
    FileClosed(PathBuf),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("io error: {0}")]
    Io(#[source] Arc<io::Error>),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Payload carried by the I/O error a closed shared handle raises.
#[derive(Debug)]
pub(crate) struct HandleClosed(pub(crate) PathBuf);

impl std::fmt::Display for HandleClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "handle for {} is closed", self.0.display())
    }
}

impl std::error::Error for HandleClosed {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        let closed = e
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<HandleClosed>())
            .map(|c| c.0.clone());

        match closed {
            Some(path) => Error::FileClosed(path),
            None => Error::Io(Arc::new(e)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub r#type: &'static str,
    pub message: String,
}

impl Error {
    fn error_type(&self) -> &'static str {
        match self {
            Error::IndexNotFound(_) => "IndexNotFound",
            Error::CorruptIndex(_) => "CorruptIndex",
            Error::CorruptBgzf(_) => "CorruptBgzf",
            Error::InvalidRecord(_) => "InvalidRecord",
            Error::FileClosed(_) => "FileClosed",
            Error::NotFound(_) => "NotFound",
            Error::InvalidInput(_) => "InvalidInput",
            Error::InvalidRange(_) => "InvalidRange",
            Error::Io(_) | Error::Internal(_) => "InternalError",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::IndexNotFound(_) | Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidInput(_) | Error::InvalidRange(_) => StatusCode::BAD_REQUEST,
            Error::CorruptIndex(_)
            | Error::CorruptBgzf(_)
            | Error::InvalidRecord(_)
            | Error::FileClosed(_)
            | Error::Io(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                r#type: self.error_type(),
                message: self.to_string(),
            },
        };
        (self.status_code(), axum::Json(body)).into_response()
    }
}
