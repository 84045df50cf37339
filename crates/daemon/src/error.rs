// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP error mapping.
//!
//! Queue and store errors surface their kinds verbatim to handlers; this
//! module is the single place that translates them into status codes. All
//! unexpected failures collapse into an opaque 500.

use crate::dispatch::DispatchError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kiln_queue::QueueError;
use kiln_store::StoreError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Artifact upload outside the job's running window
    #[error("job is closed for artifact uploads")]
    JobClosed,

    #[error("{0}")]
    BadRequest(String),

    #[error("not found")]
    NotFound,

    #[error("unauthorized")]
    Unauthorized,

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Queue(e) => ApiError::from_queue_ref(e),
            ApiError::Store(e) => match e {
                StoreError::NotExist(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Dispatch(e) => match e {
                DispatchError::UnknownBlueprint(_)
                | DispatchError::Depsolve(_)
                | DispatchError::Catalog(_) => StatusCode::BAD_REQUEST,
                DispatchError::Queue(e) => ApiError::from_queue_ref(e),
                DispatchError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::JobClosed => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn from_queue_ref(e: &QueueError) -> StatusCode {
        match e {
            QueueError::NotExist => StatusCode::NOT_FOUND,
            QueueError::NotRunning | QueueError::AlreadyTerminal => StatusCode::CONFLICT,
            QueueError::UnknownJobType(_)
            | QueueError::UnknownDependency(_)
            | QueueError::Codec(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // 5xx bodies stay opaque; everything else carries the message
        let message = if status.is_server_error() {
            error!(error = %self, "internal error");
            "internal error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(ErrorBody { message })).into_response()
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
