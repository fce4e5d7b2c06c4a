//! Maps domain errors onto HTTP responses. Only `AppError::user_message`
//! reaches the client.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use mw_core::error::AppError;
use serde::Serialize;
use tracing::error;

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub AppError);

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    retryable: bool,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            AppError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::VideoTooLong { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ValidationError(_) | AppError::DeviceAccessDenied(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(..) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::UploadFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::MetadataWriteFailed(_) | AppError::DeleteFailed(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        HttpResponse::build(status).json(ErrorBody {
            error: self.0.user_message(),
            retryable: self.0.is_retryable(),
        })
    }
}
