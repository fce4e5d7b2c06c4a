//! # AppError
//!
//! Centralized error handling for the memory wall.
//! Store and transport failures are converted into these variants at the
//! pipeline and moderation boundaries; nothing below them leaks to callers.

use std::time::Duration;
use thiserror::Error;

/// The primary error type for all mw-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Candidate file exceeds the size ceiling
    #[error("file is {size} bytes, the limit is {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    /// Candidate video runs longer than the duration ceiling
    #[error("video runs {duration:?}, the limit is {limit:?}")]
    VideoTooLong { duration: Duration, limit: Duration },

    /// Any other rejected input (empty file, kind mismatch, unconfirmed delete)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Camera or microphone refused or missing
    #[error("capture device unavailable: {0}")]
    DeviceAccessDenied(String),

    /// Media store write failed; no entry was created
    #[error("media upload failed: {0}")]
    UploadFailed(String),

    /// Entry store write failed after the media was stored
    #[error("entry metadata write failed: {0}")]
    MetadataWriteFailed(String),

    /// Soft delete could not be persisted; the entry stays visible
    #[error("delete failed: {0}")]
    DeleteFailed(String),

    /// Resource not found (e.g., Entry)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Caller lacks the authority for the action
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Request conflicts with the current state (e.g., unhiding an entry)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Infrastructure failure outside the categories above
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the same request may succeed if tried again unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::UploadFailed(_)
                | AppError::MetadataWriteFailed(_)
                | AppError::DeleteFailed(_)
                | AppError::Internal(_)
        )
    }

    /// Message safe to show to a guest. Never includes transport details.
    pub fn user_message(&self) -> String {
        match self {
            AppError::FileTooLarge { limit, .. } => format!(
                "This file is too large. Please pick one smaller than {} MB.",
                limit / (1024 * 1024)
            ),
            AppError::VideoTooLong { limit, .. } => format!(
                "This video is too long. Please keep it under {} seconds.",
                limit.as_secs()
            ),
            AppError::ValidationError(msg) => msg.clone(),
            AppError::DeviceAccessDenied(_) => {
                "The camera could not be opened. Please check your permissions.".to_string()
            }
            AppError::UploadFailed(_) | AppError::MetadataWriteFailed(_) => {
                "Something went wrong while uploading. Please try again.".to_string()
            }
            AppError::DeleteFailed(_) => {
                "Something went wrong while deleting. Please try again.".to_string()
            }
            AppError::NotFound(what, _) => format!("{what} not found."),
            AppError::Unauthorized(_) => "You are not allowed to do that.".to_string(),
            AppError::Conflict(msg) => msg.clone(),
            AppError::Internal(_) => "Something went wrong. Please try again.".to_string(),
        }
    }
}

/// A specialized Result type for memory-wall logic.
pub type Result<T> = std::result::Result<T, AppError>;
