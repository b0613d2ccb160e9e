//! # AppError
//!
//! Centralized error handling for nestboard.
//! Every failure the core raises is one of these kinds; anything else coming out
//! of a port is wrapped as `Internal` and never shown to callers in detail.

use thiserror::Error;

/// The primary error type for all nb-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Referenced forum, topic or account does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Capability check failed. The message differs for anonymous and
    /// authenticated callers; the status does not.
    #[error("{0}")]
    Unauthorized(String),

    /// Malformed input that could not be coerced to a default.
    #[error("{0}")]
    BadFormat(String),

    /// Infrastructure failure (store down, oracle unavailable, ...)
    #[error("internal service error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        AppError::Unauthorized(msg.into())
    }

    pub fn bad_format(msg: impl Into<String>) -> Self {
        AppError::BadFormat(msg.into())
    }
}

/// A specialized Result type for nestboard logic.
pub type Result<T> = std::result::Result<T, AppError>;
