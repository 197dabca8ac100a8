//! # AppError
//!
//! Centralized error handling for the Rovel backend.
//! Every port and service returns these; the API layer maps them to statuses.

use std::fmt::Display;

use thiserror::Error;

/// The primary error type for all domain and service operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// No record matches the given key (e.g., Content, Chapter, User)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// A uniqueness constraint rejected an insert
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// Malformed or missing required fields
    #[error("validation error: {0}")]
    ValidationError(String),

    /// The backing store cannot be reached
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Anything else (e.g., a stored document that no longer decodes)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(entity: &str, key: impl Display) -> Self {
        Self::NotFound(entity.to_string(), key.to_string())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey(_))
    }
}

/// A specialized Result type for Rovel logic.
pub type Result<T> = std::result::Result<T, AppError>;
