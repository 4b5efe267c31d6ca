//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{CourseError, QuestionId, TagError};
use storage::repository::StorageError;

/// Errors emitted by session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error(transparent)]
    InvalidCourse(#[from] CourseError),
    #[error(transparent)]
    InvalidTag(#[from] TagError),
    #[error("unit not found: {unit}")]
    UnknownUnit { unit: String },
    #[error("no progress key provided")]
    MissingKey,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `StudyService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StudyError {
    #[error(transparent)]
    InvalidCourse(#[from] CourseError),
    #[error("question not found: {id}")]
    UnknownQuestion { id: QuestionId },
    #[error("unit not found: {unit}")]
    UnknownUnit { unit: String },
    #[error("no study record for unit {unit}")]
    UnitNotTracked { unit: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
}
