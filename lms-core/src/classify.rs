//! Mapping backend failures onto [`DatabaseErrorKind`].
//!
//! Storage backends report failures through [`BackendFailure`]; a
//! [`ClassifyError`] decides which of the three kinds each one is.
//! [`SqlStateClassifier`] covers SQL backends (and any backend that
//! reports SQLSTATE-style codes, like the in-memory one).

use crate::errors::DatabaseErrorKind;

/// A backend-native error, as seen by a classifier.
pub trait BackendFailure: std::error::Error + Send + Sync {
    /// Five-character SQLSTATE code, if the backend reports one.
    fn sql_state(&self) -> Option<&str> {
        None
    }

    /// A kind the backend already knows for certain.
    fn kind_hint(&self) -> Option<DatabaseErrorKind> {
        None
    }
}

pub trait ClassifyError: Send + Sync {
    fn classify(&self, failure: &dyn BackendFailure) -> DatabaseErrorKind;
}

/// SQLSTATE class 23 (integrity constraint violation) plus `02000` (no data).
///
/// Failures without a recognisable code classify as `Constraint`, keeping
/// the taxonomy closed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlStateClassifier;

pub const UNIQUE_VIOLATION: &str = "23505";
pub const FOREIGN_KEY_VIOLATION: &str = "23503";
pub const NOT_NULL_VIOLATION: &str = "23502";
pub const CHECK_VIOLATION: &str = "23514";
pub const EXCLUSION_VIOLATION: &str = "23P01";
pub const INTEGRITY_CONSTRAINT_VIOLATION: &str = "23000";
pub const NO_DATA: &str = "02000";

impl SqlStateClassifier {
    pub fn classify_code(code: &str) -> DatabaseErrorKind {
        match code {
            UNIQUE_VIOLATION => DatabaseErrorKind::Duplicate,
            NO_DATA => DatabaseErrorKind::NotFound,
            _ => DatabaseErrorKind::Constraint,
        }
    }
}

impl ClassifyError for SqlStateClassifier {
    fn classify(&self, failure: &dyn BackendFailure) -> DatabaseErrorKind {
        if let Some(kind) = failure.kind_hint() {
            return kind;
        }
        match failure.sql_state() {
            Some(code) => Self::classify_code(code),
            None => {
                tracing::warn!(error = %failure, "unclassified backend failure");
                DatabaseErrorKind::Constraint
            }
        }
    }
}

impl<F> ClassifyError for F
where
    F: Fn(&dyn BackendFailure) -> DatabaseErrorKind + Send + Sync,
{
    fn classify(&self, failure: &dyn BackendFailure) -> DatabaseErrorKind {
        self(failure)
    }
}
