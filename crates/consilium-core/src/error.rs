//! Error taxonomy shared by the engine modules.

use thiserror::Error;

use crate::db::DbError;

/// Errors surfaced by case-engine operations.
///
/// `Validation` means the caller can fix the input and retry; `NotFound`
/// means an id did not resolve; `Forbidden` means the access policy rejected
/// the actor; `Storage` wraps everything fatal underneath.
#[derive(Error, Debug)]
pub enum CaseError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Storage error: {0}")]
    Storage(DbError),
}

pub type CaseResult<T> = Result<T, CaseError>;

impl From<DbError> for CaseError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(what) => CaseError::NotFound(what),
            DbError::Validation(what) => CaseError::Validation(what),
            other => CaseError::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_error_mapping() {
        let err: CaseError = DbError::NotFound("case c1".into()).into();
        assert!(matches!(err, CaseError::NotFound(_)));

        let err: CaseError = DbError::Validation("diagnosis must not be empty".into()).into();
        assert!(matches!(err, CaseError::Validation(_)));

        let err: CaseError = DbError::Constraint("duplicate reaction".into()).into();
        assert!(matches!(err, CaseError::Storage(_)));
    }
}
