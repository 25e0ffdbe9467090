use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("invalid parameter: {0}")]
    InvalidParam(String),
    #[error("invalid parent comment: {0}")]
    InvalidParent(i64),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage call timed out")]
    Timeout,
    #[error("sqlx error: {0}")]
    Unhandled(#[from] sqlx::Error),
}

impl StoreError {
    /// Maps a unique-constraint violation to `Conflict`, everything else to `Unhandled`.
    pub(crate) fn from_insert(err: sqlx::Error, what: &str) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict(format!("{what} already exists"))
            }
            _ => StoreError::Unhandled(err),
        }
    }
}
