use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid comment: {0}")]
    InvalidComment(String),
    #[error("invalid thread uri: {0}")]
    InvalidUri(String),
    #[error("invalid mode: {0}")]
    InvalidMode(i64),
}
