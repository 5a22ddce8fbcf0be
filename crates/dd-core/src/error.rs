use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid identifier '{stem}': {reason}")]
    InvalidIdentifier { stem: String, reason: &'static str },
}
