//! Errors raised by the topic model.

use thiserror::Error;

/// Errors produced while validating user-supplied topic terms.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicError {
    /// The term is empty, whitespace-only, or has no alphanumeric content.
    #[error("invalid topic term: {term:?}")]
    InvalidInput { term: String },
}
