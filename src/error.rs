//! Binding Engine Errors
//!
//! Structural problems are fatal at load time, contract violations fail
//! fast, and external failures are contained by the caller that sees them.

use thiserror::Error;

use crate::tree::NodeId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    /// Malformed expression text
    #[error("malformed expression at byte {offset}: {message}")]
    Structural { offset: usize, message: String },

    /// Evaluation requested below the minimally-resolved state
    #[error("query for field {target} is not minimally resolved")]
    UnresolvedQuery { target: NodeId },

    /// The relational executor reported a failure
    #[error("relational query failed: {0}")]
    ExternalQuery(String),

    /// A path that must be unique matched several fields
    #[error("path `{path}` matched {count} fields where exactly one was required")]
    MultipleMatch { path: String, count: usize },

    #[error("unknown field: {0}")]
    UnknownField(NodeId),

    #[error("invalid path `{0}`")]
    InvalidPath(String),
}

impl FormError {
    pub(crate) fn structural(offset: usize, message: impl Into<String>) -> Self {
        FormError::Structural {
            offset,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FormError>;
