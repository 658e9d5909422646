//! Validation failures raised before persistence.

use crate::model::category::CategoryId;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Identity provider returned a blank user id.
    EmptyUserId,
    /// Target category does not exist or belongs to another user.
    UnknownCategory(CategoryId),
    /// Lane order keys are non-negative.
    NegativeOrder(i64),
    /// Upload content type is outside the allowed image types.
    UnsupportedContentType(String),
    /// Upload exceeds the configured size cap.
    PayloadTooLarge { size: u64, max: u64 },
    /// Blob handle is blank or contains characters no store issues.
    InvalidBlobHandle(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyUserId => write!(f, "user id must not be blank"),
            Self::UnknownCategory(id) => write!(f, "unknown category: {id}"),
            Self::NegativeOrder(order) => write!(f, "order must be >= 0, got {order}"),
            Self::UnsupportedContentType(value) => {
                write!(f, "unsupported content type `{value}`")
            }
            Self::PayloadTooLarge { size, max } => {
                write!(f, "upload of {size} bytes exceeds limit of {max} bytes")
            }
            Self::InvalidBlobHandle(value) => write!(f, "invalid blob handle `{value}`"),
        }
    }
}

impl Error for ValidationError {}
