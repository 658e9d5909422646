//! Public error taxonomy of board operations.
//!
//! # Invariants
//! - Reads by anonymous callers never produce `Unauthorized`; they return
//!   empty results instead.
//! - A note owned by someone else is reported as `NotFound`, exactly like a
//!   missing one.

use crate::blob::BlobError;
use crate::db::DbError;
use crate::live::LiveError;
use crate::model::validation::ValidationError;
use crate::repo::{EntityRef, RepoError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type BoardResult<T> = Result<T, BoardError>;

#[derive(Debug)]
pub enum BoardError {
    /// Write attempted without a resolved identity.
    Unauthorized,
    /// Referenced record is missing or not owned by the caller.
    NotFound(EntityRef),
    /// Input rejected before reaching storage.
    Validation(ValidationError),
    /// Storage failure.
    Repo(RepoError),
    /// Blob store failure on a path where images are required.
    Blob(BlobError),
    /// Shared board state is unusable (poisoned lock).
    Unavailable(&'static str),
}

impl BoardError {
    /// Stable machine-readable code for log lines and CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation",
            Self::Repo(_) => "storage",
            Self::Blob(_) => "blob",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

impl Display for BoardError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "not authenticated"),
            Self::NotFound(entity) => write!(f, "{entity} not found"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Blob(err) => write!(f, "{err}"),
            Self::Unavailable(details) => write!(f, "board unavailable: {details}"),
        }
    }
}

impl Error for BoardError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Blob(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for BoardError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(entity) => Self::NotFound(entity),
            RepoError::CategoryNotOwned(id) => {
                Self::Validation(ValidationError::UnknownCategory(id))
            }
            other => Self::Repo(other),
        }
    }
}

impl From<DbError> for BoardError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::Db(value))
    }
}

impl From<ValidationError> for BoardError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<LiveError> for BoardError {
    fn from(value: LiveError) -> Self {
        match value {
            LiveError::InvalidCapacity => Self::Unavailable("change feed capacity is zero"),
            LiveError::LockPoisoned => Self::Unavailable("change feed lock poisoned"),
        }
    }
}

impl From<BlobError> for BoardError {
    fn from(value: BlobError) -> Self {
        Self::Blob(value)
    }
}

#[cfg(test)]
mod tests {
    use super::BoardError;
    use crate::model::validation::ValidationError;
    use crate::repo::{EntityRef, RepoError};
    use uuid::Uuid;

    #[test]
    fn foreign_category_maps_to_validation() {
        let id = Uuid::new_v4();
        let err = BoardError::from(RepoError::CategoryNotOwned(id));
        assert!(matches!(
            err,
            BoardError::Validation(ValidationError::UnknownCategory(found)) if found == id
        ));
        assert_eq!(err.code(), "validation");
    }

    #[test]
    fn repo_not_found_maps_to_not_found() {
        let id = Uuid::new_v4();
        let err = BoardError::from(RepoError::NotFound(EntityRef::Note(id)));
        assert!(matches!(err, BoardError::NotFound(EntityRef::Note(found)) if found == id));
        assert_eq!(err.to_string(), format!("note {id} not found"));
    }
}
