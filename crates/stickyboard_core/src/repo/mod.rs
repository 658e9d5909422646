//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define user-scoped data access contracts for categories and notes.
//! - Isolate SQL and transaction boundaries from service orchestration.
//!
//! # Invariants
//! - Every query filters by owning `user_id`; a foreign id behaves exactly
//!   like a missing one.
//! - Multi-statement writes run inside one `BEGIN IMMEDIATE` transaction.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::category::CategoryId;
use crate::model::note::NoteId;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod category_repo;
pub mod note_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Record a repository lookup was about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef {
    Category(CategoryId),
    Note(NoteId),
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Category(id) => write!(f, "category {id}"),
            Self::Note(id) => write!(f, "note {id}"),
        }
    }
}

/// Repository error for board persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Record is missing or owned by another user.
    NotFound(EntityRef),
    /// Write referenced a category the writing user does not own.
    CategoryNotOwned(CategoryId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(entity) => write!(f, "{entity} not found"),
            Self::CategoryNotOwned(id) => write!(f, "category {id} is not owned by caller"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "board repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted board data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Rejects connections that did not go through `db::open_db*`.
fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}

fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn lane_len(count: i64) -> usize {
    usize::try_from(count).unwrap_or_default()
}
