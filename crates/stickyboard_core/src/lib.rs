//! Core domain logic for StickyBoard.
//! This crate is the single source of truth for board ordering and ownership
//! invariants.

pub mod auth;
pub mod blob;
pub mod board;
pub mod config;
pub mod db;
pub mod error;
pub mod live;
pub mod logging;
pub mod model;
pub mod query;
pub mod reorder;
pub mod repo;
pub mod service;

pub use auth::{Caller, IdentityProvider, TokenIdentityProvider};
pub use blob::{
    BlobError, BlobHandle, BlobStore, FsBlobStore, MemoryBlobStore, UploadPolicy, UploadTarget,
};
pub use board::{Board, BoardWatch, LiveSnapshot};
pub use config::{BoardConfig, ConfigError};
pub use error::{BoardError, BoardResult};
pub use live::{BoardChange, ChangeFeed, ChangeKind, DropReason, Subscription};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::category::{Category, CategoryId, DEFAULT_CATEGORY_NAMES};
pub use model::note::{ImagePatch, NewNote, Note, NoteId, NotePatch};
pub use model::user::UserId;
pub use model::validation::ValidationError;
pub use query::{BoardSnapshot, Lane, NoteView};
pub use repo::{EntityRef, RepoError, RepoResult};
