//! Board domain model: users, categories (lanes) and notes.
//!
//! # Responsibility
//! - Define the records shared by repositories, services and the query layer.
//! - Define validation failures raised before anything touches storage.
//!
//! # Invariants
//! - Every category and note is owned by exactly one `UserId`.
//! - A note's `order` is only meaningful relative to notes of the same lane.

pub mod category;
pub mod note;
pub mod user;
pub mod validation;
