//! Category (lane) model.
//!
//! # Invariants
//! - `order` sorts a user's categories; ties fall back to insertion order.
//! - Categories are never renamed, reordered or deleted by core.

use crate::model::user::UserId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable category identifier.
pub type CategoryId = Uuid;

/// Names seeded for every new board, in display order.
pub const DEFAULT_CATEGORY_NAMES: [&str; 3] = ["To Do", "In Progress", "Completed"];

/// One board column owned by a single user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub user_id: UserId,
    pub name: String,
    pub order: i64,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
}
