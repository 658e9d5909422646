//! Note model and partial-update patch shapes.
//!
//! # Responsibility
//! - Define the persisted note record and its write inputs.
//! - Encode the three-state image patch (keep / clear / set).
//!
//! # Invariants
//! - `user_id` never changes after creation; no patch field can express it.
//! - `order` is non-negative; duplicates inside one lane are allowed.

use crate::blob::BlobHandle;
use crate::model::category::CategoryId;
use crate::model::user::UserId;
use crate::model::validation::ValidationError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable note identifier.
pub type NoteId = Uuid;

/// Persisted sticky note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub user_id: UserId,
    /// Lane membership.
    pub category_id: CategoryId,
    pub content: String,
    /// Attached image, if any. Serialized as `imageId` to match client naming.
    #[serde(rename = "imageId")]
    pub image: Option<BlobHandle>,
    /// Position key within the lane.
    pub order: i64,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

/// Input for note creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNote {
    pub category_id: CategoryId,
    pub content: String,
    /// Explicit lane position. `None` appends to the end of the lane.
    pub order: Option<i64>,
    pub image: Option<BlobHandle>,
}

impl NewNote {
    /// Note appended to the end of `category_id` with no image.
    pub fn new(category_id: CategoryId, content: impl Into<String>) -> Self {
        Self {
            category_id,
            content: content.into(),
            order: None,
            image: None,
        }
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_image(mut self, image: BlobHandle) -> Self {
        self.image = Some(image);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_order(self.order)
    }
}

/// Image change requested by a note patch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ImagePatch {
    /// Field omitted: leave the current attachment as is.
    #[default]
    Keep,
    /// Explicit null: detach. The blob itself is left in the store.
    Clear,
    /// Attach or replace.
    Set(BlobHandle),
}

impl From<Option<Option<BlobHandle>>> for ImagePatch {
    fn from(value: Option<Option<BlobHandle>>) -> Self {
        match value {
            None => Self::Keep,
            Some(None) => Self::Clear,
            Some(Some(handle)) => Self::Set(handle),
        }
    }
}

/// Partial note update. Only provided fields change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotePatch {
    pub content: Option<String>,
    pub image: ImagePatch,
    pub category_id: Option<CategoryId>,
    pub order: Option<i64>,
}

impl NotePatch {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn image(image: ImagePatch) -> Self {
        Self {
            image,
            ..Self::default()
        }
    }

    /// Lane change; order is left to the append policy unless set.
    pub fn category(category_id: CategoryId) -> Self {
        Self {
            category_id: Some(category_id),
            ..Self::default()
        }
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Returns whether applying this patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.image == ImagePatch::Keep
            && self.category_id.is_none()
            && self.order.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_order(self.order)
    }
}

fn validate_order(order: Option<i64>) -> Result<(), ValidationError> {
    match order {
        Some(value) if value < 0 => Err(ValidationError::NegativeOrder(value)),
        _ => Ok(()),
    }
}
