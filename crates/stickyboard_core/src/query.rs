//! Read projections served to board clients.
//!
//! # Responsibility
//! - Resolve note image handles into short-lived read URLs.
//! - Group notes into lanes for a whole-board snapshot.
//!
//! # Invariants
//! - Blob resolution failures never fail a read; the affected view carries
//!   `image_url: None` and a `warn` line is logged.
//! - Anonymous callers get empty projections.

use crate::auth::Caller;
use crate::blob::{BlobHandle, BlobStore};
use crate::error::BoardResult;
use crate::model::category::{Category, CategoryId};
use crate::model::note::Note;
use crate::reorder::sort_lane_by;
use crate::repo::category_repo::CategoryRepository;
use crate::repo::note_repo::NoteRepository;
use crate::service::category_service::CategoryService;
use crate::service::note_service::NoteService;
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashMap;

/// Note plus its resolved image URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteView {
    #[serde(flatten)]
    pub note: Note,
    pub image_url: Option<String>,
}

/// One category column with its notes in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lane {
    pub category: Category,
    pub notes: Vec<NoteView>,
}

/// Whole board grouped by lane, lanes in category order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BoardSnapshot {
    pub lanes: Vec<Lane>,
}

impl BoardSnapshot {
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    pub fn lane(&self, category_id: CategoryId) -> Option<&Lane> {
        self.lanes
            .iter()
            .find(|lane| lane.category.id == category_id)
    }

    /// Total notes across all lanes.
    pub fn note_count(&self) -> usize {
        self.lanes.iter().map(|lane| lane.notes.len()).sum()
    }
}

/// Read-side facade over the category and note services.
pub struct QueryLayer<'a, C: CategoryRepository, N: NoteRepository> {
    categories: CategoryService<C>,
    notes: NoteService<N>,
    blobs: &'a dyn BlobStore,
}

impl<'a, C: CategoryRepository, N: NoteRepository> QueryLayer<'a, C, N> {
    pub fn new(category_repo: C, note_repo: N, blobs: &'a dyn BlobStore) -> Self {
        Self {
            categories: CategoryService::new(category_repo),
            notes: NoteService::new(note_repo),
            blobs,
        }
    }

    pub fn list_categories(&self, caller: &Caller) -> BoardResult<Vec<Category>> {
        self.categories.list(caller)
    }

    /// All caller notes in storage order, with image URLs resolved.
    pub fn list_notes(&self, caller: &Caller) -> BoardResult<Vec<NoteView>> {
        let notes = self.notes.list(caller)?;
        Ok(notes.into_iter().map(|note| self.view(note)).collect())
    }

    /// Resolves one handle; `None` for anonymous callers or unresolvable handles.
    pub fn image_url(&self, caller: &Caller, handle: &BlobHandle) -> Option<String> {
        if !caller.is_authenticated() {
            return None;
        }
        resolve_url(self.blobs, handle)
    }

    pub fn default_lane(
        &self,
        caller: &Caller,
        filter: Option<CategoryId>,
    ) -> BoardResult<Option<Category>> {
        self.categories.default_lane(caller, filter)
    }

    /// Groups the caller's notes under their categories.
    ///
    /// With `filter`, only that lane is kept; a filter naming no owned
    /// category yields an empty snapshot. Notes whose category is not among
    /// the caller's lanes are left out.
    pub fn board(&self, caller: &Caller, filter: Option<CategoryId>) -> BoardResult<BoardSnapshot> {
        let categories = self.categories.list(caller)?;
        let mut by_lane: HashMap<CategoryId, Vec<NoteView>> = HashMap::new();
        for view in self.list_notes(caller)? {
            by_lane
                .entry(view.note.category_id)
                .or_default()
                .push(view);
        }

        let lanes = categories
            .into_iter()
            .filter(|category| filter.map_or(true, |id| id == category.id))
            .map(|category| {
                let mut notes = by_lane.remove(&category.id).unwrap_or_default();
                sort_lane_by(&mut notes, |view| view.note.order);
                Lane { category, notes }
            })
            .collect();
        if filter.is_none() {
            for (category_id, notes) in &by_lane {
                debug!(
                    "event=board_snapshot module=query status=lane_missing category={} notes={}",
                    category_id,
                    notes.len()
                );
            }
        }
        Ok(BoardSnapshot { lanes })
    }

    fn view(&self, note: Note) -> NoteView {
        let image_url = note
            .image
            .as_ref()
            .and_then(|handle| resolve_url(self.blobs, handle));
        NoteView { note, image_url }
    }
}

fn resolve_url(blobs: &dyn BlobStore, handle: &BlobHandle) -> Option<String> {
    match blobs.resolve_read_url(handle) {
        Ok(Some(url)) => Some(url),
        Ok(None) => {
            warn!(
                "event=image_resolve module=query status=missing handle={}",
                handle
            );
            None
        }
        Err(err) => {
            warn!(
                "event=image_resolve module=query status=error handle={} error={}",
                handle,
                err
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BoardSnapshot, Lane, NoteView};
    use crate::model::category::Category;
    use crate::model::note::Note;
    use crate::model::user::UserId;
    use uuid::Uuid;

    #[test]
    fn note_view_serializes_flat_with_image_url() {
        let user_id = UserId::new("u1").expect("user");
        let view = NoteView {
            note: Note {
                id: Uuid::nil(),
                user_id,
                category_id: Uuid::nil(),
                content: "hello".to_string(),
                image: None,
                order: 2,
                created_at: 1,
                updated_at: 1,
            },
            image_url: Some("memory://blobs/abc".to_string()),
        };

        let json = serde_json::to_value(&view).expect("serialize view");
        assert_eq!(json["content"], "hello");
        assert_eq!(json["order"], 2);
        assert_eq!(json["imageId"], serde_json::Value::Null);
        assert_eq!(json["imageUrl"], "memory://blobs/abc");
        assert_eq!(json["userId"], "u1");
    }

    #[test]
    fn snapshot_lookup_and_count() {
        let category = Category {
            id: Uuid::new_v4(),
            user_id: UserId::new("u1").expect("user"),
            name: "To Do".to_string(),
            order: 0,
            created_at: 0,
        };
        let snapshot = BoardSnapshot {
            lanes: vec![Lane {
                category: category.clone(),
                notes: Vec::new(),
            }],
        };
        assert!(!snapshot.is_empty());
        assert_eq!(snapshot.note_count(), 0);
        assert!(snapshot.lane(category.id).is_some());
        assert!(snapshot.lane(Uuid::new_v4()).is_none());
    }
}
