//! Note use-case service.
//!
//! # Responsibility
//! - Validate note inputs before they reach storage.
//! - Resolve the caller into an owning user for every write.
//!
//! # Invariants
//! - Writes by anonymous callers fail with `Unauthorized` before any
//!   repository call.
//! - Reads by anonymous callers return empty results.

use crate::auth::Caller;
use crate::error::{BoardError, BoardResult};
use crate::model::category::CategoryId;
use crate::model::note::{NewNote, Note, NoteId, NotePatch};
use crate::model::user::UserId;
use crate::repo::note_repo::{LaneReorder, NoteChange, NoteRepository};

/// Note service facade over repository implementations.
pub struct NoteService<R: NoteRepository> {
    repo: R,
}

impl<R: NoteRepository> NoteService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates one note owned by the caller.
    pub fn create(&self, caller: &Caller, new_note: &NewNote) -> BoardResult<Note> {
        let user_id = require_user(caller)?;
        new_note.validate()?;
        Ok(self.repo.create_note(user_id, new_note)?)
    }

    pub fn get(&self, caller: &Caller, note_id: NoteId) -> BoardResult<Option<Note>> {
        match caller.user_id() {
            Some(user_id) => Ok(self.repo.get_note(user_id, note_id)?),
            None => Ok(None),
        }
    }

    /// Lists the caller's notes in storage order.
    pub fn list(&self, caller: &Caller) -> BoardResult<Vec<Note>> {
        match caller.user_id() {
            Some(user_id) => Ok(self.repo.list_notes(user_id)?),
            None => Ok(Vec::new()),
        }
    }

    /// Applies a partial update. A lane change without an order appends; a
    /// patch that changes nothing writes nothing.
    pub fn update(
        &self,
        caller: &Caller,
        note_id: NoteId,
        patch: &NotePatch,
    ) -> BoardResult<NoteChange> {
        let user_id = require_user(caller)?;
        patch.validate()?;
        Ok(self.repo.update_note(user_id, note_id, patch)?)
    }

    pub fn move_to(
        &self,
        caller: &Caller,
        note_id: NoteId,
        target: CategoryId,
    ) -> BoardResult<NoteChange> {
        let user_id = require_user(caller)?;
        Ok(self.repo.move_note(user_id, note_id, target)?)
    }

    /// Moves a note inside its lane; indexes past the end clamp to the end.
    pub fn reorder(
        &self,
        caller: &Caller,
        note_id: NoteId,
        target_index: usize,
    ) -> BoardResult<LaneReorder> {
        let user_id = require_user(caller)?;
        Ok(self.repo.reorder_within_lane(user_id, note_id, target_index)?)
    }

    /// Deletes one note. Neighbours keep their orders.
    pub fn remove(&self, caller: &Caller, note_id: NoteId) -> BoardResult<Note> {
        let user_id = require_user(caller)?;
        Ok(self.repo.delete_note(user_id, note_id)?)
    }
}

fn require_user(caller: &Caller) -> BoardResult<&UserId> {
    caller.user_id().ok_or(BoardError::Unauthorized)
}
