//! Note repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist notes per user, keyed by lane (`category_uuid`).
//! - Apply the lane ordering plans from [`crate::reorder`] inside the same
//!   transaction that reads the lane.
//!
//! # Invariants
//! - All reads and writes filter by owning `user_id`.
//! - A lane change rewrites `category_uuid` and `sort_order` in one UPDATE.
//! - Deleting a note never renumbers its former lane.
//! - Storage order is `seq ASC`; lane display order is
//!   `sort_order ASC, seq ASC`.

use super::category_repo::ensure_category_owned;
use super::{ensure_connection_ready, lane_len, parse_uuid, EntityRef, RepoError, RepoResult};
use crate::blob::BlobHandle;
use crate::model::category::CategoryId;
use crate::model::note::{ImagePatch, NewNote, Note, NoteId, NotePatch};
use crate::model::user::UserId;
use crate::reorder::{self, Placement};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const NOTE_SELECT_SQL: &str = "SELECT
    note_uuid,
    user_id,
    category_uuid,
    content,
    image_handle,
    sort_order,
    created_at,
    updated_at
FROM notes";

/// Before/after pair for one note write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteChange {
    pub before: Note,
    pub after: Note,
}

impl NoteChange {
    /// `(from, to)` lanes when the write moved the note.
    pub fn lane_move(&self) -> Option<(CategoryId, CategoryId)> {
        (self.before.category_id != self.after.category_id)
            .then_some((self.before.category_id, self.after.category_id))
    }

    /// True when no user-visible field changed; `updated_at` is ignored.
    pub fn is_noop(&self) -> bool {
        let (before, after) = (&self.before, &self.after);
        before.category_id == after.category_id
            && before.order == after.order
            && before.content == after.content
            && before.image == after.image
    }

    fn unchanged(note: Note) -> Self {
        Self {
            after: note.clone(),
            before: note,
        }
    }
}

/// Lane state after an in-lane reorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneReorder {
    /// The lane in display order.
    pub lane: Vec<Note>,
    /// Number of rows whose order was rewritten.
    pub moved: usize,
}

/// Repository interface for note operations.
pub trait NoteRepository {
    /// Inserts one note into an owned lane, appending unless an order is given.
    fn create_note(&self, user_id: &UserId, new_note: &NewNote) -> RepoResult<Note>;
    /// Loads one owned note.
    fn get_note(&self, user_id: &UserId, note_id: NoteId) -> RepoResult<Option<Note>>;
    /// Lists all owned notes in storage order.
    fn list_notes(&self, user_id: &UserId) -> RepoResult<Vec<Note>>;
    /// Lists one owned lane in display order.
    fn list_lane(&self, user_id: &UserId, category_id: CategoryId) -> RepoResult<Vec<Note>>;
    /// Applies a partial update.
    fn update_note(
        &self,
        user_id: &UserId,
        note_id: NoteId,
        patch: &NotePatch,
    ) -> RepoResult<NoteChange>;
    /// Moves a note to the end of another lane; same-lane moves change nothing.
    fn move_note(
        &self,
        user_id: &UserId,
        note_id: NoteId,
        target: CategoryId,
    ) -> RepoResult<NoteChange>;
    /// Moves a note to `target_index` in its lane and renumbers the lane.
    fn reorder_within_lane(
        &self,
        user_id: &UserId,
        note_id: NoteId,
        target_index: usize,
    ) -> RepoResult<LaneReorder>;
    /// Deletes one owned note and returns its last state.
    fn delete_note(&self, user_id: &UserId, note_id: NoteId) -> RepoResult<Note>;
}

/// SQLite-backed note repository.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn begin(&self) -> RepoResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn create_note(&self, user_id: &UserId, new_note: &NewNote) -> RepoResult<Note> {
        let tx = self.begin()?;
        ensure_category_owned(&tx, user_id, new_note.category_id)?;

        let lane_len = count_lane(&tx, user_id, new_note.category_id)?;
        let order = reorder::resolve_order(new_note.order, lane_len);
        let note_id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO notes (
                note_uuid,
                user_id,
                category_uuid,
                content,
                image_handle,
                sort_order
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                note_id.to_string(),
                user_id.as_str(),
                new_note.category_id.to_string(),
                new_note.content.as_str(),
                new_note.image.as_ref().map(BlobHandle::as_str),
                order,
            ],
        )?;

        let note = load_required_note(&tx, user_id, note_id)?;
        tx.commit()?;
        Ok(note)
    }

    fn get_note(&self, user_id: &UserId, note_id: NoteId) -> RepoResult<Option<Note>> {
        load_owned_note(self.conn, user_id, note_id)
    }

    fn list_notes(&self, user_id: &UserId) -> RepoResult<Vec<Note>> {
        query_notes(
            self.conn,
            &format!("{NOTE_SELECT_SQL} WHERE user_id = ?1 ORDER BY seq ASC;"),
            &[user_id.as_str()],
        )
    }

    fn list_lane(&self, user_id: &UserId, category_id: CategoryId) -> RepoResult<Vec<Note>> {
        list_lane_in(self.conn, user_id, category_id)
    }

    fn update_note(
        &self,
        user_id: &UserId,
        note_id: NoteId,
        patch: &NotePatch,
    ) -> RepoResult<NoteChange> {
        let tx = self.begin()?;
        let before = load_required_note(&tx, user_id, note_id)?;
        if patch.is_empty() {
            return Ok(NoteChange::unchanged(before));
        }

        let target_lane_len = match patch.category_id {
            Some(category_id) if category_id != before.category_id => {
                ensure_category_owned(&tx, user_id, category_id)?;
                count_lane(&tx, user_id, category_id)?
            }
            _ => 0,
        };
        let placement = reorder::plan_patch(&before, patch, target_lane_len);

        let content = patch.content.as_deref().unwrap_or(before.content.as_str());
        let image = match &patch.image {
            ImagePatch::Keep => before.image.as_ref().map(BlobHandle::as_str),
            ImagePatch::Clear => None,
            ImagePatch::Set(handle) => Some(handle.as_str()),
        };
        if placement.category_id == before.category_id
            && placement.order == before.order
            && content == before.content
            && image == before.image.as_ref().map(BlobHandle::as_str)
        {
            return Ok(NoteChange::unchanged(before));
        }
        write_note(&tx, user_id, note_id, content, image, placement)?;

        let after = load_required_note(&tx, user_id, note_id)?;
        tx.commit()?;
        Ok(NoteChange { before, after })
    }

    fn move_note(
        &self,
        user_id: &UserId,
        note_id: NoteId,
        target: CategoryId,
    ) -> RepoResult<NoteChange> {
        let tx = self.begin()?;
        let before = load_required_note(&tx, user_id, note_id)?;
        ensure_category_owned(&tx, user_id, target)?;

        let target_lane_len = count_lane(&tx, user_id, target)?;
        let Some(placement) = reorder::plan_move(&before, target, target_lane_len) else {
            return Ok(NoteChange::unchanged(before));
        };

        let image = before.image.as_ref().map(BlobHandle::as_str);
        write_note(&tx, user_id, note_id, &before.content, image, placement)?;
        let after = load_required_note(&tx, user_id, note_id)?;
        tx.commit()?;
        Ok(NoteChange { before, after })
    }

    fn reorder_within_lane(
        &self,
        user_id: &UserId,
        note_id: NoteId,
        target_index: usize,
    ) -> RepoResult<LaneReorder> {
        let tx = self.begin()?;
        let note = load_required_note(&tx, user_id, note_id)?;
        let lane: Vec<(NoteId, i64)> = list_lane_in(&tx, user_id, note.category_id)?
            .into_iter()
            .map(|item| (item.id, item.order))
            .collect();

        let changes = reorder::plan_lane_reorder(&lane, note_id, target_index)
            .ok_or(RepoError::NotFound(EntityRef::Note(note_id)))?;
        let moved = changes.len();
        if moved == 0 {
            let lane = list_lane_in(&tx, user_id, note.category_id)?;
            return Ok(LaneReorder { lane, moved });
        }
        for (id, order) in changes {
            tx.execute(
                "UPDATE notes
                 SET sort_order = ?3,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE note_uuid = ?1
                   AND user_id = ?2;",
                params![id.to_string(), user_id.as_str(), order],
            )?;
        }

        let lane = list_lane_in(&tx, user_id, note.category_id)?;
        tx.commit()?;
        Ok(LaneReorder { lane, moved })
    }

    fn delete_note(&self, user_id: &UserId, note_id: NoteId) -> RepoResult<Note> {
        let tx = self.begin()?;
        let note = load_required_note(&tx, user_id, note_id)?;
        tx.execute(
            "DELETE FROM notes WHERE note_uuid = ?1 AND user_id = ?2;",
            params![note_id.to_string(), user_id.as_str()],
        )?;
        tx.commit()?;
        Ok(note)
    }
}

fn write_note(
    conn: &Connection,
    user_id: &UserId,
    note_id: NoteId,
    content: &str,
    image: Option<&str>,
    placement: Placement,
) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE notes
         SET content = ?3,
             image_handle = ?4,
             category_uuid = ?5,
             sort_order = ?6,
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE note_uuid = ?1
           AND user_id = ?2;",
        params![
            note_id.to_string(),
            user_id.as_str(),
            content,
            image,
            placement.category_id.to_string(),
            placement.order,
        ],
    )?;
    if changed == 0 {
        return Err(RepoError::NotFound(EntityRef::Note(note_id)));
    }
    Ok(())
}

fn count_lane(conn: &Connection, user_id: &UserId, category_id: CategoryId) -> RepoResult<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*)
         FROM notes
         WHERE user_id = ?1
           AND category_uuid = ?2;",
        params![user_id.as_str(), category_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(lane_len(count))
}

fn list_lane_in(
    conn: &Connection,
    user_id: &UserId,
    category_id: CategoryId,
) -> RepoResult<Vec<Note>> {
    let category_text = category_id.to_string();
    query_notes(
        conn,
        &format!(
            "{NOTE_SELECT_SQL}
             WHERE user_id = ?1
               AND category_uuid = ?2
             ORDER BY sort_order ASC, seq ASC;"
        ),
        &[user_id.as_str(), category_text.as_str()],
    )
}

fn query_notes(conn: &Connection, sql: &str, bind: &[&str]) -> RepoResult<Vec<Note>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(rusqlite::params_from_iter(bind.iter()))?;
    let mut notes = Vec::new();
    while let Some(row) = rows.next()? {
        notes.push(parse_note_row(row)?);
    }
    Ok(notes)
}

fn load_owned_note(conn: &Connection, user_id: &UserId, note_id: NoteId) -> RepoResult<Option<Note>> {
    conn.query_row(
        &format!(
            "{NOTE_SELECT_SQL}
             WHERE note_uuid = ?1
               AND user_id = ?2;"
        ),
        params![note_id.to_string(), user_id.as_str()],
        |row| Ok(parse_note_row(row)),
    )
    .optional()?
    .transpose()
}

fn load_required_note(conn: &Connection, user_id: &UserId, note_id: NoteId) -> RepoResult<Note> {
    load_owned_note(conn, user_id, note_id)?.ok_or(RepoError::NotFound(EntityRef::Note(note_id)))
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<Note> {
    let note_text: String = row.get("note_uuid")?;
    let category_text: String = row.get("category_uuid")?;
    let user_id = UserId::new(row.get::<_, String>("user_id")?)
        .map_err(|err| RepoError::InvalidData(format!("notes.user_id: {err}")))?;
    let image = row
        .get::<_, Option<String>>("image_handle")?
        .map(|value| {
            BlobHandle::new(value)
                .map_err(|err| RepoError::InvalidData(format!("notes.image_handle: {err}")))
        })
        .transpose()?;

    Ok(Note {
        id: parse_uuid(&note_text, "notes.note_uuid")?,
        user_id,
        category_id: parse_uuid(&category_text, "notes.category_uuid")?,
        content: row.get("content")?,
        image,
        order: row.get("sort_order")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
