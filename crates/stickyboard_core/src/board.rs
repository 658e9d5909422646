//! Board facade: the logical request surface of a sticky-note board.
//!
//! # Responsibility
//! - Serialize access to the SQLite connection and run each use-case in its
//!   own short transaction.
//! - Publish committed mutations to the change feed.
//! - Drive the client image flow against the blob store.
//!
//! # Invariants
//! - Every operation takes an explicit `&Caller`.
//! - Changes are published only after the write transaction committed.
//! - Log lines carry ids, orders and codes, never note content.

use crate::auth::Caller;
use crate::blob::{BlobHandle, BlobStore, FsBlobStore, UploadPolicy, UploadTarget};
use crate::config::BoardConfig;
use crate::db::{open_db, open_db_in_memory};
use crate::error::{BoardError, BoardResult};
use crate::live::{ChangeFeed, ChangeKind, Subscription};
use crate::model::category::{Category, CategoryId};
use crate::model::note::{ImagePatch, NewNote, Note, NoteId, NotePatch};
use crate::model::user::UserId;
use crate::query::{BoardSnapshot, NoteView, QueryLayer};
use crate::repo::category_repo::SqliteCategoryRepository;
use crate::repo::note_repo::{NoteChange, SqliteNoteRepository};
use crate::repo::EntityRef;
use crate::service::category_service::CategoryService;
use crate::service::note_service::NoteService;
use crossbeam::channel::RecvTimeoutError;
use log::{info, warn};
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

const DEFAULT_SUBSCRIBER_CAPACITY: usize = 64;

/// Shared board handle. `Send + Sync`; wrap in `Arc` to share across threads.
pub struct Board {
    conn: Mutex<Connection>,
    blobs: Arc<dyn BlobStore>,
    upload_policy: UploadPolicy,
    feed: ChangeFeed,
}

impl Board {
    /// Wraps a connection produced by `db::open_db*`.
    pub fn new(conn: Connection, blobs: Arc<dyn BlobStore>) -> BoardResult<Self> {
        SqliteCategoryRepository::try_new(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            blobs,
            upload_policy: UploadPolicy::default(),
            feed: ChangeFeed::new(DEFAULT_SUBSCRIBER_CAPACITY)?,
        })
    }

    /// Board over a fresh in-memory database.
    pub fn in_memory(blobs: Arc<dyn BlobStore>) -> BoardResult<Self> {
        Self::new(open_db_in_memory()?, blobs)
    }

    /// Opens the database file and filesystem blob store named by `config`.
    pub fn open(config: &BoardConfig) -> BoardResult<Self> {
        let conn = open_db(&config.db_path)?;
        let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::open(&config.blob)?);
        let feed = ChangeFeed::new(config.live.subscriber_capacity)?;
        Ok(Self::new(conn, blobs)?
            .with_upload_policy(config.upload.clone())
            .with_feed(feed))
    }

    pub fn with_upload_policy(mut self, upload_policy: UploadPolicy) -> Self {
        self.upload_policy = upload_policy;
        self
    }

    /// Publishes into `feed`, letting boards over one database share watchers.
    pub fn with_feed(mut self, feed: ChangeFeed) -> Self {
        self.feed = feed;
        self
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    pub fn upload_policy(&self) -> &UploadPolicy {
        &self.upload_policy
    }

    /// Seeds "To Do", "In Progress" and "Completed" for a caller with none.
    pub fn ensure_default_categories(&self, caller: &Caller) -> BoardResult<bool> {
        let seeded = logged(
            "category_seed",
            caller,
            || {
                let conn = self.lock_conn()?;
                let service = category_service(&conn)?;
                service.ensure_defaults(caller)
            },
            |seeded| format!("seeded={seeded}"),
        )?;
        if seeded {
            self.publish(caller, ChangeKind::CategoriesSeeded);
        }
        Ok(seeded)
    }

    pub fn list_categories(&self, caller: &Caller) -> BoardResult<Vec<Category>> {
        let conn = self.lock_conn()?;
        let query = self.query(&conn)?;
        query.list_categories(caller)
    }

    /// Caller notes in storage order with resolved image URLs.
    pub fn list_notes(&self, caller: &Caller) -> BoardResult<Vec<NoteView>> {
        let conn = self.lock_conn()?;
        let query = self.query(&conn)?;
        query.list_notes(caller)
    }

    pub fn board(&self, caller: &Caller, filter: Option<CategoryId>) -> BoardResult<BoardSnapshot> {
        let conn = self.lock_conn()?;
        let query = self.query(&conn)?;
        query.board(caller, filter)
    }

    pub fn image_url(&self, caller: &Caller, handle: &BlobHandle) -> Option<String> {
        let conn = self.lock_conn().ok()?;
        let query = self.query(&conn).ok()?;
        query.image_url(caller, handle)
    }

    /// Lane a "new note" action targets.
    pub fn default_lane(
        &self,
        caller: &Caller,
        filter: Option<CategoryId>,
    ) -> BoardResult<Option<Category>> {
        let conn = self.lock_conn()?;
        let query = self.query(&conn)?;
        query.default_lane(caller, filter)
    }

    pub fn create_note(&self, caller: &Caller, new_note: &NewNote) -> BoardResult<Note> {
        let note = logged(
            "note_create",
            caller,
            || {
                let conn = self.lock_conn()?;
                let service = note_service(&conn)?;
                service.create(caller, new_note)
            },
            |note| {
                format!(
                    "note={} category={} order={}",
                    note.id, note.category_id, note.order
                )
            },
        )?;
        self.publish(
            caller,
            ChangeKind::NoteCreated {
                note_id: note.id,
                category_id: note.category_id,
            },
        );
        Ok(note)
    }

    /// Applies a partial update and returns the note as stored afterwards.
    pub fn update_note(
        &self,
        caller: &Caller,
        note_id: NoteId,
        patch: &NotePatch,
    ) -> BoardResult<Note> {
        let change = logged(
            "note_update",
            caller,
            || {
                let conn = self.lock_conn()?;
                let service = note_service(&conn)?;
                service.update(caller, note_id, patch)
            },
            describe_change,
        )?;
        self.publish_change(caller, &change);
        Ok(change.after)
    }

    /// Drops a note onto another lane, appending it there.
    ///
    /// Dropping onto the note's own lane returns it unchanged and publishes
    /// nothing.
    pub fn move_note(
        &self,
        caller: &Caller,
        note_id: NoteId,
        target: CategoryId,
    ) -> BoardResult<Note> {
        let change = logged(
            "note_move",
            caller,
            || {
                let conn = self.lock_conn()?;
                let service = note_service(&conn)?;
                service.move_to(caller, note_id, target)
            },
            describe_change,
        )?;
        self.publish_change(caller, &change);
        Ok(change.after)
    }

    /// Moves a note to `target_index` within its lane, renumbering the lane
    /// densely. Returns the lane in display order; publishes only when some
    /// order actually changed.
    pub fn reorder_within_lane(
        &self,
        caller: &Caller,
        note_id: NoteId,
        target_index: usize,
    ) -> BoardResult<Vec<Note>> {
        let reorder = logged(
            "lane_reorder",
            caller,
            || {
                let conn = self.lock_conn()?;
                let service = note_service(&conn)?;
                service.reorder(caller, note_id, target_index)
            },
            |reorder| {
                format!(
                    "note={note_id} index={target_index} lane_len={} moved={}",
                    reorder.lane.len(),
                    reorder.moved
                )
            },
        )?;
        if reorder.moved > 0 {
            if let Some(first) = reorder.lane.first() {
                self.publish(
                    caller,
                    ChangeKind::LaneReordered {
                        category_id: first.category_id,
                    },
                );
            }
        }
        Ok(reorder.lane)
    }

    /// Deletes a note. Its image blob stays in the store.
    pub fn remove_note(&self, caller: &Caller, note_id: NoteId) -> BoardResult<Note> {
        let note = logged(
            "note_remove",
            caller,
            || {
                let conn = self.lock_conn()?;
                let service = note_service(&conn)?;
                service.remove(caller, note_id)
            },
            |note| format!("note={} category={}", note.id, note.category_id),
        )?;
        self.publish(
            caller,
            ChangeKind::NoteRemoved {
                note_id: note.id,
                category_id: note.category_id,
            },
        );
        Ok(note)
    }

    pub fn generate_upload_target(&self, caller: &Caller) -> BoardResult<UploadTarget> {
        logged(
            "upload_target",
            caller,
            || {
                require_user(caller)?;
                Ok(self.blobs.create_upload_target()?)
            },
            |target| format!("expires_at={}", target.expires_at),
        )
    }

    /// Validates, uploads and attaches an image to an owned note.
    pub fn attach_image(
        &self,
        caller: &Caller,
        note_id: NoteId,
        content_type: &str,
        bytes: &[u8],
    ) -> BoardResult<Note> {
        let handle = logged(
            "image_upload",
            caller,
            || {
                require_user(caller)?;
                let size = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
                self.upload_policy.validate(content_type, size)?;
                self.ensure_note_visible(caller, note_id)?;

                let target = self.blobs.create_upload_target()?;
                Ok(self.blobs.upload(&target.token, content_type, bytes)?)
            },
            |handle| format!("note={note_id} handle={handle} bytes={}", bytes.len()),
        )?;
        self.update_note(caller, note_id, &NotePatch::image(ImagePatch::Set(handle)))
    }

    /// Clears the note's image reference; the blob itself is kept.
    pub fn detach_image(&self, caller: &Caller, note_id: NoteId) -> BoardResult<Note> {
        self.update_note(caller, note_id, &NotePatch::image(ImagePatch::Clear))
    }

    /// Opens a live view of the caller's board.
    ///
    /// The subscription is taken before the initial snapshot is read, so no
    /// commit between the two is missed.
    pub fn watch(&self, caller: &Caller, filter: Option<CategoryId>) -> BoardResult<BoardWatch<'_>> {
        let user_id = require_user(caller)?.clone();
        let subscription = self.feed.subscribe(&user_id)?;
        let revision = self.feed.revision()?;
        info!(
            "event=board_watch module=board status=ok user={} revision={}",
            user_id, revision
        );
        Ok(BoardWatch {
            board: self,
            caller: caller.clone(),
            filter,
            subscription,
            revision,
        })
    }

    fn ensure_note_visible(&self, caller: &Caller, note_id: NoteId) -> BoardResult<()> {
        let conn = self.lock_conn()?;
        let service = note_service(&conn)?;
        match service.get(caller, note_id)? {
            Some(_) => Ok(()),
            None => Err(BoardError::NotFound(EntityRef::Note(note_id))),
        }
    }

    fn lock_conn(&self) -> BoardResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| BoardError::Unavailable("connection lock poisoned"))
    }

    fn query<'a>(
        &'a self,
        conn: &'a Connection,
    ) -> BoardResult<QueryLayer<'a, SqliteCategoryRepository<'a>, SqliteNoteRepository<'a>>> {
        Ok(QueryLayer::new(
            SqliteCategoryRepository::try_new(conn)?,
            SqliteNoteRepository::try_new(conn)?,
            self.blobs.as_ref(),
        ))
    }

    fn publish_change(&self, caller: &Caller, change: &NoteChange) {
        if change.is_noop() {
            return;
        }
        let note_id = change.after.id;
        let kind = match change.lane_move() {
            Some((from, to)) => ChangeKind::NoteMoved { note_id, from, to },
            None => ChangeKind::NoteUpdated { note_id },
        };
        self.publish(caller, kind);
    }

    fn publish(&self, caller: &Caller, kind: ChangeKind) {
        let Some(user_id) = caller.user_id() else {
            return;
        };
        if let Err(err) = self.feed.publish(user_id, kind) {
            warn!(
                "event=change_publish module=board status=error user={} kind={} error={}",
                user_id,
                kind.name(),
                err
            );
        }
    }
}

/// Board snapshot tagged with the last change revision it reflects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSnapshot {
    pub revision: u64,
    pub board: BoardSnapshot,
}

/// Live query over one caller's board.
pub struct BoardWatch<'b> {
    board: &'b Board,
    caller: Caller,
    filter: Option<CategoryId>,
    subscription: Subscription,
    revision: u64,
}

impl BoardWatch<'_> {
    /// Current board state at the watch's revision.
    pub fn snapshot(&self) -> BoardResult<LiveSnapshot> {
        Ok(LiveSnapshot {
            revision: self.revision,
            board: self.board.board(&self.caller, self.filter)?,
        })
    }

    /// Waits up to `timeout` for the next change and re-reads the board.
    ///
    /// Queued notifications are coalesced into one snapshot. Returns
    /// `Ok(None)` when nothing changed in time. A subscriber dropped for
    /// lagging is resubscribed and handed a full snapshot.
    pub fn next_snapshot(&mut self, timeout: Duration) -> BoardResult<Option<LiveSnapshot>> {
        match self.subscription.recv_timeout(timeout) {
            Ok(change) => {
                self.revision = change.revision;
                if let Some(last) = self.subscription.drain().last() {
                    self.revision = last.revision;
                }
            }
            Err(RecvTimeoutError::Timeout) => return Ok(None),
            Err(RecvTimeoutError::Disconnected) => self.resubscribe()?,
        }
        if self.subscription.drop_reason().is_some() {
            self.resubscribe()?;
        }
        self.snapshot().map(Some)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn resubscribe(&mut self) -> BoardResult<()> {
        let user_id = self.subscription.user_id().clone();
        self.subscription = self.board.feed.subscribe(&user_id)?;
        self.revision = self.board.feed.revision()?;
        warn!(
            "event=board_watch module=board status=resubscribed user={} revision={}",
            user_id, self.revision
        );
        Ok(())
    }
}

fn category_service(conn: &Connection) -> BoardResult<CategoryService<SqliteCategoryRepository<'_>>> {
    Ok(CategoryService::new(SqliteCategoryRepository::try_new(conn)?))
}

fn note_service(conn: &Connection) -> BoardResult<NoteService<SqliteNoteRepository<'_>>> {
    Ok(NoteService::new(SqliteNoteRepository::try_new(conn)?))
}

fn require_user(caller: &Caller) -> BoardResult<&UserId> {
    caller.user_id().ok_or(BoardError::Unauthorized)
}

fn caller_label(caller: &Caller) -> &str {
    caller.user_id().map_or("anonymous", UserId::as_str)
}

fn describe_change(change: &NoteChange) -> String {
    let after = &change.after;
    match change.lane_move() {
        Some((from, to)) => format!(
            "note={} from={from} to={to} order={}",
            after.id, after.order
        ),
        None => format!(
            "note={} category={} order={} noop={}",
            after.id,
            after.category_id,
            after.order,
            change.is_noop()
        ),
    }
}

/// Runs one mutation and emits its `event=` outcome line.
fn logged<T>(
    event: &'static str,
    caller: &Caller,
    op: impl FnOnce() -> BoardResult<T>,
    describe: impl FnOnce(&T) -> String,
) -> BoardResult<T> {
    let started_at = Instant::now();
    let result = op();
    match &result {
        Ok(value) => info!(
            "event={event} module=board status=ok user={} duration_ms={} {}",
            caller_label(caller),
            started_at.elapsed().as_millis(),
            describe(value)
        ),
        Err(err) => warn!(
            "event={event} module=board status=error user={} duration_ms={} error_code={} error={}",
            caller_label(caller),
            started_at.elapsed().as_millis(),
            err.code(),
            err
        ),
    }
    result
}
