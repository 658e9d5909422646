//! Per-user change feed for live board queries.
//!
//! # Responsibility
//! - Fan committed board mutations out to the subscribers of the same user.
//! - Drop subscribers that stop draining their queue.
//!
//! # Invariants
//! - Revisions increase by one per publish, across all users of one feed.
//! - A subscriber only ever receives changes for its own user.
//! - A full subscriber queue drops the subscriber and flags it
//!   `SubscriberLagged`; it must resubscribe and re-read the board.

use crate::model::category::CategoryId;
use crate::model::note::NoteId;
use crate::model::user::UserId;
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use log::debug;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub type LiveResult<T> = Result<T, LiveError>;

#[derive(Debug)]
pub enum LiveError {
    InvalidCapacity,
    LockPoisoned,
}

impl Display for LiveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCapacity => write!(f, "subscriber capacity must be > 0"),
            Self::LockPoisoned => write!(f, "change feed lock poisoned"),
        }
    }
}

impl Error for LiveError {}

/// What a committed mutation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    CategoriesSeeded,
    NoteCreated {
        note_id: NoteId,
        category_id: CategoryId,
    },
    NoteUpdated {
        note_id: NoteId,
    },
    NoteMoved {
        note_id: NoteId,
        from: CategoryId,
        to: CategoryId,
    },
    LaneReordered {
        category_id: CategoryId,
    },
    NoteRemoved {
        note_id: NoteId,
        category_id: CategoryId,
    },
}

impl ChangeKind {
    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CategoriesSeeded => "categories_seeded",
            Self::NoteCreated { .. } => "note_created",
            Self::NoteUpdated { .. } => "note_updated",
            Self::NoteMoved { .. } => "note_moved",
            Self::LaneReordered { .. } => "lane_reordered",
            Self::NoteRemoved { .. } => "note_removed",
        }
    }
}

/// Notification delivered to subscribers after a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardChange {
    pub user_id: UserId,
    pub revision: u64,
    pub kind: ChangeKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    SubscriberLagged,
}

/// Receiving end of one user's change stream.
pub struct Subscription {
    user_id: UserId,
    receiver: Receiver<BoardChange>,
    drop_reason: Arc<Mutex<Option<DropReason>>>,
}

impl Subscription {
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn try_recv(&self) -> Result<BoardChange, TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<BoardChange, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drains every queued change without blocking.
    pub fn drain(&self) -> Vec<BoardChange> {
        self.receiver.try_iter().collect()
    }

    /// Set once the feed has dropped this subscriber.
    pub fn drop_reason(&self) -> Option<DropReason> {
        self.drop_reason.lock().ok().and_then(|guard| *guard)
    }
}

/// Shared publisher handle; clones publish into the same feed.
#[derive(Clone)]
pub struct ChangeFeed {
    inner: Arc<Mutex<FeedState>>,
}

impl ChangeFeed {
    pub fn new(subscriber_capacity: usize) -> LiveResult<Self> {
        if subscriber_capacity == 0 {
            return Err(LiveError::InvalidCapacity);
        }
        Ok(Self {
            inner: Arc::new(Mutex::new(FeedState {
                capacity: subscriber_capacity,
                revision: 0,
                next_subscriber_id: 1,
                subscribers: BTreeMap::new(),
            })),
        })
    }

    pub fn subscribe(&self, user_id: &UserId) -> LiveResult<Subscription> {
        let mut state = self.lock_state()?;
        let (sender, receiver) = crossbeam::channel::bounded(state.capacity);
        let drop_reason = Arc::new(Mutex::new(None));
        let id = state.next_subscriber_id;
        state.next_subscriber_id = state.next_subscriber_id.saturating_add(1);
        state.subscribers.insert(
            id,
            SubscriberState {
                user_id: user_id.clone(),
                sender,
                drop_reason: Arc::clone(&drop_reason),
            },
        );

        Ok(Subscription {
            user_id: user_id.clone(),
            receiver,
            drop_reason,
        })
    }

    /// Publishes one change and returns its revision.
    pub fn publish(&self, user_id: &UserId, kind: ChangeKind) -> LiveResult<u64> {
        let mut state = self.lock_state()?;
        state.revision = state.revision.saturating_add(1);
        let change = BoardChange {
            user_id: user_id.clone(),
            revision: state.revision,
            kind,
        };

        let mut dropped = Vec::new();
        for (id, subscriber) in &state.subscribers {
            if &subscriber.user_id != user_id {
                continue;
            }
            match subscriber.sender.try_send(change.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    subscriber.set_drop_reason(DropReason::SubscriberLagged);
                    dropped.push(*id);
                }
                Err(TrySendError::Disconnected(_)) => dropped.push(*id),
            }
        }

        for id in &dropped {
            state.subscribers.remove(id);
        }
        if !dropped.is_empty() {
            debug!(
                "event=live_prune module=live status=ok user={} dropped={}",
                user_id,
                dropped.len()
            );
        }

        Ok(change.revision)
    }

    /// Revision of the last published change, `0` before any.
    pub fn revision(&self) -> LiveResult<u64> {
        Ok(self.lock_state()?.revision)
    }

    pub fn subscriber_count(&self) -> LiveResult<usize> {
        Ok(self.lock_state()?.subscribers.len())
    }

    fn lock_state(&self) -> LiveResult<MutexGuard<'_, FeedState>> {
        self.inner.lock().map_err(|_| LiveError::LockPoisoned)
    }
}

struct FeedState {
    capacity: usize,
    revision: u64,
    next_subscriber_id: u64,
    subscribers: BTreeMap<u64, SubscriberState>,
}

struct SubscriberState {
    user_id: UserId,
    sender: Sender<BoardChange>,
    drop_reason: Arc<Mutex<Option<DropReason>>>,
}

impl SubscriberState {
    fn set_drop_reason(&self, reason: DropReason) {
        if let Ok(mut guard) = self.drop_reason.lock() {
            if guard.is_none() {
                *guard = Some(reason);
            }
        }
    }
}
