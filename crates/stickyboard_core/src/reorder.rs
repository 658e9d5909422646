//! Lane ordering rules for note creation, lane moves and in-lane reordering.
//!
//! # Responsibility
//! - Compute `order` and lane membership for a note being placed.
//! - Stay storage-agnostic: callers supply lane sizes and lane contents read
//!   inside their own transaction.
//!
//! # Invariants
//! - Append policy: a note entering a lane gets `order = lane length`.
//! - Only [`plan_lane_reorder`] ever assigns orders to notes other than the
//!   one being placed; deletions never trigger renumbering.
//! - Orders are non-negative; duplicates are tolerated and broken by
//!   insertion sequence when sorting.

use crate::model::category::CategoryId;
use crate::model::note::{Note, NoteId, NotePatch};

/// Order for a note appended to a lane holding `lane_len` notes.
pub fn append_order(lane_len: usize) -> i64 {
    i64::try_from(lane_len).unwrap_or(i64::MAX)
}

/// Uses the caller-provided order when present, else appends.
pub fn resolve_order(requested: Option<i64>, lane_len: usize) -> i64 {
    requested.unwrap_or_else(|| append_order(lane_len))
}

/// Lane and order a note ends up with after a patch or move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub category_id: CategoryId,
    pub order: i64,
}

/// Plans where `note` lands when `patch` is applied.
///
/// `target_lane_len` is the number of notes currently in the patch's target
/// lane; it is only consulted for a lane change without an explicit order.
/// A lane change always carries a fresh order so the note never sits in its
/// new lane with an order computed for the old one.
pub fn plan_patch(note: &Note, patch: &NotePatch, target_lane_len: usize) -> Placement {
    match patch.category_id {
        Some(category_id) if category_id != note.category_id => Placement {
            category_id,
            order: resolve_order(patch.order, target_lane_len),
        },
        _ => Placement {
            category_id: note.category_id,
            order: patch.order.unwrap_or(note.order),
        },
    }
}

/// Plans a drag-and-drop of `note` onto lane `target`.
///
/// Dropping onto the note's own lane is a no-op (`None`); in-lane position
/// changes go through [`plan_lane_reorder`].
pub fn plan_move(note: &Note, target: CategoryId, target_lane_len: usize) -> Option<Placement> {
    if note.category_id == target {
        return None;
    }
    Some(Placement {
        category_id: target,
        order: append_order(target_lane_len),
    })
}

/// Plans moving `note_id` to `target_index` within `lane`, renumbering the
/// lane densely from zero.
///
/// `lane` must be in display order (`order ASC, seq ASC`) as `(id, order)`
/// pairs. `target_index` is clamped to the lane. Returns only the
/// assignments whose order actually changes, or `None` when `note_id` is not
/// part of `lane`.
pub fn plan_lane_reorder(
    lane: &[(NoteId, i64)],
    note_id: NoteId,
    target_index: usize,
) -> Option<Vec<(NoteId, i64)>> {
    let current = lane.iter().position(|(id, _)| *id == note_id)?;
    let mut ids: Vec<NoteId> = lane.iter().map(|(id, _)| *id).collect();
    ids.remove(current);
    let target_index = target_index.min(ids.len());
    ids.insert(target_index, note_id);

    let previous: std::collections::HashMap<NoteId, i64> = lane.iter().copied().collect();
    Some(
        ids.into_iter()
            .enumerate()
            .filter_map(|(index, id)| {
                let order = append_order(index);
                (previous.get(&id) != Some(&order)).then_some((id, order))
            })
            .collect(),
    )
}

/// Sorts one lane for display: `order ASC`, ties kept in input order.
///
/// `items` must arrive in insertion order; the sort is stable, so equal
/// orders fall back to insertion sequence.
pub fn sort_lane_by<T>(items: &mut [T], order: impl Fn(&T) -> i64) {
    items.sort_by_key(|item| order(item));
}
