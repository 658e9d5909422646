use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use stickyboard_core::db::open_db;
use stickyboard_core::{
    Board, BoardError, Caller, Category, ImagePatch, MemoryBlobStore, NewNote, NotePatch, UserId,
    ValidationError,
};

fn seeded_board(user_id: &str) -> (Board, Caller, Vec<Category>) {
    let board = Board::in_memory(Arc::new(MemoryBlobStore::new())).unwrap();
    let caller = Caller::user(UserId::new(user_id).unwrap());
    board.ensure_default_categories(&caller).unwrap();
    let categories = board.list_categories(&caller).unwrap();
    (board, caller, categories)
}

fn lane_orders(board: &Board, caller: &Caller, lane: &Category) -> Vec<(String, i64)> {
    board
        .board(caller, Some(lane.id))
        .unwrap()
        .lanes
        .into_iter()
        .flat_map(|lane| lane.notes)
        .map(|view| (view.note.content, view.note.order))
        .collect()
}

#[test]
fn creates_in_empty_lane_append_zero_one_two() {
    let (board, alice, categories) = seeded_board("alice");
    let todo = &categories[0];

    let orders: Vec<i64> = ["a", "b", "c"]
        .into_iter()
        .map(|content| {
            board
                .create_note(&alice, &NewNote::new(todo.id, content))
                .unwrap()
                .order
        })
        .collect();
    assert_eq!(orders, vec![0, 1, 2]);
}

#[test]
fn move_then_remove_keeps_remaining_orders() {
    let (board, alice, categories) = seeded_board("alice");
    let (todo, doing) = (&categories[0], &categories[1]);

    let n = board.create_note(&alice, &NewNote::new(todo.id, "N")).unwrap();
    assert_eq!(n.order, 0);

    let moved = board.move_note(&alice, n.id, doing.id).unwrap();
    assert_eq!(moved.category_id, doing.id);
    assert_eq!(moved.order, 0);

    let m = board.create_note(&alice, &NewNote::new(doing.id, "M")).unwrap();
    assert_eq!(m.order, 1);

    board.remove_note(&alice, n.id).unwrap();
    let notes = board.list_notes(&alice).unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].note.id, m.id);
    assert_eq!(notes[0].note.order, 1);
}

#[test]
fn moving_onto_own_lane_changes_nothing() {
    let (board, alice, categories) = seeded_board("alice");
    let todo = &categories[0];
    board.create_note(&alice, &NewNote::new(todo.id, "first")).unwrap();
    let second = board.create_note(&alice, &NewNote::new(todo.id, "second")).unwrap();

    let same = board.move_note(&alice, second.id, todo.id).unwrap();
    assert_eq!(same, second);
}

#[test]
fn lane_change_through_update_appends_without_explicit_order() {
    let (board, alice, categories) = seeded_board("alice");
    let (todo, done) = (&categories[0], &categories[2]);
    for content in ["x", "y"] {
        board.create_note(&alice, &NewNote::new(done.id, content)).unwrap();
    }
    let note = board
        .create_note(&alice, &NewNote::new(todo.id, "z").with_order(7))
        .unwrap();
    assert_eq!(note.order, 7);

    let updated = board
        .update_note(&alice, note.id, &NotePatch::category(done.id))
        .unwrap();
    assert_eq!(updated.category_id, done.id);
    assert_eq!(updated.order, 2);

    let explicit = board
        .update_note(
            &alice,
            note.id,
            &NotePatch::category(todo.id).with_order(4),
        )
        .unwrap();
    assert_eq!(explicit.category_id, todo.id);
    assert_eq!(explicit.order, 4);
}

#[test]
fn partial_update_touches_only_provided_fields() {
    let (board, alice, categories) = seeded_board("alice");
    let todo = &categories[0];
    let note = board
        .create_note(&alice, &NewNote::new(todo.id, "draft").with_order(3))
        .unwrap();

    let updated = board
        .update_note(&alice, note.id, &NotePatch::content("final"))
        .unwrap();
    assert_eq!(updated.content, "final");
    assert_eq!(updated.order, 3);
    assert_eq!(updated.category_id, todo.id);
    assert_eq!(updated.image, None);
    assert_eq!(updated.user_id, note.user_id);

    let cleared = board
        .update_note(&alice, note.id, &NotePatch::image(ImagePatch::Clear))
        .unwrap();
    assert_eq!(cleared.content, "final");
}

#[test]
fn duplicate_orders_fall_back_to_insertion_sequence() {
    let (board, alice, categories) = seeded_board("alice");
    let todo = &categories[0];
    for content in ["first", "second", "third"] {
        board
            .create_note(&alice, &NewNote::new(todo.id, content).with_order(5))
            .unwrap();
    }
    board
        .create_note(&alice, &NewNote::new(todo.id, "early").with_order(1))
        .unwrap();

    let lane = lane_orders(&board, &alice, todo);
    let contents: Vec<&str> = lane.iter().map(|(content, _)| content.as_str()).collect();
    assert_eq!(contents, vec!["early", "first", "second", "third"]);
}

#[test]
fn negative_order_and_unknown_category_are_validation_errors() {
    let (board, alice, categories) = seeded_board("alice");
    let todo = &categories[0];

    let err = board
        .create_note(&alice, &NewNote::new(todo.id, "x").with_order(-1))
        .unwrap_err();
    assert!(matches!(
        err,
        BoardError::Validation(ValidationError::NegativeOrder(-1))
    ));

    let missing = uuid::Uuid::new_v4();
    let err = board
        .create_note(&alice, &NewNote::new(missing, "x"))
        .unwrap_err();
    assert!(matches!(
        err,
        BoardError::Validation(ValidationError::UnknownCategory(id)) if id == missing
    ));
    assert!(board.list_notes(&alice).unwrap().is_empty());
}

#[test]
fn reorder_within_lane_renumbers_densely_and_leaves_other_lanes() {
    let (board, alice, categories) = seeded_board("alice");
    let (todo, doing) = (&categories[0], &categories[1]);
    let a = board.create_note(&alice, &NewNote::new(todo.id, "a")).unwrap();
    board
        .create_note(&alice, &NewNote::new(todo.id, "b").with_order(10))
        .unwrap();
    board
        .create_note(&alice, &NewNote::new(todo.id, "c").with_order(10))
        .unwrap();
    let other = board
        .create_note(&alice, &NewNote::new(doing.id, "other").with_order(9))
        .unwrap();

    let lane = board.reorder_within_lane(&alice, a.id, 2).unwrap();
    let placed: Vec<(&str, i64)> = lane
        .iter()
        .map(|note| (note.content.as_str(), note.order))
        .collect();
    assert_eq!(placed, vec![("b", 0), ("c", 1), ("a", 2)]);

    let untouched = lane_orders(&board, &alice, doing);
    assert_eq!(untouched, vec![("other".to_string(), other.order)]);

    let clamped = board.reorder_within_lane(&alice, a.id, 0).unwrap();
    assert_eq!(clamped[0].id, a.id);
    let far = board.reorder_within_lane(&alice, a.id, 99).unwrap();
    assert_eq!(far.last().unwrap().id, a.id);
    assert_eq!(far.last().unwrap().order, 2);
}

#[test]
fn writes_require_authenticated_caller() {
    let (board, alice, categories) = seeded_board("alice");
    let todo = &categories[0];
    let note = board.create_note(&alice, &NewNote::new(todo.id, "x")).unwrap();
    let anon = Caller::Anonymous;

    assert!(matches!(
        board.create_note(&anon, &NewNote::new(todo.id, "y")),
        Err(BoardError::Unauthorized)
    ));
    assert!(matches!(
        board.update_note(&anon, note.id, &NotePatch::content("y")),
        Err(BoardError::Unauthorized)
    ));
    assert!(matches!(
        board.move_note(&anon, note.id, todo.id),
        Err(BoardError::Unauthorized)
    ));
    assert!(matches!(
        board.remove_note(&anon, note.id),
        Err(BoardError::Unauthorized)
    ));
    assert!(matches!(
        board.generate_upload_target(&anon),
        Err(BoardError::Unauthorized)
    ));
    assert!(board.list_notes(&anon).unwrap().is_empty());
    assert!(board.board(&anon, None).unwrap().is_empty());
}

#[test]
fn board_snapshot_groups_lanes_in_category_order() {
    let (board, alice, categories) = seeded_board("alice");
    board
        .create_note(&alice, &NewNote::new(categories[2].id, "done"))
        .unwrap();
    board
        .create_note(&alice, &NewNote::new(categories[0].id, "todo"))
        .unwrap();

    let snapshot = board.board(&alice, None).unwrap();
    let names: Vec<&str> = snapshot
        .lanes
        .iter()
        .map(|lane| lane.category.name.as_str())
        .collect();
    assert_eq!(names, vec!["To Do", "In Progress", "Completed"]);
    assert_eq!(snapshot.note_count(), 2);
    assert!(snapshot.lanes[1].notes.is_empty());
    assert_eq!(snapshot.lanes[2].notes[0].note.content, "done");

    let filtered = board.board(&alice, Some(categories[2].id)).unwrap();
    assert_eq!(filtered.lanes.len(), 1);
    assert_eq!(filtered.lanes[0].category.id, categories[2].id);
}

fn file_board(path: &std::path::Path) -> Board {
    Board::new(open_db(path).unwrap(), Arc::new(MemoryBlobStore::new())).unwrap()
}

#[test]
fn concurrent_appends_across_connections_get_distinct_dense_orders() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("board.sqlite3");
    let alice = Caller::user(UserId::new("alice").unwrap());
    let setup = file_board(&path);
    setup.ensure_default_categories(&alice).unwrap();
    let lane = setup.list_categories(&alice).unwrap()[0].clone();
    let lane_id = lane.id;

    let handles: Vec<_> = (0..4)
        .map(|writer| {
            let path = path.clone();
            let alice = alice.clone();
            thread::spawn(move || {
                let board = file_board(&path);
                (0..10)
                    .map(|index| {
                        let new_note = NewNote::new(lane_id, format!("{writer}-{index}"));
                        board.create_note(&alice, &new_note).unwrap().order
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut orders: Vec<i64> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();
    orders.sort_unstable();
    assert_eq!(orders, (0..40).collect::<Vec<i64>>());
    assert_eq!(lane_orders(&setup, &alice, &lane).len(), 40);
}

#[test]
fn readers_never_observe_a_half_applied_move() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("board.sqlite3");
    let alice = Caller::user(UserId::new("alice").unwrap());
    let writer = file_board(&path);
    writer.ensure_default_categories(&alice).unwrap();
    let categories = writer.list_categories(&alice).unwrap();
    let (todo, doing) = (categories[0].id, categories[1].id);
    writer.create_note(&alice, &NewNote::new(todo, "anchor todo")).unwrap();
    writer.create_note(&alice, &NewNote::new(doing, "anchor doing")).unwrap();
    let moving = writer.create_note(&alice, &NewNote::new(todo, "moving")).unwrap();
    assert_eq!(moving.order, 1);
    let moving_id = moving.id;

    let done = Arc::new(AtomicBool::new(false));
    let reader = {
        let path = path.clone();
        let alice = alice.clone();
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let board = file_board(&path);
            let mut reads = 0;
            while !done.load(Ordering::SeqCst) || reads == 0 {
                let snapshot = board.board(&alice, None).unwrap();
                assert_eq!(snapshot.note_count(), 3);
                let placements: Vec<_> = snapshot
                    .lanes
                    .iter()
                    .flat_map(|lane| lane.notes.iter().map(move |view| (lane, view)))
                    .filter(|(_, view)| view.note.id == moving_id)
                    .collect();
                assert_eq!(placements.len(), 1);
                let (lane, view) = placements[0];
                assert_eq!(view.note.category_id, lane.category.id);
                assert_eq!(view.note.order, 1);
                reads += 1;
            }
            reads
        })
    };

    for round in 0..50 {
        let target = if round % 2 == 0 { doing } else { todo };
        let moved = writer.move_note(&alice, moving_id, target).unwrap();
        assert_eq!((moved.category_id, moved.order), (target, 1));
    }
    done.store(true, Ordering::SeqCst);
    assert!(reader.join().unwrap() > 0);
}

#[test]
fn snapshot_leaves_out_notes_without_a_lane() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("board.sqlite3");
    let alice = Caller::user(UserId::new("alice").unwrap());
    let board = file_board(&path);
    board.ensure_default_categories(&alice).unwrap();
    let todo = board.list_categories(&alice).unwrap()[0].clone();
    board.create_note(&alice, &NewNote::new(todo.id, "kept")).unwrap();

    let raw = open_db(&path).unwrap();
    raw.execute_batch("PRAGMA foreign_keys = OFF;").unwrap();
    raw.execute(
        "INSERT INTO notes (note_uuid, user_id, category_uuid, content, sort_order)
         VALUES (?1, 'alice', ?2, 'stray', 0);",
        [uuid::Uuid::new_v4().to_string(), uuid::Uuid::new_v4().to_string()],
    )
    .unwrap();

    assert_eq!(board.list_notes(&alice).unwrap().len(), 2);
    let snapshot = board.board(&alice, None).unwrap();
    assert_eq!(snapshot.note_count(), 1);
    assert_eq!(lane_orders(&board, &alice, &todo), vec![("kept".to_string(), 0)]);
}
