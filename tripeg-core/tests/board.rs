//! Board behavior through the public API.
//!
//! Walks full games with a seeded RNG and checks the invariants a caller
//! relies on: peg accounting, history as undo stack, and the JSON shapes
//! a presentation layer consumes.

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;

use tripeg_core::{
    best_move, history_key, parse_history, Board, GameEvent, Hole, Jump, PegError, Vector, APEX,
};

/// Play random legal jumps until the board is terminal.
fn random_game(seed: u64) -> Board {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut board = Board::standard();
    loop {
        let jumps: Vec<Jump> = board.legal_moves().jumps().collect();
        let Some(&jump) = jumps.choose(&mut rng) else {
            break;
        };
        board.apply_jump(jump).unwrap();
    }
    board
}

#[test]
fn random_games_end_terminal_with_consistent_counts() {
    for seed in 0..50 {
        let board = random_game(seed);
        assert!(board.is_terminal());
        assert!(board.peg_count() >= 1);
        assert_eq!(board.peg_count() as usize + board.history_len(), 14);
        assert_eq!(board.peg_count() as u32, board.occupancy().count_ones());
    }
}

#[test]
fn undoing_whole_history_restores_start() {
    for seed in 0..20 {
        let mut board = random_game(seed);
        let history = board.history();
        for expected in history.iter().rev() {
            assert_eq!(board.undo().unwrap(), *expected);
        }
        assert_eq!(board, Board::standard());
        assert_eq!(board.undo(), Err(PegError::EmptyHistory));
    }
}

#[test]
fn replaying_history_reproduces_board() {
    let board = random_game(7);
    let mut replay = Board::standard();
    for jump in board.history() {
        replay.apply_jump(jump).unwrap();
    }
    assert_eq!(replay, board);
}

#[test]
fn history_key_round_trips_a_full_game() {
    let board = random_game(11);
    let key = history_key(&board.history());
    assert_eq!(parse_history(&key).unwrap(), board.history());
}

#[test]
fn best_move_indexes_into_path() {
    let board = random_game(3);
    let path = board.history();
    for (i, jump) in path.iter().enumerate() {
        assert_eq!(best_move(&path, i).unwrap(), *jump);
    }
    assert!(matches!(
        best_move(&path, path.len()),
        Err(PegError::NoMoveAvailable { .. })
    ));
}

#[test]
fn legal_moves_serialize_for_presentation() {
    let moves = Board::standard().legal_moves();
    let json = serde_json::to_value(&moves).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "entries": [
                [[2, 4], [[2, 4]]],
                [[6, 4], [[-2, 4]]],
            ]
        })
    );
}

#[test]
fn jump_json_round_trip() {
    let jump = Jump::new(Hole(6, 4), Vector(-2, 4));
    let text = serde_json::to_string(&jump).unwrap();
    assert_eq!(text, r#"{"origin":[6,4],"vector":[-2,4]}"#);
    let back: Jump = serde_json::from_str(&text).unwrap();
    assert_eq!(back, jump);
}

#[test]
fn events_describe_moves() {
    let mut board = Board::standard();
    board.apply(Hole(2, 4), Vector(2, 4)).unwrap();
    let event = GameEvent::applied(board.last_jump().unwrap());
    let json = serde_json::to_value(event).unwrap();
    assert_eq!(json["event"], "move_applied");
    assert_eq!(json["origin"], serde_json::json!([2, 4]));
    assert!(board.is_occupied(APEX));
}
