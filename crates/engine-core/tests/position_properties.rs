//! Property tests over random playouts: the incrementally maintained
//! Zobrist keys always equal a from-scratch recomputation, and the legal
//! move set is exactly the pseudo-legal set filtered by `make_move`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use engine_core::board::zobrist::{compute_key, compute_pawn_key};
use engine_core::movegen::{generate_all_moves, is_move_pseudo_legal};
use engine_core::{EvaledMove, Move, Position, MAX_MOVES};

const GAMES: usize = 40;
const MAX_PLIES: usize = 120;

fn check_position(pos: &Position) {
    assert_eq!(pos.key(), compute_key(pos), "incremental key diverged\n{pos}");
    assert_eq!(pos.pawn_key(), compute_pawn_key(pos), "incremental pawn key diverged\n{pos}");

    let mut buf = [EvaledMove::EMPTY; MAX_MOVES];
    let count = generate_all_moves(pos, &mut buf);
    let mut child = Position::startpos();
    let filtered: Vec<Move> = buf[..count]
        .iter()
        .filter(|em| pos.make_move(em.mv, &mut child))
        .map(|em| em.mv)
        .collect();
    let legal: Vec<Move> = pos.generate_all_legal_moves().iter().map(|em| em.mv).collect();
    assert_eq!(legal, filtered);

    // Everything the generator emits must pass the generation-free check.
    for em in &buf[..count] {
        assert!(is_move_pseudo_legal(pos, em.mv), "{} rejected in {}", em.mv, pos.fen());
    }
}

#[test]
fn random_playouts_keep_invariants() {
    let mut rng = StdRng::seed_from_u64(0x00c0_ffee);
    for _ in 0..GAMES {
        let mut pos = Position::startpos();
        for _ in 0..MAX_PLIES {
            check_position(&pos);
            let legal = pos.generate_all_legal_moves();
            if legal.is_empty() || pos.fifty_move() > 100 {
                break;
            }
            let mv = legal[rng.gen_range(0..legal.len())].mv;
            let mut child = Position::startpos();
            assert!(pos.make_move(mv, &mut child));
            pos = child;
        }
    }
}

#[test]
fn null_move_keys_stay_consistent() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut pos = Position::startpos();
    for _ in 0..40 {
        let legal = pos.generate_all_legal_moves();
        if legal.is_empty() {
            break;
        }
        let mut null_child = Position::startpos();
        if !pos.is_in_check() {
            pos.make_null_move(&mut null_child);
            assert_eq!(null_child.key(), compute_key(&null_child));
            assert_eq!(null_child.pawn_key(), compute_pawn_key(&null_child));
            assert_eq!(null_child.last_move(), Move::NULL);
        }
        let mv = legal[rng.gen_range(0..legal.len())].mv;
        let mut child = Position::startpos();
        assert!(pos.make_move(mv, &mut child));
        pos = child;
    }
}

#[test]
fn lan_round_trip_over_playout() {
    let mut rng = StdRng::seed_from_u64(99);
    let mut pos = Position::startpos();
    for _ in 0..60 {
        let legal = pos.generate_all_legal_moves();
        if legal.is_empty() {
            break;
        }
        let mv = legal[rng.gen_range(0..legal.len())].mv;
        let next = pos.make_move_lan(&mv.to_string()).expect("own LAN must parse");
        let mut direct = Position::startpos();
        assert!(pos.make_move(mv, &mut direct));
        assert_eq!(next, direct);
        // FEN round-trips through the parser as well.
        assert_eq!(Position::from_fen(&next.fen()).map(|p| p.key()), Some(next.key()));
        pos = next;
    }
}
