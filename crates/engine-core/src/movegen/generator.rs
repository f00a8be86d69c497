//! Pseudo-legal move generation into caller-provided buffers.
//!
//! Nothing here allocates: both generators write into a fixed `EvaledMove`
//! slice (the per-ply buffer of the search stack) and return the count.
//! Legality is the caller's problem, with one exception: castling is only
//! emitted when the king's path is safe, so castling through check never
//! appears even in the pseudo-legal set.

use crate::board::attacks::{
    bishop_attacks, king_attacks, knight_attacks, pawn_attacks, queen_attacks, rook_attacks,
    BLACK_PAWN_ATTACKS, WHITE_PAWN_ATTACKS,
};
use crate::board::position::{
    BLACK_KING_SIDE_LOST, BLACK_QUEEN_SIDE_LOST, WHITE_KING_SIDE_LOST, WHITE_QUEEN_SIDE_LOST,
};
use crate::board::{
    rank_of, Bitboard, Color, Piece, Position, Square, B1, B8, C1, C8, D1, D8, E1, E8, F1, F8, G1,
    G8,
};

use super::types::{move_type, EvaledMove, Move, MAX_MOVES};

const PROMOTION_KINDS: [u8; 4] = [
    move_type::KNIGHT_PROMOTION,
    move_type::BISHOP_PROMOTION,
    move_type::ROOK_PROMOTION,
    move_type::QUEEN_PROMOTION,
];

#[inline]
fn piece_attacks(piece: Piece, sq: Square, occ: Bitboard) -> Bitboard {
    match piece {
        Piece::Knight => knight_attacks(sq),
        Piece::Bishop => bishop_attacks(sq, occ),
        Piece::Rook => rook_attacks(sq, occ),
        Piece::Queen => queen_attacks(sq, occ),
        Piece::King => king_attacks(sq),
        _ => Bitboard::EMPTY,
    }
}

/// Emit every pseudo-legal move for the side to move. Returns the count.
pub fn generate_all_moves(pos: &Position, buf: &mut [EvaledMove]) -> usize {
    debug_assert!(buf.len() >= MAX_MOVES);
    let us = pos.side_to_move();
    let our = pos.occupancy(us);
    // The king is never a capture target.
    let their = pos.occupancy(!us) & !pos.pieces(Piece::King);
    let all = our | pos.occupancy(!us);
    let pawns = pos.pieces(Piece::Pawn) & our;

    let mut n = 0;
    let mut push = |mv: Move| {
        buf[n] = EvaledMove::new(mv);
        n += 1;
    };

    match us {
        Color::White => {
            let single = pawns.north() & !all;
            for to in single & !Bitboard::RANK_8 {
                push(Move::new(to - 8, to, Piece::Pawn, Piece::None, move_type::QUIET));
            }
            for to in single & Bitboard::RANK_8 {
                for kind in PROMOTION_KINDS {
                    push(Move::new(to - 8, to, Piece::Pawn, Piece::None, kind));
                }
            }
            for to in (single & Bitboard::RANK_3).north() & !all {
                push(Move::new(to - 16, to, Piece::Pawn, Piece::None, move_type::DOUBLE_PAWN_PUSH));
            }
            for (caps, delta) in [(pawns.north_east() & their, 9), (pawns.north_west() & their, 7)] {
                for to in caps & !Bitboard::RANK_8 {
                    push(Move::new(to - delta, to, Piece::Pawn, pos.type_on_square(to), move_type::CAPTURE));
                }
                for to in caps & Bitboard::RANK_8 {
                    for kind in PROMOTION_KINDS {
                        push(Move::new(
                            to - delta,
                            to,
                            Piece::Pawn,
                            pos.type_on_square(to),
                            kind | move_type::CAPTURE_BIT,
                        ));
                    }
                }
            }
            if pos.ep_square() != 0 {
                let target = pos.ep_square() + 8;
                for from in BLACK_PAWN_ATTACKS[target as usize] & pawns {
                    push(Move::new(from, target, Piece::Pawn, Piece::Pawn, move_type::EP_CAPTURE));
                }
            }
        }
        Color::Black => {
            let single = pawns.south() & !all;
            for to in single & !Bitboard::RANK_1 {
                push(Move::new(to + 8, to, Piece::Pawn, Piece::None, move_type::QUIET));
            }
            for to in single & Bitboard::RANK_1 {
                for kind in PROMOTION_KINDS {
                    push(Move::new(to + 8, to, Piece::Pawn, Piece::None, kind));
                }
            }
            for to in (single & Bitboard::RANK_6).south() & !all {
                push(Move::new(to + 16, to, Piece::Pawn, Piece::None, move_type::DOUBLE_PAWN_PUSH));
            }
            for (caps, delta) in [(pawns.south_west() & their, 9), (pawns.south_east() & their, 7)] {
                for to in caps & !Bitboard::RANK_1 {
                    push(Move::new(to + delta, to, Piece::Pawn, pos.type_on_square(to), move_type::CAPTURE));
                }
                for to in caps & Bitboard::RANK_1 {
                    for kind in PROMOTION_KINDS {
                        push(Move::new(
                            to + delta,
                            to,
                            Piece::Pawn,
                            pos.type_on_square(to),
                            kind | move_type::CAPTURE_BIT,
                        ));
                    }
                }
            }
            if pos.ep_square() != 0 {
                let target = pos.ep_square() - 8;
                for from in WHITE_PAWN_ATTACKS[target as usize] & pawns {
                    push(Move::new(from, target, Piece::Pawn, Piece::Pawn, move_type::EP_CAPTURE));
                }
            }
        }
    }

    for piece in [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen, Piece::King] {
        for from in pos.pieces(piece) & our {
            let att = piece_attacks(piece, from, all);
            for to in att & !all {
                push(Move::new(from, to, piece, Piece::None, move_type::QUIET));
            }
            for to in att & their {
                push(Move::new(from, to, piece, pos.type_on_square(to), move_type::CAPTURE));
            }
        }
    }

    drop(push);
    n + generate_castles(pos, &mut buf[n..])
}

/// Castling moves. The king's path (including the start square) must be free
/// of enemy attacks and the squares between king and rook empty.
fn generate_castles(pos: &Position, buf: &mut [EvaledMove]) -> usize {
    let us = pos.side_to_move();
    let all = pos.all_occupancy();
    let flags = pos.castle_flags();
    let mut n = 0;

    let empty = |squares: &[Square]| squares.iter().all(|&sq| !all.contains(sq));
    let safe = |squares: &[Square]| squares.iter().all(|&sq| !pos.is_square_attacked(sq, !us));

    match us {
        Color::White => {
            if flags & WHITE_KING_SIDE_LOST == 0 && empty(&[F1, G1]) && safe(&[E1, F1, G1]) {
                buf[n] = EvaledMove::new(Move::WHITE_KING_CASTLE);
                n += 1;
            }
            if flags & WHITE_QUEEN_SIDE_LOST == 0 && empty(&[B1, C1, D1]) && safe(&[E1, D1, C1]) {
                buf[n] = EvaledMove::new(Move::WHITE_QUEEN_CASTLE);
                n += 1;
            }
        }
        Color::Black => {
            if flags & BLACK_KING_SIDE_LOST == 0 && empty(&[F8, G8]) && safe(&[E8, F8, G8]) {
                buf[n] = EvaledMove::new(Move::BLACK_KING_CASTLE);
                n += 1;
            }
            if flags & BLACK_QUEEN_SIDE_LOST == 0 && empty(&[B8, C8, D8]) && safe(&[E8, D8, C8]) {
                buf[n] = EvaledMove::new(Move::BLACK_QUEEN_CASTLE);
                n += 1;
            }
        }
    }
    n
}

/// Quiescence subset: captures (including en passant and capture
/// promotions to a queen) plus quiet queen promotions.
pub fn generate_all_captures(pos: &Position, buf: &mut [EvaledMove]) -> usize {
    debug_assert!(buf.len() >= MAX_MOVES);
    let us = pos.side_to_move();
    let our = pos.occupancy(us);
    let their = pos.occupancy(!us) & !pos.pieces(Piece::King);
    let all = our | pos.occupancy(!us);
    let pawns = pos.pieces(Piece::Pawn) & our;

    let mut n = 0;
    let mut push = |mv: Move| {
        buf[n] = EvaledMove::new(mv);
        n += 1;
    };

    match us {
        Color::White => {
            for to in pawns.north() & !all & Bitboard::RANK_8 {
                push(Move::new(to - 8, to, Piece::Pawn, Piece::None, move_type::QUEEN_PROMOTION));
            }
            for (caps, delta) in [(pawns.north_east() & their, 9), (pawns.north_west() & their, 7)] {
                for to in caps & !Bitboard::RANK_8 {
                    push(Move::new(to - delta, to, Piece::Pawn, pos.type_on_square(to), move_type::CAPTURE));
                }
                for to in caps & Bitboard::RANK_8 {
                    push(Move::new(
                        to - delta,
                        to,
                        Piece::Pawn,
                        pos.type_on_square(to),
                        move_type::QUEEN_CAPTURE_PROMOTION,
                    ));
                }
            }
            if pos.ep_square() != 0 {
                let target = pos.ep_square() + 8;
                for from in BLACK_PAWN_ATTACKS[target as usize] & pawns {
                    push(Move::new(from, target, Piece::Pawn, Piece::Pawn, move_type::EP_CAPTURE));
                }
            }
        }
        Color::Black => {
            for to in pawns.south() & !all & Bitboard::RANK_1 {
                push(Move::new(to + 8, to, Piece::Pawn, Piece::None, move_type::QUEEN_PROMOTION));
            }
            for (caps, delta) in [(pawns.south_west() & their, 9), (pawns.south_east() & their, 7)] {
                for to in caps & !Bitboard::RANK_1 {
                    push(Move::new(to + delta, to, Piece::Pawn, pos.type_on_square(to), move_type::CAPTURE));
                }
                for to in caps & Bitboard::RANK_1 {
                    push(Move::new(
                        to + delta,
                        to,
                        Piece::Pawn,
                        pos.type_on_square(to),
                        move_type::QUEEN_CAPTURE_PROMOTION,
                    ));
                }
            }
            if pos.ep_square() != 0 {
                let target = pos.ep_square() - 8;
                for from in WHITE_PAWN_ATTACKS[target as usize] & pawns {
                    push(Move::new(from, target, Piece::Pawn, Piece::Pawn, move_type::EP_CAPTURE));
                }
            }
        }
    }

    for piece in [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen, Piece::King] {
        for from in pos.pieces(piece) & our {
            for to in piece_attacks(piece, from, all) & their {
                push(Move::new(from, to, piece, pos.type_on_square(to), move_type::CAPTURE));
            }
        }
    }

    n
}

/// Could `mv` have been generated in this position? Validates an untrusted
/// move (typically from the transposition table) without generating the full
/// move list.
pub fn is_move_pseudo_legal(pos: &Position, mv: Move) -> bool {
    if mv == Move::NULL {
        return false;
    }
    let us = pos.side_to_move();
    let moved = mv.moved_piece();
    if moved == Piece::None {
        return false;
    }
    let from = mv.from();
    let to = mv.to();
    let our = pos.occupancy(us);
    let their = pos.occupancy(!us);
    let all = our | their;

    if !(pos.pieces(moved) & our).contains(from) {
        return false;
    }

    match mv.move_type() {
        move_type::QUIET => {
            if all.contains(to) {
                return false;
            }
            if moved == Piece::Pawn {
                match us {
                    Color::White => from + 8 == to && rank_of(to) != 7,
                    Color::Black => to + 8 == from && rank_of(to) != 0,
                }
            } else {
                piece_attacks(moved, from, all).contains(to)
            }
        }
        move_type::DOUBLE_PAWN_PUSH => {
            moved == Piece::Pawn
                && !all.contains(to)
                && match us {
                    Color::White => {
                        rank_of(from) == 1 && from + 16 == to && !all.contains(from + 8)
                    }
                    Color::Black => {
                        rank_of(from) == 6 && to + 16 == from && !all.contains(from - 8)
                    }
                }
        }
        move_type::CAPTURE => {
            let captured = mv.captured_piece();
            if captured == Piece::None
                || captured == Piece::King
                || !(pos.pieces(captured) & their).contains(to)
            {
                return false;
            }
            if moved == Piece::Pawn {
                let promo_rank = match us {
                    Color::White => 7,
                    Color::Black => 0,
                };
                pawn_attacks(us, from).contains(to) && rank_of(to) != promo_rank
            } else {
                piece_attacks(moved, from, all).contains(to)
            }
        }
        move_type::EP_CAPTURE => {
            if moved != Piece::Pawn || pos.ep_square() == 0 || mv.captured_piece() != Piece::Pawn {
                return false;
            }
            let target = match us {
                Color::White => pos.ep_square() + 8,
                Color::Black => pos.ep_square() - 8,
            };
            to == target && pawn_attacks(us, from).contains(to)
        }
        move_type::KING_CASTLE | move_type::QUEEN_CASTLE => {
            let mut buf = [EvaledMove::EMPTY; 4];
            let count = generate_castles(pos, &mut buf);
            buf[..count].iter().any(|em| em.mv == mv)
        }
        _ => {
            if !mv.is_promotion() || moved != Piece::Pawn {
                return false;
            }
            let (from_rank, to_rank) = match us {
                Color::White => (6, 7),
                Color::Black => (1, 0),
            };
            if rank_of(from) != from_rank || rank_of(to) != to_rank {
                return false;
            }
            if mv.is_capture() {
                let captured = mv.captured_piece();
                captured != Piece::None
                    && captured != Piece::King
                    && (pos.pieces(captured) & their).contains(to)
                    && pawn_attacks(us, from).contains(to)
            } else {
                let push_ok = match us {
                    Color::White => from + 8 == to,
                    Color::Black => to + 8 == from,
                };
                push_ok && !all.contains(to)
            }
        }
    }
}

/// Leaf-counting perft, the movegen correctness driver.
pub fn perft(pos: &Position, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let mut buf = [EvaledMove::EMPTY; MAX_MOVES];
    let count = generate_all_moves(pos, &mut buf);
    let mut child = Position::default();
    let mut nodes = 0;
    for em in &buf[..count] {
        if pos.make_move(em.mv, &mut child) {
            nodes += if depth == 1 { 1 } else { perft(&child, depth - 1) };
        }
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moves_of(pos: &Position) -> Vec<Move> {
        let mut buf = [EvaledMove::EMPTY; MAX_MOVES];
        let count = generate_all_moves(pos, &mut buf);
        buf[..count].iter().map(|em| em.mv).collect()
    }

    #[test]
    fn startpos_has_twenty_moves() {
        let pos = Position::startpos();
        assert_eq!(moves_of(&pos).len(), 20);
        assert_eq!(pos.generate_all_legal_moves().len(), 20);
    }

    #[test]
    fn castles_generated_only_with_clear_safe_path() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/R3K2R w KQ - 0 1").unwrap();
        let moves = moves_of(&pos);
        assert!(moves.contains(&Move::WHITE_KING_CASTLE));
        assert!(moves.contains(&Move::WHITE_QUEEN_CASTLE));

        // A rook on e8 pins the path; neither castle may appear.
        let attacked = Position::from_fen("4r1k1/8/8/8/8/8/8/R3K2R w KQ - 0 1").unwrap();
        let moves = moves_of(&attacked);
        assert!(!moves.contains(&Move::WHITE_KING_CASTLE));
        assert!(!moves.contains(&Move::WHITE_QUEEN_CASTLE));

        // A rook on g8 blocks only the king side.
        let g_file = Position::from_fen("6r1/4k3/8/8/8/8/8/R3K2R w KQ - 0 1").unwrap();
        let moves = moves_of(&g_file);
        assert!(!moves.contains(&Move::WHITE_KING_CASTLE));
        assert!(moves.contains(&Move::WHITE_QUEEN_CASTLE));
    }

    #[test]
    fn queen_side_castle_ignores_b1_attacks() {
        // b1 may be attacked; only e1, d1, c1 matter for the king's path.
        let pos = Position::from_fen("1r4k1/8/8/8/8/8/8/R3K3 w Q - 0 1").unwrap();
        assert!(moves_of(&pos).contains(&Move::WHITE_QUEEN_CASTLE));
    }

    #[test]
    fn captures_are_a_subset_of_all_moves() {
        let pos =
            Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq -")
                .unwrap();
        let all = moves_of(&pos);
        let mut buf = [EvaledMove::EMPTY; MAX_MOVES];
        let count = generate_all_captures(&pos, &mut buf);
        for em in &buf[..count] {
            assert!(em.mv.is_capture_or_promotion());
            assert!(all.contains(&em.mv), "{} missing from all moves", em.mv);
        }
    }

    #[test]
    fn pseudo_legal_accepts_generated_moves_only() {
        let pos =
            Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq -")
                .unwrap();
        for mv in moves_of(&pos) {
            assert!(is_move_pseudo_legal(&pos, mv), "{mv} rejected");
        }
        // Moves valid in other positions must be rejected here.
        let start_moves = moves_of(&Position::startpos());
        for mv in start_moves {
            if !moves_of(&pos).contains(&mv) {
                assert!(!is_move_pseudo_legal(&pos, mv), "{mv} wrongly accepted");
            }
        }
        assert!(!is_move_pseudo_legal(&pos, Move::NULL));
    }

    #[test]
    fn en_passant_both_directions() {
        let pos = Position::from_fen("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 2").unwrap();
        let moves = moves_of(&pos);
        let ep: Vec<_> = moves
            .iter()
            .filter(|m| m.move_type() == move_type::EP_CAPTURE)
            .collect();
        assert_eq!(ep.len(), 1);
        assert_eq!(ep[0].to_string(), "e5d6");
    }

    #[test]
    fn promotions_generate_all_four_pieces() {
        let pos = Position::from_fen("4k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let promos: Vec<_> = moves_of(&pos).into_iter().filter(|m| m.is_promotion()).collect();
        assert_eq!(promos.len(), 4);
    }
}
