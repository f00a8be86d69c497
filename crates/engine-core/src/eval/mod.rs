//! Static evaluation.
//!
//! Tapered material and piece-square terms plus a pawn-structure term cached
//! in the shared pawn-king table. The search treats this function as opaque:
//! all it relies on is the centipawn scale (pawn ≈ 100) and the
//! side-to-move sign convention.

pub mod pawn_king;

pub use pawn_king::PawnKingTable;

use crate::board::{file_of, rank_of, Bitboard, Color, Piece, Position, Square};

/// Middlegame pawn value, shared with the search's futility margin.
pub const PAWN_VALUE_MIDDLE: i32 = 100;

const MG_VALUES: [i32; 7] = [0, 100, 325, 335, 500, 975, 0];
const EG_VALUES: [i32; 7] = [0, 120, 305, 315, 520, 950, 0];

/// Game phase weight per piece kind; the full set of minors and majors on
/// both sides sums to MAX_PHASE.
const PHASE_WEIGHTS: [i32; 7] = [0, 0, 10, 10, 22, 44, 0];
const MAX_PHASE: i32 = 256;

const TEMPO: i32 = 10;

// Piece-square tables, white's point of view, a1 = index 0.
#[rustfmt::skip]
const PAWN_PST: [i32; 64] = [
      0,   0,   0,   0,   0,   0,   0,   0,
     -4,   2,   4, -12, -12,   4,   2,  -4,
     -4,   2,   8,   2,   2,   8,   2,  -4,
     -4,   4,  12,  20,  20,  12,   4,  -4,
      0,   8,  16,  24,  24,  16,   8,   0,
     10,  16,  24,  32,  32,  24,  16,  10,
     28,  34,  42,  48,  48,  42,  34,  28,
      0,   0,   0,   0,   0,   0,   0,   0,
];

#[rustfmt::skip]
const KNIGHT_PST: [i32; 64] = [
    -50, -30, -20, -15, -15, -20, -30, -50,
    -30, -10,   0,   5,   5,   0, -10, -30,
    -20,   5,  10,  15,  15,  10,   5, -20,
    -15,   5,  15,  20,  20,  15,   5, -15,
    -15,   5,  15,  20,  20,  15,   5, -15,
    -20,   5,  10,  15,  15,  10,   5, -20,
    -30, -10,   0,   5,   5,   0, -10, -30,
    -50, -30, -20, -15, -15, -20, -30, -50,
];

#[rustfmt::skip]
const BISHOP_PST: [i32; 64] = [
    -15, -10, -10, -10, -10, -10, -10, -15,
    -10,   5,   0,   0,   0,   0,   5, -10,
    -10,  10,  10,  10,  10,  10,  10, -10,
    -10,   0,  10,  10,  10,  10,   0, -10,
    -10,   5,   5,  10,  10,   5,   5, -10,
    -10,   0,   5,  10,  10,   5,   0, -10,
    -10,   0,   0,   0,   0,   0,   0, -10,
    -15, -10, -10, -10, -10, -10, -10, -15,
];

#[rustfmt::skip]
const ROOK_PST: [i32; 64] = [
      0,   0,   2,   6,   6,   2,   0,   0,
     -4,   0,   0,   2,   2,   0,   0,  -4,
     -4,   0,   0,   2,   2,   0,   0,  -4,
     -4,   0,   0,   2,   2,   0,   0,  -4,
     -4,   0,   0,   2,   2,   0,   0,  -4,
     -4,   0,   0,   2,   2,   0,   0,  -4,
     10,  14,  14,  14,  14,  14,  14,  10,
      2,   2,   2,   2,   2,   2,   2,   2,
];

#[rustfmt::skip]
const QUEEN_PST: [i32; 64] = [
    -20, -10, -10,  -5,  -5, -10, -10, -20,
    -10,   0,   5,   0,   0,   0,   0, -10,
    -10,   5,   5,   5,   5,   5,   0, -10,
     -5,   0,   5,   5,   5,   5,   0,  -5,
     -5,   0,   5,   5,   5,   5,   0,  -5,
    -10,   0,   5,   5,   5,   5,   0, -10,
    -10,   0,   0,   0,   0,   0,   0, -10,
    -20, -10, -10,  -5,  -5, -10, -10, -20,
];

#[rustfmt::skip]
const KING_PST_MG: [i32; 64] = [
     20,  30,  10,   0,   0,  10,  30,  20,
     20,  20,   0,   0,   0,   0,  20,  20,
    -10, -20, -20, -20, -20, -20, -20, -10,
    -20, -30, -30, -40, -40, -30, -30, -20,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
];

#[rustfmt::skip]
const KING_PST_EG: [i32; 64] = [
    -50, -30, -30, -30, -30, -30, -30, -50,
    -30, -10,   0,   0,   0,   0, -10, -30,
    -30,   0,  20,  30,  30,  20,   0, -30,
    -30,   0,  30,  40,  40,  30,   0, -30,
    -30,   0,  30,  40,  40,  30,   0, -30,
    -30,   0,  20,  30,  30,  20,   0, -30,
    -30, -10,   0,   0,   0,   0, -10, -30,
    -50, -30, -30, -30, -30, -30, -30, -50,
];

const DOUBLED_PAWN: i32 = -12;
const ISOLATED_PAWN: i32 = -14;
/// Passed-pawn bonus by relative rank.
const PASSED_PAWN: [i32; 8] = [0, 8, 12, 20, 36, 60, 100, 0];

const CONNECTED_ROOKS_MG: i32 = 25;
const CONNECTED_ROOKS_EG: i32 = 20;

#[inline]
fn relative_square(color: Color, sq: Square) -> usize {
    match color {
        Color::White => sq as usize,
        Color::Black => (sq ^ 56) as usize,
    }
}

/// No non-pawn material beyond the king for the side to move. Blocks
/// null-move pruning, where zugzwang breaks the null-move assumption.
pub fn is_late_end_game(pos: &Position) -> bool {
    let minors_and_majors = pos.pieces(Piece::Knight)
        | pos.pieces(Piece::Bishop)
        | pos.pieces(Piece::Rook)
        | pos.pieces(Piece::Queen);
    (minors_and_majors & pos.occupancy(pos.side_to_move())).is_empty()
}

/// File masks adjacent to `file`, for isolation tests.
fn adjacent_files(file: u8) -> Bitboard {
    let file_bb = Bitboard(Bitboard::FILE_A.0 << file);
    file_bb.east() | file_bb.west()
}

fn file_bb(file: u8) -> Bitboard {
    Bitboard(Bitboard::FILE_A.0 << file)
}

/// Squares in front of `sq` (from `color`'s view) on its own and adjacent
/// files; a pawn is passed when no enemy pawn sits in this span.
fn passed_span(color: Color, sq: Square) -> Bitboard {
    let file = file_of(sq);
    let span_files = file_bb(file) | adjacent_files(file);
    let rank = rank_of(sq) as u32;
    match color {
        Color::White => span_files & Bitboard((!0u64).checked_shl(8 * (rank + 1)).unwrap_or(0)),
        Color::Black => span_files & Bitboard(!(!0u64 << (8 * rank))),
    }
}

/// Two rooks defending each other along an unobstructed rank or file.
fn connected_rooks(pos: &Position, color: Color) -> bool {
    let rooks = pos.pieces(Piece::Rook) & pos.occupancy(color);
    if !rooks.more_than_one() {
        return false;
    }
    let occ = pos.all_occupancy();
    let first = rooks.lsb();
    (crate::board::attacks::rook_attacks(first, occ) & rooks).any()
}

/// Pawn structure from white's point of view, independent of the side to
/// move so it can be cached by pawn key alone.
fn pawn_structure(pos: &Position) -> i32 {
    let mut score = 0;
    for color in [Color::White, Color::Black] {
        let own = pos.pieces(Piece::Pawn) & pos.occupancy(color);
        let their = pos.pieces(Piece::Pawn) & pos.occupancy(!color);
        let mut side_score = 0;
        for sq in own {
            let file = file_of(sq);
            if (file_bb(file) & own).more_than_one() {
                side_score += DOUBLED_PAWN;
            }
            if (adjacent_files(file) & own).is_empty() {
                side_score += ISOLATED_PAWN;
            }
            if (passed_span(color, sq) & their).is_empty() {
                let rel_rank = match color {
                    Color::White => rank_of(sq),
                    Color::Black => 7 - rank_of(sq),
                };
                side_score += PASSED_PAWN[rel_rank as usize];
            }
        }
        score += match color {
            Color::White => side_score,
            Color::Black => -side_score,
        };
    }
    score
}

/// Static evaluation in centipawns, positive for the side to move.
pub fn evaluate(pos: &Position, pawn_king: &PawnKingTable) -> i32 {
    let mut mg = 0;
    let mut eg = 0;
    let mut phase = 0;

    for color in [Color::White, Color::Black] {
        let sign = match color {
            Color::White => 1,
            Color::Black => -1,
        };
        let own = pos.occupancy(color);
        for (piece, pst) in [
            (Piece::Pawn, &PAWN_PST),
            (Piece::Knight, &KNIGHT_PST),
            (Piece::Bishop, &BISHOP_PST),
            (Piece::Rook, &ROOK_PST),
            (Piece::Queen, &QUEEN_PST),
        ] {
            for sq in pos.pieces(piece) & own {
                let idx = piece.index();
                let psq = pst[relative_square(color, sq)];
                mg += sign * (MG_VALUES[idx] + psq);
                eg += sign * (EG_VALUES[idx] + psq);
                phase += PHASE_WEIGHTS[idx];
            }
        }
        let ksq = pos.king_square(color);
        mg += sign * KING_PST_MG[relative_square(color, ksq)];
        eg += sign * KING_PST_EG[relative_square(color, ksq)];

        if connected_rooks(pos, color) {
            mg += sign * CONNECTED_ROOKS_MG;
            eg += sign * CONNECTED_ROOKS_EG;
        }
    }

    let pawns = match pawn_king.get(pos.pawn_key()) {
        Some(cached) => cached,
        None => {
            let computed = pawn_structure(pos);
            pawn_king.set(pos.pawn_key(), computed);
            computed
        }
    };

    let phase = phase.min(MAX_PHASE);
    let mut score = (mg * phase + eg * (MAX_PHASE - phase)) / MAX_PHASE + pawns;
    if pos.side_to_move() == Color::Black {
        score = -score;
    }
    score + TEMPO
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PawnKingTable {
        PawnKingTable::new(1)
    }

    #[test]
    fn startpos_is_balanced() {
        let pos = Position::startpos();
        let pk = table();
        let score = evaluate(&pos, &pk);
        // Symmetric position: only tempo remains.
        assert_eq!(score, TEMPO);
        // And the black side sees the mirror image.
        let black = pos.make_move_lan("e2e4").unwrap().make_move_lan("e7e5").unwrap();
        let after = evaluate(&black, &pk);
        assert_eq!(after, TEMPO);
    }

    #[test]
    fn extra_queen_dominates() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/3QK3 w - - 0 1").unwrap();
        let pk = table();
        assert!(evaluate(&pos, &pk) > 800);
        let flipped = Position::from_fen("4k3/8/8/8/8/8/8/3QK3 b - - 0 1").unwrap();
        assert!(evaluate(&flipped, &pk) < -800);
    }

    #[test]
    fn passed_pawn_outranks_blocked_pawn() {
        let passed = Position::from_fen("4k3/8/8/8/3P4/8/8/4K3 w - - 0 1").unwrap();
        let blocked = Position::from_fen("4k3/8/8/3p4/3P4/8/8/4K3 w - - 0 1").unwrap();
        let pk = table();
        assert!(evaluate(&passed, &pk) > evaluate(&blocked, &pk));
    }

    #[test]
    fn pawn_cache_round_trips() {
        let pos = Position::from_fen("4k3/pp6/8/8/8/8/PPP5/4K3 w - - 0 1").unwrap();
        let pk = table();
        let first = evaluate(&pos, &pk);
        assert_eq!(pk.get(pos.pawn_key()), Some(pawn_structure(&pos)));
        assert_eq!(evaluate(&pos, &pk), first);
    }

    #[test]
    fn connected_rooks_detected_through_open_lines() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/R4RK1 w - - 0 1").unwrap();
        assert!(connected_rooks(&pos, Color::White));
        // A piece in between breaks the connection.
        let blocked = Position::from_fen("4k3/8/8/8/8/8/8/R2N1RK1 w - - 0 1").unwrap();
        assert!(!connected_rooks(&blocked, Color::White));
        assert!(!connected_rooks(&pos, Color::Black));
    }

    #[test]
    fn late_end_game_detection() {
        let kpk = Position::from_fen("4k3/8/4K3/4P3/8/8/8/8 w - - 0 1").unwrap();
        assert!(is_late_end_game(&kpk));
        let with_rook = Position::from_fen("4k3/8/4K3/4P3/8/8/8/7R w - - 0 1").unwrap();
        assert!(!is_late_end_game(&with_rook));
        // Only the side to move matters.
        let their_rook = Position::from_fen("4k3/7r/4K3/4P3/8/8/8/8 w - - 0 1").unwrap();
        assert!(is_late_end_game(&their_rook));
    }
}
