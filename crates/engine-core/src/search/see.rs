//! Static exchange evaluation.
//!
//! Simulates the capture exchange on the destination square under the
//! least-valuable-attacker rule, revealing X-rayed sliders as occupancy
//! shrinks. Non-normal moves (castles, promotions, en passant) pass a flat
//! exchange of zero rather than being simulated.

use crate::board::attacks::{bishop_attacks, rook_attacks};
use crate::board::{Bitboard, Piece, Position};
use crate::movegen::types::move_type;
use crate::movegen::Move;

/// Exchange values per piece kind. The king's value only matters as "no
/// recapture can win it back".
const SEE_VALUES: [i32; 7] = [0, 100, 325, 335, 500, 975, 20_000];

#[inline]
pub fn piece_value(piece: Piece) -> i32 {
    SEE_VALUES[piece.index()]
}

/// Does the exchange started by `mv` net at least `threshold` centipawns?
/// Monotone in `threshold`: a true result at `t` implies true at all
/// `t' <= t`.
pub fn see_above(pos: &Position, mv: Move, threshold: i32) -> bool {
    if !matches!(
        mv.move_type(),
        move_type::QUIET | move_type::DOUBLE_PAWN_PUSH | move_type::CAPTURE
    ) {
        return 0 >= threshold;
    }

    let from = mv.from();
    let to = mv.to();

    // Best case: the opponent never recaptures.
    let mut swap = piece_value(mv.captured_piece()) - threshold;
    if swap < 0 {
        return false;
    }

    // Worst case: our piece is taken for free.
    swap = piece_value(mv.moved_piece()) - swap;
    if swap <= 0 {
        return true;
    }

    let mut occ = pos.all_occupancy() ^ Bitboard::from_square(from) | Bitboard::from_square(to);
    let mut stm = pos.side_to_move();
    let mut attackers = pos.attackers_to(to, occ);
    let mut res = true;

    let bishops_queens = pos.pieces(Piece::Bishop) | pos.pieces(Piece::Queen);
    let rooks_queens = pos.pieces(Piece::Rook) | pos.pieces(Piece::Queen);

    loop {
        stm = !stm;
        attackers &= occ;
        let stm_attackers = attackers & pos.occupancy(stm);
        if stm_attackers.is_empty() {
            break;
        }
        res = !res;

        // Capture with the least valuable attacker; sliders moving off the
        // square may reveal an X-ray attacker behind them.
        let mut captured = Piece::None;
        for piece in [Piece::Pawn, Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen] {
            let bb = stm_attackers & pos.pieces(piece);
            if bb.any() {
                captured = piece;
                occ ^= Bitboard::from_square(bb.lsb());
                match piece {
                    Piece::Pawn | Piece::Bishop => {
                        attackers |= bishop_attacks(to, occ) & bishops_queens;
                    }
                    Piece::Rook => {
                        attackers |= rook_attacks(to, occ) & rooks_queens;
                    }
                    Piece::Queen => {
                        attackers |= (bishop_attacks(to, occ) & bishops_queens)
                            | (rook_attacks(to, occ) & rooks_queens);
                    }
                    _ => {}
                }
                break;
            }
        }

        if captured == Piece::None {
            // Only the king can take. That loses it unless the opponent has
            // no attacker left to answer with.
            return if (attackers & !pos.occupancy(stm)).any() { !res } else { res };
        }

        swap = piece_value(captured) - swap;
        if swap < if res { 1 } else { 0 } {
            break;
        }
    }
    res
}

/// Does the exchange at least break even?
#[inline]
pub fn see_sign(pos: &Position, mv: Move) -> bool {
    see_above(pos, mv, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movegen::{generate_all_moves, EvaledMove, MAX_MOVES};

    fn find_move(pos: &Position, lan: &str) -> Move {
        let mut buf = [EvaledMove::EMPTY; MAX_MOVES];
        let count = generate_all_moves(pos, &mut buf);
        buf[..count]
            .iter()
            .map(|em| em.mv)
            .find(|mv| mv.to_string() == lan)
            .unwrap_or_else(|| panic!("{lan} not generated"))
    }

    #[test]
    fn winning_capture_is_positive() {
        // Pawn takes an undefended rook.
        let pos = Position::from_fen("4k3/8/8/3r4/4P3/8/8/4K3 w - - 0 1").unwrap();
        let mv = find_move(&pos, "e4d5");
        assert!(see_sign(&pos, mv));
        assert!(see_above(&pos, mv, 400));
        assert!(!see_above(&pos, mv, 600));
    }

    #[test]
    fn defended_pawn_loses_the_queen() {
        let pos = Position::from_fen("4k3/8/2p5/3p4/8/8/3Q4/4K3 w - - 0 1").unwrap();
        let mv = find_move(&pos, "d2d5");
        assert!(!see_sign(&pos, mv));
        // The losing exchange still clears a deeply negative threshold.
        assert!(see_above(&pos, mv, -900));
    }

    #[test]
    fn xray_recapture_is_seen() {
        // Rxe5 looks safe until the battery behind the black rook answers.
        let pos = Position::from_fen("4k3/4r3/8/4p3/8/8/4R3/4K3 w - - 0 1").unwrap();
        let mv = find_move(&pos, "e2e5");
        assert!(!see_sign(&pos, mv));
        // With our own battery the exchange holds.
        let pos = Position::from_fen("4k3/4r3/8/4p3/8/8/4R3/4RK2 w - - 0 1").unwrap();
        let mv = find_move(&pos, "e2e5");
        assert!(see_sign(&pos, mv));
    }

    #[test]
    fn quiet_move_en_prise_fails_zero() {
        // A quiet rook move onto a defended square loses the rook.
        let pos = Position::from_fen("4k3/8/8/3p4/8/8/4R3/4K3 w - - 0 1").unwrap();
        let mv = find_move(&pos, "e2e4");
        assert!(!see_sign(&pos, mv));
        let safe = find_move(&pos, "e2e3");
        assert!(see_sign(&pos, safe));
    }

    #[test]
    fn monotone_in_threshold() {
        let pos =
            Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq -")
                .unwrap();
        let mut buf = [EvaledMove::EMPTY; MAX_MOVES];
        let count = generate_all_moves(&pos, &mut buf);
        for em in &buf[..count] {
            let mut last = true;
            for t in [-900, -300, -100, 0, 100, 300, 900] {
                let now = see_above(&pos, em.mv, t);
                // Once false at a low threshold it may never be true higher.
                assert!(!(now && !last), "{} not monotone at {t}", em.mv);
                last = now;
            }
        }
    }
}
