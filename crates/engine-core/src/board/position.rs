//! Position representation and copy-make move execution.
//!
//! A position is a plain value: making a move copies the parent into the
//! caller's child slot and mutates it there, XOR-updating the Zobrist keys
//! incrementally. There is no unmake.

use super::attacks::{
    bishop_attacks, king_attacks, knight_attacks, pawn_attacks, rook_attacks,
};
use super::bitboard::Bitboard;
use super::zobrist::{castle_key, compute_key, compute_pawn_key, ep_key, piece_key, side_key};
use super::{Color, Piece, Square, A1, A8, D1, D8, F1, F8, H1, H8};
use crate::movegen::types::{move_type, EvaledMove, Move};
use crate::movegen::{generate_all_moves, MAX_MOVES};

/// A set castling bit means that right has been LOST.
pub const WHITE_KING_SIDE_LOST: u8 = 1;
pub const WHITE_QUEEN_SIDE_LOST: u8 = 2;
pub const BLACK_KING_SIDE_LOST: u8 = 4;
pub const BLACK_QUEEN_SIDE_LOST: u8 = 8;
pub const ALL_CASTLING_LOST: u8 = 15;

/// Castling right lost when a rook moves off or is captured on this square.
const ROOK_CASTLE_FLAGS: [u8; 64] = {
    let mut table = [0u8; 64];
    table[A1 as usize] = WHITE_QUEEN_SIDE_LOST;
    table[H1 as usize] = WHITE_KING_SIDE_LOST;
    table[A8 as usize] = BLACK_QUEEN_SIDE_LOST;
    table[H8 as usize] = BLACK_KING_SIDE_LOST;
    table
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pieces: [Bitboard; 7],
    colors: [Bitboard; 2],
    flags: u8,
    /// 0 when none; otherwise the square a pawn just double-pushed TO.
    ep_square: Square,
    side: Color,
    fifty: u16,
    last_move: Move,
    key: u64,
    pawn_key: u64,
}

impl Position {
    /// The standard initial position.
    pub fn startpos() -> Position {
        let mut pos = Position {
            pieces: [
                Bitboard::EMPTY,
                Bitboard(0x00ff_0000_0000_ff00), // pawns
                Bitboard(0x4200_0000_0000_0042), // knights
                Bitboard(0x2400_0000_0000_0024), // bishops
                Bitboard(0x8100_0000_0000_0081), // rooks
                Bitboard(0x0800_0000_0000_0008), // queens
                Bitboard(0x1000_0000_0000_0010), // kings
            ],
            colors: [Bitboard(0xffff), Bitboard(0xffff_0000_0000_0000)],
            flags: 0,
            ep_square: 0,
            side: Color::White,
            fifty: 0,
            last_move: Move::NULL,
            key: 0,
            pawn_key: 0,
        };
        pos.rehash();
        pos
    }

    /// Recompute both keys from scratch. Used after board setup; during play
    /// the keys are maintained incrementally.
    pub(super) fn rehash(&mut self) {
        self.key = compute_key(self);
        self.pawn_key = compute_pawn_key(self);
    }

    #[inline]
    pub fn pieces(&self, piece: Piece) -> Bitboard {
        self.pieces[piece.index()]
    }

    #[inline]
    pub fn occupancy(&self, color: Color) -> Bitboard {
        self.colors[color.index()]
    }

    #[inline]
    pub fn all_occupancy(&self) -> Bitboard {
        self.colors[0] | self.colors[1]
    }

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.side
    }

    #[inline]
    pub fn castle_flags(&self) -> u8 {
        self.flags
    }

    #[inline]
    pub fn ep_square(&self) -> Square {
        self.ep_square
    }

    #[inline]
    pub fn fifty_move(&self) -> u16 {
        self.fifty
    }

    #[inline]
    pub fn last_move(&self) -> Move {
        self.last_move
    }

    #[inline]
    pub fn key(&self) -> u64 {
        self.key
    }

    #[inline]
    pub fn pawn_key(&self) -> u64 {
        self.pawn_key
    }

    #[inline]
    pub fn king_square(&self, color: Color) -> Square {
        (self.pieces(Piece::King) & self.occupancy(color)).lsb()
    }

    pub fn type_on_square(&self, sq: Square) -> Piece {
        let bb = Bitboard::from_square(sq);
        for piece in [Piece::Pawn, Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen, Piece::King] {
            if (self.pieces(piece) & bb).any() {
                return piece;
            }
        }
        Piece::None
    }

    /// Used by FEN setup only; keys must be rebuilt with `rehash` afterwards.
    pub(super) fn put_piece(&mut self, piece: Piece, color: Color, sq: Square) {
        let bb = Bitboard::from_square(sq);
        self.pieces[piece.index()] |= bb;
        self.colors[color.index()] |= bb;
    }

    pub(super) fn set_state(&mut self, side: Color, flags: u8, ep_square: Square, fifty: u16) {
        self.side = side;
        self.flags = flags;
        self.ep_square = ep_square;
        self.fifty = fifty;
    }

    pub(crate) fn empty() -> Position {
        Position {
            pieces: [Bitboard::EMPTY; 7],
            colors: [Bitboard::EMPTY; 2],
            flags: 0,
            ep_square: 0,
            side: Color::White,
            fifty: 0,
            last_move: Move::NULL,
            key: 0,
            pawn_key: 0,
        }
    }

    /// Shift a piece between squares, updating keys and castling flags.
    fn move_piece(&mut self, piece: Piece, color: Color, from: Square, to: Square) {
        let b = Bitboard::from_square(from) ^ Bitboard::from_square(to);
        self.colors[color.index()] ^= b;
        self.pieces[piece.index()] ^= b;
        let delta = piece_key(piece, color, from) ^ piece_key(piece, color, to);
        self.key ^= delta;
        match piece {
            Piece::Pawn => self.pawn_key ^= delta,
            Piece::King => {
                self.pawn_key ^= delta;
                self.flags |= match color {
                    Color::White => WHITE_KING_SIDE_LOST | WHITE_QUEEN_SIDE_LOST,
                    Color::Black => BLACK_KING_SIDE_LOST | BLACK_QUEEN_SIDE_LOST,
                };
            }
            Piece::Rook => self.flags |= ROOK_CASTLE_FLAGS[from as usize],
            _ => {}
        }
    }

    /// Add or remove a single piece, updating keys and castling flags.
    fn toggle_piece(&mut self, piece: Piece, color: Color, sq: Square) {
        let b = Bitboard::from_square(sq);
        self.colors[color.index()] ^= b;
        self.pieces[piece.index()] ^= b;
        let delta = piece_key(piece, color, sq);
        self.key ^= delta;
        match piece {
            Piece::Pawn | Piece::King => self.pawn_key ^= delta,
            Piece::Rook => self.flags |= ROOK_CASTLE_FLAGS[sq as usize],
            _ => {}
        }
    }

    /// The mutation shared by `make_move` and `make_legal_move`: everything
    /// except the legality test and the side/last-move finish.
    fn apply_move(&self, mv: Move, out: &mut Position) {
        *out = *self;
        out.key ^= side_key() ^ ep_key(self.ep_square) ^ castle_key(self.flags);
        out.pawn_key ^= side_key();
        out.fifty = self.fifty + 1;
        out.ep_square = 0;

        let side = self.side;
        let from = mv.from();
        let to = mv.to();

        match mv.move_type() {
            move_type::QUIET => {
                out.move_piece(mv.moved_piece(), side, from, to);
                if mv.moved_piece() == Piece::Pawn {
                    out.fifty = 0;
                }
            }
            move_type::DOUBLE_PAWN_PUSH => {
                out.move_piece(Piece::Pawn, side, from, to);
                out.fifty = 0;
                out.ep_square = to;
                out.key ^= ep_key(to);
            }
            move_type::CAPTURE => {
                out.fifty = 0;
                out.move_piece(mv.moved_piece(), side, from, to);
                out.toggle_piece(mv.captured_piece(), !side, to);
            }
            move_type::KING_CASTLE => {
                out.move_piece(Piece::King, side, from, to);
                match side {
                    Color::White => out.move_piece(Piece::Rook, side, H1, F1),
                    Color::Black => out.move_piece(Piece::Rook, side, H8, F8),
                }
            }
            move_type::QUEEN_CASTLE => {
                out.move_piece(Piece::King, side, from, to);
                match side {
                    Color::White => out.move_piece(Piece::Rook, side, A1, D1),
                    Color::Black => out.move_piece(Piece::Rook, side, A8, D8),
                }
            }
            move_type::EP_CAPTURE => {
                out.fifty = 0;
                out.move_piece(Piece::Pawn, side, from, to);
                out.toggle_piece(Piece::Pawn, !side, self.ep_square);
            }
            _ => {
                // Promotions, with or without capture.
                debug_assert!(mv.is_promotion());
                out.fifty = 0;
                out.toggle_piece(Piece::Pawn, side, from);
                if mv.is_capture() {
                    out.toggle_piece(mv.captured_piece(), !side, to);
                }
                out.toggle_piece(mv.promoted_piece(), side, to);
            }
        }

        out.key ^= castle_key(out.flags);
    }

    /// Copy-make `mv` into `out`. Returns false (and leaves `out` in an
    /// undefined state) when the move leaves the mover's king attacked.
    pub fn make_move(&self, mv: Move, out: &mut Position) -> bool {
        self.apply_move(mv, out);
        if out.is_in_check() {
            return false;
        }
        out.side = !self.side;
        out.last_move = mv;
        true
    }

    /// `make_move` without the legality test; the caller guarantees `mv` is
    /// legal (root moves come from `generate_all_legal_moves`).
    pub fn make_legal_move(&self, mv: Move, out: &mut Position) {
        self.apply_move(mv, out);
        out.side = !self.side;
        out.last_move = mv;
    }

    /// Flip the side to move without touching the board.
    pub fn make_null_move(&self, out: &mut Position) {
        *out = *self;
        out.side = !self.side;
        out.key ^= side_key() ^ ep_key(self.ep_square);
        out.pawn_key ^= side_key();
        out.fifty = self.fifty + 1;
        out.last_move = Move::NULL;
        out.ep_square = 0;
    }

    /// Is `sq` attacked by any piece of `by`?
    pub fn is_square_attacked(&self, sq: Square, by: Color) -> bool {
        let them = self.occupancy(by);
        if (pawn_attacks(!by, sq) & self.pieces(Piece::Pawn) & them).any() {
            return true;
        }
        if (knight_attacks(sq) & self.pieces(Piece::Knight) & them).any() {
            return true;
        }
        if (king_attacks(sq) & self.pieces(Piece::King) & them).any() {
            return true;
        }
        let occ = self.all_occupancy();
        if (bishop_attacks(sq, occ) & (self.pieces(Piece::Bishop) | self.pieces(Piece::Queen)) & them).any() {
            return true;
        }
        (rook_attacks(sq, occ) & (self.pieces(Piece::Rook) | self.pieces(Piece::Queen)) & them).any()
    }

    #[inline]
    pub fn is_in_check(&self) -> bool {
        self.is_square_attacked(self.king_square(self.side), !self.side)
    }

    /// Every piece of either colour attacking `sq` under `occ`. Used by the
    /// static exchange evaluator, which peels occupancy as it swaps pieces.
    pub fn attackers_to(&self, sq: Square, occ: Bitboard) -> Bitboard {
        use super::attacks::{BLACK_PAWN_ATTACKS, WHITE_PAWN_ATTACKS};
        let pawns = self.pieces(Piece::Pawn);
        (BLACK_PAWN_ATTACKS[sq as usize] & pawns & self.colors[0])
            | (WHITE_PAWN_ATTACKS[sq as usize] & pawns & self.colors[1])
            | (knight_attacks(sq) & self.pieces(Piece::Knight))
            | (king_attacks(sq) & self.pieces(Piece::King))
            | (bishop_attacks(sq, occ) & (self.pieces(Piece::Bishop) | self.pieces(Piece::Queen)))
            | (rook_attacks(sq, occ) & (self.pieces(Piece::Rook) | self.pieces(Piece::Queen)))
    }

    /// Parse a long-algebraic move against this position. Returns the child
    /// position, or `None` when the string matches no legal move.
    pub fn make_move_lan(&self, lan: &str) -> Option<Position> {
        let mut buf = [EvaledMove::EMPTY; MAX_MOVES];
        let count = generate_all_moves(self, &mut buf);
        for em in &buf[..count] {
            if em.mv.to_string().eq_ignore_ascii_case(lan) {
                let mut child = Position::empty();
                if self.make_move(em.mv, &mut child) {
                    return Some(child);
                }
                return None;
            }
        }
        None
    }

    /// All legal moves: the pseudo-legal set filtered through `make_move`.
    pub fn generate_all_legal_moves(&self) -> Vec<EvaledMove> {
        let mut buf = [EvaledMove::EMPTY; MAX_MOVES];
        let count = generate_all_moves(self, &mut buf);
        let mut child = Position::empty();
        buf[..count]
            .iter()
            .copied()
            .filter(|em| self.make_move(em.mv, &mut child))
            .collect()
    }
}

/// The default position is an empty board used as a scratch slot; it is
/// always overwritten by `make_move` before being read.
impl Default for Position {
    fn default() -> Position {
        Position::empty()
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for rank in (0..8).rev() {
            for file in 0..8 {
                let sq = rank * 8 + file;
                let piece = self.type_on_square(sq);
                let mut c = piece.letter();
                if self.colors[0].contains(sq) {
                    c = c.to_ascii_uppercase();
                }
                write!(f, "{c}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::zobrist;

    #[test]
    fn startpos_counts() {
        let pos = Position::startpos();
        assert_eq!(pos.all_occupancy().count(), 32);
        assert_eq!(pos.pieces(Piece::Pawn).count(), 16);
        assert_eq!((pos.pieces(Piece::King) & pos.occupancy(Color::White)).count(), 1);
        assert_eq!(pos.castle_flags(), 0);
        assert_eq!(pos.side_to_move(), Color::White);
        assert!(!pos.is_in_check());
    }

    #[test]
    fn make_move_updates_keys_incrementally() {
        let pos = Position::startpos();
        let mut child = Position::empty();
        let next = pos.make_move_lan("e2e4").unwrap();
        assert_eq!(next.key(), zobrist::compute_key(&next));
        assert_eq!(next.pawn_key(), zobrist::compute_pawn_key(&next));
        // Double push records the destination as ep square.
        assert_eq!(next.ep_square(), crate::board::parse_square("e4").unwrap());

        // A quiet knight move clears it again.
        let next2 = next.make_move_lan("g8f6").unwrap();
        assert_eq!(next2.ep_square(), 0);
        assert_eq!(next2.key(), zobrist::compute_key(&next2));
        assert_eq!(next2.fifty_move(), 1);

        // Null move flips side and keeps keys consistent.
        next2.make_null_move(&mut child);
        assert_eq!(child.key(), zobrist::compute_key(&child));
        assert_eq!(child.fifty_move(), next2.fifty_move() + 1);
        assert_eq!(child.last_move(), Move::NULL);
    }

    #[test]
    fn castling_rights_are_lost_monotonically() {
        let pos = Position::startpos();
        let next = pos
            .make_move_lan("e2e4")
            .unwrap()
            .make_move_lan("e7e5")
            .unwrap()
            .make_move_lan("e1e2")
            .unwrap();
        assert_eq!(
            next.castle_flags() & (WHITE_KING_SIDE_LOST | WHITE_QUEEN_SIDE_LOST),
            WHITE_KING_SIDE_LOST | WHITE_QUEEN_SIDE_LOST
        );
        // Black is unaffected.
        assert_eq!(next.castle_flags() & (BLACK_KING_SIDE_LOST | BLACK_QUEEN_SIDE_LOST), 0);
    }

    #[test]
    fn illegal_move_is_rejected() {
        // 1.e4 e5 2.Bb5 then black may not play d7d6..d5 pinned scenarios;
        // simplest: moving a pinned piece. Set up via FEN in fen tests; here
        // check that moving into check fails.
        let pos = Position::startpos()
            .make_move_lan("e2e4")
            .unwrap()
            .make_move_lan("f7f5")
            .unwrap()
            .make_move_lan("d1h5")
            .unwrap();
        // Black king on e8 is in check from h5; g7g6 blocks, but h7h6 does not.
        assert!(pos.is_in_check());
        assert!(pos.make_move_lan("h7h6").is_none());
        assert!(pos.make_move_lan("g7g6").is_some());
    }

    #[test]
    fn legal_moves_equal_filtered_pseudo_legal() {
        let pos = Position::startpos().make_move_lan("e2e4").unwrap();
        let legal = pos.generate_all_legal_moves();
        let mut buf = [EvaledMove::EMPTY; MAX_MOVES];
        let count = generate_all_moves(&pos, &mut buf);
        let mut child = Position::empty();
        let filtered: Vec<Move> = buf[..count]
            .iter()
            .filter(|em| pos.make_move(em.mv, &mut child))
            .map(|em| em.mv)
            .collect();
        assert_eq!(legal.iter().map(|em| em.mv).collect::<Vec<_>>(), filtered);
    }

    #[test]
    fn en_passant_capture_removes_the_pushed_pawn() {
        let pos = Position::startpos()
            .make_move_lan("e2e4")
            .unwrap()
            .make_move_lan("a7a6")
            .unwrap()
            .make_move_lan("e4e5")
            .unwrap()
            .make_move_lan("d7d5")
            .unwrap();
        let after = pos.make_move_lan("e5d6").unwrap();
        let d5 = crate::board::parse_square("d5").unwrap();
        let d6 = crate::board::parse_square("d6").unwrap();
        assert_eq!(after.type_on_square(d5), Piece::None);
        assert_eq!(after.type_on_square(d6), Piece::Pawn);
        assert_eq!(after.key(), zobrist::compute_key(&after));
    }
}
