//! Precomputed attack tables.
//!
//! - Knight, king and pawn step tables are `const`-evaluated statics.
//! - Sliding attacks use magic bitboards: `(occ & mask) * magic >> (64 - bits)`
//!   indexes a dense per-square table, 12 bits for rooks and 9 for bishops.
//! - The magic multipliers are searched at first use with a fixed-seed
//!   xorshift64 generator, so the tables are identical on every run.

use std::sync::OnceLock;

use super::bitboard::Bitboard;
use super::{file_of, rank_of, Color, Square};

const ROOK_BITS: u32 = 12;
const BISHOP_BITS: u32 = 9;
const ROOK_SHIFT: u32 = 64 - ROOK_BITS;
const BISHOP_SHIFT: u32 = 64 - BISHOP_BITS;

/// Seed for the magic search. Any non-zero value that terminates works; this
/// one is fixed so the generated tables never change between runs.
const MAGIC_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

/// Knight jumps per square.
pub static KNIGHT_ATTACKS: [Bitboard; 64] = {
    let mut table = [Bitboard::EMPTY; 64];
    let mut sq = 0;
    while sq < 64 {
        let bb = 1u64 << sq;
        let mut att = 0u64;
        att |= (bb << 17) & Bitboard::NOT_FILE_A.0;
        att |= (bb << 15) & Bitboard::NOT_FILE_H.0;
        att |= (bb << 10) & Bitboard::NOT_FILE_AB.0;
        att |= (bb << 6) & Bitboard::NOT_FILE_GH.0;
        att |= (bb >> 6) & Bitboard::NOT_FILE_AB.0;
        att |= (bb >> 10) & Bitboard::NOT_FILE_GH.0;
        att |= (bb >> 15) & Bitboard::NOT_FILE_A.0;
        att |= (bb >> 17) & Bitboard::NOT_FILE_H.0;
        table[sq] = Bitboard(att);
        sq += 1;
    }
    table
};

/// King steps per square.
pub static KING_ATTACKS: [Bitboard; 64] = {
    let mut table = [Bitboard::EMPTY; 64];
    let mut sq = 0;
    while sq < 64 {
        let bb = 1u64 << sq;
        let mut att = bb << 8 | bb >> 8;
        att |= (bb << 1 | bb << 9 | bb >> 7) & Bitboard::NOT_FILE_A.0;
        att |= (bb >> 1 | bb >> 9 | bb << 7) & Bitboard::NOT_FILE_H.0;
        table[sq] = Bitboard(att);
        sq += 1;
    }
    table
};

/// Squares a white pawn on `sq` attacks.
pub static WHITE_PAWN_ATTACKS: [Bitboard; 64] = {
    let mut table = [Bitboard::EMPTY; 64];
    let mut sq = 0;
    while sq < 64 {
        let bb = 1u64 << sq;
        table[sq] = Bitboard((bb << 9) & Bitboard::NOT_FILE_A.0 | (bb << 7) & Bitboard::NOT_FILE_H.0);
        sq += 1;
    }
    table
};

/// Squares a black pawn on `sq` attacks.
pub static BLACK_PAWN_ATTACKS: [Bitboard; 64] = {
    let mut table = [Bitboard::EMPTY; 64];
    let mut sq = 0;
    while sq < 64 {
        let bb = 1u64 << sq;
        table[sq] = Bitboard((bb >> 7) & Bitboard::NOT_FILE_A.0 | (bb >> 9) & Bitboard::NOT_FILE_H.0);
        sq += 1;
    }
    table
};

#[inline]
pub fn knight_attacks(sq: Square) -> Bitboard {
    KNIGHT_ATTACKS[sq as usize]
}

#[inline]
pub fn king_attacks(sq: Square) -> Bitboard {
    KING_ATTACKS[sq as usize]
}

#[inline]
pub fn pawn_attacks(color: Color, sq: Square) -> Bitboard {
    match color {
        Color::White => WHITE_PAWN_ATTACKS[sq as usize],
        Color::Black => BLACK_PAWN_ATTACKS[sq as usize],
    }
}

/// Rook attacks from `sq` under `occ`, via the magic tables.
#[inline]
pub fn rook_attacks(sq: Square, occ: Bitboard) -> Bitboard {
    let t = tables();
    let m = &t.rook_magics[sq as usize];
    let idx = (occ.0 & m.mask).wrapping_mul(m.magic) >> ROOK_SHIFT;
    Bitboard(t.rook[sq as usize][idx as usize])
}

/// Bishop attacks from `sq` under `occ`, via the magic tables.
#[inline]
pub fn bishop_attacks(sq: Square, occ: Bitboard) -> Bitboard {
    let t = tables();
    let m = &t.bishop_magics[sq as usize];
    let idx = (occ.0 & m.mask).wrapping_mul(m.magic) >> BISHOP_SHIFT;
    Bitboard(t.bishop[sq as usize][idx as usize])
}

#[inline]
pub fn queen_attacks(sq: Square, occ: Bitboard) -> Bitboard {
    rook_attacks(sq, occ) | bishop_attacks(sq, occ)
}

// =============================================================================
// Reference ray scans
// =============================================================================

const ROOK_DIRS: [(i8, i8); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];
const BISHOP_DIRS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

fn ray_attacks(sq: Square, occ: Bitboard, dirs: &[(i8, i8); 4]) -> Bitboard {
    let mut att = Bitboard::EMPTY;
    for &(df, dr) in dirs {
        let mut file = file_of(sq) as i8 + df;
        let mut rank = rank_of(sq) as i8 + dr;
        while (0..8).contains(&file) && (0..8).contains(&rank) {
            let s = (rank * 8 + file) as Square;
            att |= Bitboard::from_square(s);
            if occ.contains(s) {
                break;
            }
            file += df;
            rank += dr;
        }
    }
    att
}

/// Walking-ray rook attacks. Reference implementation: builds the magic
/// tables and backs the property test that the magic lookup agrees with it.
pub fn rook_attacks_slow(sq: Square, occ: Bitboard) -> Bitboard {
    ray_attacks(sq, occ, &ROOK_DIRS)
}

/// Walking-ray bishop attacks, see [`rook_attacks_slow`].
pub fn bishop_attacks_slow(sq: Square, occ: Bitboard) -> Bitboard {
    ray_attacks(sq, occ, &BISHOP_DIRS)
}

/// Blocker mask: ray squares from `sq` excluding board edges and `sq` itself.
pub fn blocker_mask(sq: Square, dirs: &[(i8, i8); 4]) -> Bitboard {
    let mut mask = Bitboard::EMPTY;
    for &(df, dr) in dirs {
        let mut file = file_of(sq) as i8 + df;
        let mut rank = rank_of(sq) as i8 + dr;
        // Stop one short of the edge in the walking direction.
        while (0..8).contains(&(file + df)) && (0..8).contains(&(rank + dr)) {
            mask |= Bitboard::from_square((rank * 8 + file) as Square);
            file += df;
            rank += dr;
        }
    }
    mask
}

pub fn rook_mask(sq: Square) -> Bitboard {
    blocker_mask(sq, &ROOK_DIRS)
}

pub fn bishop_mask(sq: Square) -> Bitboard {
    blocker_mask(sq, &BISHOP_DIRS)
}

/// All subsets of `mask`, carry-ripple enumeration. The empty subset is
/// always included.
pub fn subsets(mask: Bitboard) -> Vec<Bitboard> {
    let mut out = Vec::with_capacity(1 << mask.count());
    let mut sub = 0u64;
    loop {
        out.push(Bitboard(sub));
        sub = sub.wrapping_sub(mask.0) & mask.0;
        if sub == 0 {
            break;
        }
    }
    out
}

// =============================================================================
// Magic table construction
// =============================================================================

struct Magic {
    mask: u64,
    magic: u64,
}

struct AttackTables {
    rook_magics: [Magic; 64],
    bishop_magics: [Magic; 64],
    rook: Vec<[u64; 1 << ROOK_BITS]>,
    bishop: Vec<[u64; 1 << BISHOP_BITS]>,
}

static TABLES: OnceLock<AttackTables> = OnceLock::new();

fn tables() -> &'static AttackTables {
    TABLES.get_or_init(build_tables)
}

struct XorShift64(u64);

impl XorShift64 {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// Sparse candidate: AND of three draws, biased toward few set bits.
    fn sparse(&mut self) -> u64 {
        self.next() & self.next() & self.next()
    }
}

/// Search a multiplier that maps every occupancy subset to a slot holding its
/// attack set. Colliding slots are fine as long as the attack sets agree.
fn find_magic(occupancies: &[Bitboard], attacks: &[Bitboard], shift: u32, rng: &mut XorShift64) -> u64 {
    let table_len = 1usize << (64 - shift);
    let mut slots = vec![0u64; table_len];
    let mut epoch = vec![0u32; table_len];
    let mut generation = 0u32;
    loop {
        let magic = rng.sparse();
        generation += 1;
        let mut ok = true;
        for (occ, att) in occupancies.iter().zip(attacks) {
            let idx = (occ.0.wrapping_mul(magic) >> shift) as usize;
            if epoch[idx] != generation {
                epoch[idx] = generation;
                slots[idx] = att.0;
            } else if slots[idx] != att.0 {
                ok = false;
                break;
            }
        }
        if ok {
            return magic;
        }
    }
}

fn build_tables() -> AttackTables {
    let mut rng = XorShift64(MAGIC_SEED);

    let mut rook_magics = Vec::with_capacity(64);
    let mut rook = vec![[0u64; 1 << ROOK_BITS]; 64];
    for sq in 0..64u8 {
        let mask = rook_mask(sq);
        let occupancies = subsets(mask);
        let attacks: Vec<Bitboard> = occupancies.iter().map(|&occ| rook_attacks_slow(sq, occ)).collect();
        let magic = find_magic(&occupancies, &attacks, ROOK_SHIFT, &mut rng);
        for (occ, att) in occupancies.iter().zip(&attacks) {
            let idx = (occ.0.wrapping_mul(magic) >> ROOK_SHIFT) as usize;
            rook[sq as usize][idx] = att.0;
        }
        rook_magics.push(Magic { mask: mask.0, magic });
    }

    let mut bishop_magics = Vec::with_capacity(64);
    let mut bishop = vec![[0u64; 1 << BISHOP_BITS]; 64];
    for sq in 0..64u8 {
        let mask = bishop_mask(sq);
        let occupancies = subsets(mask);
        let attacks: Vec<Bitboard> = occupancies.iter().map(|&occ| bishop_attacks_slow(sq, occ)).collect();
        let magic = find_magic(&occupancies, &attacks, BISHOP_SHIFT, &mut rng);
        for (occ, att) in occupancies.iter().zip(&attacks) {
            let idx = (occ.0.wrapping_mul(magic) >> BISHOP_SHIFT) as usize;
            bishop[sq as usize][idx] = att.0;
        }
        bishop_magics.push(Magic { mask: mask.0, magic });
    }

    AttackTables {
        rook_magics: rook_magics.try_into().unwrap_or_else(|_| unreachable!()),
        bishop_magics: bishop_magics.try_into().unwrap_or_else(|_| unreachable!()),
        rook,
        bishop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{A1, E1, H1};

    #[test]
    fn knight_attacks_corner() {
        let att = knight_attacks(A1);
        assert_eq!(att.count(), 2);
        assert!(att.contains(17)); // b3
        assert!(att.contains(10)); // c2
    }

    #[test]
    fn king_attacks_edge() {
        assert_eq!(king_attacks(E1).count(), 5);
        assert_eq!(king_attacks(A1).count(), 3);
    }

    #[test]
    fn pawn_attacks_by_color() {
        assert_eq!(pawn_attacks(Color::White, 12), Bitboard::from_square(19) | Bitboard::from_square(21));
        assert_eq!(pawn_attacks(Color::Black, 52), Bitboard::from_square(43) | Bitboard::from_square(45));
        // Edge pawn attacks a single square.
        assert_eq!(pawn_attacks(Color::White, 8).count(), 1);
    }

    #[test]
    fn rook_mask_excludes_edges_and_square() {
        let mask = rook_mask(A1);
        assert_eq!(mask.count(), 12);
        assert!(!mask.contains(A1));
        assert!(!mask.contains(H1));
        assert!(!mask.contains(56)); // a8
    }

    #[test]
    fn bishop_mask_central_square() {
        // d4 sees 9 inner diagonal squares.
        assert_eq!(bishop_mask(27).count(), 9);
    }

    #[test]
    fn subsets_count_matches_mask_popcount() {
        let mask = rook_mask(E1);
        assert_eq!(subsets(mask).len(), 1 << mask.count());
    }

    #[test]
    fn magic_lookup_matches_ray_scan_spot_checks() {
        // Full coverage over every mask subset lives in the integration
        // tests; keep a quick sanity pass here.
        for sq in [0u8, 7, 27, 36, 56, 63] {
            let occ = Bitboard(0x00ff_0000_1234_5678);
            assert_eq!(rook_attacks(sq, occ), rook_attacks_slow(sq, occ));
            assert_eq!(bishop_attacks(sq, occ), bishop_attacks_slow(sq, occ));
        }
    }

    #[test]
    fn rook_attacks_stop_at_blockers() {
        let occ = Bitboard::from_square(E1) | Bitboard::from_square(12); // e2 blocker
        let att = rook_attacks(E1, occ);
        assert!(att.contains(12));
        assert!(!att.contains(20)); // e3 shadowed
        assert!(att.contains(A1));
        assert!(att.contains(H1));
    }
}
