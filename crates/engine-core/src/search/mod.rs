//! Adversarial search: alpha-beta core, move ordering, transposition table,
//! aspiration-window root driver and time management.

pub mod alpha_beta;
pub mod limits;
pub mod ordering;
pub mod root;
pub mod see;
pub mod time_manager;
pub mod tt;

use smallvec::SmallVec;

use crate::board::Position;
use crate::movegen::Move;

/// Maximum search ply; the stack holds one extra entry for the root.
pub const MAX_HEIGHT: usize = 127;
pub const STACK_SIZE: usize = MAX_HEIGHT + 1;

pub const MATE: i32 = 32_000;
pub const VALUE_WIN: i32 = MATE - 150;
pub const VALUE_LOSS: i32 = -VALUE_WIN;

/// Mated at `height` plies from the root.
#[inline]
pub fn loss_in(height: usize) -> i32 {
    -MATE + height as i32
}

/// Distance to mate in plies for a score outside the win/loss bands.
#[inline]
pub fn depth_to_mate(val: i32) -> i32 {
    if val >= VALUE_WIN {
        MATE - val
    } else {
        val - MATE
    }
}

/// Score for drawn positions.
#[inline]
pub fn contempt(_pos: &Position) -> i32 {
    0
}

/// Score as reported over UCI: either a mate distance in moves or
/// centipawns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UciScore {
    Mate(i32),
    Centipawn(i32),
}

impl UciScore {
    pub fn new(score: i32) -> UciScore {
        if score >= VALUE_WIN {
            UciScore::Mate((MATE - score + 1) / 2)
        } else if score <= VALUE_LOSS {
            UciScore::Mate((-MATE - score) / 2)
        } else {
            UciScore::Centipawn(score)
        }
    }
}

/// Incremental report published after each accepted iteration.
#[derive(Debug, Clone)]
pub struct SearchInfo {
    pub score: UciScore,
    pub depth: i32,
    pub nodes: u64,
    pub moves: SmallVec<[Move; 64]>,
}

/// Callback receiving `SearchInfo` updates during the search.
pub type InfoCallback = Box<dyn Fn(&SearchInfo) + Send>;
