//! Search limits as delivered by the UCI `go` command.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::board::Position;

/// UCI limits in protocol units (milliseconds for times). Zero means the
/// field was not given.
#[derive(Debug, Clone, Default)]
pub struct Limits {
    pub ponder: bool,
    pub infinite: bool,
    pub white_time: u64,
    pub black_time: u64,
    pub white_increment: u64,
    pub black_increment: u64,
    pub move_time: u64,
    pub moves_to_go: u32,
    pub depth: i32,
    pub nodes: u64,
    pub mate: i32,
    /// External cancellation: when set, the caller may stop the search by
    /// storing `true` here at any point.
    pub stop_flag: Option<Arc<AtomicBool>>,
}

impl Limits {
    pub fn depth(depth: i32) -> Limits {
        Limits { depth, ..Limits::default() }
    }

    pub fn move_time(ms: u64) -> Limits {
        Limits { move_time: ms, ..Limits::default() }
    }
}

/// A search request: the game history culminating in the position to search
/// (older positions feed repetition detection) plus the limits.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub positions: Vec<Position>,
    pub limits: Limits,
}

impl SearchParams {
    pub fn new(positions: Vec<Position>, limits: Limits) -> SearchParams {
        debug_assert!(!positions.is_empty());
        SearchParams { positions, limits }
    }

    #[inline]
    pub fn current_position(&self) -> &Position {
        self.positions.last().expect("search params carry at least one position")
    }
}
