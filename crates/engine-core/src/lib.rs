pub mod board;
pub mod engine;
pub mod eval;
pub mod movegen;
pub mod search;

pub use board::{Bitboard, Color, Piece, Position};
pub use engine::Engine;
pub use movegen::{generate_all_moves, perft, EvaledMove, Move, MAX_MOVES};
pub use search::limits::{Limits, SearchParams};
pub use search::{InfoCallback, SearchInfo, UciScore};
