//! Root driver: aspiration windows, the specialised root node and the
//! per-thread iterative-deepening loop.
//!
//! Every worker runs the same loop over its own copy of the legal root
//! moves. Helper threads diverge by shuffling their move list and by the
//! cycle-16 depth-skipping pattern; knowledge flows between threads only
//! through the shared transposition table.

use std::sync::mpsc::Sender;

use rand::seq::SliceRandom;
use smallvec::SmallVec;

use crate::movegen::{EvaledMove, Move};

use super::alpha_beta::{
    lmr_reduction, move_count_pruning, SearchContext, SearchThread, MOVE_COUNT_PRUNING_DEPTH,
};
use super::ordering::{sort_moves, MIN_SPECIAL_MOVE_VALUE};
use super::see::see_sign;
use super::tt::TransTable;
use super::{contempt, loss_in, MATE, MAX_HEIGHT};

const WINDOW_SIZE: i32 = 50;
const WINDOW_DEPTH: i32 = 6;

pub const SMP_CYCLES: usize = 16;
const SKIP_DEPTHS: [i32; SMP_CYCLES] = [1, 2, 2, 4, 4, 3, 2, 5, 4, 3, 2, 6, 5, 4, 3, 2];
const SKIP_SIZE: [i32; SMP_CYCLES] = [1, 1, 1, 2, 2, 2, 1, 3, 2, 2, 1, 3, 3, 2, 2, 1];

/// A completed root iteration, published on the result channel.
#[derive(Debug, Clone)]
pub struct RootResult {
    pub mv: Move,
    pub value: i32,
    pub depth: i32,
    pub pv: SmallVec<[Move; 64]>,
}

impl SearchThread {
    /// Search one depth inside an aspiration window around the previous
    /// score, widening on fail-high/fail-low until the result is exact.
    /// Publishes the in-window result and returns its value.
    pub fn aspiration_window<T: TransTable>(
        &mut self,
        ctx: &SearchContext<T>,
        depth: i32,
        last_value: i32,
        moves: &mut [EvaledMove],
        results: &Sender<RootResult>,
    ) -> i32 {
        let mut delta = WINDOW_SIZE;
        let (mut alpha, mut beta) = if depth >= WINDOW_DEPTH {
            ((last_value - delta).max(-MATE), (last_value + delta).min(MATE))
        } else {
            // Shallow depths are cheap; search them with a full window.
            (-MATE, MATE)
        };

        loop {
            let res = self.dep_search(ctx, depth, alpha, beta, moves);
            if self.abort {
                return last_value;
            }
            if res.value > alpha && res.value < beta {
                let value = res.value;
                // The watcher may already have gone away; that also means
                // the stop flag is about to be set.
                let _ = results.send(res);
                return value;
            }
            if res.value <= alpha {
                beta = (alpha + beta) / 2;
                alpha = (alpha - delta).max(-MATE);
            }
            if res.value >= beta {
                beta = (beta + delta).min(MATE);
            }
            delta += delta / 2 + 5;
        }
    }

    /// Root-node alpha-beta. Root moves are legal by construction, so no
    /// legality filtering happens here; ordering values carry over between
    /// iterations via the re-sort at the end.
    fn dep_search<T: TransTable>(
        &mut self,
        ctx: &SearchContext<T>,
        depth: i32,
        mut alpha: i32,
        beta: i32,
        moves: &mut [EvaledMove],
    ) -> RootResult {
        let pos = self.stack[0].position;
        let mut best_move = Move::NULL;
        let in_check = pos.is_in_check();
        let mut move_count = 0;
        self.stack[0].pv.clear();
        self.invalidate_evaluation(0);
        self.clear_quiets(0);

        for i in 0..moves.len() {
            let em = moves[i];
            pos.make_legal_move(em.mv, &mut self.stack[1].position);
            move_count += 1;
            if !em.mv.is_capture_or_promotion() {
                self.push_quiet(0, em.mv);
            }
            let child_in_check = self.stack[1].position.is_in_check();

            let mut reduction = 0;
            if !in_check
                && move_count > 1
                && em.value <= MIN_SPECIAL_MOVE_VALUE
                && !em.mv.is_capture_or_promotion()
                && !child_in_check
            {
                if depth <= MOVE_COUNT_PRUNING_DEPTH && move_count >= move_count_pruning(1, depth) {
                    continue;
                }
                if depth >= 3 {
                    reduction = (lmr_reduction(depth, move_count) - 1).min(depth - 2).max(0);
                } else if move_count >= 9 + 3 * depth {
                    continue;
                }
            }

            let mut new_depth = depth - 1;
            if in_check && see_sign(&pos, em.mv) {
                new_depth += 1;
            }

            if reduction > 0 {
                let val = -self.alpha_beta(
                    ctx,
                    new_depth - reduction,
                    -(alpha + 1),
                    -alpha,
                    1,
                    child_in_check,
                );
                if self.abort {
                    break;
                }
                if val <= alpha {
                    continue;
                }
            }
            let val = -self.alpha_beta(ctx, new_depth, -beta, -alpha, 1, child_in_check);
            if self.abort {
                break;
            }
            if val > alpha {
                alpha = val;
                best_move = em.mv;
                if alpha >= beta {
                    break;
                }
                self.assign_pv(0, em.mv);
            }
        }

        if move_count == 0 {
            alpha = if in_check { loss_in(0) } else { contempt(&pos) };
        }

        if !self.abort {
            if best_move != Move::NULL && !best_move.is_capture_or_promotion() {
                self.update_history(0, best_move, depth);
            }
            // Order the list for the next iteration.
            self.ordering.evaluate_moves(&pos, moves, best_move, 0);
            sort_moves(moves);
        }

        RootResult {
            mv: best_move,
            value: alpha,
            depth,
            pv: SmallVec::from_slice(self.stack[0].pv.moves()),
        }
    }

    /// Iterative deepening over a private root move list. Helper threads
    /// (idx > 0) shuffle their list and skip depths in a fixed cycle so the
    /// fleet spreads over different parts of the tree.
    pub fn iterative_deepening<T: TransTable>(
        &mut self,
        ctx: &SearchContext<T>,
        mut moves: Vec<EvaledMove>,
        results: &Sender<RootResult>,
        idx: usize,
    ) {
        let main_thread = idx == 0;
        let mut last_value = -MATE;
        if !main_thread {
            moves.shuffle(&mut rand::thread_rng());
        }
        let cycle = idx % SMP_CYCLES;

        let mut depth = 1;
        while depth <= MAX_HEIGHT as i32 {
            last_value = self.aspiration_window(ctx, depth, last_value, &mut moves, results);
            if self.abort {
                return;
            }
            if !main_thread && (depth + cycle as i32) % SKIP_DEPTHS[cycle] == 0 {
                depth += SKIP_SIZE[cycle];
            }
            depth += 1;
        }
    }
}
