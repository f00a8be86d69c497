//! Negamax alpha-beta with quiescence.
//!
//! The searcher owns a fixed 128-entry stack; child positions live in the
//! next slot, so making a move is a copy plus in-place mutation and nothing
//! on the hot path allocates. Heuristics, in the order they fire at a node:
//! draw detection, transposition pruning, null move, internal iterative
//! deepening, hash move (with check and singular extensions), then the
//! ordered move loop with futility, move-count and SEE pruning and late
//! move reductions under PVS re-search discipline.
//!
//! Cancellation is cooperative: the stop flag is polled every 256 nodes and
//! flips a thread-local abort flag. Every entry point returns immediately
//! once aborted, and transposition/history writes are gated on the flag so
//! an unwinding thread publishes nothing.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::OnceLock;

use crate::board::{Piece, Position};
use crate::eval::{evaluate, is_late_end_game, PawnKingTable, PAWN_VALUE_MIDDLE};
use crate::movegen::{
    generate_all_captures, generate_all_moves, is_move_pseudo_legal, types::EvaledMove, Move,
    MAX_MOVES,
};

use super::ordering::{
    max_move_to_first, move_to_first, sort_moves, MoveOrdering, MAX_BAD_CAPTURE, MIN_GOOD_CAPTURE,
    MIN_SPECIAL_MOVE_VALUE,
};
use super::see::{see_above, see_sign};
use super::tt::{TransTable, TT_ALPHA, TT_BETA, TT_EXACT};
use super::{contempt, loss_in, MATE, MAX_HEIGHT, STACK_SIZE, VALUE_LOSS};

const SEE_PRUNING_DEPTH: i32 = 8;
const SEE_QUIET_MARGIN: i32 = -80;
const SEE_NOISY_MARGIN: i32 = -18;

pub(super) const MOVE_COUNT_PRUNING_DEPTH: i32 = 8;
const FUTILITY_PRUNING_DEPTH: i32 = 8;

/// Transposition depth buckets for quiescence, keeping its entries from
/// invalidating main-search entries.
const QS_DEPTH_CHECKS: i32 = 0;
const QS_DEPTH_NO_CHECKS: i32 = -1;

/// Sentinel below any reachable score.
const VALUE_NONE: i32 = -2 * MATE;

static LMR_REDUCTIONS: OnceLock<Box<[[i32; 64]; 64]>> = OnceLock::new();

fn lmr_table() -> &'static [[i32; 64]; 64] {
    LMR_REDUCTIONS.get_or_init(|| {
        let mut table = Box::new([[0i32; 64]; 64]);
        for depth in 1..64 {
            for moves_played in 1..64 {
                table[depth][moves_played] =
                    (0.75 + (depth as f64).ln() * (moves_played as f64).ln() / 2.45) as i32;
            }
        }
        table
    })
}

#[inline]
pub(super) fn lmr_reduction(depth: i32, move_count: i32) -> i32 {
    lmr_table()[depth.min(63) as usize][move_count.min(63) as usize]
}

#[inline]
pub(super) fn move_count_pruning(improving: i32, depth: i32) -> i32 {
    (5 + depth * depth) * (1 + improving) / 2 - 1
}

/// Principal variation collected on the way back up.
pub struct Pv {
    size: usize,
    items: [Move; STACK_SIZE],
}

impl Pv {
    fn new() -> Pv {
        Pv { size: 0, items: [Move::NULL; STACK_SIZE] }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.size = 0;
    }

    #[inline]
    fn assign(&mut self, mv: Move, child: &Pv) {
        debug_assert!(child.size < STACK_SIZE);
        self.size = 1 + child.size;
        self.items[0] = mv;
        self.items[1..=child.size].copy_from_slice(&child.items[..child.size]);
    }

    #[inline]
    pub fn moves(&self) -> &[Move] {
        &self.items[..self.size]
    }
}

/// Per-ply search state. The move buffer and quiet list are fixed so the
/// whole stack is one contiguous allocation per thread.
pub struct StackEntry {
    pub position: Position,
    pub(super) pv: Pv,
    pub(super) moves: [EvaledMove; MAX_MOVES],
    quiets_searched: [Move; MAX_MOVES],
    quiets_len: usize,
    evaluation: i16,
    evaluation_valid: bool,
}

impl StackEntry {
    fn new() -> StackEntry {
        StackEntry {
            position: Position::default(),
            pv: Pv::new(),
            moves: [EvaledMove::EMPTY; MAX_MOVES],
            quiets_searched: [Move::NULL; MAX_MOVES],
            quiets_len: 0,
            evaluation: 0,
            evaluation_valid: false,
        }
    }
}

/// Shared, read-mostly state handed to every worker: the transposition
/// table, the pawn-king cache, the pre-search repetition snapshot, the stop
/// flag and the fleet-wide node counter.
pub struct SearchContext<'a, T: TransTable> {
    pub tt: &'a T,
    pub pawn_king: &'a PawnKingTable,
    pub repeated: &'a HashSet<u64>,
    pub stop: &'a AtomicBool,
    pub global_nodes: &'a AtomicU64,
}

/// One search worker: a stack of `STACK_SIZE` plies plus its private
/// ordering heuristics. Threads never share any of this; they meet only in
/// the tables inside `SearchContext`.
pub struct SearchThread {
    pub(crate) stack: Box<[StackEntry]>,
    pub(crate) ordering: MoveOrdering,
    pub(crate) nodes: u64,
    pub(crate) abort: bool,
}

impl SearchThread {
    pub fn new() -> SearchThread {
        SearchThread {
            stack: (0..STACK_SIZE).map(|_| StackEntry::new()).collect(),
            ordering: MoveOrdering::new(),
            nodes: 0,
            abort: false,
        }
    }

    /// Install the root position and reset per-search state. Ordering
    /// heuristics persist across searches of the same game.
    pub fn prepare(&mut self, root: &Position) {
        self.stack[0].position = *root;
        self.nodes = 0;
        self.abort = false;
    }

    #[inline]
    fn inc_nodes<T: TransTable>(&mut self, ctx: &SearchContext<T>) {
        self.nodes += 1;
        if self.nodes & 255 == 0 {
            ctx.global_nodes.fetch_add(256, Ordering::Relaxed);
            if ctx.stop.load(Ordering::Relaxed) {
                self.abort = true;
            }
        }
    }

    /// Cached static evaluation of the position at `height`.
    fn evaluation<T: TransTable>(&mut self, ctx: &SearchContext<T>, height: usize) -> i32 {
        let entry = &mut self.stack[height];
        if !entry.evaluation_valid {
            entry.evaluation = evaluate(&entry.position, ctx.pawn_king) as i16;
            entry.evaluation_valid = true;
        }
        entry.evaluation as i32
    }

    #[inline]
    fn improving<T: TransTable>(&mut self, ctx: &SearchContext<T>, height: usize) -> bool {
        height <= 2 || self.evaluation(ctx, height) >= self.evaluation(ctx, height - 2)
    }

    pub(super) fn assign_pv(&mut self, height: usize, mv: Move) {
        let (front, back) = self.stack.split_at_mut(height + 1);
        front[height].pv.assign(mv, &back[0].pv);
    }

    pub(super) fn clear_quiets(&mut self, height: usize) {
        self.stack[height].quiets_len = 0;
    }

    pub(super) fn push_quiet(&mut self, height: usize, mv: Move) {
        let entry = &mut self.stack[height];
        debug_assert!(entry.quiets_len < MAX_MOVES);
        entry.quiets_searched[entry.quiets_len] = mv;
        entry.quiets_len += 1;
    }

    pub(super) fn invalidate_evaluation(&mut self, height: usize) {
        self.stack[height].evaluation_valid = false;
    }

    pub(super) fn update_history(&mut self, height: usize, best_move: Move, depth: i32) {
        let entry = &self.stack[height];
        self.ordering.update(
            &entry.position,
            &entry.quiets_searched[..entry.quiets_len],
            best_move,
            depth,
            height,
        );
    }

    /// Draw detection: fifty-move rule, insufficient material, twofold
    /// repetition within the search stack (walked until a fifty reset or a
    /// null move) and repetitions against the pre-search game history.
    fn is_draw<T: TransTable>(&self, ctx: &SearchContext<T>, height: usize) -> bool {
        let pos = &self.stack[height].position;

        if pos.fifty_move() > 100 {
            return true;
        }

        let minors = pos.pieces(Piece::Knight) | pos.pieces(Piece::Bishop);
        if (pos.pieces(Piece::Pawn) | pos.pieces(Piece::Rook) | pos.pieces(Piece::Queen)).is_empty()
            && !minors.more_than_one()
        {
            return true;
        }

        for i in (0..height).rev() {
            let ancestor = &self.stack[i].position;
            if ancestor.key() == pos.key() {
                return true;
            }
            if ancestor.fifty_move() == 0 || ancestor.last_move() == Move::NULL {
                return false;
            }
        }

        ctx.repeated.contains(&pos.key())
    }

    pub(super) fn quiescence<T: TransTable>(
        &mut self,
        ctx: &SearchContext<T>,
        depth: i32,
        mut alpha: i32,
        beta: i32,
        height: usize,
        in_check: bool,
    ) -> i32 {
        self.inc_nodes(ctx);
        if self.abort {
            return 0;
        }
        self.stack[height].pv.clear();
        let pos = self.stack[height].position;
        let alpha_orig = alpha;

        if height >= MAX_HEIGHT || self.is_draw(ctx, height) {
            return contempt(&pos);
        }

        let tt_depth = if in_check || depth >= QS_DEPTH_CHECKS {
            QS_DEPTH_CHECKS
        } else {
            QS_DEPTH_NO_CHECKS
        };

        let probe = ctx.tt.get(pos.key(), height);
        let hash_move = probe.map_or(Move::NULL, |p| p.mv);
        if let Some(p) = probe {
            if p.depth >= tt_depth
                && (p.flag == TT_EXACT
                    || (p.flag == TT_ALPHA && p.value <= alpha)
                    || (p.flag == TT_BETA && p.value >= beta))
            {
                return p.value;
            }
        }

        let mut best_move = Move::NULL;
        let mut move_count = 0;

        let mut val = evaluate(&pos, ctx.pawn_king);

        let count = {
            let entry = &mut self.stack[height];
            if in_check {
                generate_all_moves(&pos, &mut entry.moves)
            } else {
                // Stand pat.
                if val >= beta {
                    return beta;
                }
                if alpha < val {
                    alpha = val;
                }
                generate_all_captures(&pos, &mut entry.moves)
            }
        };
        self.ordering.evaluate_qs_moves(&pos, &mut self.stack[height].moves[..count], hash_move);

        for i in 0..count {
            max_move_to_first(&mut self.stack[height].moves[i..count]);
            let em = self.stack[height].moves[i];
            // Losing exchanges are not worth extending the horizon for,
            // unless we have a check to get out of.
            if (!in_check && !see_sign(&pos, em.mv))
                || !pos.make_move(em.mv, &mut self.stack[height + 1].position)
            {
                continue;
            }
            move_count += 1;
            let child_in_check = self.stack[height + 1].position.is_in_check();
            val = -self.quiescence(ctx, depth - 1, -beta, -alpha, height + 1, child_in_check);
            if self.abort {
                return 0;
            }
            if val > alpha {
                alpha = val;
                best_move = em.mv;
                if val >= beta {
                    break;
                }
                self.assign_pv(height, em.mv);
            }
        }

        if move_count == 0 && in_check {
            return loss_in(height);
        }

        let flag = if alpha == alpha_orig {
            TT_ALPHA
        } else if alpha >= beta {
            TT_BETA
        } else {
            TT_EXACT
        };
        ctx.tt.set(pos.key(), alpha, tt_depth, best_move, flag, height);

        alpha
    }

    /// Is the hash move so much better than every alternative that it
    /// deserves an extra ply? Probes the siblings with a reduced null-window
    /// search against `hash_value - depth`.
    fn is_move_singular<T: TransTable>(
        &mut self,
        ctx: &SearchContext<T>,
        depth: i32,
        height: usize,
        hash_value: i32,
        start: usize,
        count: usize,
    ) -> bool {
        let pos = self.stack[height].position;
        // The child slot already holds the made hash move; restore it after
        // probing.
        let saved_child = self.stack[height + 1].position;
        let r_beta = (hash_value - depth).max(-MATE);
        let mut val = -MATE;
        let mut quiets = 0;

        for i in start..count {
            let em = self.stack[height].moves[i];
            if !pos.make_move(em.mv, &mut self.stack[height + 1].position) {
                continue;
            }
            let child_in_check = self.stack[height + 1].position.is_in_check();
            val = -self.alpha_beta(ctx, depth / 2 - 1, -r_beta - 1, -r_beta, height + 1, child_in_check);
            if self.abort || val > r_beta {
                break;
            }
            if !em.mv.is_capture_or_promotion() {
                quiets += 1;
                if quiets >= 6 {
                    break;
                }
            } else if em.value < MAX_BAD_CAPTURE {
                break;
            }
        }

        self.stack[height + 1].position = saved_child;
        val <= r_beta
    }

    pub fn alpha_beta<T: TransTable>(
        &mut self,
        ctx: &SearchContext<T>,
        depth: i32,
        mut alpha: i32,
        beta: i32,
        height: usize,
        in_check: bool,
    ) -> i32 {
        self.inc_nodes(ctx);
        if self.abort {
            return 0;
        }
        self.stack[height].pv.clear();
        let pos = self.stack[height].position;

        if self.is_draw(ctx, height) {
            return contempt(&pos);
        }
        if height >= MAX_HEIGHT {
            return self.evaluation(ctx, height);
        }

        // A null window marks a non-PV node.
        let pv_node = alpha != beta - 1;
        let alpha_orig = alpha;

        let probe = ctx.tt.get(pos.key(), height);
        let (hash_value, hash_depth, mut hash_move, hash_flag) = match probe {
            Some(p) => (p.value, p.depth, p.mv, p.flag),
            None => (0, 0, Move::NULL, 0),
        };
        if probe.is_some() && hash_depth >= depth && (depth == 0 || !pv_node) {
            if hash_flag == TT_EXACT {
                return hash_value;
            }
            if hash_flag == TT_ALPHA && hash_value <= alpha {
                return alpha;
            }
            if hash_flag == TT_BETA && hash_value >= beta {
                return beta;
            }
        }

        if depth <= 0 {
            return self.quiescence(ctx, 0, alpha, beta, height, in_check);
        }

        self.invalidate_evaluation(height);

        // Null-move pruning. Skipped right after another null move, in
        // check, when the table already bounds us below beta, and in pawn
        // endings where zugzwang rules.
        if pos.last_move() != Move::NULL
            && depth >= 2
            && !in_check
            && (probe.is_none() || (hash_flag & TT_ALPHA == 0) || hash_value >= beta)
            && !is_late_end_game(&pos)
            && self.evaluation(ctx, height) >= beta
        {
            pos.make_null_move(&mut self.stack[height + 1].position);
            let reduction = (1 + depth / 3).max(3);
            let child_in_check = self.stack[height + 1].position.is_in_check();
            let val =
                -self.alpha_beta(ctx, depth - reduction, -beta, -beta + 1, height + 1, child_in_check);
            if self.abort {
                return 0;
            }
            if val >= beta {
                return beta;
            }
        }

        // Internal iterative deepening to seed a hash move.
        if hash_move == Move::NULL
            && !in_check
            && ((pv_node && depth >= 6) || (!pv_node && depth >= 8))
        {
            let ii_depth = if pv_node { depth - depth / 4 - 1 } else { (depth - 5) / 2 };
            self.alpha_beta(ctx, ii_depth, alpha, beta, height, in_check);
            if self.abort {
                return 0;
            }
            hash_move = ctx.tt.get(pos.key(), height).map_or(Move::NULL, |p| p.mv);
        }

        let mut val = VALUE_NONE;
        let mut best_move = Move::NULL;
        let mut move_count = 0;
        let mut moves_sorted = false;
        let mut hash_move_checked = false;
        // Index of the first unsearched move in the ply's buffer; the hash
        // move, once handled, is excluded by advancing it.
        let mut start = 0;
        let mut count = 0;
        let see_margins = [SEE_QUIET_MARGIN * depth, SEE_NOISY_MARGIN * depth * depth];

        self.clear_quiets(height);

        'moves: {
            // Try the hash move before generating anything.
            if is_move_pseudo_legal(&pos, hash_move) {
                hash_move_checked = true;
                if pos.make_move(hash_move, &mut self.stack[height + 1].position) {
                    move_count += 1;
                    let child_in_check = self.stack[height + 1].position.is_in_check();
                    let mut new_depth = depth - 1;
                    let singular_candidate =
                        depth >= 8 && hash_depth >= depth - 2 && hash_flag != TT_ALPHA;
                    if in_check && see_sign(&pos, hash_move) {
                        new_depth += 1;
                    } else if singular_candidate {
                        count = {
                            let entry = &mut self.stack[height];
                            generate_all_moves(&pos, &mut entry.moves)
                        };
                        self.ordering.evaluate_moves(
                            &pos,
                            &mut self.stack[height].moves[..count],
                            hash_move,
                            height,
                        );
                        sort_moves(&mut self.stack[height].moves[..count]);
                        moves_sorted = true;
                        start = 1;
                        if self.is_move_singular(ctx, depth, height, hash_value, start, count) {
                            new_depth += 1;
                        }
                        if self.abort {
                            return 0;
                        }
                    }

                    if !hash_move.is_capture_or_promotion() {
                        self.push_quiet(height, hash_move);
                    }

                    let tmp =
                        -self.alpha_beta(ctx, new_depth, -beta, -alpha, height + 1, child_in_check);
                    if self.abort {
                        return 0;
                    }
                    if tmp > val {
                        val = tmp;
                        if val > alpha {
                            alpha = val;
                            best_move = hash_move;
                            if alpha >= beta {
                                break 'moves;
                            }
                            self.assign_pv(height, hash_move);
                        }
                    }
                }
            }

            if !moves_sorted {
                count = {
                    let entry = &mut self.stack[height];
                    generate_all_moves(&pos, &mut entry.moves)
                };
                if hash_move_checked {
                    move_to_first(&mut self.stack[height].moves[..count], hash_move);
                    start = 1;
                }
                self.ordering.evaluate_moves(
                    &pos,
                    &mut self.stack[height].moves[start..count],
                    hash_move,
                    height,
                );
            }

            for i in start..count {
                if !moves_sorted {
                    // Draw the first few moves by selection sort; shell-sort
                    // the tail only if we get that far.
                    if i - start < 3 || count - i < 3 {
                        max_move_to_first(&mut self.stack[height].moves[i..count]);
                    } else {
                        sort_moves(&mut self.stack[height].moves[i..count]);
                        moves_sorted = true;
                    }
                }
                let em = self.stack[height].moves[i];
                let is_noisy = em.mv.is_capture_or_promotion();

                if val > VALUE_LOSS
                    && !in_check
                    && move_count > 0
                    && em.value < MIN_SPECIAL_MOVE_VALUE
                    && !is_noisy
                {
                    if depth <= FUTILITY_PRUNING_DEPTH
                        && self.evaluation(ctx, height) + PAWN_VALUE_MIDDLE * depth <= alpha
                    {
                        continue;
                    }
                    if depth <= MOVE_COUNT_PRUNING_DEPTH
                        && move_count >= move_count_pruning(self.improving(ctx, height) as i32, depth)
                    {
                        continue;
                    }
                }

                if val > VALUE_LOSS
                    && depth <= SEE_PRUNING_DEPTH
                    && move_count > 0
                    && em.value < MIN_GOOD_CAPTURE
                    && !see_above(&pos, em.mv, see_margins[is_noisy as usize])
                {
                    continue;
                }

                if !pos.make_move(em.mv, &mut self.stack[height + 1].position) {
                    continue;
                }
                move_count += 1;
                let child_in_check = self.stack[height + 1].position.is_in_check();

                let mut reduction = 0;
                if depth >= 3
                    && !in_check
                    && move_count > 1
                    && em.value < MIN_SPECIAL_MOVE_VALUE
                    && !is_noisy
                    && !child_in_check
                {
                    let not_improving = !self.improving(ctx, height);
                    reduction = lmr_reduction(depth, move_count)
                        + (!pv_node) as i32
                        + not_improving as i32;
                    reduction = reduction.min(depth - 2).max(0);
                }

                let mut new_depth = depth - 1;
                if in_check && see_sign(&pos, em.mv) {
                    new_depth += 1;
                }

                if !is_noisy {
                    self.push_quiet(height, em.mv);
                }

                let mut tmp = 0;
                if reduction > 0 {
                    tmp = -self.alpha_beta(
                        ctx,
                        new_depth - reduction,
                        -(alpha + 1),
                        -alpha,
                        height + 1,
                        child_in_check,
                    );
                }
                if (reduction > 0 && tmp > alpha)
                    || (reduction == 0 && !(pv_node && move_count == 1))
                {
                    tmp = -self.alpha_beta(ctx, new_depth, -(alpha + 1), -alpha, height + 1, child_in_check);
                }
                if pv_node && (move_count == 1 || tmp > alpha) {
                    tmp = -self.alpha_beta(ctx, new_depth, -beta, -alpha, height + 1, child_in_check);
                }
                if self.abort {
                    return 0;
                }

                if tmp > val {
                    val = tmp;
                    if val > alpha {
                        alpha = val;
                        best_move = em.mv;
                        if alpha >= beta {
                            break 'moves;
                        }
                        self.assign_pv(height, em.mv);
                    }
                }
            }

            if move_count == 0 {
                return if in_check { loss_in(height) } else { contempt(&pos) };
            }
        }

        if best_move != Move::NULL && !best_move.is_capture_or_promotion() {
            self.update_history(height, best_move, depth);
        }

        let flag = if alpha == alpha_orig {
            TT_ALPHA
        } else if alpha >= beta {
            TT_BETA
        } else {
            TT_EXACT
        };
        ctx.tt.set(pos.key(), alpha, depth, best_move, flag, height);
        alpha
    }
}

impl Default for SearchThread {
    fn default() -> SearchThread {
        SearchThread::new()
    }
}
