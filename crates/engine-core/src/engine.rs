//! Engine facade: UCI options, shared tables and the Lazy-SMP worker pool.
//!
//! `search` configures the time manager, snapshots the repetition set from
//! the game history, arms the hard-deadline timer and runs either the
//! inline single-thread driver or the parallel pool. Workers share one
//! transposition table and publish root results over a channel; the watcher
//! accepts a result only when it deepens on everything seen before.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::thread;

use log::debug;

use crate::board::Position;
use crate::eval::PawnKingTable;
use crate::movegen::{EvaledMove, Move};
use crate::search::alpha_beta::{SearchContext, SearchThread};
use crate::search::limits::SearchParams;
use crate::search::ordering::sort_moves;
use crate::search::root::RootResult;
use crate::search::time_manager::TimeManager;
use crate::search::tt::{AnyTransTable, AtomicTable, TransTable};
use crate::search::{depth_to_mate, InfoCallback, SearchInfo, UciScore, MATE, MAX_HEIGHT, VALUE_WIN};

/// Integer UCI option with hard bounds.
#[derive(Debug, Clone, Copy)]
pub struct UciOption {
    pub name: &'static str,
    pub min: i32,
    pub max: i32,
    pub val: i32,
}

impl UciOption {
    pub fn set(&mut self, value: i32) {
        self.val = value.clamp(self.min, self.max);
    }
}

pub struct Engine {
    pub hash: UciOption,
    pub threads: UciOption,
    pub pawn_hash: UciOption,
    pub move_overhead: UciOption,
    tt: AnyTransTable,
    pawn_king: PawnKingTable,
    repeated: HashSet<u64>,
    moves_count: usize,
    update: Option<InfoCallback>,
    workers: Vec<SearchThread>,
    /// (hash, threads, pawn_hash) the tables were built with; a mismatch at
    /// search time triggers a rebuild.
    built_for: (i32, i32, i32),
}

impl Engine {
    pub fn new() -> Engine {
        let max_threads = thread::available_parallelism().map_or(1, |n| n.get()) as i32;
        let mut engine = Engine {
            hash: UciOption { name: "Hash", min: 4, max: 2048, val: 256 },
            threads: UciOption { name: "Threads", min: 1, max: max_threads, val: 1 },
            pawn_hash: UciOption { name: "PawnHash", min: 0, max: 8, val: 2 },
            move_overhead: UciOption { name: "MoveOverhead", min: 0, max: 10_000, val: 50 },
            tt: AnyTransTable::new(256, 1),
            pawn_king: PawnKingTable::new(2),
            repeated: HashSet::new(),
            moves_count: 0,
            update: None,
            workers: Vec::new(),
            built_for: (0, 0, 0),
        };
        engine.new_game();
        engine
    }

    pub fn info() -> (&'static str, &'static str, &'static str) {
        ("Riposte", env!("CARGO_PKG_VERSION"), "the Riposte authors")
    }

    pub fn options(&self) -> [UciOption; 4] {
        [self.hash, self.threads, self.pawn_hash, self.move_overhead]
    }

    /// Apply a `setoption` value. Unknown names are reported as `false`.
    pub fn set_option(&mut self, name: &str, value: i32) -> bool {
        match name {
            "Hash" => self.hash.set(value),
            "Threads" => self.threads.set(value),
            "PawnHash" => self.pawn_hash.set(value),
            "MoveOverhead" => self.move_overhead.set(value),
            _ => return false,
        }
        true
    }

    pub fn set_info_callback(&mut self, callback: InfoCallback) {
        self.update = Some(callback);
    }

    /// Rebuild the shared tables and worker pool for the current options.
    pub fn new_game(&mut self) {
        self.tt = AnyTransTable::new(self.hash.val as usize, self.threads.val as usize);
        self.pawn_king = PawnKingTable::new(self.pawn_hash.val as usize);
        self.workers = (0..self.threads.val).map(|_| SearchThread::new()).collect();
        self.built_for = (self.hash.val, self.threads.val, self.pawn_hash.val);
        debug!(
            "new game: hash {} MB, {} thread(s), pawn hash {} MB",
            self.hash.val, self.threads.val, self.pawn_hash.val
        );
    }

    fn ensure_ready(&mut self) {
        if self.built_for != (self.hash.val, self.threads.val, self.pawn_hash.val) {
            self.new_game();
        }
    }

    /// Keys appearing at least twice in the reversible tail of the game
    /// history; snapshot consulted read-only by every worker.
    fn fill_move_history(&mut self, positions: &[Position]) {
        self.moves_count = positions.len().saturating_sub(1);
        let mut counts: HashMap<u64, u32> = HashMap::new();
        for pos in positions.iter().rev() {
            *counts.entry(pos.key()).or_insert(0) += 1;
            if pos.fifty_move() == 0 {
                break;
            }
        }
        self.repeated = counts.into_iter().filter(|&(_, n)| n >= 2).map(|(key, _)| key).collect();
    }

    /// Search the final position of `params` and return the best move.
    pub fn search(&mut self, params: SearchParams) -> Move {
        self.ensure_ready();
        self.fill_move_history(&params.positions);
        let root = *params.current_position();

        let mut time_manager =
            TimeManager::new(&params.limits, self.move_overhead.val as u64, root.side_to_move());
        let stop = params
            .limits
            .stop_flag
            .clone()
            .unwrap_or_else(|| Arc::new(AtomicBool::new(false)));

        // The hard deadline is a timer that trips the shared stop flag;
        // workers notice within 256 nodes. A stale timer firing after the
        // search returned only touches this search's flag.
        if let Some(hard) = time_manager.hard_timeout() {
            let timer_stop = Arc::clone(&stop);
            thread::spawn(move || {
                thread::sleep(hard);
                timer_stop.store(true, Ordering::Release);
            });
        }

        let mut root_moves = root.generate_all_legal_moves();
        match root_moves.len() {
            0 => return Move::NULL,
            1 => return root_moves[0].mv,
            _ => {}
        }

        let ord_move = self.tt.get(root.key(), 0).map_or(Move::NULL, |p| p.mv);
        let global_nodes = AtomicU64::new(0);

        let Engine { tt, pawn_king, repeated, workers, update, .. } = self;
        for worker in workers.iter_mut() {
            worker.prepare(&root);
        }
        workers[0].ordering.evaluate_moves(&root, &mut root_moves, ord_move, 0);
        sort_moves(&mut root_moves);

        match tt {
            AnyTransTable::Single(table) => {
                let ctx = SearchContext {
                    tt: table,
                    pawn_king,
                    repeated,
                    stop: &stop,
                    global_nodes: &global_nodes,
                };
                single_thread_best_move(&mut workers[0], &ctx, &mut time_manager, update, root_moves)
            }
            AnyTransTable::Atomic(table) => parallel_best_move(
                workers,
                table,
                pawn_king,
                repeated,
                &stop,
                &global_nodes,
                &mut time_manager,
                update,
                root_moves,
            ),
        }
    }
}

impl Default for Engine {
    fn default() -> Engine {
        Engine::new()
    }
}

fn publish(update: &Option<InfoCallback>, res: &RootResult, nodes: u64) {
    if let Some(callback) = update {
        callback(&SearchInfo {
            score: UciScore::new(res.value),
            depth: res.depth,
            nodes,
            moves: res.pv.clone(),
        });
    }
}

/// Decide whether `res` ends the search. Returns the move to play, or
/// `None` to keep deepening.
fn finished(res: &RootResult, last_best: Move) -> Option<Move> {
    if res.value >= VALUE_WIN && depth_to_mate(res.value) <= res.depth {
        return Some(res.mv);
    }
    if res.mv == Move::NULL {
        return Some(last_best);
    }
    if res.depth >= MAX_HEIGHT as i32 {
        return Some(res.mv);
    }
    None
}

fn single_thread_best_move<T: TransTable>(
    worker: &mut SearchThread,
    ctx: &SearchContext<T>,
    time_manager: &mut TimeManager,
    update: &Option<InfoCallback>,
    mut root_moves: Vec<EvaledMove>,
) -> Move {
    let (tx, rx) = channel();
    let mut last_best = Move::NULL;
    let mut last_value = -MATE;

    for depth in 1..=MAX_HEIGHT as i32 {
        last_value = worker.aspiration_window(ctx, depth, last_value, &mut root_moves, &tx);
        if worker.abort {
            break;
        }
        let Ok(res) = rx.try_recv() else { break };
        publish(update, &res, worker.nodes);
        if let Some(mv) = finished(&res, last_best) {
            return mv;
        }
        time_manager.update_time(res.depth, res.value);
        if time_manager.is_soft_timeout(depth, worker.nodes) {
            return res.mv;
        }
        last_best = res.mv;
    }
    last_best
}

#[allow(clippy::too_many_arguments)]
fn parallel_best_move(
    workers: &mut [SearchThread],
    tt: &AtomicTable,
    pawn_king: &PawnKingTable,
    repeated: &HashSet<u64>,
    stop: &Arc<AtomicBool>,
    global_nodes: &AtomicU64,
    time_manager: &mut TimeManager,
    update: &Option<InfoCallback>,
    root_moves: Vec<EvaledMove>,
) -> Move {
    let stop: &AtomicBool = stop.as_ref();
    let (tx, rx) = channel::<RootResult>();

    crossbeam::thread::scope(|s| {
        for (idx, worker) in workers.iter_mut().enumerate() {
            let tx = tx.clone();
            let moves = root_moves.clone();
            s.spawn(move |_| {
                let ctx = SearchContext { tt, pawn_king, repeated, stop, global_nodes };
                worker.iterative_deepening(&ctx, moves, &tx, idx);
            });
        }
        drop(tx);

        // Results arrive out of order across threads; accept only strictly
        // deepening reports. A closed channel means every worker unwound
        // after the stop flag tripped.
        let mut prev_depth = 0;
        let mut last_best = Move::NULL;
        let chosen = loop {
            let Ok(res) = rx.recv() else { break last_best };
            if res.depth <= prev_depth {
                continue;
            }
            let nodes = global_nodes.load(Ordering::Relaxed);
            publish(update, &res, nodes);
            if let Some(mv) = finished(&res, last_best) {
                break mv;
            }
            time_manager.update_time(res.depth, res.value);
            if time_manager.is_soft_timeout(res.depth, nodes) {
                break res.mv;
            }
            last_best = res.mv;
            prev_depth = res.depth;
        };
        stop.store(true, Ordering::Release);
        chosen
    })
    .expect("search worker panicked")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::limits::Limits;

    fn go(engine: &mut Engine, fen: &str, limits: Limits) -> Move {
        let pos = Position::from_fen(fen).unwrap();
        engine.search(SearchParams::new(vec![pos], limits))
    }

    #[test]
    fn returns_a_legal_move_from_startpos() {
        let mut engine = Engine::new();
        let pos = Position::startpos();
        let mv = engine.search(SearchParams::new(vec![pos], Limits::depth(4)));
        assert!(pos.generate_all_legal_moves().iter().any(|em| em.mv == mv));
    }

    #[test]
    fn single_reply_is_instant() {
        let mut engine = Engine::new();
        // The checked king has exactly one flight square; the reply comes
        // back without any deepening, even with an absurd depth limit.
        let mv = go(&mut engine, "7k/7q/7K/8/8/8/8/8 w - - 0 1", Limits::depth(60));
        assert_eq!(mv.to_string(), "h6g5");
    }

    #[test]
    fn pre_set_stop_flag_returns_quickly() {
        let mut engine = Engine::new();
        let stop = Arc::new(AtomicBool::new(true));
        let limits = Limits { stop_flag: Some(stop), ..Limits::default() };
        // Unlimited search with the flag already tripped must not hang.
        let mv = go(&mut engine, "4k3/8/8/8/8/8/8/RN2K2R w - - 0 1", limits);
        // Nothing was completed, so no move is promised.
        let _ = mv;
    }

    #[test]
    fn option_values_clamp_to_bounds() {
        let mut engine = Engine::new();
        assert!(engine.set_option("Hash", 1_000_000));
        assert_eq!(engine.hash.val, 2048);
        assert!(engine.set_option("MoveOverhead", -5));
        assert_eq!(engine.move_overhead.val, 0);
        assert!(!engine.set_option("Nonsense", 1));
    }

    #[test]
    fn info_callback_reports_deepening() {
        use std::sync::Mutex;
        let depths = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&depths);
        let mut engine = Engine::new();
        engine.set_info_callback(Box::new(move |info| {
            sink.lock().unwrap().push(info.depth);
        }));
        go(&mut engine, "4k3/8/8/8/8/8/8/4K2R w - - 0 1", Limits::depth(5));
        let seen = depths.lock().unwrap();
        assert!(!seen.is_empty());
        for pair in seen.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }
}
