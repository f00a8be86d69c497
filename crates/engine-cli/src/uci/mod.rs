//! UCI session: translates protocol commands into engine calls.
//!
//! `go` runs the search on a worker thread so the session keeps reading;
//! `stop` and `quit` trip the search's stop flag and join the worker, which
//! guarantees exactly one `bestmove` per `go`.

pub mod commands;
pub mod parser;

pub use commands::{GoParams, UciCommand};
pub use parser::parse_uci_command;

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;

use anyhow::Result;
use log::warn;

use engine_core::movegen::perft;
use engine_core::{Engine, Limits, Position, SearchInfo, SearchParams, UciScore};

pub struct UciSession {
    engine: Arc<Mutex<Engine>>,
    positions: Vec<Position>,
    stop: Arc<AtomicBool>,
    search: Option<JoinHandle<()>>,
}

impl UciSession {
    pub fn new() -> UciSession {
        let mut engine = Engine::new();
        engine.set_info_callback(Box::new(print_info));
        UciSession {
            engine: Arc::new(Mutex::new(engine)),
            positions: vec![Position::startpos()],
            stop: Arc::new(AtomicBool::new(false)),
            search: None,
        }
    }

    /// Read commands until `quit` or end of input.
    pub fn run(&mut self, input: impl BufRead) -> Result<()> {
        for line in input.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match parse_uci_command(&line) {
                Ok(command) => {
                    if !self.handle(command) {
                        break;
                    }
                }
                Err(err) => warn!("ignoring input: {err}"),
            }
        }
        self.stop_search();
        Ok(())
    }

    fn handle(&mut self, command: UciCommand) -> bool {
        match command {
            UciCommand::Uci => self.announce(),
            UciCommand::IsReady => println!("readyok"),
            UciCommand::NewGame => {
                self.stop_search();
                self.engine.lock().unwrap().new_game();
            }
            UciCommand::Position { startpos, fen, moves } => {
                self.set_position(startpos, fen, &moves);
            }
            UciCommand::Go(params) => self.go(params),
            UciCommand::SetOption { name, value } => {
                let parsed = value.as_deref().and_then(|v| v.parse::<i32>().ok());
                match parsed {
                    Some(v) => {
                        if !self.engine.lock().unwrap().set_option(&name, v) {
                            warn!("unknown option: {name}");
                        }
                    }
                    None => warn!("option {name} requires an integer value"),
                }
            }
            UciCommand::Stop => self.stop_search(),
            UciCommand::Quit => return false,
            UciCommand::Perft(depth) => self.perft(depth),
        }
        true
    }

    fn announce(&self) {
        let (name, version, author) = Engine::info();
        println!("id name {name} {version}");
        println!("id author {author}");
        for option in self.engine.lock().unwrap().options() {
            println!(
                "option name {} type spin default {} min {} max {}",
                option.name, option.val, option.min, option.max
            );
        }
        println!("uciok");
    }

    fn set_position(&mut self, startpos: bool, fen: Option<String>, moves: &[String]) {
        let base = if startpos {
            Position::startpos()
        } else {
            match fen.as_deref().and_then(Position::from_fen) {
                Some(pos) => pos,
                None => {
                    warn!("invalid FEN in position command");
                    return;
                }
            }
        };

        let mut positions = vec![base];
        for lan in moves {
            match positions.last().unwrap().make_move_lan(lan) {
                Some(next) => positions.push(next),
                None => {
                    warn!("illegal move in position command: {lan}");
                    return;
                }
            }
        }
        self.positions = positions;
    }

    fn go(&mut self, params: GoParams) {
        self.stop_search();

        let stop = Arc::new(AtomicBool::new(false));
        self.stop = Arc::clone(&stop);
        let limits = Limits {
            ponder: params.ponder,
            infinite: params.infinite,
            white_time: params.wtime.unwrap_or(0),
            black_time: params.btime.unwrap_or(0),
            white_increment: params.winc.unwrap_or(0),
            black_increment: params.binc.unwrap_or(0),
            move_time: params.movetime.unwrap_or(0),
            moves_to_go: params.movestogo.unwrap_or(0),
            depth: params.depth.unwrap_or(0),
            nodes: params.nodes.unwrap_or(0),
            mate: params.mate.unwrap_or(0),
            stop_flag: Some(stop),
        };

        let engine = Arc::clone(&self.engine);
        let positions = self.positions.clone();
        self.search = Some(std::thread::spawn(move || {
            let best = engine.lock().unwrap().search(SearchParams::new(positions, limits));
            println!("bestmove {best}");
        }));
    }

    fn stop_search(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.search.take() {
            let _ = handle.join();
        }
    }

    fn perft(&mut self, depth: u32) {
        let pos = *self.positions.last().unwrap();
        let started = Instant::now();
        let nodes = perft(&pos, depth);
        let ms = started.elapsed().as_millis().max(1);
        println!("perft {depth}: {nodes} nodes in {ms} ms ({} knps)", nodes as u128 / ms);
    }
}

impl Default for UciSession {
    fn default() -> UciSession {
        UciSession::new()
    }
}

fn print_info(info: &SearchInfo) {
    let score = match info.score {
        UciScore::Mate(mate) => format!("mate {mate}"),
        UciScore::Centipawn(cp) => format!("cp {cp}"),
    };
    let mut line = format!("info depth {} score {} nodes {}", info.depth, score, info.nodes);
    if !info.moves.is_empty() {
        let pv: Vec<String> = info.moves.iter().map(|mv| mv.to_string()).collect();
        line.push_str(&format!(" pv {}", pv.join(" ")));
    }
    println!("{line}");
}
