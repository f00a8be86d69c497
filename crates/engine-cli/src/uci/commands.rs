//! UCI command model.

/// Parameters of the `go` command, in protocol units (ms for times).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoParams {
    pub ponder: bool,
    pub infinite: bool,
    pub wtime: Option<u64>,
    pub btime: Option<u64>,
    pub winc: Option<u64>,
    pub binc: Option<u64>,
    pub movetime: Option<u64>,
    pub movestogo: Option<u32>,
    pub depth: Option<i32>,
    pub nodes: Option<u64>,
    pub mate: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciCommand {
    Uci,
    IsReady,
    NewGame,
    Position {
        startpos: bool,
        fen: Option<String>,
        moves: Vec<String>,
    },
    Go(GoParams),
    SetOption {
        name: String,
        value: Option<String>,
    },
    Stop,
    Quit,
    /// Debugging extension: leaf count of the current position.
    Perft(u32),
}
