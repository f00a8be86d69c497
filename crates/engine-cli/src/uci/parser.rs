//! UCI command parser.

use anyhow::{anyhow, Result};

use super::commands::{GoParams, UciCommand};

/// Parse one line of UCI input.
pub fn parse_uci_command(line: &str) -> Result<UciCommand> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.is_empty() {
        return Err(anyhow!("empty command"));
    }

    match parts[0] {
        "uci" => Ok(UciCommand::Uci),
        "isready" => Ok(UciCommand::IsReady),
        "ucinewgame" => Ok(UciCommand::NewGame),
        "stop" => Ok(UciCommand::Stop),
        "quit" => Ok(UciCommand::Quit),

        "setoption" => parse_setoption(&parts[1..]),
        "position" => parse_position(&parts[1..]),
        "go" => parse_go(&parts[1..]),
        "perft" => parse_perft(&parts[1..]),

        other => Err(anyhow!("unknown command: {other}")),
    }
}

/// `setoption name <name> [value <value>]`; names and values may contain
/// spaces.
fn parse_setoption(parts: &[&str]) -> Result<UciCommand> {
    if parts.len() < 2 || parts[0] != "name" {
        return Err(anyhow!("invalid setoption format"));
    }

    let value_pos = parts.iter().position(|&p| p == "value");
    let name = match value_pos {
        Some(pos) => parts[1..pos].join(" "),
        None => parts[1..].join(" "),
    };
    if name.is_empty() {
        return Err(anyhow!("setoption requires a name"));
    }

    let value = value_pos.and_then(|pos| {
        let joined = parts[pos + 1..].join(" ");
        if joined.is_empty() {
            None
        } else {
            Some(joined)
        }
    });

    Ok(UciCommand::SetOption { name, value })
}

fn parse_position(parts: &[&str]) -> Result<UciCommand> {
    if parts.is_empty() {
        return Err(anyhow!("invalid position format"));
    }

    let (startpos, fen, moves_start) = if parts[0] == "startpos" {
        (true, None, 1)
    } else if parts[0] == "fen" {
        let moves_pos = parts.iter().position(|&p| p == "moves");
        let fen_end = moves_pos.unwrap_or(parts.len());
        if fen_end <= 1 {
            return Err(anyhow!("position fen requires a FEN record"));
        }
        (false, Some(parts[1..fen_end].join(" ")), fen_end)
    } else {
        return Err(anyhow!("position must start with 'startpos' or 'fen'"));
    };

    let moves = if moves_start < parts.len() && parts[moves_start] == "moves" {
        parts[moves_start + 1..].iter().map(|s| s.to_string()).collect()
    } else {
        Vec::new()
    };

    Ok(UciCommand::Position { startpos, fen, moves })
}

fn parse_go(parts: &[&str]) -> Result<UciCommand> {
    fn value<T: std::str::FromStr>(parts: &[&str], i: usize, keyword: &str) -> Result<T> {
        let raw = parts
            .get(i)
            .ok_or_else(|| anyhow!("go {keyword} requires a value"))?;
        raw.parse().map_err(|_| anyhow!("invalid {keyword} value: {raw}"))
    }

    let mut params = GoParams::default();
    let mut i = 0;
    while i < parts.len() {
        match parts[i] {
            "ponder" => params.ponder = true,
            "infinite" => params.infinite = true,
            "wtime" => {
                i += 1;
                params.wtime = Some(value(parts, i, "wtime")?);
            }
            "btime" => {
                i += 1;
                params.btime = Some(value(parts, i, "btime")?);
            }
            "winc" => {
                i += 1;
                params.winc = Some(value(parts, i, "winc")?);
            }
            "binc" => {
                i += 1;
                params.binc = Some(value(parts, i, "binc")?);
            }
            "movetime" => {
                i += 1;
                params.movetime = Some(value(parts, i, "movetime")?);
            }
            "movestogo" => {
                i += 1;
                params.movestogo = Some(value(parts, i, "movestogo")?);
            }
            "depth" => {
                i += 1;
                params.depth = Some(value(parts, i, "depth")?);
            }
            "nodes" => {
                i += 1;
                params.nodes = Some(value(parts, i, "nodes")?);
            }
            "mate" => {
                i += 1;
                params.mate = Some(value(parts, i, "mate")?);
            }
            other => return Err(anyhow!("unknown go parameter: {other}")),
        }
        i += 1;
    }
    Ok(UciCommand::Go(params))
}

fn parse_perft(parts: &[&str]) -> Result<UciCommand> {
    let depth = parts
        .first()
        .ok_or_else(|| anyhow!("perft requires a depth"))?
        .parse()
        .map_err(|_| anyhow!("invalid perft depth"))?;
    Ok(UciCommand::Perft(depth))
}
