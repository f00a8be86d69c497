//! Time management.
//!
//! Two policies behind one interface. Depth/move-time handles `go depth`,
//! `go movetime`, `go nodes` and `go infinite`; tournament mode splits the
//! remaining clock. The hard timeout becomes a timer-driven cancellation,
//! the soft timeout is polled between completed root iterations, and the
//! ideal budget stretches when the score swings between iterations.

use std::time::{Duration, Instant};

use crate::board::Color;

use super::limits::Limits;

pub enum TimeManager {
    DepthMoveTime {
        started: Instant,
        move_time: u64,
        depth: i32,
        nodes: u64,
    },
    Tournament {
        started: Instant,
        hard: Duration,
        ideal: Duration,
        last_score: i32,
    },
}

impl TimeManager {
    pub fn new(limits: &Limits, overhead: u64, side: Color) -> TimeManager {
        let started = Instant::now();
        if limits.white_time == 0 && limits.black_time == 0 {
            return TimeManager::DepthMoveTime {
                started,
                move_time: limits.move_time,
                depth: limits.depth,
                nodes: limits.nodes,
            };
        }

        let (time_left, inc) = match side {
            Color::White => (limits.white_time, limits.white_increment),
            Color::Black => (limits.black_time, limits.black_increment),
        };
        let moves_to_go = limits.moves_to_go as u64;

        let (ideal, hard) = if moves_to_go > 0 {
            (
                (time_left / (moves_to_go + 5) + inc) * 3 / 4,
                (time_left / (moves_to_go + 7) + inc) * 4,
            )
        } else {
            let ideal = (time_left + 25 * inc) / 50;
            (ideal, 5 * ideal)
        };

        let cap = time_left.saturating_sub(overhead);
        TimeManager::Tournament {
            started,
            ideal: Duration::from_millis(ideal.min(cap)),
            hard: Duration::from_millis(hard.min(cap)),
            last_score: 0,
        }
    }

    /// Deadline after which the search is cancelled outright. `None` means
    /// unlimited (`go infinite` or plain `go depth`).
    pub fn hard_timeout(&self) -> Option<Duration> {
        match self {
            TimeManager::DepthMoveTime { move_time, .. } => {
                if *move_time > 0 {
                    Some(Duration::from_millis(*move_time))
                } else {
                    None
                }
            }
            TimeManager::Tournament { hard, .. } => Some(*hard),
        }
    }

    /// Checked between completed iterations at the root.
    pub fn is_soft_timeout(&self, depth: i32, nodes: u64) -> bool {
        match self {
            TimeManager::DepthMoveTime {
                depth: max_depth,
                nodes: max_nodes,
                ..
            } => {
                (*max_depth > 0 && depth >= *max_depth) || (*max_nodes > 0 && nodes >= *max_nodes)
            }
            TimeManager::Tournament { started, ideal, .. } => started.elapsed() >= *ideal,
        }
    }

    /// Stretch the ideal budget when the score is unstable: more time after
    /// drops of 16/21/61 cp, a little more after jumps of 23/46 cp.
    pub fn update_time(&mut self, depth: i32, score: i32) {
        let TimeManager::Tournament { ideal, last_score, .. } = self else {
            return;
        };
        let previous = *last_score;
        *last_score = score;
        if depth < 4 {
            return;
        }

        if previous > score + 16 {
            *ideal += *ideal / 20;
        }
        if previous > score + 21 {
            *ideal += *ideal / 20;
        }
        if previous > score + 61 {
            *ideal += *ideal / 20;
        }

        if previous + 23 < score {
            *ideal += *ideal / 40;
        }
        if previous + 46 < score {
            *ideal += *ideal / 20;
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            TimeManager::DepthMoveTime { started, .. } | TimeManager::Tournament { started, .. } => {
                started.elapsed()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_limit_is_a_soft_timeout() {
        let tm = TimeManager::new(&Limits::depth(6), 50, Color::White);
        assert!(tm.hard_timeout().is_none());
        assert!(!tm.is_soft_timeout(5, 0));
        assert!(tm.is_soft_timeout(6, 0));
    }

    #[test]
    fn node_limit_is_a_soft_timeout() {
        let limits = Limits { nodes: 10_000, ..Limits::default() };
        let tm = TimeManager::new(&limits, 50, Color::White);
        assert!(!tm.is_soft_timeout(30, 9_999));
        assert!(tm.is_soft_timeout(1, 10_000));
    }

    #[test]
    fn move_time_sets_only_the_hard_deadline() {
        let tm = TimeManager::new(&Limits::move_time(1500), 50, Color::White);
        assert_eq!(tm.hard_timeout(), Some(Duration::from_millis(1500)));
        assert!(!tm.is_soft_timeout(60, u64::MAX - 1));
    }

    #[test]
    fn infinite_never_times_out() {
        let tm = TimeManager::new(&Limits { infinite: true, ..Limits::default() }, 50, Color::White);
        assert!(tm.hard_timeout().is_none());
        assert!(!tm.is_soft_timeout(120, 1 << 40));
    }

    #[test]
    fn tournament_budget_with_moves_to_go() {
        let limits = Limits {
            white_time: 60_000,
            white_increment: 1_000,
            moves_to_go: 35,
            ..Limits::default()
        };
        let tm = TimeManager::new(&limits, 50, Color::White);
        let TimeManager::Tournament { ideal, hard, .. } = &tm else {
            panic!("expected tournament manager");
        };
        assert_eq!(*ideal, Duration::from_millis((60_000 / 40 + 1_000) * 3 / 4));
        assert_eq!(*hard, Duration::from_millis((60_000 / 42 + 1_000) * 4));
        assert!(tm.hard_timeout().is_some());
    }

    #[test]
    fn tournament_sudden_death_split() {
        let limits = Limits { black_time: 30_000, ..Limits::default() };
        let tm = TimeManager::new(&limits, 50, Color::Black);
        let TimeManager::Tournament { ideal, hard, .. } = &tm else {
            panic!("expected tournament manager");
        };
        assert_eq!(*ideal, Duration::from_millis(600));
        assert_eq!(*hard, Duration::from_millis(3_000));
    }

    #[test]
    fn budgets_never_exceed_clock_minus_overhead() {
        let limits = Limits { white_time: 200, ..Limits::default() };
        let tm = TimeManager::new(&limits, 50, Color::White);
        assert!(tm.hard_timeout().unwrap() <= Duration::from_millis(150));
    }

    #[test]
    fn score_drop_stretches_ideal_time() {
        let limits = Limits { white_time: 60_000, ..Limits::default() };
        let mut tm = TimeManager::new(&limits, 50, Color::White);
        let before = match &tm {
            TimeManager::Tournament { ideal, .. } => *ideal,
            _ => unreachable!(),
        };
        tm.update_time(5, 100);
        // Score collapses by 100 cp: all three drop rules fire.
        tm.update_time(6, 0);
        let after = match &tm {
            TimeManager::Tournament { ideal, .. } => *ideal,
            _ => unreachable!(),
        };
        let expected = before + before / 20;
        let expected = expected + expected / 20;
        let expected = expected + expected / 20;
        assert_eq!(after, expected);

        // Shallow iterations never adjust.
        let mut tm2 = TimeManager::new(&limits, 50, Color::White);
        tm2.update_time(2, 500);
        tm2.update_time(3, -500);
        let unchanged = match &tm2 {
            TimeManager::Tournament { ideal, .. } => *ideal,
            _ => unreachable!(),
        };
        assert_eq!(unchanged, before);
    }
}
