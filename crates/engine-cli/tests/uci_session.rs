//! End-to-end protocol test against the compiled binary.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn handshake_and_search() {
    let mut cmd = Command::cargo_bin("riposte").unwrap();
    cmd.write_stdin("uci\nisready\nposition startpos moves e2e4 e7e5\ngo depth 4\nquit\n");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("id name Riposte"))
        .stdout(predicate::str::contains("option name Hash"))
        .stdout(predicate::str::contains("uciok"))
        .stdout(predicate::str::contains("readyok"))
        .stdout(predicate::str::contains("bestmove"));
}

#[test]
fn perft_command_reports_counts() {
    let mut cmd = Command::cargo_bin("riposte").unwrap();
    cmd.write_stdin("position startpos\nperft 3\nquit\n");
    cmd.assert().success().stdout(predicate::str::contains("perft 3: 8902 nodes"));
}

#[test]
fn survives_garbage_input() {
    let mut cmd = Command::cargo_bin("riposte").unwrap();
    cmd.write_stdin("not-a-command\nisready\nquit\n");
    cmd.assert().success().stdout(predicate::str::contains("readyok"));
}
