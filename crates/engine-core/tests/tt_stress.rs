//! Concurrent stress of the lock-free transposition table: under racing
//! writers, a probe must never return a payload that does not belong to the
//! probed key.

use std::sync::Arc;

use engine_core::search::tt::{AtomicTable, TransTable, TT_EXACT};
use engine_core::Move;

const WRITERS: u64 = 4;
const KEYS_PER_WRITER: u64 = 200_000;

fn next_key(key: u64) -> u64 {
    key.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407)
}

fn seed(stream: u64) -> u64 {
    0x9e37_79b9_7f4a_7c15u64.wrapping_mul(stream + 1)
}

/// Payload derived from the key, so readers can verify what they get.
fn expected(key: u64) -> (i32, i32, Move) {
    let value = ((key >> 7) & 0x3fff) as i32 - 8_192;
    let depth = (key & 63) as i32;
    let mv = Move((key >> 32) as u32);
    (value, depth, mv)
}

#[test]
fn racing_writers_never_corrupt_probes() {
    // Small table so every slot is contested and overwritten constantly.
    let table = Arc::new(AtomicTable::new(1));

    let mut handles = Vec::new();
    for stream in 0..WRITERS {
        let table = Arc::clone(&table);
        handles.push(std::thread::spawn(move || {
            let mut key = seed(stream);
            for _ in 0..KEYS_PER_WRITER {
                key = next_key(key);
                let (value, depth, mv) = expected(key);
                table.set(key, value, depth, mv, TT_EXACT, 0);
            }
        }));
    }

    // Readers walk the same key streams while the writers race, so most
    // probes target keys that are being written somewhere in the table.
    for stream in 0..WRITERS {
        let table = Arc::clone(&table);
        handles.push(std::thread::spawn(move || {
            let mut key = seed(WRITERS - 1 - stream);
            for _ in 0..KEYS_PER_WRITER {
                key = next_key(key);
                if let Some(probe) = table.get(key, 0) {
                    // A hit must carry exactly the payload stored under this
                    // key; the XOR discipline turns torn or foreign data
                    // into a miss instead.
                    let (value, depth, mv) = expected(key);
                    assert_eq!(probe.value, value, "score under foreign key");
                    assert_eq!(probe.depth, depth, "depth under foreign key");
                    assert_eq!(probe.mv, mv, "move under foreign key");
                    assert_eq!(probe.flag, TT_EXACT);
                }
            }
        }));
    }

    for handle in handles {
        handle.join().expect("stress thread panicked");
    }

    // After the dust settles, probing a key that was written must yield
    // either its own payload or a miss (overwritten by another stream) —
    // never someone else's data.
    let mut key = seed(0);
    for _ in 0..KEYS_PER_WRITER {
        key = next_key(key);
    }
    let (value, depth, mv) = expected(key);
    match table.get(key, 0) {
        Some(probe) => {
            assert_eq!((probe.value, probe.depth, probe.mv), (value, depth, mv));
        }
        None => {
            // Another stream overwrote the slot; a miss is acceptable, a
            // wrong payload is not.
        }
    }
}
