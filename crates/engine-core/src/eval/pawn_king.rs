//! Pawn-king hash table.
//!
//! Caches the pawn-structure evaluation by `pawn_key`. Shared by all search
//! threads; entries use the same lock-free XOR publication discipline as the
//! transposition table, so a torn read is detected as a miss.

use std::sync::atomic::{AtomicU64, Ordering};

const ENTRY_BYTES: usize = 16;
const MIN_ENTRIES: usize = 1024;

struct PkEntry {
    key_xor_data: AtomicU64,
    data: AtomicU64,
}

pub struct PawnKingTable {
    entries: Vec<PkEntry>,
    mask: usize,
}

impl PawnKingTable {
    /// `size_mb` may be 0; the table then keeps a minimal footprint.
    pub fn new(size_mb: usize) -> PawnKingTable {
        let mut len = (size_mb * 1024 * 1024 / ENTRY_BYTES).max(MIN_ENTRIES);
        if !len.is_power_of_two() {
            len = len.next_power_of_two() / 2;
        }
        let entries = (0..len)
            .map(|_| PkEntry {
                key_xor_data: AtomicU64::new(0),
                data: AtomicU64::new(0),
            })
            .collect();
        PawnKingTable { entries, mask: len - 1 }
    }

    #[inline]
    pub fn get(&self, key: u64) -> Option<i32> {
        let entry = &self.entries[key as usize & self.mask];
        let data = entry.data.load(Ordering::Relaxed);
        if entry.key_xor_data.load(Ordering::Relaxed) ^ data != key {
            return None;
        }
        Some(data as i16 as i32)
    }

    #[inline]
    pub fn set(&self, key: u64, score: i32) {
        debug_assert!(i16::try_from(score).is_ok());
        let data = score as i16 as u16 as u64;
        let entry = &self.entries[key as usize & self.mask];
        entry.key_xor_data.store(key ^ data, Ordering::Relaxed);
        entry.data.store(data, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        for entry in &self.entries {
            entry.key_xor_data.store(0, Ordering::Relaxed);
            entry.data.store(0, Ordering::Relaxed);
        }
    }
}
