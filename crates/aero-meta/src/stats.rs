use std::sync::atomic::{AtomicU64, Ordering};

use crate::save::SaveStack;

/// Counters for the meta layer.
///
/// Updated from the context's thread; readable from anywhere through
/// [`MetaStats::snapshot`].
#[derive(Debug, Default)]
pub struct MetaStats {
    meta_draws: AtomicU64,
    fallbacks: AtomicU64,
    tiles: AtomicU64,
    temp_reallocations: AtomicU64,
    program_compiles: AtomicU64,
    program_cache_hits: AtomicU64,
    program_compile_failures: AtomicU64,
}

impl MetaStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_meta_draws(&self) {
        self.meta_draws.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_fallbacks(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_tiles(&self) {
        self.tiles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_temp_reallocations(&self) {
        self.temp_reallocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_program_compiles(&self) {
        self.program_compiles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_program_cache_hits(&self) {
        self.program_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_program_compile_failures(&self) {
        self.program_compile_failures
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, save: &SaveStack) -> MetaStatsSnapshot {
        MetaStatsSnapshot {
            meta_draws: self.meta_draws.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            tiles: self.tiles.load(Ordering::Relaxed),
            temp_reallocations: self.temp_reallocations.load(Ordering::Relaxed),
            program_compiles: self.program_compiles.load(Ordering::Relaxed),
            program_cache_hits: self.program_cache_hits.load(Ordering::Relaxed),
            program_compile_failures: self.program_compile_failures.load(Ordering::Relaxed),
            save_begins: save.begins(),
            save_ends: save.ends(),
            save_max_depth: save.max_depth() as u64,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetaStatsSnapshot {
    pub meta_draws: u64,
    pub fallbacks: u64,
    pub tiles: u64,
    pub temp_reallocations: u64,
    pub program_compiles: u64,
    pub program_cache_hits: u64,
    pub program_compile_failures: u64,
    pub save_begins: u64,
    pub save_ends: u64,
    pub save_max_depth: u64,
}

impl MetaStatsSnapshot {
    pub fn to_json(self) -> String {
        format!(
            "{{\"meta_draws\":{},\"fallbacks\":{},\"tiles\":{},\"temp_reallocations\":{},\"program_compiles\":{},\"program_cache_hits\":{},\"program_compile_failures\":{},\"save_stack\":{{\"begins\":{},\"ends\":{},\"max_depth\":{}}}}}",
            self.meta_draws,
            self.fallbacks,
            self.tiles,
            self.temp_reallocations,
            self.program_compiles,
            self.program_cache_hits,
            self.program_compile_failures,
            self.save_begins,
            self.save_ends,
            self.save_max_depth,
        )
    }
}
