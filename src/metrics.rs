//! End-of-run statistics derived from the memory system counters

use std::path::PathBuf;

use crate::memory::cache::{CacheGeometry, CacheHistory};
use crate::memory::mmu::{MemoryGeometry, PageHistory, MAX_PAGE_TABLE_ENTRIES};
use crate::memory::{MemorySystem, RunHistory};

/// Price of cache silicon, in dollars per KB
pub const COST_PER_KB: f64 = 0.07;

/// Page table occupancy of one process
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessUsage {
    pub trace_file: PathBuf,
    pub used_entries: u64,
    pub used_percent: f64,
    /// Bytes of page table reserved but never filled
    pub wasted_bytes: f64,
}

/// Everything reported at the end of a run
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationReport {
    pub cache_geometry: CacheGeometry,
    pub memory_geometry: MemoryGeometry,

    pub cache: CacheHistory,
    pub pages: PageHistory,
    pub run: RunHistory,

    pub hit_rate: f64,
    pub miss_rate: f64,
    pub cpi: f64,

    pub processes: Vec<ProcessUsage>,

    pub unused_blocks: u64,
    pub unused_bytes: u64,
    pub unused_percent: f64,
    pub waste_cost: f64,
}

impl SimulationReport {
    pub fn virtual_pages_mapped(&self) -> u64 {
        self.pages.num_hit + self.pages.num_from_free
    }

    pub fn unused_kb(&self) -> f64 {
        self.unused_bytes as f64 / 1024.0
    }
}

/// Cost of building a cache of this shape, tag and valid bits included
pub fn implementation_cost(geometry: &CacheGeometry) -> f64 {
    geometry.footprint_bytes() as f64 / 1024.0 * COST_PER_KB
}

/// Collect the final report from a finished run
pub fn aggregate(
    mem: &MemorySystem,
    trace_files: &[PathBuf],
) -> SimulationReport {
    let cache = mem.cache.history;
    let geometry = mem.cache.geometry;
    let memory_geometry = mem.mmu.geometry;

    let hit_rate = if cache.num_access > 0 {
        cache.num_hit as f64 * 100.0 / cache.num_access as f64
    } else {
        0.0
    };
    let miss_rate = if cache.num_access > 0 { 100.0 - hit_rate } else { 0.0 };
    let cpi = if mem.history.inst_count > 0 {
        mem.history.cycle_count as f64 / mem.history.inst_count as f64
    } else {
        0.0
    };

    let processes = mem
        .mmu
        .page_tables
        .iter()
        .enumerate()
        .map(|(pid, table)| {
            let used_entries = table.len() as u64;
            let free_entries = MAX_PAGE_TABLE_ENTRIES as u64 - used_entries;
            ProcessUsage {
                trace_file: trace_files.get(pid).cloned().unwrap_or_default(),
                used_entries,
                used_percent: used_entries as f64 * 100.0
                    / MAX_PAGE_TABLE_ENTRIES as f64,
                wasted_bytes: free_entries as f64
                    * memory_geometry.pte_bits as f64
                    / 8.0,
            }
        })
        .collect();

    let unused_blocks = mem.cache.unused_blocks();
    let unused_bytes = unused_blocks * geometry.block_size as u64;
    let unused_percent =
        unused_bytes as f64 * 100.0 / geometry.cache_size as f64;

    SimulationReport {
        cache_geometry: geometry,
        memory_geometry,
        cache,
        pages: mem.mmu.history,
        run: mem.history,
        hit_rate,
        miss_rate,
        cpi,
        processes,
        unused_blocks,
        unused_bytes,
        unused_percent,
        waste_cost: unused_bytes as f64 / 1024.0 * COST_PER_KB,
    }
}
