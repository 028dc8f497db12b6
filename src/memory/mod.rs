//! Memory structure
//!
//! Every access goes through the MMU first; the resulting physical
//! address is split into tag and index and looked up in the cache.
//! When the MMU reclaims a page, the cache drops everything it
//! holds from that page before the access continues.

pub mod cache;
pub mod decoder;
pub mod mmu;
pub mod policy;

use tracing::trace;

use cache::{Cache, CacheGeometry, CacheResult};
use mmu::{MemoryGeometry, Translation, MMU};
use policy::ReplacementPolicy;

use crate::config::SimConfig;
use crate::error::{ConfigError, MemoryError};

/// Base execution cost of every instruction, on top of its memory accesses
pub const INSTRUCTION_CYCLES: u64 = 2;
/// Width of one cache access
pub const WORD_BYTES: u32 = 4;

/// Mixed into the seed so the pager and the cache draw independent streams
const PAGER_SEED_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessKind {
    Instruction,
    Data,
}

/// One already-parsed trace event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessEvent {
    /// Instruction fetch of `length` bytes starting at `address`
    Fetch { address: u32, length: u32 },
    /// Operand access; `None` when the record carries no address
    Data { address: Option<u32> },
}

/// Run-wide counters that do not belong to the cache or the MMU
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct RunHistory {
    pub cycle_count: u64,
    pub inst_count: u64,
    pub instruction_bytes: u64,
    pub src_dst_bytes: u64,
}

/// Everything that happened to one word access
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessRecord {
    pub translation: Translation,
    pub tag: u32,
    pub index: usize,
    pub result: CacheResult,
}

/// State of one simulation run: the cache, the MMU and run counters
#[derive(Clone, Debug)]
pub struct MemorySystem {
    pub cache: Cache,
    pub mmu: MMU,
    pub history: RunHistory,
}

impl MemorySystem {
    pub fn make(
        cache_geometry: CacheGeometry,
        memory_geometry: MemoryGeometry,
        processes: usize,
        policy: ReplacementPolicy,
        seed: u64,
    ) -> Self {
        Self {
            cache: Cache::make(cache_geometry, policy, seed),
            mmu: MMU::make(
                memory_geometry,
                processes,
                policy,
                seed ^ PAGER_SEED_SALT,
            ),
            history: RunHistory::default(),
        }
    }

    /// Build the memory system for a validated configuration
    pub fn from_config(
        config: &SimConfig,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        let memory_geometry = config.memory_geometry();
        let cache_geometry = config.cache_geometry()?;
        Ok(Self::make(
            cache_geometry,
            memory_geometry,
            config.trace_files.len(),
            config.policy,
            seed,
        ))
    }

    pub fn processes(&self) -> usize {
        self.mmu.page_tables.len()
    }

    /// Translate and access one word of process `pid`.
    /// `None` when no physical page could back the access; the cache is
    /// not touched then.
    pub fn access(
        &mut self,
        pid: usize,
        virtual_address: u32,
        kind: AccessKind,
    ) -> Option<AccessRecord> {
        let cycles = &mut self.history.cycle_count;
        let translation = self.mmu.translate(
            pid,
            virtual_address,
            &mut self.cache,
            cycles,
        )?;
        let (tag, index) =
            self.cache.decoder().split_cache(translation.physical_address);
        let result = self.cache.access(index, tag, kind, cycles);
        trace!(
            pid,
            virtual_address,
            physical_address = translation.physical_address,
            ?result,
            "access"
        );
        Some(AccessRecord {
            translation,
            tag,
            index,
            result,
        })
    }

    /// Replay one trace event of process `pid`
    pub fn handle_event(&mut self, pid: usize, event: AccessEvent) {
        match event {
            AccessEvent::Fetch { address, length } => {
                self.history.inst_count += 1;
                self.history.instruction_bytes += length as u64;

                // Fetches never wrap past the top of the address space
                let end = (address as u64 + length as u64).min(1 << 32);
                let mut current = address as u64;
                while current < end {
                    self.access(pid, current as u32, AccessKind::Instruction);
                    current += WORD_BYTES as u64;
                }

                self.history.cycle_count += INSTRUCTION_CYCLES;
            }
            AccessEvent::Data { address: Some(address) } => {
                self.history.src_dst_bytes += WORD_BYTES as u64;
                self.access(pid, address, AccessKind::Data);
            }
            AccessEvent::Data { address: None } => {}
        }
    }

    /// Check page ownership and that no cached block outlived its page
    pub fn verify(&self) -> Result<(), MemoryError> {
        self.mmu.verify_ownership()?;
        let decoder = self.cache.decoder();
        for (index, set) in self.cache.sets.iter().enumerate() {
            for (way, block) in set.blocks.iter().enumerate() {
                if !block.valid {
                    continue;
                }
                let ppn = decoder.block_page(block.tag, index);
                if self.mmu.registry.owner(ppn).is_none() {
                    return Err(MemoryError::StaleBlock { index, way, ppn });
                }
            }
        }
        Ok(())
    }
}
