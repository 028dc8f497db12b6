//! Set-associative cache implementation

use tracing::trace;

use super::decoder::{get_log_2, is_pow_2, AddressDecoder};
use super::mmu::PageInvalidator;
use super::policy::{ReplacementPolicy, VictimSelector};
use super::AccessKind;
use crate::error::ConfigError;

/// Cost of one memory read when filling a block, in cycles
pub const MEMORY_READ_CYCLES: u64 = 4;
/// Bytes moved per memory read
pub const MEMORY_READ_BYTES: u32 = 4;
pub const HIT_CYCLES: u64 = 1;
/// Effective-address computation, charged to data misses
pub const DATA_ACCESS_CYCLES: u64 = 1;

/// Fixed cache shape for one run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheGeometry {
    pub cache_size: u32,
    pub block_size: u32,
    pub associativity: u32,
    pub total_blocks: u32,
    pub sets: u32,
    pub offset_bits: u32,
    pub index_bits: u32,
    pub tag_bits: u32,
}

impl CacheGeometry {
    pub fn make(
        cache_size_kb: u32,
        block_size: u32,
        associativity: u32,
        address_bits: u32,
    ) -> Result<Self, ConfigError> {
        let cache_size = cache_size_kb * 1024;
        if !is_pow_2(block_size) || cache_size % block_size != 0 {
            return Err(ConfigError::BlockSize(block_size));
        }
        let total_blocks = cache_size / block_size;
        if !is_pow_2(associativity) || total_blocks % associativity != 0 {
            return Err(ConfigError::Associativity(associativity));
        }
        let sets = total_blocks / associativity;

        let offset_bits = get_log_2(block_size);
        let index_bits = get_log_2(sets);
        // A non power of 2 set count cannot be addressed by an index field
        if !is_pow_2(sets) || offset_bits + index_bits >= address_bits {
            return Err(ConfigError::Geometry {
                sets,
                block_size,
                address_bits,
            });
        }

        Ok(Self {
            cache_size,
            block_size,
            associativity,
            total_blocks,
            sets,
            offset_bits,
            index_bits,
            tag_bits: address_bits - index_bits - offset_bits,
        })
    }

    pub fn decoder(&self) -> AddressDecoder {
        AddressDecoder::new(self.offset_bits, self.index_bits)
    }

    /// Tag plus valid bit for every block, in bytes
    pub fn overhead_bytes(&self) -> u64 {
        (self.tag_bits as u64 + 1) * self.total_blocks as u64 / 8
    }

    /// Data plus overhead, in bytes
    pub fn footprint_bytes(&self) -> u64 {
        self.cache_size as u64 + self.overhead_bytes()
    }

    /// Cycles needed to fill one block from memory
    pub fn miss_penalty(&self) -> u64 {
        MEMORY_READ_CYCLES * self.block_size.div_ceil(MEMORY_READ_BYTES) as u64
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Block {
    pub valid: bool,
    pub tag: u32,
}

/// One row of the cache; the position in `blocks` is the way
#[derive(Clone, Debug)]
pub struct CacheSet {
    pub blocks: Vec<Block>,
}

impl CacheSet {
    fn new(associativity: usize) -> Self {
        Self {
            blocks: vec![Block::default(); associativity],
        }
    }

    pub fn lookup(&self, tag: u32) -> Option<usize> {
        self.blocks
            .iter()
            .position(|block| block.valid && block.tag == tag)
    }

    pub fn first_empty(&self) -> Option<usize> {
        self.blocks.iter().position(|block| !block.valid)
    }
}

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct CacheHistory {
    pub num_access: u64,
    pub num_hit: u64,
    pub num_miss: u64,
    pub num_compulsory: u64,
    pub num_conflict: u64,
    /// Blocks dropped because their page was reclaimed
    pub num_invalidated: u64,
}

/// Outcome of a single cache access, with the way that now holds the tag
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheResult {
    Hit { way: usize },
    CompulsoryMiss { way: usize },
    ConflictMiss { way: usize },
}

impl CacheResult {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheResult::Hit { .. })
    }

    pub fn way(&self) -> usize {
        match *self {
            CacheResult::Hit { way }
            | CacheResult::CompulsoryMiss { way }
            | CacheResult::ConflictMiss { way } => way,
        }
    }
}

/// Cache implementation
#[derive(Clone, Debug)]
pub struct Cache {
    pub geometry: CacheGeometry,
    pub history: CacheHistory,
    pub sets: Vec<CacheSet>,

    decoder: AddressDecoder,
    selector: VictimSelector,
}

impl Cache {
    pub fn make(
        geometry: CacheGeometry,
        policy: ReplacementPolicy,
        seed: u64,
    ) -> Self {
        let sets = (0..geometry.sets)
            .map(|_| CacheSet::new(geometry.associativity as usize))
            .collect();
        Self {
            geometry,
            history: CacheHistory::default(),
            sets,
            decoder: geometry.decoder(),
            selector: VictimSelector::make(policy, seed),
        }
    }

    pub fn decoder(&self) -> &AddressDecoder {
        &self.decoder
    }

    /// Access the block with `tag` in set `index`, filling it on a miss.
    /// The timing cost of the access is added to `cycles`.
    pub fn access(
        &mut self,
        index: usize,
        tag: u32,
        kind: AccessKind,
        cycles: &mut u64,
    ) -> CacheResult {
        assert!(
            index < self.sets.len(),
            "set index {} out of range ({} sets)",
            index,
            self.sets.len()
        );
        self.history.num_access += 1;

        let set = &mut self.sets[index];
        if let Some(way) = set.lookup(tag) {
            self.history.num_hit += 1;
            *cycles += HIT_CYCLES;
            trace!(index, tag, way, "cache hit");
            return CacheResult::Hit { way };
        }

        self.history.num_miss += 1;
        *cycles += self.geometry.miss_penalty();

        let result = if let Some(way) = set.first_empty() {
            self.history.num_compulsory += 1;
            CacheResult::CompulsoryMiss { way }
        } else {
            self.history.num_conflict += 1;
            let way = self.selector.select(set.blocks.len());
            CacheResult::ConflictMiss { way }
        };
        set.blocks[result.way()] = Block { valid: true, tag };

        if kind == AccessKind::Data {
            *cycles += DATA_ACCESS_CYCLES;
        }

        trace!(index, tag, ?result, "cache miss");
        result
    }

    /// Look up an address without touching counters or contents
    pub fn probe(&self, address: u32) -> Option<usize> {
        let (tag, index) = self.decoder.split_cache(address);
        self.sets[index].lookup(tag)
    }

    pub fn valid_blocks(&self) -> u64 {
        self.sets
            .iter()
            .flat_map(|set| set.blocks.iter())
            .filter(|block| block.valid)
            .count() as u64
    }

    pub fn unused_blocks(&self) -> u64 {
        self.geometry.total_blocks as u64 - self.valid_blocks()
    }
}

impl PageInvalidator for Cache {
    /// Drop every block whose contents came from physical page `ppn`.
    /// Scans the whole cache and returns the number of blocks dropped.
    fn invalidate_page(&mut self, ppn: u32) -> usize {
        let decoder = self.decoder;
        let mut dropped = 0;
        for (index, set) in self.sets.iter_mut().enumerate() {
            for block in set.blocks.iter_mut() {
                if block.valid && decoder.block_page(block.tag, index) == ppn {
                    block.valid = false;
                    dropped += 1;
                }
            }
        }
        self.history.num_invalidated += dropped as u64;
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_cache(associativity: u32, policy: ReplacementPolicy) -> Cache {
        // 8 KB, 16-byte blocks, 128 MB of physical memory
        let geometry = CacheGeometry::make(8, 16, associativity, 27).unwrap();
        Cache::make(geometry, policy, 7)
    }

    #[test]
    fn test_geometry_scenario() {
        let geometry = CacheGeometry::make(8, 16, 1, 27).unwrap();
        assert_eq!(geometry.total_blocks, 512);
        assert_eq!(geometry.sets, 512);
        assert_eq!(geometry.offset_bits, 4);
        assert_eq!(geometry.index_bits, 9);
        assert_eq!(geometry.tag_bits, 14);
        assert_eq!(geometry.overhead_bytes(), 960);
        assert_eq!(geometry.footprint_bytes(), 9152);
        assert_eq!(
            geometry.sets * geometry.associativity,
            geometry.total_blocks
        );
    }

    #[test]
    fn test_geometry_rejects_bad_shapes() {
        assert_eq!(
            CacheGeometry::make(8, 24, 1, 27),
            Err(ConfigError::BlockSize(24))
        );
        assert_eq!(
            CacheGeometry::make(8, 16, 3, 27),
            Err(ConfigError::Associativity(3))
        );
        // 8 MB direct-mapped cache with a 16 MB address space leaves no tag
        assert!(CacheGeometry::make(8192, 64, 1, 23).is_err());
    }

    #[test]
    fn test_miss_penalty() {
        let geometry = CacheGeometry::make(8, 8, 1, 27).unwrap();
        assert_eq!(geometry.miss_penalty(), 8);
        let geometry = CacheGeometry::make(8, 64, 1, 27).unwrap();
        assert_eq!(geometry.miss_penalty(), 64);
    }

    #[test]
    fn test_round_robin_eviction_order() {
        let mut cache = small_cache(2, ReplacementPolicy::RoundRobin);
        let mut cycles = 0;

        let first = cache.access(3, 0xa, AccessKind::Instruction, &mut cycles);
        let second = cache.access(3, 0xb, AccessKind::Instruction, &mut cycles);
        let third = cache.access(3, 0xc, AccessKind::Instruction, &mut cycles);

        assert_eq!(first, CacheResult::CompulsoryMiss { way: 0 });
        assert_eq!(second, CacheResult::CompulsoryMiss { way: 1 });
        assert_eq!(third, CacheResult::ConflictMiss { way: 0 });
        assert_eq!(cache.sets[3].blocks[0], Block { valid: true, tag: 0xc });
        assert_eq!(cache.sets[3].blocks[1], Block { valid: true, tag: 0xb });
        assert_eq!(cache.history.num_compulsory, 2);
        assert_eq!(cache.history.num_conflict, 1);
        assert_eq!(cycles, 3 * 16);
    }

    #[test]
    fn test_repeated_hit_is_stable() {
        let mut cache = small_cache(4, ReplacementPolicy::Random);
        let mut cycles = 0;
        cache.access(1, 0x55, AccessKind::Data, &mut cycles);
        let before = cache.sets[1].clone();

        let a = cache.access(1, 0x55, AccessKind::Data, &mut cycles);
        let b = cache.access(1, 0x55, AccessKind::Data, &mut cycles);

        assert!(a.is_hit());
        assert_eq!(a, b);
        assert_eq!(cache.sets[1].blocks, before.blocks);
        // Miss with data penalty, then two single-cycle hits
        assert_eq!(cycles, 16 + 1 + 2);
    }

    #[test]
    fn test_no_duplicate_tags_in_set() {
        let mut cache = small_cache(4, ReplacementPolicy::Random);
        let mut cycles = 0;
        for round in 0..50u32 {
            cache.access(0, round % 6, AccessKind::Instruction, &mut cycles);
            let valid_tags: Vec<_> = cache.sets[0]
                .blocks
                .iter()
                .filter(|b| b.valid)
                .map(|b| b.tag)
                .collect();
            let mut deduped = valid_tags.clone();
            deduped.sort_unstable();
            deduped.dedup();
            assert_eq!(valid_tags.len(), deduped.len());
        }
        let h = cache.history;
        assert_eq!(h.num_hit + h.num_miss, h.num_access);
        assert_eq!(h.num_compulsory + h.num_conflict, h.num_miss);
    }

    #[test]
    fn test_invalidate_page() {
        let mut cache = small_cache(2, ReplacementPolicy::RoundRobin);
        let mut cycles = 0;
        // Two addresses on page 5, one on page 6
        for address in [0x5000u32, 0x5ff0, 0x6010] {
            let (tag, index) = cache.decoder().split_cache(address);
            cache.access(index, tag, AccessKind::Data, &mut cycles);
        }
        assert_eq!(cache.valid_blocks(), 3);

        assert_eq!(cache.invalidate_page(5), 2);
        assert_eq!(cache.probe(0x5000), None);
        assert_eq!(cache.probe(0x5ff0), None);
        assert!(cache.probe(0x6010).is_some());
        assert_eq!(cache.unused_blocks(), 512 - 1);
        assert_eq!(cache.history.num_invalidated, 2);

        // Invalidated slots are filled again as compulsory misses
        let (tag, index) = cache.decoder().split_cache(0x5000);
        let result = cache.access(index, tag, AccessKind::Data, &mut cycles);
        assert!(matches!(result, CacheResult::CompulsoryMiss { .. }));
    }

    #[test]
    #[should_panic]
    fn test_index_out_of_range() {
        let mut cache = small_cache(1, ReplacementPolicy::RoundRobin);
        cache.access(512, 0, AccessKind::Instruction, &mut 0);
    }
}
