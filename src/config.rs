//! Run configuration and its validation

use std::path::PathBuf;

use crate::error::ConfigError;
use crate::memory::cache::CacheGeometry;
use crate::memory::decoder::is_pow_2;
use crate::memory::mmu::MemoryGeometry;
use crate::memory::policy::ReplacementPolicy;

pub const MIN_CACHE_KB: u32 = 8;
pub const MAX_CACHE_KB: u32 = 8192;
pub const MIN_BLOCK_SIZE: u32 = 8;
pub const MAX_BLOCK_SIZE: u32 = 64;
pub const ASSOCIATIVITIES: [u32; 5] = [1, 2, 4, 8, 16];
pub const MIN_MEMORY_MB: u32 = 128;
pub const MAX_MEMORY_MB: u32 = 4096;
pub const MAX_PROCESSES: usize = 3;

/// Parameters of one simulation run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimConfig {
    pub cache_size_kb: u32,
    pub block_size: u32,
    pub associativity: u32,
    pub policy: ReplacementPolicy,
    pub physical_memory_mb: u32,
    pub utilization_percent: u32,
    /// Instructions each process runs before yielding;
    /// `None` runs traces to completion
    pub instructions_per_slice: Option<u64>,
    /// One process per trace file
    pub trace_files: Vec<PathBuf>,
    /// Seed for the Random policy; drawn at start-up when absent
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            cache_size_kb: 512,
            block_size: 16,
            associativity: 4,
            policy: ReplacementPolicy::RoundRobin,
            physical_memory_mb: 1024,
            utilization_percent: 0,
            instructions_per_slice: None,
            trace_files: Vec::new(),
            seed: None,
        }
    }
}

impl SimConfig {
    /// Turn the `-n` argument into a slice length (-1 means All)
    pub fn parse_slice(instructions: i64) -> Result<Option<u64>, ConfigError> {
        match instructions {
            -1 => Ok(None),
            n if n >= 1 => Ok(Some(n as u64)),
            n => Err(ConfigError::Instructions(n)),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_CACHE_KB..=MAX_CACHE_KB).contains(&self.cache_size_kb) {
            return Err(ConfigError::CacheSize(self.cache_size_kb));
        }
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&self.block_size)
            || !is_pow_2(self.block_size)
        {
            return Err(ConfigError::BlockSize(self.block_size));
        }
        if !ASSOCIATIVITIES.contains(&self.associativity) {
            return Err(ConfigError::Associativity(self.associativity));
        }
        if !(MIN_MEMORY_MB..=MAX_MEMORY_MB).contains(&self.physical_memory_mb)
            || !is_pow_2(self.physical_memory_mb)
        {
            return Err(ConfigError::PhysicalMemory(self.physical_memory_mb));
        }
        if self.utilization_percent > 100 {
            return Err(ConfigError::Utilization(self.utilization_percent));
        }
        if self.instructions_per_slice == Some(0) {
            return Err(ConfigError::Instructions(0));
        }
        if !(1..=MAX_PROCESSES).contains(&self.trace_files.len()) {
            return Err(ConfigError::TraceFileCount(self.trace_files.len()));
        }
        // Catches caches whose set count is not a power of 2
        self.cache_geometry()?;
        Ok(())
    }

    pub fn memory_geometry(&self) -> MemoryGeometry {
        MemoryGeometry::make(self.physical_memory_mb, self.utilization_percent)
    }

    pub fn cache_geometry(&self) -> Result<CacheGeometry, ConfigError> {
        CacheGeometry::make(
            self.cache_size_kb,
            self.block_size,
            self.associativity,
            self.memory_geometry().address_bits,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SimConfig {
        SimConfig {
            trace_files: vec![PathBuf::from("a.trc")],
            ..Default::default()
        }
    }

    #[test]
    fn test_default_is_valid() {
        assert_eq!(config().validate(), Ok(()));
    }

    #[test]
    fn test_rejects_out_of_range() {
        let cases = [
            (
                SimConfig {
                    cache_size_kb: 4,
                    ..config()
                },
                ConfigError::CacheSize(4),
            ),
            (
                SimConfig {
                    block_size: 128,
                    ..config()
                },
                ConfigError::BlockSize(128),
            ),
            (
                SimConfig {
                    block_size: 24,
                    ..config()
                },
                ConfigError::BlockSize(24),
            ),
            (
                SimConfig {
                    associativity: 32,
                    ..config()
                },
                ConfigError::Associativity(32),
            ),
            (
                SimConfig {
                    physical_memory_mb: 1000,
                    ..config()
                },
                ConfigError::PhysicalMemory(1000),
            ),
            (
                SimConfig {
                    utilization_percent: 101,
                    ..config()
                },
                ConfigError::Utilization(101),
            ),
            (
                SimConfig {
                    trace_files: vec![],
                    ..config()
                },
                ConfigError::TraceFileCount(0),
            ),
        ];
        for (config, expected) in cases {
            assert_eq!(config.validate(), Err(expected));
        }
    }

    #[test]
    fn test_rejects_four_traces() {
        let config = SimConfig {
            trace_files: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            ..config()
        };
        assert_eq!(config.validate(), Err(ConfigError::TraceFileCount(4)));
    }

    #[test]
    fn test_rejects_uneven_cache() {
        // 12 KB of 16-byte blocks gives 768 sets
        let config = SimConfig {
            cache_size_kb: 12,
            associativity: 1,
            ..config()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Geometry { .. })
        ));
    }

    #[test]
    fn test_parse_slice() {
        assert_eq!(SimConfig::parse_slice(-1), Ok(None));
        assert_eq!(SimConfig::parse_slice(100), Ok(Some(100)));
        assert_eq!(
            SimConfig::parse_slice(0),
            Err(ConfigError::Instructions(0))
        );
        assert_eq!(
            SimConfig::parse_slice(-5),
            Err(ConfigError::Instructions(-5))
        );
    }

    #[test]
    fn test_derived_geometry() {
        let config = SimConfig {
            cache_size_kb: 8,
            block_size: 16,
            associativity: 1,
            physical_memory_mb: 128,
            utilization_percent: 10,
            ..config()
        };
        let cache = config.cache_geometry().unwrap();
        assert_eq!((cache.sets, cache.tag_bits), (512, 14));
        assert_eq!(config.memory_geometry().system_pages, 3277);
    }
}
