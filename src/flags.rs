use std::path::PathBuf;

use crate::config::SimConfig;
use crate::error::ConfigError;

xflags::xflags! {
    /// Cache and virtual memory simulator for instruction/data traces.
    cmd CacheSimArgs {
        /// Cache size in KB (8 to 8192).
        optional -s, --cache-size size: u32

        /// Block size in bytes (8, 16, 32 or 64).
        optional -b, --block-size bytes: u32

        /// Associativity (1, 2, 4, 8 or 16).
        optional -a, --associativity ways: u32

        /// Replacement policy.
        /// RR: Round Robin
        /// RND: Random
        optional -r, --replacement policy: String

        /// Physical memory in MB (power of 2, 128 to 4096).
        optional -p, --physical-memory mb: u32

        /// Percentage of physical memory used by the OS (0 to 100).
        optional -u, --utilization percent: u32

        /// Instructions per time slice, -1 for All.
        optional -n, --instructions count: i64

        /// Trace file; give one to three, one per process.
        repeated -f, --file path: PathBuf

        /// Seed for the Random policy, for reproducible runs.
        optional --seed seed: u64

        /// Enables verbose mode, logging page faults and invalidations.
        optional -v, --verbose
    }
}

impl TryFrom<CacheSimArgs> for SimConfig {
    type Error = ConfigError;

    fn try_from(args: CacheSimArgs) -> Result<Self, Self::Error> {
        let policy = args
            .replacement
            .ok_or(ConfigError::Missing("Replacement Policy (-r)"))?;
        let instructions = args
            .instructions
            .ok_or(ConfigError::Missing("Instructions (-n)"))?;

        let config = SimConfig {
            cache_size_kb: args
                .cache_size
                .ok_or(ConfigError::Missing("Cache Size (-s)"))?,
            block_size: args
                .block_size
                .ok_or(ConfigError::Missing("Block Size (-b)"))?,
            associativity: args
                .associativity
                .ok_or(ConfigError::Missing("Associativity (-a)"))?,
            policy: policy
                .parse()
                .map_err(|_| ConfigError::ReplacementPolicy(policy))?,
            physical_memory_mb: args
                .physical_memory
                .ok_or(ConfigError::Missing("Physical Memory (-p)"))?,
            utilization_percent: args
                .utilization
                .ok_or(ConfigError::Missing("Utilization (-u)"))?,
            instructions_per_slice: SimConfig::parse_slice(instructions)?,
            trace_files: args.file,
            seed: args.seed,
        };
        config.validate()?;
        Ok(config)
    }
}
