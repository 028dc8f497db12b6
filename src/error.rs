use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the simulator
#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error("Invalid configuration: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("Failed to read trace: {0}")]
    TraceError(#[from] TraceError),

    #[error("Memory error: {0}")]
    MemoryError(#[from] MemoryError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

/// Errors raised while validating the run configuration.
/// The simulation core is never built from a config that fails these.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("Cache Size must be between 8 and 8192 KB, got {0}")]
    CacheSize(u32),

    #[error("Block Size must be 8, 16, 32, or 64 bytes, got {0}")]
    BlockSize(u32),

    #[error("Associativity must be 1, 2, 4, 8, or 16, got {0}")]
    Associativity(u32),

    #[error("Replacement Policy must be RR or RND, got '{0}'")]
    ReplacementPolicy(String),

    #[error("Physical Memory must be a power of 2 in 128..=4096 MB, got {0}")]
    PhysicalMemory(u32),

    #[error("Utilization must be between 0 and 100%, got {0}")]
    Utilization(u32),

    #[error("Instructions / Time Slice must be -1 or positive, got {0}")]
    Instructions(i64),

    #[error("Must specify between 1 and 3 Trace Files. You provided {0}")]
    TraceFileCount(usize),

    #[error("{sets} sets of {block_size} B need over {address_bits} bits")]
    Geometry {
        sets: u32,
        block_size: u32,
        address_bits: u32,
    },
}

/// Broken invariants of the memory hierarchy
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MemoryError {
    #[error("Physical page {0:#x} must be free or mapped exactly once")]
    PageOwnership(u32),

    #[error("Block in set {index} way {way} caches reclaimed page {ppn:#x}")]
    StaleBlock { index: usize, way: usize, ppn: u32 },
}

/// Errors related to trace files
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Failed to read trace file '{0}': {1}")]
    FileReadError(PathBuf, #[source] std::io::Error),

    #[error("Malformed record in '{path}' at line {line}: {reason}")]
    ParseError {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

/// Type alias for Result with SimulatorError
pub type SimulatorResult<T> = Result<T, SimulatorError>;
