use std::path::PathBuf;
use std::process;

use sim_lib::config::SimConfig;
use sim_lib::error::SimulatorResult;
use sim_lib::memory::policy::ReplacementPolicy;
use sim_lib::run_wrapper::run;

const CACHE_SIZES_KB: [u32; 4] = [8, 64, 256, 1024];
const BLOCK_SIZES: [u32; 3] = [8, 16, 64];
const POLICIES: [ReplacementPolicy; 2] =
    [ReplacementPolicy::RoundRobin, ReplacementPolicy::Random];
const ASSOCIATIVITY: u32 = 4;

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::WARN)
        .init();

    if let Err(e) = run_eval() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run_eval() -> SimulatorResult<()> {
    let traces: Vec<PathBuf> =
        std::env::args().skip(1).map(PathBuf::from).collect();
    if traces.is_empty() {
        eprintln!("Usage: sweep-eval <trace file>...");
        process::exit(2);
    }

    let output_path = "eval/sweep_eval.csv";
    if let Some(parent) = std::path::Path::new(output_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(output_path)?;
    writer.write_record([
        "Trace File",
        "Cache Size (KB)",
        "Block Size (B)",
        "Policy",
        "Hit Rate (%)",
        "CPI",
    ])?;

    for trace in &traces {
        for cache_size_kb in CACHE_SIZES_KB {
            for block_size in BLOCK_SIZES {
                for policy in POLICIES {
                    let config = SimConfig {
                        cache_size_kb,
                        block_size,
                        associativity: ASSOCIATIVITY,
                        policy,
                        physical_memory_mb: 1024,
                        utilization_percent: 0,
                        instructions_per_slice: None,
                        trace_files: vec![trace.clone()],
                        seed: Some(0),
                    };
                    let name = trace.display().to_string();
                    eprintln!(
                        "Running: {} | {}KB | {}B | {}...",
                        name, cache_size_kb, block_size, policy
                    );

                    let (hit_rate, cpi) = match run(&config) {
                        Ok(result) => (
                            format!("{:.4}", result.report.hit_rate),
                            format!("{:.2}", result.report.cpi),
                        ),
                        Err(e) => {
                            eprintln!("Warning: Failed on '{}': {}", name, e);
                            ("Error".to_string(), "Error".to_string())
                        }
                    };
                    writer.write_record([
                        name,
                        cache_size_kb.to_string(),
                        block_size.to_string(),
                        policy.to_string(),
                        hit_rate,
                        cpi,
                    ])?;
                }
            }
        }
    }
    writer.flush()?;

    eprintln!("Done! Written to {}", output_path);
    Ok(())
}
