use std::process;

use sim_lib::config::SimConfig;
use sim_lib::error::SimulatorResult;
use sim_lib::flags::CacheSimArgs;
use sim_lib::report::RunSummary;
use sim_lib::run_wrapper;
use tracing_subscriber::EnvFilter;

fn main() {
    let args = CacheSimArgs::from_env_or_exit();
    init_logging(args.verbose);

    if let Err(e) = run_sim(args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Diagnostics go to stderr; `-v` overrides RUST_LOG
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_sim(args: CacheSimArgs) -> SimulatorResult<()> {
    let config = SimConfig::try_from(args)?;
    let result = run_wrapper::run(&config)?;

    println!("Cache Simulator");
    println!();
    print!("{}", RunSummary::new(&config, &result.report));
    if config.seed.is_none() {
        eprintln!(
            "[HISTORY] seed = {} (rerun with --seed to reproduce)",
            result.seed
        );
    }
    Ok(())
}
