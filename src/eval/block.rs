use std::path::{Path, PathBuf};

use plotters::prelude::*;
use sim_lib::config::SimConfig;
use sim_lib::memory::policy::ReplacementPolicy;
use sim_lib::run_wrapper::run;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::WARN)
        .init();

    let trace_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .ok_or("You should specify exactly one trace file")?;

    // For a fixed cache size, vary the block size
    // Performance metric: hit rate
    let cache_sizes_kb = [8, 64, 256, 1024];
    let block_sizes = [8, 16, 32, 64];

    let mut data: Vec<Vec<(u32, f64)>> = vec![vec![]; cache_sizes_kb.len()];
    for (i, cache_size_kb) in cache_sizes_kb.iter().enumerate() {
        for block_size in block_sizes.iter() {
            let config = SimConfig {
                cache_size_kb: *cache_size_kb,
                block_size: *block_size,
                associativity: 4,
                policy: ReplacementPolicy::RoundRobin,
                physical_memory_mb: 1024,
                utilization_percent: 0,
                instructions_per_slice: None,
                trace_files: vec![trace_path.clone()],
                seed: Some(0),
            };
            let result = run(&config)?;
            data[i].push((*block_size, result.report.hit_rate));
        }
    }

    // Plot the data
    let trace_base_name = trace_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "trace".to_string());
    let plot_title = format!("Hit rate by block size: {}", trace_base_name);
    std::fs::create_dir_all("eval")?;
    let output_path = Path::new("eval")
        .join(format!("block_eval_{}.svg", trace_base_name));

    let root = SVGBackend::new(&output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let y_min = data
        .iter()
        .flatten()
        .map(|(_, hit_rate)| *hit_rate)
        .fold(100.0f64, f64::min);
    let mut ctx = ChartBuilder::on(&root)
        .caption(plot_title.as_str(), ("sans-serif", 40).into_font())
        .margin(5)
        .x_label_area_size(40)
        .y_label_area_size(40)
        .build_cartesian_2d(8..64, (y_min - 1.0).max(0.0)..100.0)?;
    ctx.configure_mesh()
        .x_desc("Block size (bytes)")
        .y_desc("Hit rate (%)")
        .draw()?;

    for (i, cache_size_kb) in cache_sizes_kb.iter().enumerate() {
        let series = data[i].iter().map(|(x, y)| (*x as i32, *y));
        let label = format!("Cache size = {} KB", cache_size_kb);
        let color = Palette99::pick(i).to_rgba();
        ctx.draw_series(LineSeries::new(series, color))?
            .label(label)
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color)
            });
    }

    ctx.configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    root.present()?;

    eprintln!("Plot written to {}", output_path.display());
    Ok(())
}
