//! A simulator wrapper

use std::io::BufRead;

use rand::Rng;
use tracing::{debug, info};

use crate::config::SimConfig;
use crate::error::SimulatorResult;
use crate::memory::MemorySystem;
use crate::metrics::{aggregate, SimulationReport};
use crate::trace::{TraceReader, TraceRecord};

/// Outcome of a full run
pub struct RunResult {
    pub report: SimulationReport,
    /// Seed the Random policy drew from; pass it back to replay the run
    pub seed: u64,
}

/// One simulated process replaying its trace
struct Process<R> {
    pid: usize,
    reader: TraceReader<R>,
    /// First instruction of the next slice
    pending: Option<TraceRecord>,
    finished: bool,
}

impl<R: BufRead> Process<R> {
    fn next_record(&mut self) -> Option<SimulatorResult<TraceRecord>> {
        if let Some(record) = self.pending.take() {
            return Some(Ok(record));
        }
        self.reader.next().map(|r| r.map_err(Into::into))
    }

    /// Run up to `slice` instructions (with their operands), or to the end
    fn run_slice(
        &mut self,
        mem: &mut MemorySystem,
        slice: Option<u64>,
    ) -> SimulatorResult<()> {
        let mut executed = 0;
        while let Some(record) = self.next_record() {
            let record = record?;
            if record.is_instruction() {
                if slice == Some(executed) {
                    self.pending = Some(record);
                    debug!(pid = self.pid, executed, "time slice over");
                    return Ok(());
                }
                executed += 1;
            }
            for event in record.events() {
                mem.handle_event(self.pid, event);
            }
        }
        info!(
            pid = self.pid,
            trace = %self.reader.path().display(),
            "trace finished"
        );
        self.finished = true;
        Ok(())
    }
}

/// Replay every trace on `mem`, one process per reader.
/// Processes take turns of `slice` instructions; `None` runs them back to back.
pub fn replay<R: BufRead>(
    mem: &mut MemorySystem,
    readers: Vec<TraceReader<R>>,
    slice: Option<u64>,
) -> SimulatorResult<()> {
    assert_eq!(readers.len(), mem.processes());
    let mut processes: Vec<_> = readers
        .into_iter()
        .enumerate()
        .map(|(pid, reader)| Process {
            pid,
            reader,
            pending: None,
            finished: false,
        })
        .collect();

    while processes.iter().any(|p| !p.finished) {
        for process in processes.iter_mut().filter(|p| !p.finished) {
            process.run_slice(mem, slice)?;
        }
    }
    Ok(())
}

pub fn resolve_seed(config: &SimConfig) -> u64 {
    config.seed.unwrap_or_else(|| rand::thread_rng().gen())
}

/// Run simulation on the configured trace files
pub fn run(config: &SimConfig) -> SimulatorResult<RunResult> {
    config.validate()?;
    let seed = resolve_seed(config);
    info!(seed, policy = %config.policy, "starting simulation");

    let readers = config
        .trace_files
        .iter()
        .map(|path| TraceReader::open(path))
        .collect::<Result<Vec<_>, _>>()?;

    let mut mem = MemorySystem::from_config(config, seed)?;
    replay(&mut mem, readers, config.instructions_per_slice)?;
    mem.verify()?;

    let report = aggregate(&mem, &config.trace_files);
    info!(
        accesses = report.cache.num_access,
        faults = report.pages.num_fault,
        cpi = report.cpi,
        "simulation finished"
    );
    Ok(RunResult { report, seed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::cache::CacheGeometry;
    use crate::memory::mmu::MemoryGeometry;
    use crate::memory::policy::ReplacementPolicy;
    use std::io::Cursor;

    const TRACE_A: &str = "\
EIP (04): 00401000 83ec10
EIP (04): 00401004 83ec10
dstM: 0012ff70 00000000    srcM: 00000000 --------
EIP (04): 00401008 83ec10
";

    const TRACE_B: &str = "\
EIP (02): 00402000 33c0
EIP (02): 00402002 33c0
";

    fn system(processes: usize) -> MemorySystem {
        let memory = MemoryGeometry::make(128, 0);
        let geometry =
            CacheGeometry::make(8, 16, 2, memory.address_bits).unwrap();
        MemorySystem::make(
            geometry,
            memory,
            processes,
            ReplacementPolicy::RoundRobin,
            0,
        )
    }

    fn readers(
        traces: &[&'static str],
    ) -> Vec<TraceReader<Cursor<&'static str>>> {
        traces
            .iter()
            .enumerate()
            .map(|(i, t)| {
                TraceReader::new(format!("t{}.trc", i), Cursor::new(*t))
            })
            .collect()
    }

    #[test]
    fn test_replay_counts() {
        let mut mem = system(2);
        replay(&mut mem, readers(&[TRACE_A, TRACE_B]), None).unwrap();
        assert_eq!(mem.history.inst_count, 5);
        assert_eq!(mem.history.instruction_bytes, 16);
        assert_eq!(mem.history.src_dst_bytes, 4);
        assert_eq!(mem.cache.history.num_access, 3 + 1 + 2);
        assert!(mem.verify().is_ok());
    }

    #[test]
    fn test_time_slices_interleave() {
        // One instruction per slice: process 1 runs before
        // process 0 reaches its operand
        let mut sliced = system(2);
        replay(&mut sliced, readers(&[TRACE_A, TRACE_B]), Some(1)).unwrap();
        let ppn_b = sliced.mmu.page_tables[1].lookup(0x402).unwrap();
        let ppn_stack = sliced.mmu.page_tables[0].lookup(0x12f).unwrap();
        assert!(ppn_b < ppn_stack);

        // Back to back, process 0 maps both of its pages first
        let mut serial = system(2);
        replay(&mut serial, readers(&[TRACE_A, TRACE_B]), None).unwrap();
        let ppn_b = serial.mmu.page_tables[1].lookup(0x402).unwrap();
        let ppn_stack = serial.mmu.page_tables[0].lookup(0x12f).unwrap();
        assert!(ppn_b > ppn_stack);

        // Slicing changes order, not totals
        assert_eq!(sliced.history, serial.history);
        assert_eq!(
            sliced.mmu.history.num_translation(),
            serial.mmu.history.num_translation()
        );
    }

    #[test]
    fn test_parse_error_stops_run() {
        let mut mem = system(1);
        let bad = "EIP (04): 00401000 83ec10\nEIP (zz): 00401004\n";
        let result = replay(&mut mem, readers(&[bad]), Some(1));
        assert!(result.is_err());
    }

    #[test]
    fn test_fixed_seed() {
        let config = SimConfig {
            seed: Some(5),
            ..Default::default()
        };
        assert_eq!(resolve_seed(&config), 5);
    }
}
