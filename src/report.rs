//! Text rendering of a finished run

use std::fmt;

use crate::config::SimConfig;
use crate::metrics::{implementation_cost, SimulationReport, COST_PER_KB};

/// Input parameters, calculated values and results of one run
pub struct RunSummary<'a> {
    pub config: &'a SimConfig,
    pub report: &'a SimulationReport,
}

impl<'a> RunSummary<'a> {
    pub fn new(config: &'a SimConfig, report: &'a SimulationReport) -> Self {
        Self { config, report }
    }

    fn write_parameters(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.config;
        writeln!(f, "Trace File(s):")?;
        for file in &c.trace_files {
            writeln!(f, "\t{}", file.display())?;
        }
        writeln!(f)?;
        writeln!(f, "***** Cache Input Parameters *****")?;
        writeln!(f, "{:<32}{} KB", "Cache Size:", c.cache_size_kb)?;
        writeln!(f, "{:<32}{} bytes", "Block Size:", c.block_size)?;
        writeln!(f, "{:<32}{}", "Associativity:", c.associativity)?;
        writeln!(f, "{:<32}{}", "Replacement Policy:", c.policy)?;
        writeln!(f, "{:<32}{} MB", "Physical Memory:", c.physical_memory_mb)?;
        writeln!(
            f,
            "{:<32}{:.1}%",
            "Percent Memory Used by System:", c.utilization_percent as f64
        )?;
        match c.instructions_per_slice {
            Some(n) => writeln!(f, "{:<32}{}", "Instructions / Time Slice:", n),
            None => writeln!(f, "{:<32}All", "Instructions / Time Slice:"),
        }
    }

    fn write_calculated(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let g = &self.report.cache_geometry;
        let m = &self.report.memory_geometry;
        let footprint = g.footprint_bytes();

        writeln!(f, "***** Cache Calculated Values *****")?;
        writeln!(f, "{:<32}{}", "Total # Blocks:", g.total_blocks)?;
        writeln!(f, "{:<32}{} bits", "Tag Size:", g.tag_bits)?;
        writeln!(f, "{:<32}{} bits", "Index Size:", g.index_bits)?;
        writeln!(f, "{:<32}{}", "Total # Rows:", g.sets)?;
        writeln!(f, "{:<32}{} bytes", "Overhead Size:", g.overhead_bytes())?;
        writeln!(
            f,
            "{:<32}{:.2} KB ({} bytes)",
            "Implementation Memory Size:",
            footprint as f64 / 1024.0,
            footprint
        )?;
        writeln!(
            f,
            "{:<32}${:.2} @ ${:.2} per KB",
            "Cost:",
            implementation_cost(g),
            COST_PER_KB
        )?;
        writeln!(f)?;

        writeln!(f, "***** Physical Memory Calculated Values *****")?;
        writeln!(f, "{:<32}{}", "Number of Physical Pages:", m.total_pages)?;
        writeln!(f, "{:<32}{}", "Number of Pages for System:", m.system_pages)?;
        writeln!(f, "{:<32}{} bits", "Size of Page Table Entry:", m.pte_bits)?;
        writeln!(
            f,
            "{:<32}{} bytes",
            "Total RAM for Page Table(s):",
            m.page_table_bytes(self.report.processes.len())
        )
    }

    fn write_memory_results(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.report;
        writeln!(f, "***** VIRTUAL MEMORY SIMULATION RESULTS *****")?;
        writeln!(f)?;
        writeln!(
            f,
            "{:<32}{}",
            "Physical Pages Used By SYSTEM:", r.memory_geometry.system_pages
        )?;
        writeln!(
            f,
            "{:<32}{}",
            "Pages Available to User:",
            r.memory_geometry.pages_available()
        )?;
        writeln!(f)?;
        let indent = "        ";
        writeln!(
            f,
            "{:<32}{}",
            "Virtual Pages Mapped:",
            r.virtual_pages_mapped()
        )?;
        writeln!(f, "{}------------------------------", indent)?;
        let counts = [
            ("Page Table Hits:", r.pages.num_hit),
            ("Pages From Free:", r.pages.num_from_free),
            ("Total Page Faults:", r.pages.num_fault),
        ];
        for (label, count) in counts {
            writeln!(f, "{}{:<24}{}", indent, label, count)?;
        }
        writeln!(f)?;

        writeln!(f, "Page Table Usage Per Process:")?;
        writeln!(f, "------------------------------")?;
        for (pid, usage) in r.processes.iter().enumerate() {
            writeln!(f, "[{}] {}:", pid, usage.trace_file.display())?;
            writeln!(
                f,
                "{}Used Page Table Entries: {} ({:.2}%)",
                indent, usage.used_entries, usage.used_percent
            )?;
            writeln!(
                f,
                "{}Page Table Wasted: {:.0} bytes",
                indent, usage.wasted_bytes
            )?;
            writeln!(f)?;
        }
        Ok(())
    }

    fn write_cache_results(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.report;
        writeln!(f, "***** CACHE SIMULATION RESULTS *****")?;
        writeln!(f)?;
        let counts = [
            ("Total Cache Accesses:", r.cache.num_access),
            ("--- Instruction Bytes:", r.run.instruction_bytes),
            ("--- SrcDst Bytes:", r.run.src_dst_bytes),
            ("Cache Hits:", r.cache.num_hit),
            ("Cache Misses:", r.cache.num_miss),
            ("--- Compulsory Misses:", r.cache.num_compulsory),
            ("--- Conflict Misses:", r.cache.num_conflict),
        ];
        for (label, count) in counts {
            writeln!(f, "{:<24}{}", label, count)?;
        }
        writeln!(f)?;

        writeln!(f, "***** ***** CACHE HIT & MISS RATE: ***** *****")?;
        writeln!(f)?;
        writeln!(f, "{:<24}{:.4}%", "Hit Rate:", r.hit_rate)?;
        writeln!(f, "{:<24}{:.4}%", "Miss Rate:", r.miss_rate)?;
        writeln!(
            f,
            "{:<24}{:.2} Cycles/Instruction ({})",
            "CPI:", r.cpi, r.run.cycle_count
        )?;
        writeln!(
            f,
            "{:<24}{:.2} KB / {} KB = {:.2}% Waste: ${:.2}/chip",
            "Unused Cache Space:",
            r.unused_kb(),
            self.config.cache_size_kb,
            r.unused_percent,
            r.waste_cost
        )?;
        writeln!(
            f,
            "{:<24}{} / {}",
            "Unused Cache Blocks:",
            r.unused_blocks,
            r.cache_geometry.total_blocks
        )
    }
}

impl fmt::Display for RunSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_parameters(f)?;
        writeln!(f)?;
        self.write_calculated(f)?;
        writeln!(f)?;
        self.write_memory_results(f)?;
        self.write_cache_results(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySystem;
    use crate::metrics::aggregate;
    use std::path::PathBuf;

    #[test]
    fn test_summary_sections() {
        let config = SimConfig {
            cache_size_kb: 8,
            block_size: 16,
            associativity: 1,
            physical_memory_mb: 128,
            utilization_percent: 10,
            trace_files: vec![PathBuf::from("trace1.trc")],
            ..Default::default()
        };
        let mem = MemorySystem::from_config(&config, 0).unwrap();
        let report = aggregate(&mem, &config.trace_files);
        let text = RunSummary::new(&config, &report).to_string();

        assert!(text.contains("Total # Blocks:                 512"));
        assert!(text.contains("Tag Size:                       14 bits"));
        assert!(text.contains("Overhead Size:                  960 bytes"));
        assert!(text
            .contains("Implementation Memory Size:     8.94 KB (9152 bytes)"));
        assert!(text.contains("        Total Page Faults:      0"));
        assert!(text.contains("Number of Pages for System:     3277"));
        assert!(text.contains("Pages Available to User:        29491"));
        assert!(text.contains("[0] trace1.trc:"));
        assert!(text.contains("Instructions / Time Slice:      All"));
        assert!(text.contains("Unused Cache Blocks:    512 / 512"));
    }
}
