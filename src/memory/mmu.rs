//! Memory management unit with per-process page tables
//! backed by a finite pool of physical pages

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use super::decoder::{get_log_2, split_page};
use super::policy::{ReplacementPolicy, VictimSelector};
use crate::error::MemoryError;

pub const PAGE_WIDTH: u32 = 12;
pub const PAGE_SIZE: u32 = 1 << PAGE_WIDTH;
/// Page table entries the OS reserves for every process
pub const MAX_PAGE_TABLE_ENTRIES: u32 = 1 << 19;
pub const PAGE_FAULT_CYCLES: u64 = 100;

/// Physical memory shape for one run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryGeometry {
    pub physical_memory_mb: u32,
    pub utilization_percent: u32,
    pub physical_bytes: u64,
    pub address_bits: u32,
    pub total_pages: u32,
    pub system_pages: u32,
    pub ppn_bits: u32,
    pub pte_bits: u32,
}

impl MemoryGeometry {
    pub fn make(physical_memory_mb: u32, utilization_percent: u32) -> Self {
        assert!(utilization_percent <= 100);
        let physical_bytes = physical_memory_mb as u64 * (1 << 20);
        let total_pages = (physical_bytes / PAGE_SIZE as u64) as u32;
        let system_pages = (utilization_percent as u64 * total_pages as u64)
            .div_ceil(100) as u32;
        let ppn_bits = get_log_2(total_pages);
        Self {
            physical_memory_mb,
            utilization_percent,
            physical_bytes,
            address_bits: ppn_bits + PAGE_WIDTH,
            total_pages,
            system_pages,
            ppn_bits,
            pte_bits: ppn_bits + 1,
        }
    }

    /// Pages left for user processes once the OS has taken its share
    pub fn pages_available(&self) -> u32 {
        self.total_pages - self.system_pages
    }

    /// RAM needed to hold full page tables for `processes` processes
    pub fn page_table_bytes(&self, processes: usize) -> u64 {
        MAX_PAGE_TABLE_ENTRIES as u64 * processes as u64 * self.pte_bits as u64
            / 8
    }
}

/// Physical pages not yet handed to any process, in allocation order
#[derive(Clone, Debug, Default)]
pub struct FreePagePool {
    pages: VecDeque<u32>,
}

impl FreePagePool {
    pub fn new(pages: impl IntoIterator<Item = u32>) -> Self {
        Self {
            pages: pages.into_iter().collect(),
        }
    }

    pub fn pop(&mut self) -> Option<u32> {
        self.pages.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Sparse VPN -> PPN mapping for one process
#[derive(Clone, Debug, Default)]
pub struct PageTable {
    entries: HashMap<u32, u32>,
}

impl PageTable {
    pub fn lookup(&self, vpn: u32) -> Option<u32> {
        self.entries.get(&vpn).copied()
    }

    pub fn insert(&mut self, vpn: u32, ppn: u32) {
        let previous = self.entries.insert(vpn, ppn);
        assert!(previous.is_none(), "VPN {:#x} mapped twice", vpn);
    }

    pub fn remove(&mut self, vpn: u32) -> Option<u32> {
        self.entries.remove(&vpn)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.entries.iter().map(|(&vpn, &ppn)| (vpn, ppn))
    }
}

/// Owner of a mapped physical page
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageOwner {
    pub pid: usize,
    pub vpn: u32,
}

/// Every physical page currently mapped by some process.
/// `pages` keeps first-mapping order and is the victim domain;
/// `owners` is the reverse index used to unmap a victim.
#[derive(Clone, Debug, Default)]
pub struct UsedPageRegistry {
    pages: Vec<u32>,
    owners: HashMap<u32, PageOwner>,
}

impl UsedPageRegistry {
    pub fn push(&mut self, ppn: u32, owner: PageOwner) {
        let previous = self.owners.insert(ppn, owner);
        assert!(previous.is_none(), "PPN {:#x} registered twice", ppn);
        self.pages.push(ppn);
    }

    /// Hand `ppn` to a new owner, returning the old one
    pub fn reassign(&mut self, ppn: u32, owner: PageOwner) -> PageOwner {
        let slot = self
            .owners
            .get_mut(&ppn)
            .unwrap_or_else(|| panic!("PPN {:#x} has no owner", ppn));
        std::mem::replace(slot, owner)
    }

    pub fn owner(&self, ppn: u32) -> Option<PageOwner> {
        self.owners.get(&ppn).copied()
    }

    pub fn get(&self, i: usize) -> u32 {
        self.pages[i]
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn pages(&self) -> &[u32] {
        &self.pages
    }
}

/// Anything holding data tagged by physical page that must be
/// dropped when the page is handed to another mapping
pub trait PageInvalidator {
    /// Returns the number of entries dropped
    fn invalidate_page(&mut self, ppn: u32) -> usize;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageOutcome {
    Hit,
    FromFree,
    Fault { victim: u32, previous: PageOwner },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Translation {
    pub physical_address: u32,
    pub ppn: u32,
    pub outcome: PageOutcome,
}

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct PageHistory {
    pub num_hit: u64,
    pub num_from_free: u64,
    pub num_fault: u64,
}

impl PageHistory {
    pub fn num_translation(&self) -> u64 {
        self.num_hit + self.num_from_free + self.num_fault
    }
}

/// Memory management unit
#[derive(Clone, Debug)]
pub struct MMU {
    pub geometry: MemoryGeometry,
    pub history: PageHistory,
    pub free_pool: FreePagePool,
    pub page_tables: Vec<PageTable>,
    pub registry: UsedPageRegistry,

    selector: VictimSelector,
}

impl MMU {
    /// Make a new MMU serving `processes` processes.
    /// Pages below `geometry.system_pages` belong to the OS
    /// and are never handed out.
    pub fn make(
        geometry: MemoryGeometry,
        processes: usize,
        policy: ReplacementPolicy,
        seed: u64,
    ) -> Self {
        Self {
            geometry,
            history: PageHistory::default(),
            free_pool: FreePagePool::new(
                geometry.system_pages..geometry.total_pages,
            ),
            page_tables: vec![PageTable::default(); processes],
            registry: UsedPageRegistry::default(),
            selector: VictimSelector::make(policy, seed),
        }
    }

    /// Translate `virtual_address` of process `pid`.
    ///
    /// Unmapped pages are taken from the free pool while it lasts; after that
    /// a mapped page is reclaimed from whichever process holds it, and
    /// `invalidator` drops everything cached from that page before the
    /// translation is returned. The page-fault penalty is added to `cycles`.
    ///
    /// Returns `None` when the OS holds every physical page: the fault is
    /// still counted and charged, but nothing backs the access.
    pub fn translate(
        &mut self,
        pid: usize,
        virtual_address: u32,
        invalidator: &mut impl PageInvalidator,
        cycles: &mut u64,
    ) -> Option<Translation> {
        assert!(pid < self.page_tables.len(), "unknown process {}", pid);
        let (vpn, offset) = split_page(virtual_address);

        let mapped = self.page_tables[pid].lookup(vpn);
        let (ppn, outcome) = if let Some(ppn) = mapped {
            self.history.num_hit += 1;
            (ppn, PageOutcome::Hit)
        } else if let Some(ppn) = self.free_pool.pop() {
            self.history.num_from_free += 1;
            self.page_tables[pid].insert(vpn, ppn);
            self.registry.push(ppn, PageOwner { pid, vpn });
            (ppn, PageOutcome::FromFree)
        } else if self.registry.is_empty() {
            self.history.num_fault += 1;
            *cycles += PAGE_FAULT_CYCLES;
            debug!(pid, vpn, "page fault with no user pages");
            return None;
        } else {
            let (victim, previous) = self.reclaim(pid, vpn);
            let dropped = invalidator.invalidate_page(victim);
            self.history.num_fault += 1;
            *cycles += PAGE_FAULT_CYCLES;
            debug!(
                pid,
                vpn,
                victim,
                previous_pid = previous.pid,
                previous_vpn = previous.vpn,
                dropped,
                "page fault"
            );
            (victim, PageOutcome::Fault { victim, previous })
        };

        Some(Translation {
            physical_address: ppn * PAGE_SIZE + offset,
            ppn,
            outcome,
        })
    }

    /// Pick a victim among mapped pages and move it to (`pid`, `vpn`)
    fn reclaim(&mut self, pid: usize, vpn: u32) -> (u32, PageOwner) {
        let slot = self.selector.select(self.registry.len());
        let victim = self.registry.get(slot);

        let previous = self.registry.reassign(victim, PageOwner { pid, vpn });
        let unmapped = self.page_tables[previous.pid].remove(previous.vpn);
        assert_eq!(unmapped, Some(victim), "page table and registry disagree");
        self.page_tables[pid].insert(vpn, victim);

        (victim, previous)
    }

    /// Check that every user page is either free
    /// or mapped by exactly one process
    pub fn verify_ownership(&self) -> Result<(), MemoryError> {
        let free: HashSet<u32> = self.free_pool.pages.iter().copied().collect();
        let mut owners: HashMap<u32, usize> = HashMap::new();
        for (pid, table) in self.page_tables.iter().enumerate() {
            for (vpn, ppn) in table.iter() {
                if owners.insert(ppn, pid).is_some()
                    || free.contains(&ppn)
                    || self.registry.owner(ppn) != Some(PageOwner { pid, vpn })
                {
                    return Err(MemoryError::PageOwnership(ppn));
                }
            }
        }
        for ppn in self.geometry.system_pages..self.geometry.total_pages {
            if owners.contains_key(&ppn) == free.contains(&ppn) {
                return Err(MemoryError::PageOwnership(ppn));
            }
        }
        Ok(())
    }
}
