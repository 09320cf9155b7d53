//! Multi-core cache hierarchy with MESI coherence.
//!
//! Each core privately owns an L1d, an L1i, a DTLB, and a prefetcher; L2 and
//! L3 are shared across every core. The [`CoherenceController`] snoops the
//! per-core L1s (it owns no line data itself) to decide when a peer must be
//! downgraded or invalidated, and the false-sharing tracker rides along on
//! every demand access that carries source-line information.

use std::collections::{HashMap, HashSet};

use crate::common::addr::line_align;
use crate::common::error::ConfigError;
use crate::config::{CacheHierarchyConfig, InclusionPolicy};
use crate::core::units::cache::{AccessResult, CacheLevel, CoherenceState};
use crate::core::units::coherence::{CoherenceController, FalseSharingEvent};
use crate::core::units::mmu::Tlb;
use crate::core::units::prefetch::Prefetcher;

use super::{build_prefetcher, L1Target};

struct CoreState {
    l1d: CacheLevel,
    l1i: CacheLevel,
    prefetcher: Option<Box<dyn Prefetcher>>,
    dtlb: Tlb,
    prefetched_addresses: HashSet<u64>,
}

/// Outcome of one [`MultiCoreCacheSystem::access`] call.
#[derive(Debug, Clone, Default)]
pub struct MultiCoreAccessResult {
    /// Hit in the requesting core's L1.
    pub l1_hit: bool,
    /// Hit in the shared L2 (only meaningful if L1 missed).
    pub l2_hit: bool,
    /// Hit in the shared L3 (only meaningful if L1 and L2 missed).
    pub l3_hit: bool,
    /// Whether the access ultimately reached main memory.
    pub memory_access: bool,
    /// Line-aligned addresses written back to memory during this access.
    pub writebacks: Vec<u64>,
    /// Number of addresses the local prefetcher issued as a side effect.
    pub prefetches_issued: usize,
    /// Coherence invalidations caused by *this* access (not the running
    /// total; see [`MultiCoreCacheSystem::coherence_invalidations`]).
    pub coherence_invalidations: u64,
    /// Whether this access is the one that first qualified its line as
    /// false-sharing.
    pub false_sharing: bool,
    /// Whether the DTLB lookup for this access hit.
    pub tlb_hit: bool,
}

/// Per-core L1d/L1i/DTLB/prefetcher plus a shared L2/L3 and coherence
/// controller.
pub struct MultiCoreCacheSystem {
    cores: Vec<CoreState>,
    l2: CacheLevel,
    l3: Option<CacheLevel>,
    coherence: CoherenceController,
    inclusion_policy: InclusionPolicy,
    thread_core: HashMap<u32, usize>,
    next_core: usize,
    line_bytes: u64,
}

impl MultiCoreCacheSystem {
    /// Builds a `num_cores`-wide hierarchy from a validated configuration.
    pub fn new(config: &CacheHierarchyConfig) -> Result<Self, ConfigError> {
        let num_cores = config.num_cores.max(1);
        let mut cores = Vec::with_capacity(num_cores);
        for _ in 0..num_cores {
            cores.push(CoreState {
                l1d: CacheLevel::new(config.l1d)?,
                l1i: CacheLevel::new(config.l1i)?,
                prefetcher: build_prefetcher(&config.prefetch, config.l1d.line_bytes),
                dtlb: Tlb::new(config.tlb.num_sets, config.tlb.ways),
                prefetched_addresses: HashSet::new(),
            });
        }
        let l2 = CacheLevel::new(config.l2)?;
        let l3 = if config.l3.is_absent() {
            None
        } else {
            Some(CacheLevel::new(config.l3)?)
        };

        Ok(Self {
            cores,
            l2,
            l3,
            coherence: CoherenceController::new(),
            inclusion_policy: config.inclusion_policy,
            thread_core: HashMap::new(),
            next_core: 0,
            line_bytes: config.l1d.line_bytes as u64,
        })
    }

    /// Number of cores in this hierarchy.
    pub fn num_cores(&self) -> usize {
        self.cores.len()
    }

    /// Assigns (or looks up) the core a thread's accesses are bound to,
    /// round-robin over `0..num_cores`, stable for the thread's lifetime.
    pub fn core_for_thread(&mut self, thread_id: u32) -> usize {
        let num_cores = self.cores.len();
        *self.thread_core.entry(thread_id).or_insert_with(|| {
            let core = self.next_core;
            self.next_core = (self.next_core + 1) % num_cores;
            core
        })
    }

    fn l1_mut(&mut self, core: usize, which: L1Target) -> &mut CacheLevel {
        match which {
            L1Target::Data => &mut self.cores[core].l1d,
            L1Target::Instruction => &mut self.cores[core].l1i,
        }
    }

    /// Drives one demand access (read/write/fetch) for `thread_id`,
    /// resolving its bound core, through DTLB translation, false-sharing
    /// tracking, and the MESI read/write paths.
    ///
    /// `file`/`src_line` carry the source-line provenance used for
    /// false-sharing detection; pass an empty `file` to skip it.
    #[allow(clippy::too_many_arguments)]
    pub fn access(
        &mut self,
        thread_id: u32,
        addr: u64,
        is_write: bool,
        pc: u64,
        which: L1Target,
        file: &str,
        src_line: u32,
    ) -> MultiCoreAccessResult {
        let core = self.core_for_thread(thread_id);
        let line_addr = line_align(addr, self.line_bytes);
        let byte_offset = addr - line_addr;

        let mut result = MultiCoreAccessResult {
            tlb_hit: self.cores[core].dtlb.access(addr),
            ..MultiCoreAccessResult::default()
        };

        if !file.is_empty() {
            result.false_sharing = self.coherence.record_access(
                line_addr,
                FalseSharingEvent {
                    thread_id,
                    byte_offset,
                    is_write,
                    file: file.to_string(),
                    line: src_line,
                },
            );
        }

        if is_write {
            self.demand_write(core, line_addr, which, &mut result);
        } else {
            self.demand_read(core, line_addr, pc, which, &mut result);
        }
        result
    }

    fn demand_read(&mut self, core: usize, line_addr: u64, pc: u64, which: L1Target, result: &mut MultiCoreAccessResult) {
        let inv_before = self.coherence.coherence_invalidations();

        let l1_info = self.l1_mut(core, which).access(line_addr, false);
        if l1_info.result == AccessResult::Hit {
            result.l1_hit = true;
            self.record_prefetch_hit(core, line_addr);
            return;
        }
        if let Some(evicted) = l1_info.evicted_address {
            self.coherence.remove_core(core, evicted);
            self.record_prefetch_eviction(core, evicted);
        }
        self.cascade_l1_eviction(l1_info.was_dirty, l1_info.evicted_address, result);

        self.issue_local_prefetch(core, line_addr, pc, result);

        let mut found = false;
        let mut was_modified = false;
        for peer in 0..self.cores.len() {
            if peer == core {
                continue;
            }
            if self.cores[peer].l1d.is_present(line_addr) {
                found = true;
                was_modified |= self.cores[peer].l1d.is_dirty(line_addr);
                self.cores[peer].l1d.downgrade_to_shared(line_addr);
            }
            if self.cores[peer].l1i.is_present(line_addr) {
                found = true;
                self.cores[peer].l1i.set_coherence_state(line_addr, CoherenceState::Shared);
            }
        }
        if was_modified {
            self.coherence.record_invalidations(1);
        }
        if found {
            self.coherence.clear_owner(line_addr);
        }

        let new_state = if found { CoherenceState::Shared } else { CoherenceState::Exclusive };
        let (l2_hit, l3_hit, memory_access, writebacks) = self.fetch_up_from_l2(line_addr);
        result.l2_hit |= l2_hit;
        result.l3_hit |= l3_hit;
        result.memory_access |= memory_access;
        result.writebacks.extend(writebacks);

        self.l1_mut(core, which).install_with_state(line_addr, false, new_state);

        if found {
            self.coherence.note_shared(core, line_addr);
        } else {
            self.coherence.note_exclusive(core, line_addr);
        }

        result.coherence_invalidations = self.coherence.coherence_invalidations() - inv_before;
    }

    fn demand_write(&mut self, core: usize, line_addr: u64, which: L1Target, result: &mut MultiCoreAccessResult) {
        let inv_before = self.coherence.coherence_invalidations();

        let mut any_peer = false;
        for peer in 0..self.cores.len() {
            if peer == core {
                continue;
            }
            if self.cores[peer].l1d.is_present(line_addr) {
                self.cores[peer].l1d.invalidate(line_addr);
                self.coherence.remove_core(peer, line_addr);
                any_peer = true;
            }
            if self.cores[peer].l1i.is_present(line_addr) {
                self.cores[peer].l1i.invalidate(line_addr);
                self.coherence.remove_core(peer, line_addr);
                any_peer = true;
            }
        }
        if any_peer {
            self.coherence.record_invalidations(1);
        }
        self.coherence.note_exclusive(core, line_addr);

        let l1_info = self.l1_mut(core, which).access(line_addr, true);
        if l1_info.result == AccessResult::Hit {
            self.l1_mut(core, which).set_coherence_state(line_addr, CoherenceState::Modified);
            result.l1_hit = true;
            self.record_prefetch_hit(core, line_addr);
            result.coherence_invalidations = self.coherence.coherence_invalidations() - inv_before;
            return;
        }

        if let Some(evicted) = l1_info.evicted_address {
            self.coherence.remove_core(core, evicted);
            self.record_prefetch_eviction(core, evicted);
        }
        self.cascade_l1_eviction(l1_info.was_dirty, l1_info.evicted_address, result);

        // `access(.., true)` already installed the line as Modified/dirty;
        // this fetch only accounts for L2/L3 structural hit/miss/writeback.
        let (l2_hit, l3_hit, memory_access, writebacks) = self.fetch_up_from_l2(line_addr);
        result.l2_hit |= l2_hit;
        result.l3_hit |= l3_hit;
        result.memory_access |= memory_access;
        result.writebacks.extend(writebacks);

        result.coherence_invalidations = self.coherence.coherence_invalidations() - inv_before;
    }

    fn cascade_l1_eviction(&mut self, was_dirty: bool, evicted: Option<u64>, result: &mut MultiCoreAccessResult) {
        let Some(evicted_addr) = evicted else { return };
        match self.inclusion_policy {
            InclusionPolicy::Inclusive | InclusionPolicy::Nine => {
                if was_dirty {
                    result.writebacks.push(evicted_addr);
                }
            }
            InclusionPolicy::Exclusive => {
                self.l2.install(evicted_addr, was_dirty);
            }
        }
    }

    fn cascade_l2_to_l3(&mut self, was_dirty: bool, evicted: Option<u64>, writebacks: &mut Vec<u64>) {
        let Some(evicted_addr) = evicted else { return };
        match self.inclusion_policy {
            InclusionPolicy::Inclusive | InclusionPolicy::Nine => {
                if was_dirty {
                    writebacks.push(evicted_addr);
                }
            }
            InclusionPolicy::Exclusive => {
                if let Some(l3) = self.l3.as_mut() {
                    l3.install(evicted_addr, was_dirty);
                } else if was_dirty {
                    writebacks.push(evicted_addr);
                }
            }
        }
    }

    /// Fetches `line_addr` through the shared L2/L3/memory path, returning
    /// `(l2_hit, l3_hit, memory_access, writebacks)`. Does not touch any
    /// core's L1 — that install is the caller's responsibility, since only
    /// the caller knows the MESI state to install it with.
    fn fetch_up_from_l2(&mut self, line_addr: u64) -> (bool, bool, bool, Vec<u64>) {
        let mut writebacks = Vec::new();

        let l2_info = self.l2.access(line_addr, false);
        if l2_info.result == AccessResult::Hit {
            if self.inclusion_policy == InclusionPolicy::Exclusive {
                self.l2.invalidate(line_addr);
            }
            return (true, false, false, writebacks);
        }
        self.cascade_l2_to_l3(l2_info.was_dirty, l2_info.evicted_address, &mut writebacks);

        let Some(l3) = self.l3.as_mut() else {
            return (false, false, true, writebacks);
        };
        let l3_info = l3.access(line_addr, false);
        if l3_info.result == AccessResult::Hit {
            if self.inclusion_policy == InclusionPolicy::Exclusive {
                l3.invalidate(line_addr);
            }
            return (false, true, false, writebacks);
        }

        if l3_info.was_dirty {
            if let Some(victim) = l3_info.evicted_address {
                writebacks.push(victim);
                if self.inclusion_policy == InclusionPolicy::Inclusive {
                    self.back_invalidate_all(victim);
                }
            }
        }
        (false, false, true, writebacks)
    }

    fn back_invalidate_all(&mut self, addr: u64) {
        self.l2.invalidate(addr);
        for core in &mut self.cores {
            core.l1d.invalidate(addr);
            core.l1i.invalidate(addr);
        }
        self.coherence.invalidate_all(addr);
    }

    fn record_prefetch_hit(&mut self, core: usize, addr: u64) {
        if self.cores[core].prefetched_addresses.remove(&addr) {
            if let Some(p) = self.cores[core].prefetcher.as_mut() {
                p.record_useful();
            }
        }
    }

    /// Marks a previously-issued prediction useless if it's evicted from
    /// its core's L1 before ever being touched by a demand access.
    fn record_prefetch_eviction(&mut self, core: usize, addr: u64) {
        if self.cores[core].prefetched_addresses.remove(&addr) {
            if let Some(p) = self.cores[core].prefetcher.as_mut() {
                p.record_useless();
            }
        }
    }

    /// Issues the core-local prefetcher's prediction on a demand L1 miss
    /// and, per prediction, ensures L2/L3 hold the line (a read-fill, not a
    /// demand access) before installing into L1[c] Shared-if-peer-present,
    /// Exclusive otherwise. Never installs Modified via prefetch.
    fn issue_local_prefetch(&mut self, core: usize, addr: u64, pc: u64, result: &mut MultiCoreAccessResult) {
        let Some(prefetcher) = self.cores[core].prefetcher.as_mut() else {
            return;
        };
        let targets = prefetcher.on_miss(addr, pc);
        result.prefetches_issued += targets.len();
        let line_bytes = self.line_bytes;
        let targets: Vec<u64> = targets.into_iter().map(|t| line_align(t, line_bytes)).collect();

        for target in targets {
            if self.cores[core].l1d.is_present(target) {
                continue;
            }
            if !self.l2.is_present(target) {
                self.l2.install(target, false);
            }
            let found_elsewhere = (0..self.cores.len()).any(|p| p != core && self.cores[p].l1d.is_present(target));
            let state = if found_elsewhere {
                CoherenceState::Shared
            } else {
                CoherenceState::Exclusive
            };
            self.cores[core].l1d.install_with_state(target, false, state);
            if found_elsewhere {
                self.coherence.note_shared(core, target);
            } else {
                self.coherence.note_exclusive(core, target);
            }
            let _ = self.cores[core].prefetched_addresses.insert(target);
        }
    }

    /// One core's L1 data cache.
    pub fn core_l1d(&self, core: usize) -> &CacheLevel {
        &self.cores[core].l1d
    }
    /// One core's L1 instruction cache.
    pub fn core_l1i(&self, core: usize) -> &CacheLevel {
        &self.cores[core].l1i
    }
    /// One core's DTLB stats.
    pub fn core_dtlb(&self, core: usize) -> &Tlb {
        &self.cores[core].dtlb
    }
    /// One core's prefetch stats, if a prefetcher is configured.
    pub fn core_prefetch_stats(&self, core: usize) -> Option<crate::core::units::prefetch::PrefetchStats> {
        self.cores[core].prefetcher.as_ref().map(|p| p.stats())
    }
    /// Shared L2.
    pub fn l2(&self) -> &CacheLevel {
        &self.l2
    }
    /// Shared L3, if configured.
    pub fn l3(&self) -> Option<&CacheLevel> {
        self.l3.as_ref()
    }
    /// Running total of coherence-driven invalidations across every access.
    pub fn coherence_invalidations(&self) -> u64 {
        self.coherence.coherence_invalidations()
    }
    /// Number of distinct lines ever flagged as false-sharing.
    pub fn false_sharing_count(&self) -> u64 {
        self.coherence.false_sharing_count()
    }
    /// Every flagged false-sharing line with its full access history.
    pub fn false_sharing_report(&self) -> Vec<(u64, Vec<FalseSharingEvent>)> {
        self.coherence.false_sharing_report()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheHierarchyConfig;
    use crate::presets::educational;

    fn four_core_educational() -> CacheHierarchyConfig {
        let mut cfg = educational();
        cfg.num_cores = 4;
        cfg
    }

    #[test]
    fn distinct_threads_bind_to_distinct_cores_round_robin() {
        let mut sys = MultiCoreCacheSystem::new(&four_core_educational()).unwrap();
        assert_eq!(sys.core_for_thread(10), 0);
        assert_eq!(sys.core_for_thread(20), 1);
        assert_eq!(sys.core_for_thread(10), 0); // stable
        assert_eq!(sys.core_for_thread(30), 2);
    }

    #[test]
    fn two_cores_reading_same_address_both_miss_no_invalidation() {
        let mut sys = MultiCoreCacheSystem::new(&four_core_educational()).unwrap();
        let r1 = sys.access(1, 0x4000, false, 0, L1Target::Data, "", 0);
        assert!(!r1.l1_hit);
        let r2 = sys.access(2, 0x4000, false, 0, L1Target::Data, "", 0);
        assert!(!r2.l1_hit);
        assert_eq!(sys.coherence_invalidations(), 0);
    }

    #[test]
    fn third_core_write_after_two_readers_invalidates() {
        let mut sys = MultiCoreCacheSystem::new(&four_core_educational()).unwrap();
        sys.access(1, 0x4000, false, 0, L1Target::Data, "", 0);
        sys.access(2, 0x4000, false, 0, L1Target::Data, "", 0);
        let before = sys.coherence_invalidations();
        sys.access(3, 0x4000, true, 0, L1Target::Data, "", 0);
        assert!(sys.coherence_invalidations() > before);
    }

    #[test]
    fn false_sharing_needs_two_threads_two_offsets_and_a_write() {
        let mut sys = MultiCoreCacheSystem::new(&four_core_educational()).unwrap();
        sys.access(1, 0x8000, true, 0, L1Target::Data, "a.c", 10);
        let r = sys.access(2, 0x8000 + 32, true, 0, L1Target::Data, "a.c", 20);
        assert!(r.false_sharing);
        assert_eq!(sys.false_sharing_count(), 1);
    }

    #[test]
    fn reads_only_never_flag_false_sharing() {
        let mut sys = MultiCoreCacheSystem::new(&four_core_educational()).unwrap();
        sys.access(1, 0x8000, false, 0, L1Target::Data, "a.c", 10);
        sys.access(2, 0x8000 + 32, false, 0, L1Target::Data, "a.c", 20);
        assert_eq!(sys.false_sharing_count(), 0);
    }

    #[test]
    fn same_byte_writes_by_two_threads_do_not_flag() {
        let mut sys = MultiCoreCacheSystem::new(&four_core_educational()).unwrap();
        sys.access(1, 0x8000, true, 0, L1Target::Data, "a.c", 10);
        sys.access(2, 0x8000, true, 0, L1Target::Data, "a.c", 20);
        assert_eq!(sys.false_sharing_count(), 0);
    }
}
