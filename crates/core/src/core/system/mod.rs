//! Single-core three-level cache hierarchy.

/// Multi-core hierarchy built from per-core [`CacheSystem`]-like parts.
pub mod multicore;

use std::collections::HashSet;

use crate::common::addr::line_align;
use crate::common::error::ConfigError;
use crate::config::{CacheHierarchyConfig, InclusionPolicy, PrefetcherKind};
use crate::core::units::cache::{AccessResult, CacheLevel};
use crate::core::units::mmu::Tlb;
use crate::core::units::prefetch::{
    AdaptivePrefetcher, NextLinePrefetcher, Prefetcher, StreamPrefetcher, StridePrefetcher,
};

/// Which L1 a demand access should be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum L1Target {
    /// Data cache.
    Data,
    /// Instruction cache.
    Instruction,
}

/// Outcome of one [`CacheSystem::access_hierarchy`] call.
#[derive(Debug, Clone, Default)]
pub struct SystemAccessResult {
    /// Hit in L1 (data or instruction, per the request).
    pub l1_hit: bool,
    /// Hit in L2 (only meaningful if L1 missed).
    pub l2_hit: bool,
    /// Hit in L3 (only meaningful if L1 and L2 missed).
    pub l3_hit: bool,
    /// Whether the access ultimately reached main memory.
    pub memory_access: bool,
    /// Line-aligned addresses written back to memory during this access.
    pub writebacks: Vec<u64>,
    /// Number of addresses the prefetcher issued as a side effect.
    pub prefetches_issued: usize,
    /// Whether the DTLB lookup for this access hit.
    pub tlb_hit: bool,
}

pub(super) fn build_prefetcher(cfg: &crate::config::PrefetchConfig, line_bytes: usize) -> Option<Box<dyn Prefetcher>> {
    match cfg.kind {
        PrefetcherKind::None => None,
        PrefetcherKind::NextLine => Some(Box::new(NextLinePrefetcher::new(line_bytes, cfg.degree))),
        PrefetcherKind::Stream => Some(Box::new(StreamPrefetcher::new(
            line_bytes,
            cfg.degree,
            cfg.table_size,
            cfg.confidence_threshold,
            cfg.confidence_max,
        ))),
        PrefetcherKind::Stride => Some(Box::new(StridePrefetcher::new(
            line_bytes,
            cfg.degree,
            cfg.table_size,
            cfg.confidence_threshold,
            cfg.confidence_max,
        ))),
        PrefetcherKind::Adaptive | PrefetcherKind::Intel => Some(Box::new(AdaptivePrefetcher::new(
            line_bytes,
            cfg.degree,
            cfg.table_size,
            cfg.confidence_threshold,
            cfg.confidence_max,
        ))),
    }
}

/// A single core's L1d/L1i/L2/L3 hierarchy with inclusion-policy-driven
/// eviction cascades and a shared prefetcher.
pub struct CacheSystem {
    pub(crate) l1d: CacheLevel,
    pub(crate) l1i: CacheLevel,
    pub(crate) l2: CacheLevel,
    pub(crate) l3: Option<CacheLevel>,
    inclusion_policy: InclusionPolicy,
    prefetcher: Option<Box<dyn Prefetcher>>,
    prefetched_addresses: HashSet<u64>,
    line_bytes: u64,
    dtlb: Tlb,
}

impl CacheSystem {
    /// Builds a hierarchy from a validated configuration.
    pub fn new(config: &CacheHierarchyConfig) -> Result<Self, ConfigError> {
        let l1d = CacheLevel::new(config.l1d)?;
        let l1i = CacheLevel::new(config.l1i)?;
        let l2 = CacheLevel::new(config.l2)?;
        let l3 = if config.l3.is_absent() {
            None
        } else {
            Some(CacheLevel::new(config.l3)?)
        };
        let prefetcher = build_prefetcher(&config.prefetch, config.l1d.line_bytes);

        Ok(Self {
            l1d,
            l1i,
            l2,
            l3,
            inclusion_policy: config.inclusion_policy,
            prefetcher,
            prefetched_addresses: HashSet::new(),
            line_bytes: config.l1d.line_bytes as u64,
            dtlb: Tlb::new(config.tlb.num_sets, config.tlb.ways),
        })
    }

    fn l1_mut(&mut self, which: L1Target) -> &mut CacheLevel {
        match which {
            L1Target::Data => &mut self.l1d,
            L1Target::Instruction => &mut self.l1i,
        }
    }

    fn record_prefetch_hit_if_tracked(&mut self, addr: u64) {
        if self.prefetched_addresses.remove(&addr) {
            if let Some(p) = self.prefetcher.as_mut() {
                p.record_useful();
            }
        }
    }

    fn cascade_eviction(&mut self, was_dirty: bool, evicted: Option<u64>, result: &mut SystemAccessResult, target: L1Target) {
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
        let _ = target;
    }

    /// Drives one demand access (read/write/fetch) down the hierarchy,
    /// issuing a prefetch on the terminal miss.
    pub fn access_hierarchy(&mut self, addr: u64, is_write: bool, pc: u64, which: L1Target) -> SystemAccessResult {
        let mut result = SystemAccessResult::default();
        result.tlb_hit = self.dtlb.access(addr);

        let l1_info = self.l1_mut(which).access(addr, is_write);
        if l1_info.result == AccessResult::Hit {
            result.l1_hit = true;
            self.record_prefetch_hit_if_tracked(addr);
            return result;
        }
        self.cascade_eviction(l1_info.was_dirty, l1_info.evicted_address, &mut result, which);

        let l2_info = self.l2.access(addr, false);
        if l2_info.result == AccessResult::Hit {
            result.l2_hit = true;
            self.record_prefetch_hit_if_tracked(addr);
            if self.inclusion_policy == InclusionPolicy::Exclusive {
                self.l2.invalidate(addr);
            }
            return result;
        }
        self.cascade_to_l3(l2_info.was_dirty, l2_info.evicted_address, &mut result);

        if let Some(l3) = self.l3.as_mut() {
            let l3_info = l3.access(addr, false);
            if l3_info.result == AccessResult::Hit {
                result.l3_hit = true;
                if self.inclusion_policy == InclusionPolicy::Exclusive {
                    l3.invalidate(addr);
                }
                return result;
            }
            result.memory_access = true;
            if l3_info.was_dirty {
                if let Some(victim_addr) = l3_info.evicted_address {
                    result.writebacks.push(victim_addr);
                }
                if self.inclusion_policy == InclusionPolicy::Inclusive {
                    if let Some(victim_addr) = l3_info.evicted_address {
                        self.l2.invalidate(victim_addr);
                        self.l1d.invalidate(victim_addr);
                        self.l1i.invalidate(victim_addr);
                    }
                }
            }
        } else {
            result.memory_access = true;
        }

        self.issue_prefetch(addr, pc, &mut result);
        result
    }

    fn cascade_to_l3(&mut self, was_dirty: bool, evicted: Option<u64>, result: &mut SystemAccessResult) {
        let Some(evicted_addr) = evicted else { return };
        if self.prefetched_addresses.remove(&evicted_addr) {
            if let Some(p) = self.prefetcher.as_mut() {
                p.record_useless();
            }
        }
        match self.inclusion_policy {
            InclusionPolicy::Inclusive | InclusionPolicy::Nine => {
                if was_dirty {
                    result.writebacks.push(evicted_addr);
                }
            }
            InclusionPolicy::Exclusive => {
                if let Some(l3) = self.l3.as_mut() {
                    l3.install(evicted_addr, was_dirty);
                } else if was_dirty {
                    result.writebacks.push(evicted_addr);
                }
            }
        }
    }

    fn issue_prefetch(&mut self, addr: u64, pc: u64, result: &mut SystemAccessResult) {
        let Some(prefetcher) = self.prefetcher.as_mut() else { return };
        let targets = prefetcher.on_miss(addr, pc);
        result.prefetches_issued = targets.len();
        for target in targets {
            let line = line_align(target, self.line_bytes);
            if !self.l1d.is_present(line) && !self.l2.is_present(line) {
                self.l2.install(line, false);
                let _ = self.prefetched_addresses.insert(line);
            }
        }
    }

    /// L1 data cache.
    pub fn l1d(&self) -> &CacheLevel {
        &self.l1d
    }
    /// L1 instruction cache.
    pub fn l1i(&self) -> &CacheLevel {
        &self.l1i
    }
    /// Unified L2.
    pub fn l2(&self) -> &CacheLevel {
        &self.l2
    }
    /// Unified L3, if configured.
    pub fn l3(&self) -> Option<&CacheLevel> {
        self.l3.as_ref()
    }
    /// Prefetch stats, if a prefetcher is configured.
    pub fn prefetch_stats(&self) -> Option<crate::core::units::prefetch::PrefetchStats> {
        self.prefetcher.as_ref().map(|p| p.stats())
    }
    /// Data TLB.
    pub fn dtlb(&self) -> &Tlb {
        &self.dtlb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::educational;

    #[test]
    fn sequential_ten_byte_access_has_one_compulsory_miss() {
        let mut sys = CacheSystem::new(&educational()).unwrap();
        for addr in 0x1000..0x100A {
            sys.access_hierarchy(addr, false, 0, L1Target::Data);
        }
        let stats = sys.l1d().stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 9);
    }

    #[test]
    fn hundred_reads_to_same_address_miss_once() {
        let mut sys = CacheSystem::new(&educational()).unwrap();
        for _ in 0..100 {
            sys.access_hierarchy(0x1000, false, 0, L1Target::Data);
        }
        let stats = sys.l1d().stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 99);
    }

    #[test]
    fn l1_miss_falls_through_to_l2_then_memory() {
        let mut sys = CacheSystem::new(&educational()).unwrap();
        let result = sys.access_hierarchy(0x1000, false, 0, L1Target::Data);
        assert!(!result.l1_hit);
        assert!(!result.l2_hit);
        assert!(result.memory_access || result.l3_hit);
    }
}
