//! Trace-driven dispatch loop.
//!
//! Splits each [`TraceEvent`] into line-sized sub-accesses, routes it to the
//! right cache-system entry point by flavor, and accumulates per-source-line
//! and intrinsic/vector/atomic counters on the side.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::common::addr::line_align;
use crate::common::error::ConfigError;
use crate::config::CacheHierarchyConfig;
use crate::core::system::multicore::MultiCoreCacheSystem;
use crate::core::system::{CacheSystem, L1Target};
use crate::stats::HotLine;
use crate::streaming::{EventResult, ProgressSink};
use crate::trace::event::TraceEvent;

#[derive(Debug, Clone, Default)]
struct SourceLineEntry {
    file: String,
    line: u32,
    hits: u64,
    misses: u64,
    threads: std::collections::HashSet<u32>,
}

/// Accumulates per-`"{file}:{line}"` demand hit/miss counts in first-seen
/// order, so ties in [`SourceLineTracker::hot_lines`] break by insertion
/// order.
#[derive(Debug, Clone, Default)]
struct SourceLineTracker {
    index: HashMap<String, usize>,
    entries: Vec<SourceLineEntry>,
}

impl SourceLineTracker {
    fn record(&mut self, event: &TraceEvent, is_hit: bool) {
        let Some(key) = event.source_key() else { return };
        let idx = *self.index.entry(key).or_insert_with(|| {
            self.entries.push(SourceLineEntry {
                file: event.file.clone(),
                line: event.line,
                ..SourceLineEntry::default()
            });
            self.entries.len() - 1
        });
        let entry = &mut self.entries[idx];
        if is_hit {
            entry.hits += 1;
        } else {
            entry.misses += 1;
        }
        entry.threads.insert(event.thread_id);
    }

    fn hot_lines(&self, limit: usize) -> Vec<HotLine> {
        let mut ordered: Vec<&SourceLineEntry> = self.entries.iter().collect();
        ordered.sort_by(|a, b| b.misses.cmp(&a.misses));
        ordered
            .into_iter()
            .take(limit)
            .map(|entry| HotLine {
                file: entry.file.clone(),
                line: entry.line,
                hits: entry.hits,
                misses: entry.misses,
                thread_count: entry.threads.len(),
            })
            .collect()
    }
}

/// Intrinsic/vector/atomic counters threaded alongside the cache system
/// shared by the single- and multi-core processors.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntrinsicCounters {
    /// Software-prefetch instructions processed.
    pub sw_prefetch_issued: u64,
    /// `memcpy` events processed.
    pub memcpy_count: u64,
    /// `memmove` events processed.
    pub memmove_count: u64,
    /// `memset` events processed.
    pub memset_count: u64,
    /// Vector load/store events processed.
    pub vector_accesses: u64,
    /// Events whose region spanned more than one cache line.
    pub cross_line_accesses: u64,
    /// Atomic load events processed.
    pub atomic_loads: u64,
    /// Atomic read-modify-write events processed.
    pub atomic_rmw: u64,
    /// Atomic compare-and-swap events processed.
    pub atomic_cmpxchg: u64,
}

/// Splits `[addr, addr+size)` into the line-aligned addresses it
/// intersects, ascending.
fn split_lines(addr: u64, size: u32, line_bytes: u64) -> Vec<u64> {
    if size == 0 {
        return Vec::new();
    }
    let last = addr + (size as u64 - 1);
    let first_line = line_align(addr, line_bytes);
    let last_line = line_align(last, line_bytes);
    let mut lines = Vec::new();
    let mut cur = first_line;
    loop {
        lines.push(cur);
        if cur >= last_line {
            break;
        }
        cur += line_bytes;
    }
    lines
}

/// Drives a single-core [`CacheSystem`] from a trace.
pub struct TraceProcessor {
    system: CacheSystem,
    line_bytes: u64,
    source_lines: SourceLineTracker,
    intrinsics: IntrinsicCounters,
}

impl TraceProcessor {
    /// Builds a processor from a validated hierarchy configuration.
    pub fn new(config: &CacheHierarchyConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            system: CacheSystem::new(config)?,
            line_bytes: config.l1d.line_bytes as u64,
            source_lines: SourceLineTracker::default(),
            intrinsics: IntrinsicCounters::default(),
        })
    }

    /// The underlying hierarchy, for stats extraction after a run.
    pub fn system(&self) -> &CacheSystem {
        &self.system
    }

    /// Accumulated intrinsic/vector/atomic counters.
    pub fn intrinsics(&self) -> IntrinsicCounters {
        self.intrinsics
    }

    /// The `limit` source locations with the most demand misses, descending,
    /// ties broken by first occurrence.
    pub fn hot_lines(&self, limit: usize) -> Vec<HotLine> {
        self.source_lines.hot_lines(limit)
    }

    /// Dispatches one trace event, notifying `sink` once the event has been
    /// fully applied.
    pub fn process(&mut self, event: &TraceEvent, sink: &mut dyn ProgressSink) {
        #[cfg(feature = "always-trace")]
        trace!(address = event.address, size = event.size, "processing trace event");

        if event.is_prefetch {
            self.dispatch_sw_prefetch(event);
            return;
        }
        if event.is_memcpy || event.is_memmove {
            self.dispatch_copy(event, sink);
            return;
        }
        if event.is_memset {
            self.intrinsics.memset_count += 1;
            self.dispatch_region(event, event.address, event.size, true, L1Target::Data, sink);
            return;
        }
        if event.is_vector {
            self.intrinsics.vector_accesses += 1;
            self.dispatch_region(event, event.address, event.size, event.is_write, L1Target::Data, sink);
            return;
        }
        if event.is_atomic {
            if event.is_rmw {
                self.intrinsics.atomic_rmw += 1;
            } else if event.is_cmpxchg {
                self.intrinsics.atomic_cmpxchg += 1;
            } else {
                self.intrinsics.atomic_loads += 1;
            }
            self.dispatch_region(event, event.address, event.size, event.is_write, L1Target::Data, sink);
            return;
        }
        if event.is_icache {
            self.dispatch_region(event, event.address, event.size, false, L1Target::Instruction, sink);
            return;
        }
        self.dispatch_region(event, event.address, event.size, event.is_write, L1Target::Data, sink);
    }

    fn dispatch_sw_prefetch(&mut self, event: &TraceEvent) {
        self.intrinsics.sw_prefetch_issued += 1;
        let lines = split_lines(event.address, event.size, self.line_bytes);
        if let Some(&first) = lines.first() {
            self.system.access_hierarchy(first, false, event.address, L1Target::Data);
        }
    }

    fn dispatch_copy(&mut self, event: &TraceEvent, sink: &mut dyn ProgressSink) {
        if event.is_memcpy {
            self.intrinsics.memcpy_count += 1;
        } else {
            self.intrinsics.memmove_count += 1;
        }
        if let Some(src) = event.src_address {
            self.dispatch_region_raw(event, src, event.size, false, L1Target::Data, &mut crate::streaming::NullSink);
        }
        self.dispatch_region(event, event.address, event.size, true, L1Target::Data, sink);
    }

    fn dispatch_region(&mut self, event: &TraceEvent, addr: u64, size: u32, is_write: bool, which: L1Target, sink: &mut dyn ProgressSink) {
        self.dispatch_region_raw(event, addr, size, is_write, which, sink);
    }

    fn dispatch_region_raw(&mut self, event: &TraceEvent, addr: u64, size: u32, is_write: bool, which: L1Target, sink: &mut dyn ProgressSink) {
        let lines = split_lines(addr, size, self.line_bytes);
        if lines.len() > 1 {
            self.intrinsics.cross_line_accesses += 1;
        }

        let mut any_l1 = false;
        let mut any_l2 = false;
        let mut any_l3 = false;
        for line_addr in &lines {
            let result = self.system.access_hierarchy(*line_addr, is_write, event.address, which);
            any_l1 |= result.l1_hit;
            any_l2 |= result.l2_hit;
            any_l3 |= result.l3_hit;
            self.source_lines.record(event, result.l1_hit);
        }

        debug!(l1 = any_l1, l2 = any_l2, l3 = any_l3, "event dispatched");
        sink.on_event(EventResult {
            l1_hit: any_l1,
            l2_hit: any_l2,
            l3_hit: any_l3,
            address: event.address,
            size: event.size,
            file: event.file.clone(),
            line: event.line,
        });
    }
}

/// Drives a [`MultiCoreCacheSystem`] from a trace.
pub struct MultiCoreTraceProcessor {
    system: MultiCoreCacheSystem,
    line_bytes: u64,
    source_lines: SourceLineTracker,
    intrinsics: IntrinsicCounters,
}

impl MultiCoreTraceProcessor {
    /// Builds a processor from a validated hierarchy configuration.
    pub fn new(config: &CacheHierarchyConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            system: MultiCoreCacheSystem::new(config)?,
            line_bytes: config.l1d.line_bytes as u64,
            source_lines: SourceLineTracker::default(),
            intrinsics: IntrinsicCounters::default(),
        })
    }

    /// The underlying hierarchy, for stats extraction after a run.
    pub fn system(&self) -> &MultiCoreCacheSystem {
        &self.system
    }

    /// Accumulated intrinsic/vector/atomic counters.
    pub fn intrinsics(&self) -> IntrinsicCounters {
        self.intrinsics
    }

    /// The `limit` source locations with the most demand misses, descending,
    /// ties broken by first occurrence.
    pub fn hot_lines(&self, limit: usize) -> Vec<HotLine> {
        self.source_lines.hot_lines(limit)
    }

    /// Dispatches one trace event, notifying `sink` once the event has been
    /// fully applied.
    pub fn process(&mut self, event: &TraceEvent, sink: &mut dyn ProgressSink) {
        #[cfg(feature = "always-trace")]
        trace!(address = event.address, thread = event.thread_id, "processing trace event");

        if event.is_prefetch {
            self.dispatch_sw_prefetch(event);
            return;
        }
        if event.is_memcpy || event.is_memmove {
            self.dispatch_copy(event, sink);
            return;
        }
        if event.is_memset {
            self.intrinsics.memset_count += 1;
            self.dispatch_region(event, event.address, event.size, true, L1Target::Data, sink);
            return;
        }
        if event.is_vector {
            self.intrinsics.vector_accesses += 1;
            self.dispatch_region(event, event.address, event.size, event.is_write, L1Target::Data, sink);
            return;
        }
        if event.is_atomic {
            if event.is_rmw {
                self.intrinsics.atomic_rmw += 1;
            } else if event.is_cmpxchg {
                self.intrinsics.atomic_cmpxchg += 1;
            } else {
                self.intrinsics.atomic_loads += 1;
            }
            self.dispatch_region(event, event.address, event.size, event.is_write, L1Target::Data, sink);
            return;
        }
        if event.is_icache {
            self.dispatch_region(event, event.address, event.size, false, L1Target::Instruction, sink);
            return;
        }
        self.dispatch_region(event, event.address, event.size, event.is_write, L1Target::Data, sink);
    }

    fn dispatch_sw_prefetch(&mut self, event: &TraceEvent) {
        self.intrinsics.sw_prefetch_issued += 1;
        let lines = split_lines(event.address, event.size, self.line_bytes);
        if let Some(&first) = lines.first() {
            self.system
                .access(event.thread_id, first, false, event.address, L1Target::Data, "", 0);
        }
    }

    fn dispatch_copy(&mut self, event: &TraceEvent, sink: &mut dyn ProgressSink) {
        if event.is_memcpy {
            self.intrinsics.memcpy_count += 1;
        } else {
            self.intrinsics.memmove_count += 1;
        }
        if let Some(src) = event.src_address {
            self.dispatch_region_raw(event, src, event.size, false, L1Target::Data, &mut crate::streaming::NullSink);
        }
        self.dispatch_region(event, event.address, event.size, true, L1Target::Data, sink);
    }

    fn dispatch_region(&mut self, event: &TraceEvent, addr: u64, size: u32, is_write: bool, which: L1Target, sink: &mut dyn ProgressSink) {
        self.dispatch_region_raw(event, addr, size, is_write, which, sink);
    }

    fn dispatch_region_raw(&mut self, event: &TraceEvent, addr: u64, size: u32, is_write: bool, which: L1Target, sink: &mut dyn ProgressSink) {
        let lines = split_lines(addr, size, self.line_bytes);
        if lines.len() > 1 {
            self.intrinsics.cross_line_accesses += 1;
        }

        let mut any_l1 = false;
        let mut any_l2 = false;
        let mut any_l3 = false;
        for line_addr in &lines {
            let result = self.system.access(
                event.thread_id,
                *line_addr,
                is_write,
                event.address,
                which,
                &event.file,
                event.line,
            );
            any_l1 |= result.l1_hit;
            any_l2 |= result.l2_hit;
            any_l3 |= result.l3_hit;
            self.source_lines.record(event, result.l1_hit);
        }

        debug!(l1 = any_l1, l2 = any_l2, l3 = any_l3, "event dispatched");
        sink.on_event(EventResult {
            l1_hit: any_l1,
            l2_hit: any_l2,
            l3_hit: any_l3,
            address: event.address,
            size: event.size,
            file: event.file.clone(),
            line: event.line,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::educational;
    use crate::streaming::NullSink;

    fn event(address: u64, size: u32, is_write: bool) -> TraceEvent {
        TraceEvent {
            address,
            size,
            is_write,
            ..TraceEvent::default()
        }
    }

    #[test]
    fn split_lines_single_region_within_one_line() {
        assert_eq!(split_lines(0x1000, 8, 64), vec![0x1000]);
    }

    #[test]
    fn split_lines_spans_two_lines() {
        assert_eq!(split_lines(0x103C, 8, 64), vec![0x1000, 0x1040]);
    }

    #[test]
    fn sequential_reads_produce_one_compulsory_miss() {
        let mut proc = TraceProcessor::new(&educational()).unwrap();
        let mut sink = NullSink;
        for addr in 0x1000..0x1009 {
            proc.process(&event(addr, 1, false), &mut sink);
        }
        let stats = proc.system().l1d().stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 8);
    }

    #[test]
    fn hot_lines_sorts_by_miss_count_descending() {
        let mut proc = TraceProcessor::new(&educational()).unwrap();
        let mut sink = NullSink;
        let mut hot = event(0x2000, 8, false);
        hot.file = "hot.c".to_string();
        hot.line = 10;
        let mut cold = event(0x3000, 8, false);
        cold.file = "cold.c".to_string();
        cold.line = 20;

        proc.process(&cold, &mut sink);
        proc.process(&hot, &mut sink);
        proc.process(&hot, &mut sink);

        let lines = proc.hot_lines(2);
        assert_eq!(lines[0].file, "hot.c");
    }

    #[test]
    fn memcpy_splits_source_and_destination() {
        let mut proc = TraceProcessor::new(&educational()).unwrap();
        let mut sink = NullSink;
        let mut copy = event(0x5000, 16, false);
        copy.is_memcpy = true;
        copy.src_address = Some(0x6000);
        proc.process(&copy, &mut sink);
        assert_eq!(proc.intrinsics().memcpy_count, 1);
        assert!(proc.system().l1d().is_present(0x5000) || proc.system().l2().is_present(0x5000));
    }

    #[test]
    fn software_prefetch_does_not_pollute_source_line_stats() {
        let mut proc = TraceProcessor::new(&educational()).unwrap();
        let mut sink = NullSink;
        let mut prefetch = event(0x7000, 8, false);
        prefetch.is_prefetch = true;
        prefetch.file = "p.c".to_string();
        prefetch.line = 1;
        proc.process(&prefetch, &mut sink);
        assert_eq!(proc.intrinsics().sw_prefetch_issued, 1);
        assert!(proc.hot_lines(10).is_empty());
    }

    #[test]
    fn multicore_two_readers_then_a_writer_invalidates() {
        let mut cfg = educational();
        cfg.num_cores = 4;
        let mut proc = MultiCoreTraceProcessor::new(&cfg).unwrap();
        let mut sink = NullSink;
        proc.process(&{ let mut e = event(0x4000, 8, false); e.thread_id = 1; e }, &mut sink);
        proc.process(&{ let mut e = event(0x4000, 8, false); e.thread_id = 2; e }, &mut sink);
        proc.process(&{ let mut e = event(0x4000, 8, true); e.thread_id = 3; e }, &mut sink);
        assert!(proc.system().coherence_invalidations() >= 1);
    }
}
