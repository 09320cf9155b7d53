//! Drives a trace through a configured hierarchy and assembles a
//! [`RunResult`].

use std::io;
use std::path::Path;

use cachesim_core::common::error::ConfigError;
use cachesim_core::config::CacheHierarchyConfig;
use cachesim_core::core::units::mmu::TlbStats;
use cachesim_core::stats::{
    self, CacheLevelStats, FalseSharingReport, HotLine, MultiCoreStats, PrefetchStatsRecord,
    RunResult, SingleCoreStats, TimingStats, TlbHierarchyStats, TlbStatsRecord,
};
use cachesim_core::streaming::{NullSink, ProgressSink};
use cachesim_core::trace::parser::parse_line;
use cachesim_core::{MultiCoreTraceProcessor, TraceProcessor};
use thiserror::Error;
use tracing::warn;

use crate::cli::RunArgs;
use crate::trace_source::TraceSource;

/// Everything that can go wrong driving a trace through a run: opening or
/// reading the trace source, or the hierarchy geometry assembled by
/// `build_config::resolve` turning out to be invalid.
#[derive(Debug, Error)]
pub enum RunError {
    /// The trace source couldn't be opened or read.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The resolved cache hierarchy geometry was rejected at construction.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn tlb_hierarchy_stats(dtlb: TlbStats) -> TlbHierarchyStats {
    TlbHierarchyStats {
        dtlb: TlbStatsRecord::from(dtlb),
        itlb: TlbStatsRecord::default(),
    }
}

/// A streaming sink that prints one progress line per event to stdout.
struct PrintingSink;

impl ProgressSink for PrintingSink {
    fn on_event(&mut self, event: cachesim_core::streaming::EventResult) {
        let level = if event.l1_hit {
            "L1"
        } else if event.l2_hit {
            "L2"
        } else if event.l3_hit {
            "L3"
        } else {
            "MEM"
        };
        if event.file.is_empty() {
            println!("{level} 0x{:x} ({} B)", event.address, event.size);
        } else {
            println!("{level} 0x{:x} ({} B) {}:{}", event.address, event.size, event.file, event.line);
        }
    }
}

fn timing_from_levels(
    l1_total_hits: u64,
    l2: CacheLevelStats,
    l3: Option<CacheLevelStats>,
    memory_accesses: u64,
    tlb_misses: u64,
    total_demand_accesses: u64,
    latency: &cachesim_core::config::LatencyConfig,
) -> TimingStats {
    let l1_cycles = l1_total_hits * latency.l1_cycles;
    let l2_cycles = l2.hits * latency.l2_cycles;
    let l3_cycles = l3.map_or(0, |l3| l3.hits * latency.l3_cycles);
    let memory_cycles = memory_accesses * latency.memory_cycles;
    let tlb_miss_cycles = tlb_misses * latency.tlb_miss_cycles;
    let total_cycles = l1_cycles + l2_cycles + l3_cycles + memory_cycles + tlb_miss_cycles;
    let avg_latency = if total_demand_accesses == 0 {
        0.0
    } else {
        total_cycles as f64 / total_demand_accesses as f64
    };
    TimingStats {
        total_cycles,
        l1_cycles,
        l2_cycles,
        l3_cycles,
        memory_cycles,
        tlb_miss_cycles,
        avg_latency,
    }
}

/// Runs a single-core simulation over `trace_path` (or stdin) and returns
/// the assembled result bundle.
///
/// # Errors
///
/// Returns the underlying I/O error if the trace source can't be opened or
/// read, or a [`ConfigError`] if `config`'s geometry is invalid.
pub fn run_single_core(
    config: &CacheHierarchyConfig,
    trace_path: Option<&Path>,
    args: &RunArgs,
) -> Result<RunResult, RunError> {
    let mut proc = TraceProcessor::new(config)?;
    let mut null_sink = NullSink;

    for line in TraceSource::open(trace_path)?.lines() {
        let line = line?;
        match parse_line(&line) {
            Ok(Some(event)) => {
                if args.stream {
                    let mut sink = PrintingSink;
                    proc.process(&event, &mut sink);
                } else {
                    proc.process(&event, &mut null_sink);
                }
            }
            Ok(None) => {}
            Err(err) => warn!(%err, line = %line, "skipping unparsable trace line"),
        }
    }

    let system = proc.system();
    let l1d: CacheLevelStats = system.l1d().stats().into();
    let l1i: CacheLevelStats = system.l1i().stats().into();
    let l2: CacheLevelStats = system.l2().stats().into();
    let l3: Option<CacheLevelStats> = system.l3().map(|l| l.stats().into());
    let prefetch: Option<PrefetchStatsRecord> = system.prefetch_stats().map(Into::into);

    let memory_accesses = l3.map_or(l2.misses, |l3| l3.misses);
    let tlb = system.dtlb().stats();

    let timing = timing_from_levels(
        l1d.hits + l1i.hits,
        l2,
        l3,
        memory_accesses,
        tlb.misses,
        l1d.hits + l1d.misses + l1i.hits + l1i.misses,
        &config.latency,
    );

    let snapshots = if args.fast {
        Vec::new()
    } else {
        let mut snaps = vec![
            ("l1d".to_string(), stats::snapshot_level(system.l1d())),
            ("l1i".to_string(), stats::snapshot_level(system.l1i())),
            ("l2".to_string(), stats::snapshot_level(system.l2())),
        ];
        if let Some(l3) = system.l3() {
            snaps.push(("l3".to_string(), stats::snapshot_level(l3)));
        }
        snaps
    };

    let intrinsics = proc.intrinsics();

    Ok(RunResult {
        single_core: Some(SingleCoreStats {
            l1d,
            l1i,
            l2,
            l3,
            prefetch,
        }),
        multi_core: None,
        tlb: vec![tlb_hierarchy_stats(tlb)],
        false_sharing: Vec::new(),
        hot_lines: proc.hot_lines(args.hot_lines),
        timing,
        sw_prefetch_issued: intrinsics.sw_prefetch_issued,
        memcpy_count: intrinsics.memcpy_count,
        memmove_count: intrinsics.memmove_count,
        memset_count: intrinsics.memset_count,
        vector_accesses: intrinsics.vector_accesses,
        cross_line_accesses: intrinsics.cross_line_accesses,
        atomic_loads: intrinsics.atomic_loads,
        atomic_rmw: intrinsics.atomic_rmw,
        atomic_cmpxchg: intrinsics.atomic_cmpxchg,
        snapshots,
    })
}

/// Runs a multi-core simulation over `trace_path` (or stdin) and returns
/// the assembled result bundle.
///
/// # Errors
///
/// Returns the underlying I/O error if the trace source can't be opened or
/// read, or a [`ConfigError`] if `config`'s geometry is invalid.
pub fn run_multi_core(
    config: &CacheHierarchyConfig,
    trace_path: Option<&Path>,
    args: &RunArgs,
) -> Result<RunResult, RunError> {
    let mut proc = MultiCoreTraceProcessor::new(config)?;
    let mut null_sink = NullSink;

    for line in TraceSource::open(trace_path)?.lines() {
        let line = line?;
        match parse_line(&line) {
            Ok(Some(event)) => {
                if args.stream {
                    let mut sink = PrintingSink;
                    proc.process(&event, &mut sink);
                } else {
                    proc.process(&event, &mut null_sink);
                }
            }
            Ok(None) => {}
            Err(err) => warn!(%err, line = %line, "skipping unparsable trace line"),
        }
    }

    let system = proc.system();
    let num_cores = system.num_cores();

    let mut l1_per_core = Vec::with_capacity(num_cores);
    let mut prefetch_per_core = Vec::with_capacity(num_cores);
    let mut tlb_per_core = Vec::with_capacity(num_cores);
    let mut l1_total_hits = 0u64;
    let mut l1_total_accesses = 0u64;
    let mut tlb_misses_total = 0u64;

    for core in 0..num_cores {
        let l1d: CacheLevelStats = system.core_l1d(core).stats().into();
        l1_total_hits += l1d.hits;
        l1_total_accesses += l1d.hits + l1d.misses;
        l1_per_core.push(l1d);
        prefetch_per_core.push(system.core_prefetch_stats(core).map(Into::into));
        let dtlb = system.core_dtlb(core).stats();
        tlb_misses_total += dtlb.misses;
        tlb_per_core.push(tlb_hierarchy_stats(dtlb));
    }

    let l2: CacheLevelStats = system.l2().stats().into();
    let l3: Option<CacheLevelStats> = system.l3().map(|l| l.stats().into());
    let memory_accesses = l3.map_or(l2.misses, |l3| l3.misses);

    let timing = timing_from_levels(
        l1_total_hits,
        l2,
        l3,
        memory_accesses,
        tlb_misses_total,
        l1_total_accesses,
        &config.latency,
    );

    let false_sharing: Vec<FalseSharingReport> = system
        .false_sharing_report()
        .into_iter()
        .map(|(line_address, events)| {
            let threads: std::collections::HashSet<u32> = events.iter().map(|e| e.thread_id).collect();
            let offsets: std::collections::HashSet<u64> = events.iter().map(|e| e.byte_offset).collect();
            FalseSharingReport {
                line_address,
                thread_count: threads.len(),
                offset_count: offsets.len(),
                access_count: events.len(),
            }
        })
        .collect();

    let snapshots = if args.fast {
        Vec::new()
    } else {
        let mut snaps = Vec::new();
        for core in 0..num_cores {
            snaps.push((format!("core{core}.l1d"), stats::snapshot_level(system.core_l1d(core))));
            snaps.push((format!("core{core}.l1i"), stats::snapshot_level(system.core_l1i(core))));
        }
        snaps.push(("l2".to_string(), stats::snapshot_level(system.l2())));
        if let Some(l3) = system.l3() {
            snaps.push(("l3".to_string(), stats::snapshot_level(l3)));
        }
        snaps
    };

    let hot_lines: Vec<HotLine> = proc.hot_lines(args.hot_lines);
    let intrinsics = proc.intrinsics();

    Ok(RunResult {
        single_core: None,
        multi_core: Some(MultiCoreStats {
            l1_per_core,
            l2,
            l3,
            coherence_invalidations: system.coherence_invalidations(),
            false_sharing_events: system.false_sharing_count(),
            prefetch_per_core,
        }),
        tlb: tlb_per_core,
        false_sharing,
        hot_lines,
        timing,
        sw_prefetch_issued: intrinsics.sw_prefetch_issued,
        memcpy_count: intrinsics.memcpy_count,
        memmove_count: intrinsics.memmove_count,
        memset_count: intrinsics.memset_count,
        vector_accesses: intrinsics.vector_accesses,
        cross_line_accesses: intrinsics.cross_line_accesses,
        atomic_loads: intrinsics.atomic_loads,
        atomic_rmw: intrinsics.atomic_rmw,
        atomic_cmpxchg: intrinsics.atomic_cmpxchg,
        snapshots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::RunArgs;
    use cachesim_core::presets::educational;
    use std::io::Write;

    fn args(stream: bool, fast: bool) -> RunArgs {
        RunArgs {
            trace: None,
            config: "educational".to_string(),
            cores: None,
            prefetch: None,
            prefetch_degree: None,
            verbose: false,
            json: false,
            stream,
            flamegraph: None,
            fast,
            l1_size: None,
            l1_assoc: None,
            l1_line: None,
            l2_size: None,
            l2_assoc: None,
            l3_size: None,
            l3_assoc: None,
            hot_lines: 10,
        }
    }

    fn write_trace(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    #[test]
    fn single_core_sequential_trace_matches_scenario_s1() {
        let trace = write_trace(&[
            "L 0x1000 1", "L 0x1001 1", "L 0x1002 1", "L 0x1003 1", "L 0x1004 1", "L 0x1005 1",
            "L 0x1006 1", "L 0x1007 1", "L 0x1008 1",
        ]);
        let cfg = educational();
        let result = run_single_core(&cfg, Some(trace.path()), &args(false, false)).unwrap();
        let single = result.single_core.unwrap();
        assert_eq!(single.l1d.hits, 8);
        assert_eq!(single.l1d.misses, 1);
    }

    #[test]
    fn fast_flag_skips_snapshots() {
        let trace = write_trace(&["L 0x1000 1"]);
        let cfg = educational();
        let result = run_single_core(&cfg, Some(trace.path()), &args(false, true)).unwrap();
        assert!(result.snapshots.is_empty());
    }

    #[test]
    fn multi_core_trace_reports_per_core_stats() {
        let trace = write_trace(&["L 0x1000 1 T1", "L 0x2000 1 T2"]);
        let mut cfg = educational();
        cfg.num_cores = 4;
        let result = run_multi_core(&cfg, Some(trace.path()), &args(false, false)).unwrap();
        let multi = result.multi_core.unwrap();
        assert_eq!(multi.l1_per_core.len(), 4);
    }

    #[test]
    fn malformed_lines_are_skipped_without_aborting() {
        let trace = write_trace(&["not a trace line", "L 0x1000 1"]);
        let cfg = educational();
        let result = run_single_core(&cfg, Some(trace.path()), &args(false, false)).unwrap();
        assert_eq!(result.single_core.unwrap().l1d.misses, 1);
    }
}
