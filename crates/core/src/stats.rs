//! Statistics and snapshot facades bundled into a [`RunResult`].
//!
//! None of the lower-level stats types (`cache::CacheStats`,
//! `prefetch::PrefetchStats`, `mmu::TlbStats`) derive `Serialize` directly —
//! they're internal counters mutated on hot paths. The types here are the
//! JSON-facing snapshots a run produces once, at the end.

use serde::Serialize;

use crate::core::units::cache::{CacheLevel, CacheLineSnapshot, CacheStats};
use crate::core::units::mmu::TlbStats;
use crate::core::units::prefetch::PrefetchStats;

/// Serializable snapshot of one cache level's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheLevelStats {
    /// Demand hits.
    pub hits: u64,
    /// Demand misses.
    pub misses: u64,
    /// `hits / (hits + misses)`, `0.0` if there were no accesses.
    pub hit_rate: f64,
    /// Dirty lines written back on eviction.
    pub writebacks: u64,
    /// Coherence/back-invalidation events.
    pub invalidations: u64,
    /// Misses to a line never resident before (3C model).
    pub compulsory: u64,
    /// Misses caused by insufficient total capacity (3C model).
    pub capacity: u64,
    /// Misses caused by associativity conflicts (3C model).
    pub conflict: u64,
}

impl From<CacheStats> for CacheLevelStats {
    fn from(stats: CacheStats) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            hit_rate: stats.hit_rate(),
            writebacks: stats.writebacks,
            invalidations: stats.invalidations,
            compulsory: stats.compulsory_misses,
            capacity: stats.capacity_misses,
            conflict: stats.conflict_misses,
        }
    }
}

/// Serializable snapshot of one level's resident lines.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheLevelSnapshot {
    /// Number of sets in this level.
    pub num_sets: usize,
    /// Associativity (ways) of this level.
    pub num_ways: usize,
    /// Every (set, way) slot, valid or not.
    pub lines: Vec<CacheLineSnapshotRecord>,
}

/// One `(set, way)` slot's state, mirroring
/// [`crate::core::units::cache::CacheLineSnapshot`] in owned, serializable
/// form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheLineSnapshotRecord {
    /// Set index.
    pub set: usize,
    /// Way index within the set.
    pub way: usize,
    /// Whether the slot holds a valid line.
    pub valid: bool,
    /// The resident tag, meaningless unless `valid`.
    pub tag: u64,
    /// MESI state as a single character (`I`/`S`/`E`/`M`).
    pub coherence_char: char,
    /// Whether the resident line is dirty.
    pub dirty: bool,
}

impl From<CacheLineSnapshot> for CacheLineSnapshotRecord {
    fn from(snap: CacheLineSnapshot) -> Self {
        Self {
            set: snap.set,
            way: snap.way,
            valid: snap.valid,
            tag: snap.tag,
            coherence_char: snap.coherence_char,
            dirty: snap.dirty,
        }
    }
}

/// Builds a full snapshot of a level's resident lines, for inclusion in a
/// [`RunResult`].
pub fn snapshot_level(level: &CacheLevel) -> CacheLevelSnapshot {
    let (num_sets, num_ways) = level.shape();
    CacheLevelSnapshot {
        num_sets,
        num_ways,
        lines: level.get_sets().map(CacheLineSnapshotRecord::from).collect(),
    }
}

/// Serializable snapshot of a TLB's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TlbStatsRecord {
    /// Lookups that found the page resident.
    pub hits: u64,
    /// Lookups that required an install.
    pub misses: u64,
    /// `hits / (hits + misses)`.
    pub hit_rate: f64,
}

impl From<TlbStats> for TlbStatsRecord {
    fn from(stats: TlbStats) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            hit_rate: stats.hit_rate(),
        }
    }
}

/// Per-core DTLB plus a placeholder ITLB slot. The
/// engine does not track ITLB distinctly; `itlb` is always absent/zeroed).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TlbHierarchyStats {
    /// Data TLB counters.
    pub dtlb: TlbStatsRecord,
    /// Instruction TLB counters; always zero (no ITLB is modeled).
    pub itlb: TlbStatsRecord,
}

/// Serializable snapshot of a hardware prefetcher's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PrefetchStatsRecord {
    /// Total addresses emitted.
    pub issued: u64,
    /// Predictions later touched by a demand access.
    pub useful: u64,
    /// Predictions never touched.
    pub useless: u64,
    /// `useful / issued`.
    pub accuracy: f64,
}

impl From<PrefetchStats> for PrefetchStatsRecord {
    fn from(stats: PrefetchStats) -> Self {
        Self {
            issued: stats.issued,
            useful: stats.useful,
            useless: stats.useless,
            accuracy: stats.accuracy(),
        }
    }
}

/// One flagged false-sharing line with its accumulated access history
/// flagged as false-sharing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FalseSharingReport {
    /// Line-aligned address that qualified as false-sharing.
    pub line_address: u64,
    /// Distinct threads observed touching this line.
    pub thread_count: usize,
    /// Distinct byte offsets touched within the line.
    pub offset_count: usize,
    /// Total accesses recorded for this line.
    pub access_count: usize,
}

/// A `(file, line)` source location and its accumulated demand-access
/// counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HotLine {
    /// Source file.
    pub file: String,
    /// Source line number.
    pub line: u32,
    /// Demand hits attributed to this source location.
    pub hits: u64,
    /// Demand misses attributed to this source location.
    pub misses: u64,
    /// Distinct threads that touched this source location.
    pub thread_count: usize,
}

/// Estimated cycle cost of a run.
///
/// `total_cycles = Σ hits·latency + memory_accesses·memory_latency +
/// tlb_misses·tlb_miss_penalty` per level; computed once at the end of a
/// run from the final stats, not accumulated incrementally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TimingStats {
    /// Sum of every term below.
    pub total_cycles: u64,
    /// Cycles attributed to L1 hits.
    pub l1_cycles: u64,
    /// Cycles attributed to L2 hits.
    pub l2_cycles: u64,
    /// Cycles attributed to L3 hits.
    pub l3_cycles: u64,
    /// Cycles attributed to memory accesses.
    pub memory_cycles: u64,
    /// Cycles attributed to TLB miss penalties.
    pub tlb_miss_cycles: u64,
    /// `total_cycles / total demand accesses`, `0.0` if there were none.
    pub avg_latency: f64,
}

/// Per-level cache stats for a single-core run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SingleCoreStats {
    /// L1 data cache.
    pub l1d: CacheLevelStats,
    /// L1 instruction cache.
    pub l1i: CacheLevelStats,
    /// Unified L2.
    pub l2: CacheLevelStats,
    /// Unified L3, absent when not configured.
    pub l3: Option<CacheLevelStats>,
    /// Hardware prefetcher counters, absent when `PrefetcherKind::None`.
    pub prefetch: Option<PrefetchStatsRecord>,
}

/// Per-core and shared-level stats for a multi-core run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MultiCoreStats {
    /// One entry per core's L1 data cache, in core order.
    pub l1_per_core: Vec<CacheLevelStats>,
    /// Shared L2.
    pub l2: CacheLevelStats,
    /// Shared L3, absent when not configured.
    pub l3: Option<CacheLevelStats>,
    /// Running total of coherence-driven invalidations.
    pub coherence_invalidations: u64,
    /// Number of distinct lines flagged as false-sharing.
    pub false_sharing_events: u64,
    /// One entry per core's hardware prefetcher, in core order (`None`
    /// entries where that core has no prefetcher configured).
    pub prefetch_per_core: Vec<Option<PrefetchStatsRecord>>,
}

/// The full bundle an engine run hands back to an external writer. Exactly
/// one of `single_core`/`multi_core` is populated, matching which processor
/// produced the run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunResult {
    /// Populated when the run used [`crate::trace::processor::TraceProcessor`].
    pub single_core: Option<SingleCoreStats>,
    /// Populated when the run used
    /// [`crate::trace::processor::MultiCoreTraceProcessor`].
    pub multi_core: Option<MultiCoreStats>,
    /// Per-core DTLB/ITLB counters, one entry per core (a single entry for
    /// single-core runs).
    pub tlb: Vec<TlbHierarchyStats>,
    /// Every line ever flagged as false-sharing.
    pub false_sharing: Vec<FalseSharingReport>,
    /// The highest-miss source locations, descending, ties by first
    /// occurrence.
    pub hot_lines: Vec<HotLine>,
    /// Estimated cycle cost of the run.
    pub timing: TimingStats,
    /// Software-prefetch instructions processed (not hardware-prefetcher
    /// issues).
    pub sw_prefetch_issued: u64,
    /// `memcpy` events processed.
    pub memcpy_count: u64,
    /// `memmove` events processed.
    pub memmove_count: u64,
    /// `memset` events processed.
    pub memset_count: u64,
    /// Vector load/store events processed.
    pub vector_accesses: u64,
    /// Vector/intrinsic events whose region spanned more than one line.
    pub cross_line_accesses: u64,
    /// Atomic load/read events processed.
    pub atomic_loads: u64,
    /// Atomic read-modify-write events processed.
    pub atomic_rmw: u64,
    /// Atomic compare-and-swap events processed.
    pub atomic_cmpxchg: u64,
    /// Per-level final cache-line snapshots, present only when the caller
    /// requested them (expensive for large hierarchies).
    pub snapshots: Vec<(String, CacheLevelSnapshot)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_level_stats_from_raw_stats_computes_hit_rate() {
        let raw = CacheStats {
            hits: 9,
            misses: 1,
            ..CacheStats::default()
        };
        let snap: CacheLevelStats = raw.into();
        assert_eq!(snap.hits, 9);
        assert_eq!(snap.misses, 1);
        assert!((snap.hit_rate - 0.9).abs() < 1e-9);
    }

    #[test]
    fn prefetch_stats_record_computes_accuracy() {
        let raw = PrefetchStats {
            issued: 4,
            useful: 2,
            useless: 2,
        };
        let rec: PrefetchStatsRecord = raw.into();
        assert!((rec.accuracy - 0.5).abs() < 1e-9);
    }

    #[test]
    fn run_result_serializes_to_json() {
        let result = RunResult::default();
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"hot_lines\""));
    }
}
