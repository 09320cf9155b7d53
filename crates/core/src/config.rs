//! Configuration for the cache simulator.
//!
//! This module defines the structures used to parameterize a run: the
//! geometry of each cache level, the inclusion policy tying the hierarchy
//! together, prefetcher selection, and per-level latencies. Configuration is
//! supplied as JSON (matching [`crate::stats::RunResult`]'s own JSON
//! contract) or built in code via [`crate::presets`].

use serde::{Deserialize, Serialize};

use crate::common::error::ConfigError;

/// Baseline geometry and latency constants, used when a field is omitted
/// from a deserialized config.
mod defaults {
    /// Default L1 data/instruction cache size (32 KiB).
    pub const L1_SIZE: usize = 32 * 1024;
    /// Default L2 cache size (256 KiB).
    pub const L2_SIZE: usize = 256 * 1024;
    /// Default L3 cache size (8 MiB). Zero means "absent".
    pub const L3_SIZE: usize = 8 * 1024 * 1024;
    /// Default cache line size in bytes.
    pub const LINE_BYTES: usize = 64;
    /// Default L1 associativity.
    pub const L1_WAYS: usize = 8;
    /// Default L2 associativity.
    pub const L2_WAYS: usize = 8;
    /// Default L3 associativity.
    pub const L3_WAYS: usize = 16;
    /// Default L1 access latency in cycles.
    pub const L1_LATENCY: u64 = 4;
    /// Default L2 access latency in cycles.
    pub const L2_LATENCY: u64 = 12;
    /// Default L3 access latency in cycles.
    pub const L3_LATENCY: u64 = 36;
    /// Default main-memory access latency in cycles.
    pub const MEMORY_LATENCY: u64 = 200;
    /// Default TLB-miss penalty in cycles.
    pub const TLB_MISS_PENALTY: u64 = 20;
    /// Default DTLB set count.
    pub const TLB_SETS: usize = 16;
    /// Default DTLB ways per set.
    pub const TLB_WAYS: usize = 4;
    /// Default prefetch table size (stream/stride entries).
    pub const PREFETCH_TABLE_SIZE: usize = 16;
    /// Default prefetch degree (lines per trigger).
    pub const PREFETCH_DEGREE: usize = 1;
    /// Confidence threshold for stream/stride prefetchers to start firing.
    pub const CONFIDENCE_THRESHOLD: i8 = 2;
    /// Maximum confidence value stream/stride confidence saturates at.
    pub const CONFIDENCE_MAX: i8 = 3;
    /// Default core count for a multi-core run.
    pub const NUM_CORES: usize = 1;
}

/// Cache replacement policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReplacementPolicy {
    /// Least Recently Used: evict the line with the oldest access timestamp.
    #[default]
    #[serde(alias = "Lru")]
    Lru,
    /// Tree pseudo-LRU; requires power-of-two associativity.
    #[serde(alias = "Plru", alias = "TreePlru")]
    Plru,
    /// Uniformly random victim selection among valid lines.
    #[serde(alias = "Random")]
    Random,
    /// Static re-reference interval prediction (2-bit RRPV).
    #[serde(alias = "Srrip")]
    Srrip,
    /// Bimodal re-reference interval prediction.
    #[serde(alias = "Brrip")]
    Brrip,
}

/// Write policy for a cache level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WritePolicy {
    /// Writes are buffered and only flushed to the next level on eviction.
    #[default]
    WriteBack,
    /// The level never takes dirty lines (used for instruction caches).
    ReadOnly,
}

/// Hardware prefetcher selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PrefetcherKind {
    /// No prefetching.
    #[default]
    None,
    /// Fetches the next `degree` sequential lines after every miss.
    NextLine,
    /// Tracks ascending/descending streams per page.
    Stream,
    /// Tracks a per-PC stride.
    Stride,
    /// Stride first, falling back to stream when stride yields nothing.
    Adaptive,
    /// Alias for [`PrefetcherKind::Adaptive`].
    Intel,
}

/// Inter-level containment discipline for a [`CacheHierarchyConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum InclusionPolicy {
    /// A line present in Lk (k>1) is guaranteed to also be reachable in
    /// Lk-1's fill path; evicting it from the outer level back-invalidates
    /// the inner levels.
    #[default]
    Inclusive,
    /// A line lives in at most one level at a time for a given core.
    Exclusive,
    /// Non-inclusive, non-exclusive: no containment guarantee either way.
    Nine,
}

/// Geometry and policy for a single cache level.
///
/// Deserializing leaves any omitted field at its default; call
/// [`CacheConfig::validate`] before deriving offset/index/tag bit widths.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Total capacity in bytes.
    #[serde(default = "CacheConfig::default_size")]
    pub size_bytes: usize,
    /// Cache line size in bytes (power of two).
    #[serde(default = "CacheConfig::default_line")]
    pub line_bytes: usize,
    /// Associativity (number of ways per set).
    #[serde(default = "CacheConfig::default_ways")]
    pub ways: usize,
    /// Replacement policy.
    #[serde(default)]
    pub policy: ReplacementPolicy,
    /// Write-back vs read-only.
    #[serde(default)]
    pub write_policy: WritePolicy,
    /// Access latency in cycles.
    #[serde(default = "CacheConfig::default_latency")]
    pub latency: u64,
}

impl CacheConfig {
    fn default_size() -> usize {
        defaults::L1_SIZE
    }
    fn default_line() -> usize {
        defaults::LINE_BYTES
    }
    fn default_ways() -> usize {
        defaults::L1_WAYS
    }
    fn default_latency() -> u64 {
        defaults::L1_LATENCY
    }

    /// Builds an L1-shaped config with the given geometry.
    pub fn new(size_bytes: usize, ways: usize, line_bytes: usize, latency: u64) -> Self {
        Self {
            size_bytes,
            line_bytes,
            ways,
            policy: ReplacementPolicy::default(),
            write_policy: WritePolicy::default(),
            latency,
        }
    }

    /// A disabled/absent level (`size_bytes == 0`), used for an optional L3.
    pub fn absent() -> Self {
        Self {
            size_bytes: 0,
            line_bytes: defaults::LINE_BYTES,
            ways: 1,
            policy: ReplacementPolicy::default(),
            write_policy: WritePolicy::default(),
            latency: 0,
        }
    }

    /// `size_bytes == 0`, meaning this level does not exist (used for L3).
    pub fn is_absent(&self) -> bool {
        self.size_bytes == 0
    }

    /// `self.policy` with `replacement_policy` substituted.
    pub fn with_policy(mut self, policy: ReplacementPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the write policy.
    pub fn with_write_policy(mut self, write_policy: WritePolicy) -> Self {
        self.write_policy = write_policy;
        self
    }

    /// Validates geometry and derives `(num_sets, offset_bits, index_bits,
    /// tag_bits)`.
    ///
    /// Rejects: zero size, zero associativity, a line size that is not a
    /// power of two, a size that isn't an exact multiple of `line * ways`,
    /// a derived set count that is not a power of two, and (for
    /// [`ReplacementPolicy::Plru`]) an associativity that is not a power of
    /// two.
    pub fn validate(&self) -> Result<CacheGeometry, ConfigError> {
        if self.size_bytes == 0 {
            return Err(ConfigError::ZeroSize);
        }
        if self.ways == 0 {
            return Err(ConfigError::ZeroAssociativity);
        }
        if !self.line_bytes.is_power_of_two() {
            return Err(ConfigError::LineNotPowerOfTwo(self.line_bytes));
        }

        let set_bytes = self.line_bytes * self.ways;
        if self.size_bytes % set_bytes != 0 {
            return Err(ConfigError::SizeNotDivisible {
                size: self.size_bytes,
                line: self.line_bytes,
                ways: self.ways,
            });
        }

        let num_sets = self.size_bytes / set_bytes;
        if !num_sets.is_power_of_two() {
            return Err(ConfigError::SetsNotPowerOfTwo(num_sets));
        }

        if self.policy == ReplacementPolicy::Plru && !self.ways.is_power_of_two() {
            return Err(ConfigError::PlruRequiresPowerOfTwoWays(self.ways));
        }

        let offset_bits = crate::common::addr::log2_exact(self.line_bytes as u64);
        let index_bits = crate::common::addr::log2_exact(num_sets as u64);

        Ok(CacheGeometry {
            num_sets,
            offset_bits,
            index_bits,
            tag_bits: 64 - offset_bits - index_bits,
        })
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            size_bytes: defaults::L1_SIZE,
            line_bytes: defaults::LINE_BYTES,
            ways: defaults::L1_WAYS,
            policy: ReplacementPolicy::default(),
            write_policy: WritePolicy::default(),
            latency: defaults::L1_LATENCY,
        }
    }
}

/// Derived bit widths for a validated [`CacheConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheGeometry {
    /// `size_bytes / (line_bytes * ways)`.
    pub num_sets: usize,
    /// `log2(line_bytes)`.
    pub offset_bits: u32,
    /// `log2(num_sets)`.
    pub index_bits: u32,
    /// `64 - offset_bits - index_bits`.
    pub tag_bits: u32,
}

/// Stream/stride prefetcher tuning knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PrefetchConfig {
    /// Which prefetcher algorithm is active.
    #[serde(default)]
    pub kind: PrefetcherKind,
    /// Lines to prefetch per triggering miss.
    #[serde(default = "PrefetchConfig::default_degree")]
    pub degree: usize,
    /// Entries in the stream/stride pattern tables.
    #[serde(default = "PrefetchConfig::default_table_size")]
    pub table_size: usize,
    /// Confidence needed before a stream/stride entry starts firing.
    #[serde(default = "PrefetchConfig::default_confidence_threshold")]
    pub confidence_threshold: i8,
    /// Saturating maximum for a table entry's confidence counter.
    #[serde(default = "PrefetchConfig::default_confidence_max")]
    pub confidence_max: i8,
}

impl PrefetchConfig {
    fn default_degree() -> usize {
        defaults::PREFETCH_DEGREE
    }
    fn default_table_size() -> usize {
        defaults::PREFETCH_TABLE_SIZE
    }
    fn default_confidence_threshold() -> i8 {
        defaults::CONFIDENCE_THRESHOLD
    }
    fn default_confidence_max() -> i8 {
        defaults::CONFIDENCE_MAX
    }

    /// A `PrefetchConfig` for the given algorithm at the given degree, with
    /// every other knob at its default.
    pub fn new(kind: PrefetcherKind, degree: usize) -> Self {
        Self {
            kind,
            degree,
            ..Self::default()
        }
    }
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            kind: PrefetcherKind::default(),
            degree: defaults::PREFETCH_DEGREE,
            table_size: defaults::PREFETCH_TABLE_SIZE,
            confidence_threshold: defaults::CONFIDENCE_THRESHOLD,
            confidence_max: defaults::CONFIDENCE_MAX,
        }
    }
}

/// Per-level cycle costs used by [`crate::stats::TimingStats`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LatencyConfig {
    /// L1 (data or instruction) hit latency.
    #[serde(default = "LatencyConfig::default_l1")]
    pub l1_cycles: u64,
    /// L2 hit latency.
    #[serde(default = "LatencyConfig::default_l2")]
    pub l2_cycles: u64,
    /// L3 hit latency.
    #[serde(default = "LatencyConfig::default_l3")]
    pub l3_cycles: u64,
    /// Main-memory access latency.
    #[serde(default = "LatencyConfig::default_memory")]
    pub memory_cycles: u64,
    /// Additional penalty applied on a DTLB miss.
    #[serde(default = "LatencyConfig::default_tlb_miss")]
    pub tlb_miss_cycles: u64,
}

impl LatencyConfig {
    fn default_l1() -> u64 {
        defaults::L1_LATENCY
    }
    fn default_l2() -> u64 {
        defaults::L2_LATENCY
    }
    fn default_l3() -> u64 {
        defaults::L3_LATENCY
    }
    fn default_memory() -> u64 {
        defaults::MEMORY_LATENCY
    }
    fn default_tlb_miss() -> u64 {
        defaults::TLB_MISS_PENALTY
    }
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            l1_cycles: defaults::L1_LATENCY,
            l2_cycles: defaults::L2_LATENCY,
            l3_cycles: defaults::L3_LATENCY,
            memory_cycles: defaults::MEMORY_LATENCY,
            tlb_miss_cycles: defaults::TLB_MISS_PENALTY,
        }
    }
}

/// DTLB geometry, shared by every core.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TlbConfig {
    /// Number of sets.
    #[serde(default = "TlbConfig::default_sets")]
    pub num_sets: usize,
    /// Ways per set.
    #[serde(default = "TlbConfig::default_ways")]
    pub ways: usize,
}

impl TlbConfig {
    fn default_sets() -> usize {
        defaults::TLB_SETS
    }
    fn default_ways() -> usize {
        defaults::TLB_WAYS
    }
}

impl Default for TlbConfig {
    fn default() -> Self {
        Self {
            num_sets: defaults::TLB_SETS,
            ways: defaults::TLB_WAYS,
        }
    }
}

/// The full three-(or-four-)level cache hierarchy configuration.
///
/// `l3` is optional in the sense that [`CacheConfig::is_absent`] (i.e.
/// `size_bytes == 0`) means the hierarchy has no L3; in that case an L2
/// miss goes directly to memory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheHierarchyConfig {
    /// L1 data cache.
    pub l1d: CacheConfig,
    /// L1 instruction cache.
    pub l1i: CacheConfig,
    /// Unified L2, private per core in multi-core mode.
    pub l2: CacheConfig,
    /// Unified L3, shared across cores. `size_bytes == 0` means absent.
    #[serde(default = "CacheConfig::absent")]
    pub l3: CacheConfig,
    /// Containment discipline across levels.
    #[serde(default)]
    pub inclusion_policy: InclusionPolicy,
    /// Prefetcher configuration, applied per core.
    #[serde(default)]
    pub prefetch: PrefetchConfig,
    /// Per-level cycle costs.
    #[serde(default)]
    pub latency: LatencyConfig,
    /// DTLB geometry, one instance per core.
    #[serde(default)]
    pub tlb: TlbConfig,
    /// Number of cores for a multi-core run (`1` runs the single-core path).
    #[serde(default = "CacheHierarchyConfig::default_num_cores")]
    pub num_cores: usize,
}

impl CacheHierarchyConfig {
    fn default_num_cores() -> usize {
        defaults::NUM_CORES
    }
}

impl Default for CacheHierarchyConfig {
    fn default() -> Self {
        Self {
            l1d: CacheConfig::default(),
            l1i: CacheConfig::default().with_write_policy(WritePolicy::ReadOnly),
            l2: CacheConfig::new(
                defaults::L2_SIZE,
                defaults::L2_WAYS,
                defaults::LINE_BYTES,
                defaults::L2_LATENCY,
            ),
            l3: CacheConfig::new(
                defaults::L3_SIZE,
                defaults::L3_WAYS,
                defaults::LINE_BYTES,
                defaults::L3_LATENCY,
            ),
            inclusion_policy: InclusionPolicy::default(),
            prefetch: PrefetchConfig::default(),
            latency: LatencyConfig::default(),
            tlb: TlbConfig::default(),
            num_cores: defaults::NUM_CORES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let cfg = CacheHierarchyConfig::default();
        assert!(cfg.l1d.validate().is_ok());
        assert!(cfg.l1i.validate().is_ok());
        assert!(cfg.l2.validate().is_ok());
        assert!(cfg.l3.validate().is_ok());
    }

    #[test]
    fn zero_size_is_rejected() {
        let cfg = CacheConfig {
            size_bytes: 0,
            ..CacheConfig::default()
        };
        assert_eq!(cfg.validate().unwrap_err(), ConfigError::ZeroSize);
    }

    #[test]
    fn non_power_of_two_line_is_rejected() {
        let cfg = CacheConfig {
            line_bytes: 100,
            ..CacheConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::LineNotPowerOfTwo(100))
        ));
    }

    #[test]
    fn non_divisible_size_is_rejected() {
        let cfg = CacheConfig {
            size_bytes: 100,
            line_bytes: 64,
            ways: 3,
            ..CacheConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::SizeNotDivisible { .. })
        ));
    }

    #[test]
    fn educational_geometry_derives_expected_bits() {
        // 1 KiB, 2-way, 64 B lines -> 8 sets -> offset_bits=6, index_bits=3.
        let cfg = CacheConfig::new(1024, 2, 64, 1);
        let geom = cfg.validate().unwrap();
        assert_eq!(geom.num_sets, 8);
        assert_eq!(geom.offset_bits, 6);
        assert_eq!(geom.index_bits, 3);
        assert_eq!(geom.tag_bits, 55);
    }

    #[test]
    fn plru_requires_power_of_two_ways() {
        let cfg = CacheConfig {
            ways: 3,
            size_bytes: 3 * 64,
            line_bytes: 64,
            policy: ReplacementPolicy::Plru,
            ..CacheConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::PlruRequiresPowerOfTwoWays(3))
        ));
    }
}
