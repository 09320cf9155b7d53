//! Set-associative cache level.
//!
//! A [`CacheLevel`] is one level of the hierarchy (L1d, L1i, L2, or L3): a
//! fixed number of sets, each holding `ways` [`CacheLine`]s, with victim
//! selection delegated to a pluggable [`policies::ReplacementPolicy`].

/// Replacement policy implementations (LRU, PLRU, RANDOM, SRRIP, BRRIP).
pub mod policies;

use policies::{BrripPolicy, LruPolicy, PlruPolicy, RandomPolicy, ReplacementPolicy, SrripPolicy};

use crate::common::addr::{decompose, rebuild_address};
use crate::config::{CacheConfig, ReplacementPolicy as PolicyKind};

/// MESI coherence state of a cache line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoherenceState {
    /// Not resident / not valid.
    #[default]
    Invalid,
    /// Resident, clean, possibly shared with other cores.
    Shared,
    /// Resident, clean, held by exactly one core.
    Exclusive,
    /// Resident, dirty, held by exactly one core.
    Modified,
}

impl CoherenceState {
    /// Single-character rendering used by [`CacheLineSnapshot`].
    pub fn as_char(self) -> char {
        match self {
            CoherenceState::Invalid => 'I',
            CoherenceState::Shared => 'S',
            CoherenceState::Exclusive => 'E',
            CoherenceState::Modified => 'M',
        }
    }
}

/// One line's metadata: no data storage, only what a trace-driven simulator
/// needs to classify future accesses.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheLine {
    /// Whether this way currently holds a resident line.
    pub valid: bool,
    /// Tag bits identifying which line of the set this is.
    pub tag: u64,
    /// Set for a write that hasn't been written back yet.
    pub dirty: bool,
    /// Timestamp from [`CacheLevel`]'s monotonic access counter (LRU).
    pub lru_time: u64,
    /// 2-bit re-reference interval prediction value (SRRIP/BRRIP).
    pub rrip_value: u8,
    /// MESI state.
    pub coherence_state: CoherenceState,
}

impl CacheLine {
    fn invalidate(&mut self) {
        self.valid = false;
        self.dirty = false;
        self.coherence_state = CoherenceState::Invalid;
    }
}

/// Outcome of a [`CacheLevel::access`] or [`CacheLevel::install`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessResult {
    /// The line was already resident.
    Hit,
    /// The line was not resident and no valid line had to be evicted.
    Miss,
    /// The line was not resident and installing it evicted a valid line.
    MissWithEviction,
}

impl AccessResult {
    /// `true` for either miss variant.
    pub fn is_miss(self) -> bool {
        !matches!(self, AccessResult::Hit)
    }
}

/// Full detail of one [`CacheLevel::access`]/[`install`](CacheLevel::install)
/// call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessInfo {
    /// Hit/miss classification.
    pub result: AccessResult,
    /// Whether the evicted victim (if any) was dirty.
    pub was_dirty: bool,
    /// Line-aligned address of the evicted victim, if there was one.
    pub evicted_address: Option<u64>,
    /// Whether an eviction occurred at all (a valid line was replaced).
    pub had_eviction: bool,
}

/// Hit/miss/writeback/invalidation counters for one [`CacheLevel`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Demand accesses that found the line resident.
    pub hits: u64,
    /// Demand accesses that did not find the line resident.
    pub misses: u64,
    /// Dirty lines evicted and written back to the next level.
    pub writebacks: u64,
    /// Lines explicitly invalidated (coherence or inclusion cascade).
    pub invalidations: u64,
    /// Misses to a line never previously resident in this level.
    pub compulsory_misses: u64,
    /// Misses caused by insufficient capacity (set had no free way and the
    /// evicted line had been touched before).
    pub capacity_misses: u64,
    /// Misses caused purely by associativity conflicts in the same set.
    pub conflict_misses: u64,
}

impl CacheStats {
    /// `hits / (hits + misses)`, `0.0` with no accesses.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Snapshot of one way of one set, for post-run reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLineSnapshot {
    /// Set index.
    pub set: usize,
    /// Way index within the set.
    pub way: usize,
    /// Validity bit.
    pub valid: bool,
    /// Tag bits.
    pub tag: u64,
    /// MESI state as a single character (`I`/`S`/`E`/`M`).
    pub coherence_char: char,
    /// Dirty bit.
    pub dirty: bool,
}

struct CacheSet {
    lines: Vec<CacheLine>,
}

/// One level of the cache hierarchy.
pub struct CacheLevel {
    config: CacheConfig,
    num_sets: usize,
    offset_bits: u32,
    index_bits: u32,
    sets: Vec<CacheSet>,
    policy: Box<dyn ReplacementPolicy>,
    access_time: u64,
    stats: CacheStats,
    ever_resident: std::collections::HashSet<u64>,
}

impl CacheLevel {
    /// Builds a cache level from a validated config.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::common::error::ConfigError`] from
    /// [`CacheConfig::validate`].
    pub fn new(config: CacheConfig) -> Result<Self, crate::common::error::ConfigError> {
        let geometry = config.validate()?;
        let policy: Box<dyn ReplacementPolicy> = match config.policy {
            PolicyKind::Lru => Box::new(LruPolicy::new(geometry.num_sets, config.ways)),
            PolicyKind::Plru => Box::new(PlruPolicy::new(geometry.num_sets, config.ways)),
            PolicyKind::Random => Box::new(RandomPolicy::new(geometry.num_sets, config.ways)),
            PolicyKind::Srrip => Box::new(SrripPolicy::new(geometry.num_sets, config.ways)),
            PolicyKind::Brrip => Box::new(BrripPolicy::new(geometry.num_sets, config.ways)),
        };

        let sets = (0..geometry.num_sets)
            .map(|_| CacheSet {
                lines: vec![CacheLine::default(); config.ways],
            })
            .collect();

        Ok(Self {
            config,
            num_sets: geometry.num_sets,
            offset_bits: geometry.offset_bits,
            index_bits: geometry.index_bits,
            sets,
            policy,
            access_time: 0,
            stats: CacheStats::default(),
            ever_resident: std::collections::HashSet::new(),
        })
    }

    #[inline]
    fn decompose(&self, addr: u64) -> (usize, u64) {
        let d = decompose(addr, self.offset_bits, self.index_bits);
        (d.index as usize, d.tag)
    }

    fn find_way(&self, set_idx: usize, tag: u64) -> Option<usize> {
        self.sets[set_idx]
            .lines
            .iter()
            .position(|l| l.valid && l.tag == tag)
    }

    /// Picks a victim way: the smallest-index invalid line if any exists,
    /// otherwise delegates to the policy.
    fn select_victim(&mut self, set_idx: usize) -> usize {
        let set = &mut self.sets[set_idx];
        if let Some(way) = set.lines.iter().position(|l| !l.valid) {
            return way;
        }
        self.policy.select_victim(set_idx, &mut set.lines)
    }

    fn classify_miss(&mut self, addr: u64, had_eviction: bool) -> (u64, u64, u64) {
        let line_addr = crate::common::addr::line_align(addr, 1u64 << self.offset_bits);
        let first_time = self.ever_resident.insert(line_addr);
        if first_time {
            (1, 0, 0)
        } else if had_eviction {
            (0, 1, 0)
        } else {
            (0, 0, 1)
        }
    }

    fn do_install(&mut self, addr: u64, tag: u64, set_idx: usize, dirty: bool, state: CoherenceState) -> AccessInfo {
        self.access_time += 1;
        let clock = self.access_time;
        let way = self.select_victim(set_idx);

        let victim_was_valid = self.sets[set_idx].lines[way].valid;
        let victim_was_dirty = victim_was_valid && self.sets[set_idx].lines[way].dirty;
        let evicted_address = if victim_was_valid {
            let victim_tag = self.sets[set_idx].lines[way].tag;
            Some(rebuild_address(
                victim_tag,
                set_idx as u64,
                self.offset_bits,
                self.index_bits,
            ))
        } else {
            None
        };

        if victim_was_dirty {
            self.stats.writebacks += 1;
        }

        self.sets[set_idx].lines[way] = CacheLine {
            valid: true,
            tag,
            dirty,
            lru_time: clock,
            rrip_value: 0,
            coherence_state: state,
        };
        self.policy
            .on_access(set_idx, way, &mut self.sets[set_idx].lines, clock, true);

        let (compulsory, capacity, conflict) = self.classify_miss(addr, victim_was_valid);
        self.stats.compulsory_misses += compulsory;
        self.stats.capacity_misses += capacity;
        self.stats.conflict_misses += conflict;

        AccessInfo {
            result: if victim_was_valid {
                AccessResult::MissWithEviction
            } else {
                AccessResult::Miss
            },
            was_dirty: victim_was_dirty,
            evicted_address,
            had_eviction: victim_was_valid,
        }
    }

    /// Demand access. Bumps `stats.hits`/`stats.misses`; on a miss, installs
    /// the line with `dirty = is_write`.
    pub fn access(&mut self, addr: u64, is_write: bool) -> AccessInfo {
        let (set_idx, tag) = self.decompose(addr);

        if let Some(way) = self.find_way(set_idx, tag) {
            self.access_time += 1;
            let clock = self.access_time;
            self.stats.hits += 1;
            if is_write {
                self.sets[set_idx].lines[way].dirty = true;
            }
            self.policy
                .on_access(set_idx, way, &mut self.sets[set_idx].lines, clock, false);
            return AccessInfo {
                result: AccessResult::Hit,
                was_dirty: self.sets[set_idx].lines[way].dirty,
                evicted_address: None,
                had_eviction: false,
            };
        }

        self.stats.misses += 1;
        let state = if is_write {
            CoherenceState::Modified
        } else {
            CoherenceState::Exclusive
        };
        self.do_install(addr, tag, set_idx, is_write, state)
    }

    /// Fills a line without counting it as a demand access; if the line is
    /// already present its dirty bit is OR'd with `is_dirty` and replacement
    /// state refreshed. Used on the way back up an inclusion cascade.
    pub fn install(&mut self, addr: u64, is_dirty: bool) -> AccessInfo {
        self.install_with_state(
            addr,
            is_dirty,
            if is_dirty {
                CoherenceState::Modified
            } else {
                CoherenceState::Exclusive
            },
        )
    }

    /// Like [`install`](Self::install) but with an explicit MESI state,
    /// used by the coherence-aware multi-core path on a fill.
    pub fn install_with_state(&mut self, addr: u64, is_dirty: bool, state: CoherenceState) -> AccessInfo {
        let (set_idx, tag) = self.decompose(addr);

        if let Some(way) = self.find_way(set_idx, tag) {
            self.access_time += 1;
            let clock = self.access_time;
            self.sets[set_idx].lines[way].dirty |= is_dirty;
            self.sets[set_idx].lines[way].coherence_state = state;
            self.policy
                .on_access(set_idx, way, &mut self.sets[set_idx].lines, clock, true);
            return AccessInfo {
                result: AccessResult::Hit,
                was_dirty: self.sets[set_idx].lines[way].dirty,
                evicted_address: None,
                had_eviction: false,
            };
        }

        self.do_install(addr, tag, set_idx, is_dirty, state)
    }

    /// Clears validity/dirty/state for `addr`'s line if resident; bumps
    /// `stats.invalidations` only when a matching valid line existed.
    pub fn invalidate(&mut self, addr: u64) {
        let (set_idx, tag) = self.decompose(addr);
        if let Some(way) = self.find_way(set_idx, tag) {
            self.sets[set_idx].lines[way].invalidate();
            self.stats.invalidations += 1;
        }
    }

    /// Whether `addr`'s line is currently resident.
    pub fn is_present(&self, addr: u64) -> bool {
        let (set_idx, tag) = self.decompose(addr);
        self.find_way(set_idx, tag).is_some()
    }

    /// Whether `addr`'s line is resident and dirty.
    pub fn is_dirty(&self, addr: u64) -> bool {
        let (set_idx, tag) = self.decompose(addr);
        self.find_way(set_idx, tag)
            .map(|way| self.sets[set_idx].lines[way].dirty)
            .unwrap_or(false)
    }

    /// Idempotent MESI state set on a resident line; a no-op if `addr` is
    /// not present.
    pub fn set_coherence_state(&mut self, addr: u64, state: CoherenceState) {
        let (set_idx, tag) = self.decompose(addr);
        if let Some(way) = self.find_way(set_idx, tag) {
            self.sets[set_idx].lines[way].coherence_state = state;
        }
    }

    /// If `addr`'s line is Modified, clears its dirty bit (the caller is
    /// responsible for the logical write-back) and sets state Shared.
    pub fn downgrade_to_shared(&mut self, addr: u64) {
        let (set_idx, tag) = self.decompose(addr);
        if let Some(way) = self.find_way(set_idx, tag) {
            let line = &mut self.sets[set_idx].lines[way];
            if line.coherence_state == CoherenceState::Modified {
                line.dirty = false;
            }
            line.coherence_state = CoherenceState::Shared;
        }
    }

    /// Accumulated stats for this level.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Validated geometry: `(num_sets, ways)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.num_sets, self.config.ways)
    }

    /// `true` when this level has zero capacity (absent, e.g. no L3).
    pub fn is_absent(&self) -> bool {
        self.config.is_absent()
    }

    /// Yields a snapshot of every `(set, way)` slot in the level.
    pub fn get_sets(&self) -> impl Iterator<Item = CacheLineSnapshot> + '_ {
        self.sets.iter().enumerate().flat_map(|(set_idx, set)| {
            set.lines.iter().enumerate().map(move |(way, line)| CacheLineSnapshot {
                set: set_idx,
                way,
                valid: line.valid,
                tag: line.tag,
                coherence_char: line.coherence_state.as_char(),
                dirty: line.dirty,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    fn educational_l1() -> CacheLevel {
        // 1 KiB, 2-way, 64 B lines -> 8 sets.
        CacheLevel::new(CacheConfig::new(1024, 2, 64, 1)).unwrap()
    }

    #[test]
    fn first_access_misses_repeat_hits() {
        let mut l1 = educational_l1();
        assert_eq!(l1.access(0x1000, false).result, AccessResult::Miss);
        for _ in 0..9 {
            assert_eq!(l1.access(0x1000, false).result, AccessResult::Hit);
        }
        assert_eq!(l1.stats().hits, 9);
        assert_eq!(l1.stats().misses, 1);
    }

    #[test]
    fn install_then_present_invalidate_then_absent() {
        let mut l1 = educational_l1();
        l1.access(0x2000, false);
        assert!(l1.is_present(0x2000));
        l1.invalidate(0x2000);
        assert!(!l1.is_present(0x2000));
        assert_eq!(l1.stats().invalidations, 1);
    }

    #[test]
    fn dirty_tracks_last_write() {
        let mut l1 = educational_l1();
        l1.access(0x3000, false);
        assert!(!l1.is_dirty(0x3000));
        l1.access(0x3000, true);
        assert!(l1.is_dirty(0x3000));
    }

    #[test]
    fn eviction_reports_round_trip_address() {
        let mut l1 = educational_l1();
        // Same set (index bits from addr), two different tags fill a 2-way set.
        l1.access(0x0000, false);
        l1.access(0x2000, false);
        let info = l1.access(0x4000, false); // third distinct line, same set, evicts one
        assert!(info.had_eviction);
        assert!(info.evicted_address.is_some());
    }

    #[test]
    fn accessing_n_distinct_lines_beyond_associativity_evicts_lru() {
        let mut l1 = educational_l1();
        // set index comes from bits [8:6); choose addresses that map to set 0.
        let base = 0u64;
        let stride = 1u64 << (6 + 3); // skip index+offset bits entirely -> same set 0
        l1.access(base, false);
        l1.access(base + stride, false);
        // A third distinct line in the same set evicts the first (LRU).
        l1.access(base + 2 * stride, false);
        assert!(!l1.is_present(base));
        assert!(l1.is_present(base + stride));
        assert!(l1.is_present(base + 2 * stride));
    }
}
