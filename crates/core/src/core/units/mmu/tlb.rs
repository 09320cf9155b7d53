//! Data Translation Lookaside Buffer.
//!
//! A small set-associative page translator. The simulator does
//! not model page tables or multi-level translation; a TLB miss simply
//! records a stats event and "installs" the page, standing in for a walk
//! that would otherwise take many cycles.

/// Page granularity assumed by every [`Tlb`] (4 KiB).
pub const PAGE_SIZE: u64 = 4096;

/// `log2(PAGE_SIZE)`.
const PAGE_SHIFT: u32 = 12;

#[derive(Clone, Copy, Default)]
struct TlbLine {
    valid: bool,
    page: u64,
    lru_time: u64,
}

/// One set of `ways` TLB lines, indexed by `page % num_sets`.
#[derive(Clone)]
struct TlbSet {
    lines: Vec<TlbLine>,
}

impl TlbSet {
    fn new(ways: usize) -> Self {
        Self {
            lines: vec![TlbLine::default(); ways],
        }
    }
}

/// Hit/miss counters for a [`Tlb`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TlbStats {
    /// Number of lookups that found the page already resident.
    pub hits: u64,
    /// Number of lookups that required an install.
    pub misses: u64,
}

impl TlbStats {
    /// Hit rate in `[0.0, 1.0]`; `0.0` when there have been no accesses.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A small set-associative translation buffer, keyed by virtual page number.
pub struct Tlb {
    sets: Vec<TlbSet>,
    ways: usize,
    num_sets: u64,
    clock: u64,
    stats: TlbStats,
}

impl Tlb {
    /// Creates a TLB with `num_sets` sets of `ways` entries each.
    ///
    /// `num_sets` is rounded up to the next power of two; a non-power-of-two
    /// set count would make `page % num_sets` biased toward low addresses.
    pub fn new(num_sets: usize, ways: usize) -> Self {
        let num_sets = num_sets.max(1).next_power_of_two();
        let ways = ways.max(1);
        Self {
            sets: vec![TlbSet::new(ways); num_sets],
            ways,
            num_sets: num_sets as u64,
            clock: 0,
            stats: TlbStats::default(),
        }
    }

    #[inline(always)]
    fn page_of(addr: u64) -> u64 {
        addr >> PAGE_SHIFT
    }

    /// Looks up the page containing `addr`, installing it on a miss.
    ///
    /// Returns `true` on hit, `false` on miss (after the install).
    pub fn access(&mut self, addr: u64) -> bool {
        let page = Self::page_of(addr);
        let set_idx = (page % self.num_sets) as usize;
        self.clock += 1;
        let now = self.clock;
        let set = &mut self.sets[set_idx];

        if let Some(line) = set.lines.iter_mut().find(|l| l.valid && l.page == page) {
            line.lru_time = now;
            self.stats.hits += 1;
            return true;
        }

        self.stats.misses += 1;
        let victim_way = set
            .lines
            .iter()
            .enumerate()
            .min_by_key(|(way, l)| (l.valid, if l.valid { l.lru_time } else { 0 }, *way))
            .map_or(0, |(way, _)| way);
        let victim = &mut set.lines[victim_way];
        victim.valid = true;
        victim.page = page;
        victim.lru_time = now;
        false
    }

    /// Returns `true` if the page containing `addr` is currently resident,
    /// without affecting LRU order or stats.
    pub fn contains(&self, addr: u64) -> bool {
        let page = Self::page_of(addr);
        let set_idx = (page % self.num_sets) as usize;
        self.sets[set_idx]
            .lines
            .iter()
            .any(|l| l.valid && l.page == page)
    }

    /// Current hit/miss counters.
    pub fn stats(&self) -> TlbStats {
        self.stats
    }

    /// Invalidates every entry and resets counters.
    pub fn flush(&mut self) {
        for set in &mut self.sets {
            for line in &mut set.lines {
                line.valid = false;
            }
        }
        self.stats = TlbStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_access_to_same_page_hits() {
        let mut tlb = Tlb::new(4, 2);
        assert!(!tlb.access(0x1000));
        assert!(tlb.access(0x1000));
        assert!(tlb.access(0x1400)); // same page, different offset
        assert_eq!(tlb.stats().hits, 2);
        assert_eq!(tlb.stats().misses, 1);
    }

    #[test]
    fn distinct_pages_in_same_set_evict_lru() {
        let mut tlb = Tlb::new(1, 2);
        tlb.access(0x0000); // page 0
        tlb.access(0x1000); // page 1, same single set
        assert!(tlb.access(0x0000));
        assert!(tlb.access(0x1000));
        // third distinct page evicts page 0 (least recently used)
        tlb.access(0x2000);
        assert!(!tlb.contains(0x0000));
        assert!(tlb.contains(0x1000));
        assert!(tlb.contains(0x2000));
    }

    #[test]
    fn flush_clears_residency_and_stats() {
        let mut tlb = Tlb::new(2, 2);
        tlb.access(0x1000);
        tlb.flush();
        assert!(!tlb.contains(0x1000));
        assert_eq!(tlb.stats(), TlbStats::default());
    }
}
