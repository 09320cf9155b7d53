//! Stride prefetcher.
//!
//! A direct-mapped reference-prediction table keyed by instruction address
//! (PC): each entry tracks the last line address and detected stride for
//! that PC. A stride is trusted once its confidence reaches the threshold;
//! a mismatch decays confidence and, once exhausted, the stride resets to
//! the new delta.

use super::{PrefetchStats, Prefetcher};

#[derive(Clone, Copy, Default)]
struct StrideEntry {
    valid: bool,
    last_line_addr: u64,
    stride: i64,
    confidence: i8,
}

/// Per-PC constant-stride detector.
pub struct StridePrefetcher {
    table: Vec<StrideEntry>,
    line_bytes: u64,
    degree: usize,
    confidence_threshold: i8,
    confidence_max: i8,
    stats: PrefetchStats,
}

impl StridePrefetcher {
    /// Creates a stride prefetcher with `table_size` PC-indexed slots
    /// (rounded up to a power of two).
    pub fn new(
        line_bytes: usize,
        degree: usize,
        table_size: usize,
        confidence_threshold: i8,
        confidence_max: i8,
    ) -> Self {
        let size = table_size.max(1).next_power_of_two();
        Self {
            table: vec![StrideEntry::default(); size],
            line_bytes: line_bytes as u64,
            degree: degree.max(1),
            confidence_threshold,
            confidence_max,
            stats: PrefetchStats::default(),
        }
    }

    fn index(&self, pc: u64) -> usize {
        (pc as usize) & (self.table.len() - 1)
    }
}

impl Prefetcher for StridePrefetcher {
    fn on_miss(&mut self, addr: u64, pc: u64) -> Vec<u64> {
        let line_addr = addr & !(self.line_bytes - 1);
        let idx = self.index(pc);
        let entry = &mut self.table[idx];

        let mut targets = Vec::new();

        if !entry.valid {
            entry.valid = true;
            entry.last_line_addr = line_addr;
            entry.stride = 0;
            entry.confidence = 0;
            return targets;
        }

        let observed = line_addr as i64 - entry.last_line_addr as i64;

        if entry.stride == 0 {
            entry.stride = observed;
            entry.confidence = 1;
        } else if observed == entry.stride {
            entry.confidence = (entry.confidence + 1).min(self.confidence_max);
        } else {
            entry.confidence -= 1;
            if entry.confidence <= 0 {
                entry.stride = observed;
                entry.confidence = 0;
            }
        }

        if entry.confidence >= self.confidence_threshold && entry.stride != 0 {
            for k in 1..=self.degree as i64 {
                let target = (line_addr as i64 + entry.stride * k) as u64;
                targets.push(target & !(self.line_bytes - 1));
            }
        }

        entry.last_line_addr = line_addr;
        self.stats.issued += targets.len() as u64;
        targets
    }

    fn stats(&self) -> PrefetchStats {
        self.stats
    }

    fn record_useful(&mut self) {
        self.stats.useful += 1;
    }

    fn record_useless(&mut self) {
        self.stats.useless += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirms_stride_on_third_miss_then_fires() {
        let mut p = StridePrefetcher::new(64, 2, 16, 2, 3);
        assert!(p.on_miss(0x1000, 0x40).is_empty()); // establishes baseline
        assert!(p.on_miss(0x1080, 0x40).is_empty()); // stride=0x80, confidence=1
        let fired = p.on_miss(0x1100, 0x40); // confidence=2 >= threshold
        assert_eq!(fired, vec![0x1180, 0x1200]);
    }

    #[test]
    fn distinct_pcs_track_independent_strides() {
        let mut p = StridePrefetcher::new(64, 1, 16, 2, 3);
        p.on_miss(0x1000, 0x10);
        p.on_miss(0x2000, 0x20);
        // First PC's second access still establishes its own stride cleanly.
        p.on_miss(0x1080, 0x10);
        assert!(p.on_miss(0x2040, 0x20).is_empty());
    }

    #[test]
    fn zero_stride_never_fires() {
        let mut p = StridePrefetcher::new(64, 1, 16, 2, 3);
        p.on_miss(0x1000, 0x10);
        for _ in 0..5 {
            assert!(p.on_miss(0x1000, 0x10).is_empty());
        }
    }
}
