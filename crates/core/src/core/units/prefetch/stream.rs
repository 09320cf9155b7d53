//! Stream prefetcher.
//!
//! Tracks one ascending/descending stream per page in a small direct-mapped
//! table. A stream's confidence climbs while consecutive misses
//! land exactly one line apart in the same direction, and decays (without
//! resetting direction) for near misses within 4 lines; anything further
//! away reallocates the slot to the new page.

use super::{PrefetchStats, Prefetcher};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    None,
    Ascending,
    Descending,
}

#[derive(Clone, Copy)]
struct StreamEntry {
    valid: bool,
    page: u64,
    last_addr: u64,
    direction: Direction,
    confidence: i8,
}

impl Default for StreamEntry {
    fn default() -> Self {
        Self {
            valid: false,
            page: 0,
            last_addr: 0,
            direction: Direction::None,
            confidence: 0,
        }
    }
}

/// Per-page ascending/descending stream detector.
pub struct StreamPrefetcher {
    table: Vec<StreamEntry>,
    line_bytes: u64,
    degree: usize,
    confidence_threshold: i8,
    confidence_max: i8,
    stats: PrefetchStats,
}

const PAGE_SIZE: u64 = 4096;

impl StreamPrefetcher {
    /// Creates a stream prefetcher with `table_size` page-tracking slots.
    pub fn new(
        line_bytes: usize,
        degree: usize,
        table_size: usize,
        confidence_threshold: i8,
        confidence_max: i8,
    ) -> Self {
        Self {
            table: vec![StreamEntry::default(); table_size.max(1)],
            line_bytes: line_bytes as u64,
            degree: degree.max(1),
            confidence_threshold,
            confidence_max,
            stats: PrefetchStats::default(),
        }
    }
}

impl Prefetcher for StreamPrefetcher {
    fn on_miss(&mut self, addr: u64, _pc: u64) -> Vec<u64> {
        let page = addr / PAGE_SIZE;
        let idx = (page as usize) % self.table.len();
        let line_sz = self.line_bytes as i64;

        {
            let entry = &mut self.table[idx];
            if entry.valid && entry.page == page {
                let diff = addr as i64 - entry.last_addr as i64;
                if diff == line_sz && entry.direction != Direction::Descending {
                    entry.direction = Direction::Ascending;
                    entry.confidence = (entry.confidence + 1).min(self.confidence_max);
                } else if diff == -line_sz && entry.direction != Direction::Ascending {
                    entry.direction = Direction::Descending;
                    entry.confidence = (entry.confidence + 1).min(self.confidence_max);
                } else if diff.abs() <= 4 * line_sz {
                    entry.confidence = (entry.confidence - 1).max(0);
                } else {
                    *entry = StreamEntry {
                        valid: true,
                        page,
                        last_addr: addr,
                        direction: Direction::None,
                        confidence: 1,
                    };
                }
            } else {
                *entry = StreamEntry {
                    valid: true,
                    page,
                    last_addr: addr,
                    direction: Direction::None,
                    confidence: 1,
                };
            }
            entry.last_addr = addr;
        }

        let entry = self.table[idx];
        let mut targets = Vec::new();
        if entry.confidence >= self.confidence_threshold && entry.direction != Direction::None {
            for k in 1..=self.degree as i64 {
                let offset = match entry.direction {
                    Direction::Ascending => k * line_sz,
                    Direction::Descending => -k * line_sz,
                    Direction::None => unreachable!(),
                };
                let target = (addr as i64 + offset) as u64;
                if target / PAGE_SIZE != page {
                    break;
                }
                targets.push(target & !(self.line_bytes - 1));
            }
        }

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
    fn ascending_stream_builds_confidence_then_fires() {
        let mut p = StreamPrefetcher::new(64, 2, 16, 2, 3);
        assert!(p.on_miss(0x1000, 0).is_empty());
        assert!(p.on_miss(0x1040, 0).is_empty());
        let fired = p.on_miss(0x1080, 0);
        assert_eq!(fired, vec![0x10C0, 0x1100]);
    }

    #[test]
    fn unrelated_jump_resets_the_slot() {
        let mut p = StreamPrefetcher::new(64, 1, 16, 2, 3);
        p.on_miss(0x1000, 0);
        p.on_miss(0x1040, 0);
        let fired = p.on_miss(0x9000, 0);
        assert!(fired.is_empty());
    }
}
