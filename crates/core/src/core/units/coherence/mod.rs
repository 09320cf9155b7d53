//! MESI coherence bookkeeping and false-sharing detection.
//!
//! [`CoherenceController`] does not own any cache line data itself — only
//! the `sharers`/`owner` maps used to decide who to snoop and invalidate.
//! The actual MESI state transitions on a line live on the owning core's
//! [`crate::core::units::cache::CacheLevel`]; the multi-core system drives
//! both together.

use std::collections::{HashMap, HashSet};

/// One observed access to a line, used to detect false sharing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FalseSharingEvent {
    /// Thread that made the access.
    pub thread_id: u32,
    /// Byte offset within the line.
    pub byte_offset: u64,
    /// Whether the access was a write.
    pub is_write: bool,
    /// Source file, if known.
    pub file: String,
    /// Source line number, if known.
    pub line: u32,
}

/// Per-core identifier used by the coherence maps.
pub type CoreId = usize;

/// Sharer/owner bookkeeping plus the false-sharing tracker, keyed by
/// line-aligned address.
#[derive(Default)]
pub struct CoherenceController {
    sharers: HashMap<u64, HashSet<CoreId>>,
    owner: HashMap<u64, CoreId>,
    line_accesses: HashMap<u64, Vec<FalseSharingEvent>>,
    false_sharing_lines: HashSet<u64>,
    coherence_invalidations: u64,
}

impl CoherenceController {
    /// Creates an empty controller.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cores that currently hold a valid copy of `line_addr`, per the
    /// sharer map (not a live query of any cache).
    pub fn sharers(&self, line_addr: u64) -> HashSet<CoreId> {
        self.sharers.get(&line_addr).cloned().unwrap_or_default()
    }

    /// The core holding the line Modified/Exclusive, if any.
    pub fn owner(&self, line_addr: u64) -> Option<CoreId> {
        self.owner.get(&line_addr).copied()
    }

    /// Records that `core` now holds a clean, possibly-shared copy.
    pub fn note_shared(&mut self, core: CoreId, line_addr: u64) {
        let _ = self.sharers.entry(line_addr).or_default().insert(core);
    }

    /// Records that `core` now holds the line Modified or Exclusive,
    /// replacing any previous sharer set.
    pub fn note_exclusive(&mut self, core: CoreId, line_addr: u64) {
        let mut set = HashSet::new();
        let _ = set.insert(core);
        let _ = self.sharers.insert(line_addr, set);
        let _ = self.owner.insert(line_addr, core);
    }

    /// Removes `core` from the sharer/owner bookkeeping for `line_addr`,
    /// e.g. on an L1 eviction.
    pub fn remove_core(&mut self, core: CoreId, line_addr: u64) {
        if let Some(set) = self.sharers.get_mut(&line_addr) {
            let _ = set.remove(&core);
            if set.is_empty() {
                let _ = self.sharers.remove(&line_addr);
            }
        }
        if self.owner.get(&line_addr) == Some(&core) {
            let _ = self.owner.remove(&line_addr);
        }
    }

    /// Clears every sharer of `line_addr` (used when a write invalidates
    /// every peer copy before taking ownership).
    pub fn invalidate_all(&mut self, line_addr: u64) {
        let _ = self.sharers.remove(&line_addr);
        let _ = self.owner.remove(&line_addr);
    }

    /// Clears only the owner designation for `line_addr`, keeping the
    /// sharer set intact. Used when a Modified/Exclusive holder is read by
    /// a peer and downgrades to Shared: nobody owns it exclusively anymore,
    /// but the sharer set (now including the reader) is still accurate.
    pub fn clear_owner(&mut self, line_addr: u64) {
        let _ = self.owner.remove(&line_addr);
    }

    /// Increments the monotonic invalidation counter by `count`.
    pub fn record_invalidations(&mut self, count: u64) {
        self.coherence_invalidations += count;
    }

    /// Total coherence-driven invalidations observed so far.
    pub fn coherence_invalidations(&self) -> u64 {
        self.coherence_invalidations
    }

    /// Records one access for false-sharing detection; returns `true` the
    /// first time this call causes `line_addr` to newly qualify (≥2
    /// distinct threads, ≥2 distinct byte offsets, ≥1 write).
    pub fn record_access(&mut self, line_addr: u64, event: FalseSharingEvent) -> bool {
        let events = self.line_accesses.entry(line_addr).or_default();
        events.push(event);

        if self.false_sharing_lines.contains(&line_addr) {
            return false;
        }

        let threads: HashSet<u32> = events.iter().map(|e| e.thread_id).collect();
        let offsets: HashSet<u64> = events.iter().map(|e| e.byte_offset).collect();
        let has_write = events.iter().any(|e| e.is_write);

        if threads.len() >= 2 && offsets.len() >= 2 && has_write {
            let _ = self.false_sharing_lines.insert(line_addr);
            true
        } else {
            false
        }
    }

    /// Number of distinct lines ever flagged as false-sharing (not event
    /// count).
    pub fn false_sharing_count(&self) -> u64 {
        self.false_sharing_lines.len() as u64
    }

    /// Every line ever flagged as false-sharing, together with its full
    /// access history, for reporting.
    pub fn false_sharing_report(&self) -> Vec<(u64, Vec<FalseSharingEvent>)> {
        let mut lines: Vec<u64> = self.false_sharing_lines.iter().copied().collect();
        lines.sort_unstable();
        lines
            .into_iter()
            .map(|addr| (addr, self.line_accesses.get(&addr).cloned().unwrap_or_default()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(thread_id: u32, byte_offset: u64, is_write: bool) -> FalseSharingEvent {
        FalseSharingEvent {
            thread_id,
            byte_offset,
            is_write,
            file: "a.c".to_string(),
            line: 1,
        }
    }

    #[test]
    fn two_threads_two_offsets_one_write_flags_false_sharing() {
        let mut c = CoherenceController::new();
        assert!(!c.record_access(0x1000, event(1, 0, false)));
        assert!(!c.record_access(0x1000, event(2, 32, false)));
        assert!(c.record_access(0x1000, event(1, 0, true)));
        assert_eq!(c.false_sharing_count(), 1);
    }

    #[test]
    fn repeat_accesses_do_not_double_count() {
        let mut c = CoherenceController::new();
        let _ = c.record_access(0x1000, event(1, 0, true));
        let _ = c.record_access(0x1000, event(2, 32, true));
        assert_eq!(c.false_sharing_count(), 1);
        for _ in 0..5 {
            let _ = c.record_access(0x1000, event(1, 0, true));
        }
        assert_eq!(c.false_sharing_count(), 1);
    }

    #[test]
    fn reads_only_never_flag() {
        let mut c = CoherenceController::new();
        let _ = c.record_access(0x1000, event(1, 0, false));
        let _ = c.record_access(0x1000, event(2, 32, false));
        assert_eq!(c.false_sharing_count(), 0);
    }

    #[test]
    fn exclusive_then_shared_then_eviction() {
        let mut c = CoherenceController::new();
        c.note_exclusive(0, 0x2000);
        assert_eq!(c.owner(0x2000), Some(0));
        c.note_shared(1, 0x2000);
        assert_eq!(c.sharers(0x2000).len(), 2);
        c.remove_core(0, 0x2000);
        assert_eq!(c.owner(0x2000), None);
        assert_eq!(c.sharers(0x2000).len(), 1);
    }
}
