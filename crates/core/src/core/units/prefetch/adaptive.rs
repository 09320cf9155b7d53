//! Adaptive prefetcher.
//!
//! Tries the stride detector first; only when it yields nothing does the
//! stream detector get a chance. `INTEL` is an alias for this strategy
//! there is no separate adjacent-line variant.

use super::{PrefetchStats, Prefetcher, StreamPrefetcher, StridePrefetcher};

/// Stride-first, stream-fallback composite prefetcher.
pub struct AdaptivePrefetcher {
    stride: StridePrefetcher,
    stream: StreamPrefetcher,
}

impl AdaptivePrefetcher {
    /// Builds the stride and stream sub-detectors with shared tuning.
    pub fn new(
        line_bytes: usize,
        degree: usize,
        table_size: usize,
        confidence_threshold: i8,
        confidence_max: i8,
    ) -> Self {
        Self {
            stride: StridePrefetcher::new(line_bytes, degree, table_size, confidence_threshold, confidence_max),
            stream: StreamPrefetcher::new(line_bytes, degree, table_size, confidence_threshold, confidence_max),
        }
    }
}

impl Prefetcher for AdaptivePrefetcher {
    fn on_miss(&mut self, addr: u64, pc: u64) -> Vec<u64> {
        let from_stride = self.stride.on_miss(addr, pc);
        if !from_stride.is_empty() {
            return from_stride;
        }
        self.stream.on_miss(addr, pc)
    }

    fn stats(&self) -> PrefetchStats {
        let s = self.stride.stats();
        let r = self.stream.stats();
        PrefetchStats {
            issued: s.issued + r.issued,
            useful: s.useful + r.useful,
            useless: s.useless + r.useless,
        }
    }

    fn record_useful(&mut self) {
        self.stride.record_useful();
    }

    fn record_useless(&mut self) {
        self.stride.record_useless();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_stream_when_stride_is_silent() {
        let mut p = AdaptivePrefetcher::new(64, 1, 16, 2, 3);
        // Different PCs each time defeats stride's per-PC table, but the
        // addresses still form an ascending stream the stream detector can
        // pick up.
        p.on_miss(0x1000, 0x10);
        p.on_miss(0x1040, 0x20);
        let fired = p.on_miss(0x1080, 0x30);
        assert_eq!(fired, vec![0x10C0]);
    }
}
